//! Invocation identity
//!
//! Turns one call's live arguments into a deterministic key: bind the
//! arguments against the declared signature into a canonical mapping, then
//! serialize that mapping compactly. Two calls that bind the same values to
//! the same names produce byte-identical keys regardless of calling style.

use std::fmt;

use thiserror::Error;

use crate::codec::{Codec, CodecError, Format, JsonCodec, Mapping, Value};

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("takes at most {expected} positional arguments but {supplied} were supplied")]
    TooManyPositional { expected: usize, supplied: usize },

    #[error("unexpected keyword argument `{0}`")]
    UnknownKeyword(String),

    #[error("multiple values for argument `{0}`")]
    DuplicateBinding(String),

    #[error("receiver supplied for a signature that does not declare one")]
    UnexpectedReceiver,
}

/// Errors from computing an invocation key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    default: Option<Value>,
}

/// Declared parameter list of a monitored function.
///
/// Parameter names, declaration order, defaults and the variadic captures
/// all feed the canonical argument mapping, so the signature reported at a
/// call site must match the function as declared.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
    varargs: Option<String>,
    kwargs: Option<String>,
    receiver: Option<String>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required parameter, bindable positionally or by keyword.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declare a parameter whose default fills in when the call leaves it
    /// unbound. The default participates in the key like any bound value.
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Declare a variadic positional capture. `name` receives overflow
    /// positionals as a sequence and is present even when empty.
    pub fn varargs(mut self, name: impl Into<String>) -> Self {
        self.varargs = Some(name.into());
        self
    }

    /// Declare a keyword capture. `name` receives undeclared keywords as a
    /// mapping and is present even when empty.
    pub fn kwargs(mut self, name: impl Into<String>) -> Self {
        self.kwargs = Some(name.into());
        self
    }

    /// Declare an implicit receiver. It never enters the canonical mapping;
    /// declaring it only permits receiver-carrying calls.
    pub fn with_receiver(mut self, name: impl Into<String>) -> Self {
        self.receiver = Some(name.into());
        self
    }

    /// Bind `args` to canonical parameter names.
    pub fn bind(&self, args: &CallArgs) -> Result<Mapping, BindingError> {
        if args.receiver.is_some() && self.receiver.is_none() {
            return Err(BindingError::UnexpectedReceiver);
        }

        let mut bound = Mapping::new();
        let mut overflow = Vec::new();

        for (index, value) in args.positional.iter().enumerate() {
            match self.params.get(index) {
                Some(param) => {
                    bound.insert(param.name.clone(), value.clone());
                }
                None if self.varargs.is_some() => overflow.push(value.clone()),
                None => {
                    return Err(BindingError::TooManyPositional {
                        expected: self.params.len(),
                        supplied: args.positional.len(),
                    });
                }
            }
        }

        let mut captured = Mapping::new();
        for (name, value) in &args.keywords {
            if self.params.iter().any(|param| param.name == *name) {
                if bound.contains_key(name) {
                    return Err(BindingError::DuplicateBinding(name.clone()));
                }
                bound.insert(name.clone(), value.clone());
            } else if self.kwargs.is_some() {
                if captured.insert(name.clone(), value.clone()).is_some() {
                    return Err(BindingError::DuplicateBinding(name.clone()));
                }
            } else {
                return Err(BindingError::UnknownKeyword(name.clone()));
            }
        }

        for param in &self.params {
            if !bound.contains_key(&param.name) {
                match &param.default {
                    Some(default) => {
                        bound.insert(param.name.clone(), default.clone());
                    }
                    None => return Err(BindingError::MissingArgument(param.name.clone())),
                }
            }
        }

        if let Some(name) = &self.varargs {
            bound.insert(name.clone(), Value::Sequence(overflow));
        }
        if let Some(name) = &self.kwargs {
            bound.insert(name.clone(), Value::Mapping(captured));
        }

        Ok(bound)
    }
}

/// Live arguments of one call.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
    receiver: Option<Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn pos(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kw(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Attach the receiver of a wrapped invocation. The value never enters
    /// the canonical mapping.
    pub fn with_receiver(mut self, value: impl Into<Value>) -> Self {
        self.receiver = Some(value.into());
        self
    }
}

/// Deterministic identity of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationKey(String);

impl InvocationKey {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for InvocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for InvocationKey {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for InvocationKey {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Compute the invocation key with the default codec.
pub fn compute_invocation_key(
    signature: &Signature,
    args: &CallArgs,
) -> Result<InvocationKey, KeyError> {
    invocation_key_with(&JsonCodec::new(), signature, args)
}

/// Compute the invocation key with a specific codec.
///
/// The key is the compact serialization of the canonical argument mapping
/// and nothing else: no function name, no ambient time, no identity hashing.
pub fn invocation_key_with(
    codec: &dyn Codec,
    signature: &Signature,
    args: &CallArgs,
) -> Result<InvocationKey, KeyError> {
    let bound = signature.bind(args)?;
    let text = codec.serialize(&Value::Mapping(bound), Format::Compact)?;
    Ok(InvocationKey::new(text))
}
