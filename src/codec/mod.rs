//! Self-describing value codec
//!
//! Serializes recorded value trees to JSON text and back. Tagged nodes carry
//! the reserved `__type__` discriminator; everything else passes through
//! structurally. Per-type hooks extend the codec to application types
//! without touching the wire layer.

mod recordable;
mod snapshot;
mod value;

pub use recordable::Recordable;
pub use snapshot::Snapshot;
pub use value::{Mapping, OpaqueValue, Value, TYPE_KEY};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::DateTime;
use thiserror::Error;

use value::{SNAPSHOT_FIELD, TIMESTAMP_FIELD, TIMESTAMP_TAG};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hook `{tag}` has no decoder")]
    HookMissingDecoder { tag: String },

    #[error("unknown value tag `{tag}`")]
    UnknownTag { tag: String },

    #[error("malformed `{tag}` node: {detail}")]
    MalformedNode { tag: String, detail: String },

    #[error("cannot record value of type `{type_name}`: {detail}")]
    Unrecordable { type_name: String, detail: String },

    #[error("snapshot of `{type_name}` failed: {detail}")]
    Snapshot { type_name: String, detail: String },
}

/// Text layout for serialized trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// No incidental whitespace. Invocation keys use this layout.
    Compact,
    /// Two-space indentation. Fixture files use this layout.
    Pretty,
}

/// The pluggable serializer seam.
pub trait Codec: Send + Sync {
    /// Lower a live value into a recorded tree.
    fn encode(&self, value: &dyn Recordable) -> Result<Value, CodecError>;

    /// Render a tree as text.
    fn serialize(&self, value: &Value, format: Format) -> Result<String, CodecError>;

    /// Parse text back into a tree, reviving tagged nodes.
    fn deserialize(&self, text: &str) -> Result<Value, CodecError>;

    /// File extension for fixture files written with this codec.
    fn file_extension(&self) -> &str;
}

type EncodeFn = Box<dyn Fn(&dyn Any) -> Result<Mapping, CodecError> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&Mapping) -> Result<Value, CodecError> + Send + Sync>;

/// Encode/decode hook pair for one application type.
///
/// The encode side fires on the value's exact runtime type and produces the
/// node's fields; the codec injects the discriminator. The decode side fires
/// on the node's tag. [`JsonCodec::register`] rejects a hook without a
/// decoder, since fixtures it writes could never be replayed.
pub struct TypeHook {
    tag: String,
    type_id: TypeId,
    type_name: &'static str,
    encode: EncodeFn,
    decode: Option<DecodeFn>,
}

impl TypeHook {
    pub fn new<T, F>(tag: impl Into<String>, encode: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<Mapping, CodecError> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        Self {
            tag: tag.into(),
            type_id: TypeId::of::<T>(),
            type_name,
            encode: Box::new(move |any| {
                let value = any
                    .downcast_ref::<T>()
                    .ok_or_else(|| CodecError::Unrecordable {
                        type_name: type_name.to_string(),
                        detail: "hook dispatched with a different runtime type".to_string(),
                    })?;
                encode(value)
            }),
            decode: None,
        }
    }

    /// Attach the decode side. It receives the revived node fields,
    /// discriminator entry included.
    pub fn with_decoder<F>(mut self, decode: F) -> Self
    where
        F: Fn(&Mapping) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        self.decode = Some(Box::new(decode));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }
}

/// JSON implementation of [`Codec`] with per-type extension hooks.
pub struct JsonCodec {
    by_type: HashMap<TypeId, Arc<TypeHook>>,
    by_tag: HashMap<String, Arc<TypeHook>>,
    strict: bool,
}

impl JsonCodec {
    /// Lenient codec: values that cannot be recorded degrade to their
    /// `Debug` text, unknown tags decode to null. Malformed tagged nodes
    /// are errors in both modes.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_tag: HashMap::new(),
            strict: false,
        }
    }

    /// Strict codec: every degradation becomes an error instead.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::new()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Register a hook. A later registration for the same type or tag
    /// replaces the earlier one; the two indexes stay mirrored.
    pub fn register(&mut self, hook: TypeHook) -> Result<(), CodecError> {
        if hook.decode.is_none() {
            return Err(CodecError::HookMissingDecoder {
                tag: hook.tag.clone(),
            });
        }
        if let Some(previous) = self.by_type.remove(&hook.type_id) {
            self.by_tag.remove(&previous.tag);
        }
        if let Some(previous) = self.by_tag.remove(&hook.tag) {
            self.by_type.remove(&previous.type_id);
        }
        let hook = Arc::new(hook);
        self.by_type.insert(hook.type_id, Arc::clone(&hook));
        self.by_tag.insert(hook.tag.clone(), hook);
        Ok(())
    }

    fn revive(&self, raw: serde_json::Value) -> Result<Value, CodecError> {
        match raw {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(flag) => Ok(Value::Bool(flag)),
            serde_json::Value::Number(number) => Ok(Value::Number(number)),
            serde_json::Value::String(text) => Ok(Value::String(text)),
            serde_json::Value::Array(items) => {
                let revived = items
                    .into_iter()
                    .map(|item| self.revive(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Sequence(revived))
            }
            serde_json::Value::Object(fields) => {
                if let Some(tag) = fields.get(TYPE_KEY) {
                    let tag = match tag {
                        serde_json::Value::String(text) => text.clone(),
                        other => {
                            let tag = other.to_string();
                            if self.strict {
                                return Err(CodecError::UnknownTag { tag });
                            }
                            tracing::warn!(tag = %tag, "unknown value tag, decoding as null");
                            return Ok(Value::Null);
                        }
                    };
                    return self.revive_tagged(&tag, fields);
                }
                Ok(Value::Mapping(self.revive_fields(fields)?))
            }
        }
    }

    fn revive_fields(
        &self,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Mapping, CodecError> {
        fields
            .into_iter()
            .map(|(key, raw)| Ok((key, self.revive(raw)?)))
            .collect()
    }

    fn revive_tagged(
        &self,
        tag: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Value, CodecError> {
        if let Some(hook) = self.by_tag.get(tag) {
            let decode = hook
                .decode
                .as_ref()
                .ok_or_else(|| CodecError::HookMissingDecoder {
                    tag: tag.to_string(),
                })?;
            let revived = self.revive_fields(fields)?;
            return decode(&revived);
        }

        if tag == TIMESTAMP_TAG {
            let text = fields
                .get(TIMESTAMP_FIELD)
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| CodecError::MalformedNode {
                    tag: tag.to_string(),
                    detail: format!("missing string `{TIMESTAMP_FIELD}` field"),
                })?;
            let instant =
                DateTime::parse_from_rfc3339(text).map_err(|err| CodecError::MalformedNode {
                    tag: tag.to_string(),
                    detail: err.to_string(),
                })?;
            return Ok(Value::Timestamp(instant));
        }

        if let Some(raw) = fields.get(SNAPSHOT_FIELD) {
            let text = raw.as_str().ok_or_else(|| CodecError::MalformedNode {
                tag: tag.to_string(),
                detail: format!("`{SNAPSHOT_FIELD}` field is not a string"),
            })?;
            let bytes =
                general_purpose::STANDARD
                    .decode(text)
                    .map_err(|err| CodecError::MalformedNode {
                        tag: tag.to_string(),
                        detail: err.to_string(),
                    })?;
            return Ok(Value::Opaque(OpaqueValue {
                type_name: tag.to_string(),
                bytes,
            }));
        }

        if self.strict {
            return Err(CodecError::UnknownTag {
                tag: tag.to_string(),
            });
        }
        tracing::warn!(tag = %tag, "unknown value tag, decoding as null");
        Ok(Value::Null)
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for JsonCodec {
    fn encode(&self, value: &dyn Recordable) -> Result<Value, CodecError> {
        let lowered = match self.by_type.get(&value.as_any().type_id()) {
            Some(hook) => (hook.encode)(value.as_any()).map(|mut fields| {
                fields.insert(TYPE_KEY.to_string(), Value::String(hook.tag.clone()));
                Value::Mapping(fields)
            }),
            None => value.record(self),
        };
        match lowered {
            Ok(tree) => Ok(tree),
            Err(err) if !self.strict => {
                tracing::warn!(error = %err, "recording value as debug text");
                Ok(Value::String(format!("{value:?}")))
            }
            Err(err) => Err(err),
        }
    }

    fn serialize(&self, value: &Value, format: Format) -> Result<String, CodecError> {
        let text = match format {
            Format::Compact => serde_json::to_string(value)?,
            Format::Pretty => serde_json::to_string_pretty(value)?,
        };
        Ok(text)
    }

    fn deserialize(&self, text: &str) -> Result<Value, CodecError> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        self.revive(raw)
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}
