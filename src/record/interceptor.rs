//! The capture interceptor
//!
//! One thread-local slot holds the active capture session. Installing a
//! session saves whatever was there and restores it on drop, so recording
//! windows nest and unwind cleanly even across panics. Monitored functions
//! report through [`observe_return`] at their return boundary; the call is
//! free when no matching session is active.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::codec::{Codec, CodecError, Value};
use crate::invocation::{invocation_key_with, CallArgs, Signature};
use crate::record::table::FixtureSet;
use crate::record::{KeyStrategy, WindowConfig};

thread_local! {
    static ACTIVE: RefCell<Option<Rc<CaptureSession>>> = const { RefCell::new(None) };
}

/// Reported identity of an instrumented function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    function: String,
    source: Option<String>,
}

impl CallSite {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            source: None,
        }
    }

    /// A site that also names where the function lives, for disambiguating
    /// identically-named functions.
    pub fn located(function: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            source: Some(source.into()),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Allow-list entry naming a function to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Match by function name alone.
    Function(String),
    /// Match by function name and source location.
    Located { function: String, source: String },
}

impl Target {
    pub fn function(name: impl Into<String>) -> Self {
        Target::Function(name.into())
    }

    pub fn located(function: impl Into<String>, source: impl Into<String>) -> Self {
        Target::Located {
            function: function.into(),
            source: source.into(),
        }
    }

    pub fn matches(&self, site: &CallSite) -> bool {
        match self {
            Target::Function(name) => site.function() == name,
            Target::Located { function, source } => {
                site.function() == function && site.source() == Some(source.as_str())
            }
        }
    }
}

/// One observed return: the callee's declared signature, the live arguments,
/// and the encoded return value.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub(crate) signature: Signature,
    pub(crate) args: CallArgs,
    pub(crate) value: Value,
}

impl CapturedCall {
    pub fn new(signature: Signature, args: CallArgs, value: Value) -> Self {
        Self {
            signature,
            args,
            value,
        }
    }
}

/// Borrowed view of a capture handed to reducers and custom key functions.
pub struct CaptureContext<'a> {
    site: &'a CallSite,
    signature: &'a Signature,
    args: &'a CallArgs,
}

impl<'a> CaptureContext<'a> {
    pub fn site(&self) -> &CallSite {
        self.site
    }

    pub fn signature(&self) -> &Signature {
        self.signature
    }

    pub fn args(&self) -> &CallArgs {
        self.args
    }
}

pub(crate) struct CaptureSession {
    config: Rc<WindowConfig>,
    captured: RefCell<FixtureSet>,
    busy: Cell<bool>,
}

impl CaptureSession {
    pub(crate) fn new(config: Rc<WindowConfig>) -> Self {
        Self {
            config,
            captured: RefCell::new(FixtureSet::new()),
            busy: Cell::new(false),
        }
    }

    pub(crate) fn take_captured(&self) -> FixtureSet {
        self.captured.take()
    }

    fn record_call(&self, site: &CallSite, call: CapturedCall) {
        let context = CaptureContext {
            site,
            signature: &call.signature,
            args: &call.args,
        };

        let value = match &self.config.reducer {
            Some(reduce) => reduce(&context, &call.value).unwrap_or_else(|| call.value.clone()),
            None => call.value.clone(),
        };

        let key = match &self.config.key_strategy {
            KeyStrategy::BoundArguments => {
                match invocation_key_with(self.config.codec.as_ref(), &call.signature, &call.args) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::warn!(
                            function = %site.function(),
                            error = %err,
                            "cannot key this capture, dropping it"
                        );
                        return;
                    }
                }
            }
            KeyStrategy::Literal(key) => key.clone(),
            KeyStrategy::Custom(derive) => derive(&context, &value),
        };

        self.captured.borrow_mut().record(site.function(), key, value);
    }
}

/// Report a monitored function's return.
///
/// Call this at the return boundary of an instrumented function. The
/// closure is only run when a capture session is active on this thread and
/// `site` matches its allow-list; it receives the session's codec so
/// argument and return values encode with the session's hooks. A closure
/// error drops this one capture with a warning and recording continues.
///
/// Captures triggered from inside capture processing are skipped, so the
/// recorder never recurses into itself.
pub fn observe_return<F>(site: &CallSite, capture: F)
where
    F: FnOnce(&dyn Codec) -> Result<CapturedCall, CodecError>,
{
    ACTIVE.with(|slot| {
        let session = match slot.borrow().as_ref() {
            Some(active) if !active.busy.get() => Rc::clone(active),
            _ => return,
        };
        if !session.config.matches(site) {
            return;
        }

        let _latch = BusyLatch::engage(&session.busy);
        match capture(session.config.codec.as_ref()) {
            Ok(call) => session.record_call(site, call),
            Err(err) => {
                tracing::warn!(
                    function = %site.function(),
                    error = %err,
                    "capture failed, dropping it"
                );
            }
        }
    });
}

/// Scoped activation of the interceptor slot. Saves the previously active
/// session and puts it back unconditionally on drop.
pub(crate) struct SessionGuard {
    previous: Option<Rc<CaptureSession>>,
}

impl SessionGuard {
    pub(crate) fn install(session: Rc<CaptureSession>) -> Self {
        let previous = ACTIVE.with(|slot| slot.borrow_mut().replace(session));
        Self { previous }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|slot| *slot.borrow_mut() = previous);
    }
}

struct BusyLatch<'a> {
    busy: &'a Cell<bool>,
}

impl<'a> BusyLatch<'a> {
    fn engage(busy: &'a Cell<bool>) -> Self {
        busy.set(true);
        Self { busy }
    }
}

impl Drop for BusyLatch<'_> {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}
