//! Recording windows
//!
//! A `Recorder` owns the what-and-how of capture: which functions to
//! monitor, how returns are keyed and reduced, which codec encodes values,
//! and where captured fixtures go. [`Recorder::record`] wraps one entry
//! call in a capture window; monitored functions report through
//! [`observe_return`] while the window is open.

mod interceptor;
mod table;

pub use interceptor::{observe_return, CallSite, CaptureContext, CapturedCall, Target};
pub use table::{FixtureSet, FixtureTable, Shape, ShapeMismatch};

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::{Codec, CodecError, Format, JsonCodec, Value};
use crate::invocation::InvocationKey;
use crate::report::{ReportSink, TracingSink};
use crate::store::{FixtureStore, StoreError};

use interceptor::{CaptureSession, SessionGuard};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("cannot accumulate fixtures: {0}")]
    Merge(#[from] ShapeMismatch),
}

/// Derives an invocation key from a capture.
pub type KeyFn = Box<dyn Fn(&CaptureContext<'_>, &Value) -> InvocationKey>;

/// Rewrites a return value before it is recorded. `None` keeps the raw
/// value.
pub type ReduceFn = Box<dyn Fn(&CaptureContext<'_>, &Value) -> Option<Value>>;

/// How captures are keyed. The variants are mutually exclusive by
/// construction, so there is no precedence to reason about.
pub enum KeyStrategy {
    /// Canonical bound-argument key (the default).
    BoundArguments,
    /// One fixed key for every capture in the window.
    Literal(InvocationKey),
    /// Caller-supplied key derivation.
    Custom(KeyFn),
}

impl Default for KeyStrategy {
    fn default() -> Self {
        KeyStrategy::BoundArguments
    }
}

/// Configuration for a [`Recorder`].
pub struct RecorderOptions {
    key_strategy: KeyStrategy,
    reducer: Option<ReduceFn>,
    codec: Arc<dyn Codec>,
    output_dir: Option<PathBuf>,
    sink: Arc<dyn ReportSink>,
    accumulate: bool,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            key_strategy: KeyStrategy::default(),
            reducer: None,
            codec: Arc::new(JsonCodec::new()),
            output_dir: None,
            sink: Arc::new(TracingSink),
            accumulate: false,
        }
    }
}

impl RecorderOptions {
    /// Key every capture in the window under one literal key.
    pub fn with_invocation_key(mut self, key: impl Into<InvocationKey>) -> Self {
        self.key_strategy = KeyStrategy::Literal(key.into());
        self
    }

    /// Derive keys with a custom function instead of argument binding.
    pub fn with_key_fn<F>(mut self, derive: F) -> Self
    where
        F: Fn(&CaptureContext<'_>, &Value) -> InvocationKey + 'static,
    {
        self.key_strategy = KeyStrategy::Custom(Box::new(derive));
        self
    }

    /// Rewrite return values before recording.
    pub fn with_reducer<F>(mut self, reduce: F) -> Self
    where
        F: Fn(&CaptureContext<'_>, &Value) -> Option<Value> + 'static,
    {
        self.reducer = Some(Box::new(reduce));
        self
    }

    /// Encode and persist with a specific codec.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Write fixture files under `dir` after each window.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Where serialized fixtures go when no output directory is set
    /// (default: the tracing sink).
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Carry captures across windows on the same recorder. Every flush then
    /// rewrites the merged state, which merge idempotence makes safe.
    pub fn accumulating(mut self) -> Self {
        self.accumulate = true;
        self
    }
}

/// The slice of configuration the interceptor needs while a window is open.
pub(crate) struct WindowConfig {
    pub(crate) targets: Vec<Target>,
    pub(crate) key_strategy: KeyStrategy,
    pub(crate) reducer: Option<ReduceFn>,
    pub(crate) codec: Arc<dyn Codec>,
}

impl WindowConfig {
    pub(crate) fn matches(&self, site: &CallSite) -> bool {
        self.targets.iter().any(|target| target.matches(site))
    }
}

/// Records live invocations of monitored functions.
///
/// Recording is thread-local: only calls made on the thread running the
/// entry closure are observed.
pub struct Recorder {
    config: Rc<WindowConfig>,
    output_dir: Option<PathBuf>,
    sink: Arc<dyn ReportSink>,
    accumulate: bool,
    store: FixtureStore,
    retained: RefCell<FixtureSet>,
}

impl Recorder {
    /// Recorder with default options: bound-argument keys, the default
    /// codec, fixtures reported to the tracing sink.
    pub fn new(targets: Vec<Target>) -> Self {
        Self::with_options(targets, RecorderOptions::default())
    }

    pub fn with_options(targets: Vec<Target>, options: RecorderOptions) -> Self {
        let store = FixtureStore::new(Arc::clone(&options.codec));
        Self {
            config: Rc::new(WindowConfig {
                targets,
                key_strategy: options.key_strategy,
                reducer: options.reducer,
                codec: options.codec,
            }),
            output_dir: options.output_dir,
            sink: options.sink,
            accumulate: options.accumulate,
            store,
            retained: RefCell::new(FixtureSet::new()),
        }
    }

    /// Run `entry` inside a capture window, then flush what it recorded.
    ///
    /// The interceptor slot is restored when the window ends, panicking or
    /// not. Fixtures captured by a panicking window are discarded.
    pub fn record<R>(&self, entry: impl FnOnce() -> R) -> Result<R, RecordError> {
        let session = Rc::new(CaptureSession::new(Rc::clone(&self.config)));
        let result = {
            let _guard = SessionGuard::install(Rc::clone(&session));
            entry()
        };
        let captured = session.take_captured();

        if self.accumulate {
            let mut retained = self.retained.borrow_mut();
            retained.absorb(captured)?;
            self.flush(&retained)?;
        } else {
            self.flush(&captured)?;
        }
        Ok(result)
    }

    fn flush(&self, set: &FixtureSet) -> Result<(), RecordError> {
        if set.is_empty() {
            return Ok(());
        }
        match &self.output_dir {
            Some(dir) => self.store.flush(set, dir)?,
            None => {
                for (function, table) in set.iter() {
                    let text = self
                        .config
                        .codec
                        .serialize(&table.to_value(), Format::Pretty)?;
                    self.sink.report(function, &text);
                }
            }
        }
        Ok(())
    }
}
