//! Record live function calls as replayable test fixtures.
//!
//! A producer run exercises real code inside a recording window and
//! persists each monitored function's invocations as invocation-key to
//! value fixtures. A consumer run loads those fixtures into a
//! [`FixtureDouble`] and replays them by pure lookup, with the original
//! dependencies nowhere in sight.
//!
//! # Example
//! ```
//! use calltape::{
//!     observe_return, CallArgs, CallSite, CapturedCall, Recorder, Signature, Target,
//! };
//!
//! fn add(a: i64, b: i64) -> i64 {
//!     let total = a + b;
//!     observe_return(&CallSite::new("add"), |codec| {
//!         Ok(CapturedCall::new(
//!             Signature::new().param("a").param("b"),
//!             CallArgs::new().pos(a).pos(b),
//!             codec.encode(&total)?,
//!         ))
//!     });
//!     total
//! }
//!
//! let recorder = Recorder::new(vec![Target::function("add")]);
//! let sum = recorder.record(|| add(2, 3))?;
//! assert_eq!(sum, 5);
//! # Ok::<(), calltape::RecordError>(())
//! ```

pub mod codec;
pub mod invocation;
pub mod record;
pub mod replay;
pub mod report;
pub mod store;

pub use codec::{
    Codec, CodecError, Format, JsonCodec, Mapping, OpaqueValue, Recordable, Snapshot, TypeHook,
    Value, TYPE_KEY,
};
pub use invocation::{
    compute_invocation_key, invocation_key_with, BindingError, CallArgs, InvocationKey, KeyError,
    Signature,
};
pub use record::{
    observe_return, CallSite, CaptureContext, CapturedCall, FixtureSet, FixtureTable, KeyFn,
    KeyStrategy, RecordError, Recorder, RecorderOptions, ReduceFn, Shape, ShapeMismatch, Target,
};
pub use replay::{FixtureDouble, ReplayError};
pub use report::{MemorySink, ReportSink, TracingSink};
pub use store::{FixtureStore, StoreError};
