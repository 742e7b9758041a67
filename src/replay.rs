//! Replaying recorded fixtures
//!
//! A `FixtureDouble` loads one function's fixture file and answers calls by
//! pure lookup: recompute the invocation key from the arguments, return the
//! stored value or the miss sentinel. The loaded table is never mutated.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::{Codec, CodecError, JsonCodec, Value};
use crate::invocation::{invocation_key_with, CallArgs, KeyError, Signature};
use crate::record::FixtureTable;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("fixture io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("argument lookup requires a signature, set one with `with_signature`")]
    MissingSignature,

    #[error("fixture file is neither a mapping nor a sequence")]
    UnsupportedShape,
}

/// A deterministic stand-in for one recorded function.
///
/// A hit returns the recorded value; a miss returns `None` so the caller
/// decides what a missing fixture means for the test at hand.
pub struct FixtureDouble {
    table: FixtureTable,
    codec: Arc<dyn Codec>,
    signature: Option<Signature>,
}

impl FixtureDouble {
    /// Load a fixture file with the default codec.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        Self::load_with(path, Arc::new(JsonCodec::new()))
    }

    /// Load a fixture file with a specific codec.
    ///
    /// An empty file yields an empty double with a warning. Malformed
    /// content is an error: on the consumer side that is a broken test
    /// setup, not something to paper over.
    pub fn load_with(path: &Path, codec: Arc<dyn Codec>) -> Result<Self, ReplayError> {
        let text = fs::read_to_string(path)?;
        let table = if text.trim().is_empty() {
            tracing::warn!(path = %path.display(), "empty fixture file, double starts empty");
            FixtureTable::default()
        } else {
            let value = codec.deserialize(&text)?;
            FixtureTable::from_value(value).ok_or(ReplayError::UnsupportedShape)?
        };
        Ok(Self {
            table,
            codec,
            signature: None,
        })
    }

    /// Build a double from an in-memory table.
    pub fn from_table(table: FixtureTable) -> Self {
        Self {
            table,
            codec: Arc::new(JsonCodec::new()),
            signature: None,
        }
    }

    /// Attach the recorded function's signature, enabling argument lookup
    /// through [`call`](Self::call).
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Look up the recorded value for `args`.
    ///
    /// `Ok(None)` is a miss. Binding failures are errors, distinct from
    /// misses. Sequence-shaped fixtures have no keys, so every argument
    /// lookup against them is a miss.
    pub fn call(&self, args: &CallArgs) -> Result<Option<&Value>, ReplayError> {
        let signature = self.signature.as_ref().ok_or(ReplayError::MissingSignature)?;
        let key = invocation_key_with(self.codec.as_ref(), signature, args)?;
        Ok(self.get(key.as_str()))
    }

    /// Raw lookup by literal key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.table {
            FixtureTable::Mapping(entries) => entries.get(key),
            FixtureTable::Sequence(_) => None,
        }
    }

    pub fn table(&self) -> &FixtureTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
