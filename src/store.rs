//! Fixture persistence
//!
//! One file per monitored function, named after it with the codec's
//! extension. A flush never clobbers prior fixtures blindly: the existing
//! file is decoded, the fresh captures are merged in shape-by-shape, and
//! the merged table is written back through an atomic rename.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::codec::{Codec, CodecError, Format};
use crate::record::{FixtureSet, FixtureTable, ShapeMismatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fixture io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("cannot merge fixtures for `{function}`: {source}")]
    Merge {
        function: String,
        #[source]
        source: ShapeMismatch,
    },

    #[error("fixture file for `{function}` is neither a mapping nor a sequence")]
    UnsupportedPriorShape { function: String },
}

/// Writes fixture sets to per-function files.
pub struct FixtureStore {
    codec: Arc<dyn Codec>,
}

impl FixtureStore {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    /// Path the fixtures of `function` are stored at under `dir`.
    pub fn fixture_path(&self, dir: &Path, function: &str) -> PathBuf {
        dir.join(format!("{function}.{}", self.codec.file_extension()))
    }

    /// Write every table in `set` under `dir`, merging with prior files.
    /// The directory is created on first use.
    pub fn flush(&self, set: &FixtureSet, dir: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(dir)?;
        for (function, table) in set.iter() {
            self.flush_table(function, table, dir)?;
        }
        Ok(())
    }

    fn flush_table(
        &self,
        function: &str,
        table: &FixtureTable,
        dir: &Path,
    ) -> Result<(), StoreError> {
        let path = self.fixture_path(dir, function);
        let merged = match self.read_prior(&path, function)? {
            Some(mut prior) => {
                prior
                    .merge(table.clone())
                    .map_err(|source| StoreError::Merge {
                        function: function.to_string(),
                        source,
                    })?;
                prior
            }
            None => table.clone(),
        };

        let text = self.codec.serialize(&merged.into_value(), Format::Pretty)?;
        write_atomic(&path, &text)?;
        tracing::debug!(function, path = %path.display(), "wrote fixture file");
        Ok(())
    }

    /// Decode the existing fixture file, if any. A missing or empty file is
    /// no prior; a malformed one is warned about and discarded rather than
    /// blocking the producer run that is trying to replace it.
    fn read_prior(&self, path: &Path, function: &str) -> Result<Option<FixtureTable>, StoreError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let value = match self.codec.deserialize(&text) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "malformed fixture file, discarding prior contents"
                );
                return Ok(None);
            }
        };

        match FixtureTable::from_value(value) {
            Some(table) => Ok(Some(table)),
            None => Err(StoreError::UnsupportedPriorShape {
                function: function.to_string(),
            }),
        }
    }
}

fn write_atomic(path: &Path, text: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(text.as_bytes())?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}
