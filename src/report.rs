//! Fixture reporting sinks
//!
//! When a recorder has no output directory, each captured table is
//! serialized and handed to a sink instead of being written to disk.

use parking_lot::Mutex;

/// Receives serialized fixture tables that have nowhere else to go.
pub trait ReportSink: Send + Sync {
    fn report(&self, function: &str, serialized: &str);
}

/// Default sink: emits each table through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, function: &str, serialized: &str) {
        tracing::info!(function, fixtures = %serialized, "recorded fixtures");
    }
}

/// Sink that collects reports in memory for test assertions.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported `(function, serialized)` pairs, in report order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }
}

impl ReportSink for MemorySink {
    fn report(&self, function: &str, serialized: &str) {
        self.entries
            .lock()
            .push((function.to_string(), serialized.to_string()));
    }
}
