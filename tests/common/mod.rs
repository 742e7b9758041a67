//! Shared test utilities for calltape
//!
//! This module provides common helpers for the integration suite:
//! - Instrumented demo functions that report through `observe_return`
//! - One-time tracing setup for test output

pub mod instrumented;

use once_cell::sync::Lazy;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
});

/// Install the test subscriber once for the whole binary.
pub fn init_tracing() {
    Lazy::force(&TRACING);
}
