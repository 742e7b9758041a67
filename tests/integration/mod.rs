//! Integration tests for calltape
//!
//! These tests verify that recording, persistence, and replay work together.

#[path = "../common/mod.rs"]
pub mod common;

pub mod codec_roundtrip;
pub mod record_replay;
