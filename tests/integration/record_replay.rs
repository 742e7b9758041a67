//! Integration tests for the record/replay cycle
//!
//! A producer run records instrumented calls into fixture files; a consumer
//! run loads those files and replays them as lookup doubles.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use calltape::{
    CallArgs, FixtureDouble, MemorySink, Recorder, RecorderOptions, Signature, Target, Value,
};
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use super::common::instrumented::{convert, greet, schedule, Ledger};
use super::common::init_tracing;

fn convert_signature() -> Signature {
    Signature::new().param("amount").param("rate")
}

/// Record one call, then replay it from the fixture file by positional
/// and by keyword arguments.
#[test]
fn test_recorded_call_replays_as_double() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let recorder = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default().with_output_dir(dir.path()),
    );

    let produced = recorder.record(|| convert(3, 4))?;
    assert_eq!(produced, 12, "entry point should run for real");

    let double = FixtureDouble::load(&dir.path().join("convert.json"))?
        .with_signature(convert_signature());

    assert_eq!(
        double.call(&CallArgs::new().pos(3).pos(4))?,
        Some(&Value::from(12))
    );
    assert_eq!(
        double.call(&CallArgs::new().kw("rate", 4).kw("amount", 3))?,
        Some(&Value::from(12)),
        "keyword spelling should hit the same fixture"
    );
    assert_eq!(
        double.call(&CallArgs::new().pos(9).pos(9))?,
        None,
        "unrecorded arguments are a miss, not an error"
    );
    Ok(())
}

/// A later recording window merges into the prior file instead of
/// clobbering it, and re-recording the same arguments overwrites in place.
#[test]
fn test_windows_merge_into_prior_files() -> Result<()> {
    let dir = tempdir()?;
    let options = || RecorderOptions::default().with_output_dir(dir.path());

    let first = Recorder::with_options(vec![Target::function("convert")], options());
    first.record(|| convert(1, 2))?;

    let second = Recorder::with_options(vec![Target::function("convert")], options());
    second.record(|| {
        convert(5, 6);
        convert(1, 2);
    })?;

    let double = FixtureDouble::load(&dir.path().join("convert.json"))?
        .with_signature(convert_signature());
    assert_eq!(double.len(), 2, "distinct argument sets accumulate");
    assert_eq!(
        double.call(&CallArgs::new().pos(1).pos(2))?,
        Some(&Value::from(2))
    );
    assert_eq!(
        double.call(&CallArgs::new().pos(5).pos(6))?,
        Some(&Value::from(30))
    );
    Ok(())
}

/// Functions outside the monitored set run untouched and leave no file.
#[test]
fn test_unmonitored_functions_are_not_recorded() -> Result<()> {
    let dir = tempdir()?;
    let recorder = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default().with_output_dir(dir.path()),
    );

    let greeting = recorder.record(|| greet("ada"))?;
    assert_eq!(greeting, "hello ada");
    assert!(
        !dir.path().join("greet.json").exists(),
        "greet is not monitored, so nothing should be flushed"
    );
    assert!(!dir.path().join("convert.json").exists());
    Ok(())
}

/// Method-style recordings key on the arguments alone, so a consumer can
/// replay them without any receiver at hand.
#[test]
fn test_receiver_is_excluded_from_the_key() -> Result<()> {
    let dir = tempdir()?;
    let recorder = Recorder::with_options(
        vec![Target::function("total")],
        RecorderOptions::default().with_output_dir(dir.path()),
    );

    let ledger = Ledger { currency: "EUR" };
    recorder.record(|| ledger.total(10, 1))?;

    let signature = Signature::new()
        .param("amount")
        .param("fee")
        .with_receiver("self");
    let double =
        FixtureDouble::load(&dir.path().join("total.json"))?.with_signature(signature);

    assert_eq!(
        double.call(&CallArgs::new().pos(10).pos(1))?,
        Some(&Value::from(11)),
        "receiver-free replay should hit the recorded fixture"
    );
    assert_eq!(
        double.call(&CallArgs::new().pos(10).pos(1).with_receiver("USD"))?,
        Some(&Value::from(11)),
        "a different receiver should hit the same fixture"
    );
    Ok(())
}

/// Timestamp arguments become part of the key in their tagged form and
/// still replay from the file.
#[test]
fn test_timestamp_arguments_replay() -> Result<()> {
    let dir = tempdir()?;
    let recorder = Recorder::with_options(
        vec![Target::function("schedule")],
        RecorderOptions::default().with_output_dir(dir.path()),
    );

    let when = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    recorder.record(|| schedule(when))?;

    let double = FixtureDouble::load(&dir.path().join("schedule.json"))?
        .with_signature(Signature::new().param("when"));
    assert_eq!(
        double.call(&CallArgs::new().pos(when))?,
        Some(&Value::from("booked"))
    );
    assert_eq!(
        double.call(&CallArgs::new().pos(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()))?,
        None
    );
    Ok(())
}

/// A panic inside the window propagates, flushes nothing, and leaves the
/// recorder reusable.
#[test]
fn test_panicking_window_flushes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let recorder = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default().with_output_dir(dir.path()),
    );

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        recorder.record(|| {
            convert(1, 2);
            panic!("entry blew up");
        })
    }));
    assert!(outcome.is_err(), "the panic should propagate");
    assert!(
        !dir.path().join("convert.json").exists(),
        "a panicked window must not flush partial captures"
    );

    // The active slot was restored, so a fresh window records normally.
    recorder.record(|| convert(3, 4))?;
    let double = FixtureDouble::load(&dir.path().join("convert.json"))?;
    assert_eq!(double.len(), 1);
    Ok(())
}

/// Nested windows each capture their own calls, and closing the inner one
/// hands control back to the outer.
#[test]
fn test_nested_windows_capture_independently() -> Result<()> {
    let outer_dir = tempdir()?;
    let inner_dir = tempdir()?;
    let outer = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default().with_output_dir(outer_dir.path()),
    );
    let inner = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default().with_output_dir(inner_dir.path()),
    );

    outer.record(|| {
        convert(1, 2);
        inner.record(|| convert(3, 4)).unwrap();
        convert(5, 6);
    })?;

    let outer_double = FixtureDouble::load(&outer_dir.path().join("convert.json"))?;
    let inner_double = FixtureDouble::load(&inner_dir.path().join("convert.json"))?;
    assert_eq!(outer_double.len(), 2, "outer window sees only its own calls");
    assert_eq!(inner_double.len(), 1, "inner window sees only its own calls");
    Ok(())
}

/// An accumulating recorder folds every window into one growing set and
/// stays idempotent when a window repeats earlier calls.
#[test]
fn test_accumulating_recorder_merges_windows() -> Result<()> {
    let dir = tempdir()?;
    let recorder = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default()
            .with_output_dir(dir.path())
            .accumulating(),
    );

    recorder.record(|| convert(1, 2))?;
    recorder.record(|| convert(5, 6))?;
    recorder.record(|| convert(1, 2))?;

    let double = FixtureDouble::load(&dir.path().join("convert.json"))?;
    assert_eq!(double.len(), 2, "repeat calls overwrite rather than duplicate");
    Ok(())
}

/// Without an output directory the recorder hands serialized fixtures to
/// the report sink instead of the filesystem.
#[test]
fn test_sink_receives_fixtures_without_output_dir() -> Result<()> {
    let sink = Arc::new(MemorySink::new());
    let recorder = Recorder::with_options(
        vec![Target::function("convert")],
        RecorderOptions::default().with_sink(sink.clone()),
    );

    recorder.record(|| convert(1, 2))?;

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "convert");
    insta::assert_snapshot!(entries[0].1, @r#"
    {
      "{\"amount\":1,\"rate\":2}": 2
    }
    "#);
    Ok(())
}
