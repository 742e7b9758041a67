//! Integration tests for codec round-trips
//!
//! Property coverage over the native value tree plus pinned snapshots of
//! the wire form.

use calltape::{Codec, Format, JsonCodec, Mapping, Snapshot, Value};
use chrono::{FixedOffset, TimeZone, Utc};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::from),
    ];
    // Lowercase keys so generated mappings can never collide with the
    // reserved "__type__" discriminator.
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Mapping),
        ]
    })
}

proptest! {
    /// Any native tree survives serialize/deserialize in both formats.
    #[test]
    fn test_native_trees_roundtrip(value in value_strategy()) {
        let codec = JsonCodec::new();
        for format in [Format::Compact, Format::Pretty] {
            let text = codec.serialize(&value, format).unwrap();
            prop_assert_eq!(codec.deserialize(&text).unwrap(), value.clone());
        }
    }
}

/// Timestamps keep their instant and their offset across the wire.
#[test]
fn test_timestamps_roundtrip_across_offsets() {
    let codec = JsonCodec::new();
    for seconds in [0, 2 * 3600, -(7 * 3600 + 1800)] {
        let zone = FixedOffset::east_opt(seconds).unwrap();
        let when = zone.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let text = codec
            .serialize(&Value::Timestamp(when), Format::Compact)
            .unwrap();
        let revived = codec.deserialize(&text).unwrap();
        let restored = revived.as_timestamp().unwrap();
        assert_eq!(restored, when);
        assert_eq!(restored.offset(), when.offset(), "offset text must survive");
    }
}

/// Two timestamps denoting the same instant compare equal whatever their
/// offsets say.
#[test]
fn test_equal_instants_compare_equal_across_offsets() {
    let utc = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let zoned = utc.with_timezone(&FixedOffset::east_opt(2 * 3600).unwrap());
    assert_eq!(Value::from(utc), Value::Timestamp(zoned));
}

#[derive(Debug, PartialEq)]
struct SessionToken {
    bytes: Vec<u8>,
}

impl Snapshot for SessionToken {
    fn to_snapshot(&self) -> Result<Vec<u8>, calltape::CodecError> {
        Ok(self.bytes.clone())
    }

    fn from_snapshot(bytes: &[u8]) -> Result<Self, calltape::CodecError> {
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}

/// Opaque values round-trip byte for byte and restore to the native type.
#[test]
fn test_snapshot_values_roundtrip_through_text() {
    let codec = JsonCodec::new();
    let token = SessionToken {
        bytes: vec![7, 0, 255],
    };
    let node = Value::opaque(&token).unwrap();
    let text = codec.serialize(&node, Format::Compact).unwrap();
    let revived = codec.deserialize(&text).unwrap();
    let restored: SessionToken = revived.restore().unwrap();
    assert_eq!(restored, token);
}

/// The pretty wire form is pinned: sorted keys, two-space indent, tagged
/// timestamp nodes.
#[test]
fn test_pretty_form_is_stable() {
    let codec = JsonCodec::new();
    let zone = FixedOffset::east_opt(0).unwrap();
    let mut fields = Mapping::new();
    fields.insert("count".into(), Value::from(3));
    fields.insert(
        "tags".into(),
        Value::Sequence(vec![Value::from("a"), Value::from("b")]),
    );
    fields.insert(
        "when".into(),
        Value::Timestamp(zone.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
    );

    let text = codec
        .serialize(&Value::Mapping(fields), Format::Pretty)
        .unwrap();
    insta::assert_snapshot!(text, @r#"
    {
      "count": 3,
      "tags": [
        "a",
        "b"
      ],
      "when": {
        "__type__": "timestamp",
        "rfc3339": "2024-05-01T12:00:00+00:00"
      }
    }
    "#);
}

/// A registered hook shapes both directions of the trip.
#[test]
fn test_hooks_roundtrip_custom_types() {
    #[derive(Debug)]
    struct Grid {
        rows: u32,
        cols: u32,
    }

    impl calltape::Recordable for Grid {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn record(&self, _codec: &dyn Codec) -> Result<Value, calltape::CodecError> {
            Err(calltape::CodecError::Unrecordable {
                type_name: "Grid".to_string(),
                detail: "requires the grid hook".to_string(),
            })
        }
    }

    let mut codec = JsonCodec::new();
    codec.register(
        calltape::TypeHook::new("grid", |grid: &Grid| {
            let mut fields = Mapping::new();
            fields.insert("rows".into(), Value::from(grid.rows as u64));
            fields.insert("cols".into(), Value::from(grid.cols as u64));
            Ok(fields)
        })
        .with_decoder(|fields| Ok(Value::Mapping(fields.clone()))),
    )
    .unwrap();

    let encoded = codec.encode(&Grid { rows: 2, cols: 5 }).unwrap();
    let text = codec.serialize(&encoded, Format::Compact).unwrap();
    assert_eq!(text, r#"{"__type__":"grid","cols":5,"rows":2}"#);

    let revived = codec.deserialize(&text).unwrap();
    let fields = revived.as_mapping().unwrap();
    assert_eq!(fields.get("rows"), Some(&Value::from(2u64)));
    assert_eq!(fields.get("cols"), Some(&Value::from(5u64)));
}
