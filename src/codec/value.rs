//! Recorded value trees
//!
//! `Value` is the shape every recorded argument and return value takes
//! before it hits the wire: JSON-like natives plus two tagged extension
//! nodes, one for calendar timestamps and one for opaque binary snapshots.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::snapshot::Snapshot;
use super::CodecError;

/// Reserved discriminator key marking a tagged node on the wire.
///
/// A mapping that uses this key as an ordinary field will be misread as a
/// tagged node when decoded.
pub const TYPE_KEY: &str = "__type__";

pub(crate) const TIMESTAMP_TAG: &str = "timestamp";
pub(crate) const TIMESTAMP_FIELD: &str = "rfc3339";
pub(crate) const SNAPSHOT_FIELD: &str = "snapshot";

/// Key-ordered mapping node. The ordering makes the compact text form
/// canonical regardless of insertion order.
pub type Mapping = BTreeMap<String, Value>;

/// A recorded value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    /// Calendar timestamp, persisted as an RFC 3339 tagged node.
    Timestamp(DateTime<FixedOffset>),
    /// Binary snapshot of a value the JSON natives cannot express.
    Opaque(OpaqueValue),
}

/// Payload of a [`Value::Opaque`] node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueValue {
    /// Recorded for diagnostics; not checked on restore.
    pub type_name: String,
    pub bytes: Vec<u8>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(number) => number.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(number) => number.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(instant) => Some(*instant),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueValue> {
        match self {
            Value::Opaque(opaque) => Some(opaque),
            _ => None,
        }
    }

    /// Build an opaque node from any [`Snapshot`] value.
    pub fn opaque<T: Snapshot>(value: &T) -> Result<Self, CodecError> {
        Ok(Value::Opaque(OpaqueValue {
            type_name: T::type_name().to_string(),
            bytes: value.to_snapshot()?,
        }))
    }

    /// Rebuild a live value from an opaque node.
    ///
    /// The recorded type name is informational only; `from_snapshot` decides
    /// whether the bytes fit.
    pub fn restore<T: Snapshot>(&self) -> Result<T, CodecError> {
        match self {
            Value::Opaque(opaque) => T::from_snapshot(&opaque.bytes),
            _ => Err(CodecError::Snapshot {
                type_name: T::type_name().to_string(),
                detail: "value is not an opaque node".to_string(),
            }),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(flag) => serializer.serialize_bool(*flag),
            Value::Number(number) => number.serialize(serializer),
            Value::String(text) => serializer.serialize_str(text),
            Value::Sequence(items) => items.serialize(serializer),
            Value::Mapping(fields) => fields.serialize(serializer),
            Value::Timestamp(instant) => {
                let mut node = serializer.serialize_map(Some(2))?;
                node.serialize_entry(TYPE_KEY, TIMESTAMP_TAG)?;
                node.serialize_entry(TIMESTAMP_FIELD, &instant.to_rfc3339())?;
                node.end()
            }
            Value::Opaque(opaque) => {
                let mut node = serializer.serialize_map(Some(2))?;
                node.serialize_entry(TYPE_KEY, &opaque.type_name)?;
                node.serialize_entry(
                    SNAPSHOT_FIELD,
                    &general_purpose::STANDARD.encode(&opaque.bytes),
                )?;
                node.end()
            }
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Number(value.into())
            }
        }
    )*};
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        // NaN and infinities have no JSON form.
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::from(f64::from(value))
    }
}

impl From<serde_json::Number> for Value {
    fn from(value: serde_json::Number) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<OpaqueValue> for Value {
    fn from(value: OpaqueValue) -> Self {
        Value::Opaque(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(fields: BTreeMap<String, T>) -> Self {
        Value::Mapping(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(fields: HashMap<String, T>) -> Self {
        Value::Mapping(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
