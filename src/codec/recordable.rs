//! Lowering live values into recorded trees
//!
//! `Recordable` is the seam between application values and the codec.
//! Natives lower structurally; date-times become timestamp nodes; custom
//! types either register a hook on the codec or delegate to their
//! [`Snapshot`](super::Snapshot) impl via [`Value::opaque`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use chrono::{DateTime, FixedOffset, Utc};

use super::value::{Mapping, Value};
use super::{Codec, CodecError};

/// A live value that can lower itself into a recorded [`Value`] tree.
pub trait Recordable: Debug {
    /// Runtime-type view used for hook dispatch.
    fn as_any(&self) -> &dyn Any;

    /// Lower this value into the recorded tree. Containers recurse through
    /// `codec` so registered hooks apply to nested values.
    fn record(&self, codec: &dyn Codec) -> Result<Value, CodecError>;
}

macro_rules! record_as_number {
    ($($ty:ty),* $(,)?) => {$(
        impl Recordable for $ty {
            fn as_any(&self) -> &dyn Any {
                self
            }

            fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
                Ok(Value::Number((*self).into()))
            }
        }
    )*};
}

record_as_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl Recordable for f64 {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::from(*self))
    }
}

impl Recordable for f32 {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::from(*self))
    }
}

impl Recordable for bool {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::Bool(*self))
    }
}

impl Recordable for () {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::Null)
    }
}

impl Recordable for String {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::String(self.clone()))
    }
}

impl Recordable for &'static str {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::String(self.to_string()))
    }
}

impl Recordable for Value {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(self.clone())
    }
}

impl Recordable for DateTime<Utc> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::Timestamp(self.fixed_offset()))
    }
}

impl Recordable for DateTime<FixedOffset> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, _codec: &dyn Codec) -> Result<Value, CodecError> {
        Ok(Value::Timestamp(*self))
    }
}

impl<T: Recordable + 'static> Recordable for Option<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, codec: &dyn Codec) -> Result<Value, CodecError> {
        match self {
            Some(inner) => codec.encode(inner),
            None => Ok(Value::Null),
        }
    }
}

impl<T: Recordable + 'static> Recordable for Vec<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, codec: &dyn Codec) -> Result<Value, CodecError> {
        let items = self
            .iter()
            .map(|item| codec.encode(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Sequence(items))
    }
}

impl<T: Recordable + 'static> Recordable for BTreeMap<String, T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, codec: &dyn Codec) -> Result<Value, CodecError> {
        let fields = self
            .iter()
            .map(|(key, item)| Ok((key.clone(), codec.encode(item)?)))
            .collect::<Result<Mapping, CodecError>>()?;
        Ok(Value::Mapping(fields))
    }
}

impl<T: Recordable + 'static> Recordable for HashMap<String, T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn record(&self, codec: &dyn Codec) -> Result<Value, CodecError> {
        let fields = self
            .iter()
            .map(|(key, item)| Ok((key.clone(), codec.encode(item)?)))
            .collect::<Result<Mapping, CodecError>>()?;
        Ok(Value::Mapping(fields))
    }
}
