use crate::{Error, Result, Value};
use std::{any, borrow::Cow, sync::Arc};

/// Conversion between native Rust types and the dynamically typed [`Value`]
/// used for query parameters and fetched columns.
///
/// This covers the storage classes of the engine only. Application types
/// that need a custom representation go through the adapter/converter
/// pipeline of [`crate::ConversionRegistry`] instead.
///
/// # Examples
/// ```rust
/// use cask_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Integer(42));
/// let n: i32 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Convert this value into its owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    ///
    /// Numeric conversions are range checked, the error names both the
    /// offending value and the target type.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Text(value.into())
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {:?} to {}",
        value,
        any::type_name::<T>(),
    ))
}

macro_rules! impl_as_value_integer {
    ($($source:ty),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_value(self) -> Value {
                    Value::Integer(self as i64)
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Integer(v) => <$source>::try_from(v).map_err(|_| {
                            Error::msg(format!(
                                "Value {v}: i64 is out of range for {}",
                                any::type_name::<Self>(),
                            ))
                        }),
                        _ => Err(mismatch::<Self>(&value)),
                    }
                }
            }
        )+
    };
}
impl_as_value_integer!(i8, i16, i32, i64, u8, u16, u32);

impl AsValue for u64 {
    fn as_value(self) -> Value {
        // Values past i64::MAX cannot be stored as INTEGER, keep them as text
        match i64::try_from(self) {
            Ok(v) => Value::Integer(v),
            Err(..) => Value::Text(itoa::Buffer::new().format(self).to_owned()),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => u64::try_from(v).map_err(|_| {
                Error::msg(format!("Value {v}: i64 is out of range for u64"))
            }),
            Value::Text(ref v) => v
                .parse()
                .map_err(|e| Error::new(e).context(mismatch::<Self>(&value))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for bool {
    fn as_value(self) -> Value {
        Value::Integer(self as i64)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for f64 {
    fn as_value(self) -> Value {
        Value::Real(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for f32 {
    fn as_value(self) -> Value {
        Value::Real(self as f64)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        f64::try_from_value(value).map(|v| v as f32)
    }
}

impl AsValue for String {
    fn as_value(self) -> Value {
        Value::Text(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Cow<'_, str> {
    fn as_value(self) -> Value {
        Value::Text(self.into_owned())
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Cow::Owned)
    }
}

impl AsValue for Arc<str> {
    fn as_value(self) -> Value {
        Value::Text(self.as_ref().to_owned())
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Vec<u8> {
    fn as_value(self) -> Value {
        Value::Blob(self.into_boxed_slice())
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v.into_vec()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Box<[u8]> {
    fn as_value(self) -> Value {
        Value::Blob(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Vec::<u8>::try_from_value(value).map(Vec::into_boxed_slice)
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => Value::Null,
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            v => T::try_from_value(v).map(Some),
        }
    }
}
