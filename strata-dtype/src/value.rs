use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use strata_error::{StrataResult, strata_err};

use crate::{LogicalType, Matrix, Tensor3, Tensor4, WeightedIndex};

/// A single dynamically typed cell of a Strata column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A [`LogicalType::Bool`] value.
    Bool(bool),
    /// A [`LogicalType::I8`] value.
    I8(i8),
    /// A [`LogicalType::I16`] value.
    I16(i16),
    /// A [`LogicalType::I32`] value.
    I32(i32),
    /// A [`LogicalType::I64`] value.
    I64(i64),
    /// A [`LogicalType::U8`] value.
    U8(u8),
    /// A [`LogicalType::U16`] value.
    U16(u16),
    /// A [`LogicalType::U32`] value.
    U32(u32),
    /// A [`LogicalType::U64`] value.
    U64(u64),
    /// A [`LogicalType::F32`] value.
    F32(f32),
    /// A [`LogicalType::F64`] value.
    F64(f64),
    /// A [`LogicalType::Timestamp`] value, in microseconds since the Unix epoch.
    Timestamp(i64),
    /// A [`LogicalType::Duration`] value, in microseconds.
    Duration(i64),
    /// A [`LogicalType::Utf8`] value.
    Utf8(Arc<str>),
    /// A [`LogicalType::Binary`] value.
    Binary(Vec<u8>),
    /// A [`LogicalType::IndexList`] value.
    IndexList(Vec<u32>),
    /// A [`LogicalType::WeightedIndexList`] value.
    WeightedIndexList(Vec<WeightedIndex>),
    /// A [`LogicalType::Vector`] value.
    Vector(Vec<f32>),
    /// A [`LogicalType::Matrix`] value.
    Matrix(Matrix),
    /// A [`LogicalType::Tensor3`] value.
    Tensor3(Tensor3),
    /// A [`LogicalType::Tensor4`] value.
    Tensor4(Tensor4),
}

impl Value {
    /// The logical type of the value.
    pub fn logical_type(&self) -> LogicalType {
        match self {
            Value::Bool(_) => LogicalType::Bool,
            Value::I8(_) => LogicalType::I8,
            Value::I16(_) => LogicalType::I16,
            Value::I32(_) => LogicalType::I32,
            Value::I64(_) => LogicalType::I64,
            Value::U8(_) => LogicalType::U8,
            Value::U16(_) => LogicalType::U16,
            Value::U32(_) => LogicalType::U32,
            Value::U64(_) => LogicalType::U64,
            Value::F32(_) => LogicalType::F32,
            Value::F64(_) => LogicalType::F64,
            Value::Timestamp(_) => LogicalType::Timestamp,
            Value::Duration(_) => LogicalType::Duration,
            Value::Utf8(_) => LogicalType::Utf8,
            Value::Binary(_) => LogicalType::Binary,
            Value::IndexList(_) => LogicalType::IndexList,
            Value::WeightedIndexList(_) => LogicalType::WeightedIndexList,
            Value::Vector(_) => LogicalType::Vector,
            Value::Matrix(_) => LogicalType::Matrix,
            Value::Tensor3(_) => LogicalType::Tensor3,
            Value::Tensor4(_) => LogicalType::Tensor4,
        }
    }

    /// Borrow the string if this is a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Timestamp(us) => match jiff::Timestamp::from_microsecond(*us) {
                Ok(ts) => write!(f, "{ts}"),
                Err(_) => write!(f, "{us}us"),
            },
            Value::Duration(us) => write!(f, "{}", jiff::SignedDuration::from_micros(*us)),
            Value::Utf8(v) => write!(f, "{v}"),
            Value::Binary(v) => write!(f, "0x{}", v.iter().map(|b| format!("{b:02x}")).join("")),
            Value::IndexList(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::WeightedIndexList(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::Vector(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::Matrix(v) => write!(f, "{v}"),
            Value::Tensor3(v) => write!(f, "{v}"),
            Value::Tensor4(v) => write!(f, "{v}"),
        }
    }
}

/// A Rust type that a column can be read back as.
pub trait FromValue: Sized {
    /// The logical type a value is converted to before extraction.
    const LOGICAL_TYPE: LogicalType;

    /// Extract the Rust value from a [`Value`] that already has [`Self::LOGICAL_TYPE`].
    fn from_value(value: Value) -> StrataResult<Self>;
}

macro_rules! native_value {
    ($T:ty, $variant:ident) => {
        impl From<$T> for Value {
            fn from(value: $T) -> Self {
                Value::$variant(value)
            }
        }

        impl FromValue for $T {
            const LOGICAL_TYPE: LogicalType = LogicalType::$variant;

            fn from_value(value: Value) -> StrataResult<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(strata_err!(MismatchedTypes: LogicalType::$variant, other.logical_type())),
                }
            }
        }
    };
}

native_value!(bool, Bool);
native_value!(i8, I8);
native_value!(i16, I16);
native_value!(i32, I32);
native_value!(i64, I64);
native_value!(u8, U8);
native_value!(u16, U16);
native_value!(u32, U32);
native_value!(u64, U64);
native_value!(f32, F32);
native_value!(f64, F64);
native_value!(Arc<str>, Utf8);
native_value!(Vec<u8>, Binary);
native_value!(Vec<u32>, IndexList);
native_value!(Vec<WeightedIndex>, WeightedIndexList);
native_value!(Vec<f32>, Vector);
native_value!(Matrix, Matrix);
native_value!(Tensor3, Tensor3);
native_value!(Tensor4, Tensor4);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Utf8(value.into())
    }
}

impl FromValue for String {
    const LOGICAL_TYPE: LogicalType = LogicalType::Utf8;

    fn from_value(value: Value) -> StrataResult<Self> {
        Arc::<str>::from_value(value).map(|s| s.to_string())
    }
}

impl From<jiff::Timestamp> for Value {
    fn from(value: jiff::Timestamp) -> Self {
        Value::Timestamp(value.as_microsecond())
    }
}

impl FromValue for jiff::Timestamp {
    const LOGICAL_TYPE: LogicalType = LogicalType::Timestamp;

    fn from_value(value: Value) -> StrataResult<Self> {
        match value {
            Value::Timestamp(us) => jiff::Timestamp::from_microsecond(us)
                .map_err(|e| strata_err!(OutOfRange: "timestamp {us} ({e})")),
            other => Err(strata_err!(MismatchedTypes: "timestamp", other.logical_type())),
        }
    }
}

impl FromValue for jiff::SignedDuration {
    const LOGICAL_TYPE: LogicalType = LogicalType::Duration;

    fn from_value(value: Value) -> StrataResult<Self> {
        match value {
            Value::Duration(us) => Ok(jiff::SignedDuration::from_micros(us)),
            other => Err(strata_err!(MismatchedTypes: "duration", other.logical_type())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{FromValue, LogicalType, Matrix, Value, WeightedIndex};

    #[test]
    fn logical_types() {
        assert_eq!(Value::from(3u16).logical_type(), LogicalType::U16);
        assert_eq!(Value::from("a").logical_type(), LogicalType::Utf8);
        assert_eq!(
            Value::from(vec![WeightedIndex::new(1, 0.5)]).logical_type(),
            LogicalType::WeightedIndexList
        );
        assert_eq!(Value::Timestamp(0).logical_type(), LogicalType::Timestamp);
    }

    #[test]
    fn extraction_checks_type() {
        assert_eq!(i32::from_value(Value::I32(7)).unwrap(), 7);
        assert_eq!(
            String::from_value(Value::Utf8(Arc::from("hi"))).unwrap(),
            "hi".to_string()
        );
        assert!(i32::from_value(Value::I64(7)).is_err());
        assert!(Matrix::from_value(Value::Vector(vec![1.0])).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Binary(vec![0xde, 0xad]).to_string(), "0xdead");
        assert_eq!(Value::IndexList(vec![1, 2, 3]).to_string(), "[1, 2, 3]");
        assert_eq!(Value::Timestamp(0).to_string(), "1970-01-01T00:00:00Z");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
