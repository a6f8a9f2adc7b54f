use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use static_assertions::const_assert_eq;
use strata_error::{StrataResult, strata_err};

/// Width in bytes of a `{startIndex, count}` range descriptor.
pub const RANGE_DESCRIPTOR_WIDTH: u32 = 8;

/// The logical types of Strata columns.
///
/// The discriminant doubles as the one-byte tag stored in a column descriptor, so existing
/// values must never be renumbered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LogicalType {
    /// `true` or `false`, stored as one byte.
    Bool = 1,
    /// Signed 8-bit integer.
    I8 = 2,
    /// Signed 16-bit integer.
    I16 = 3,
    /// Signed 32-bit integer.
    I32 = 4,
    /// Signed 64-bit integer.
    I64 = 5,
    /// Unsigned 8-bit integer.
    U8 = 6,
    /// Unsigned 16-bit integer.
    U16 = 7,
    /// Unsigned 32-bit integer.
    U32 = 8,
    /// Unsigned 64-bit integer.
    U64 = 9,
    /// IEEE 754 single precision float.
    F32 = 10,
    /// IEEE 754 double precision float.
    F64 = 11,
    /// Microseconds since the Unix epoch.
    Timestamp = 12,
    /// Signed span of microseconds.
    Duration = 13,
    /// UTF-8 strings, stored as codes into the shared string pool.
    Utf8 = 14,
    /// Opaque byte blobs, stored in the shared binary pool.
    Binary = 15,
    /// Lists of `u32` indices, stored in the shared index pool.
    IndexList = 16,
    /// Lists of `(u32 index, f32 weight)` pairs, stored in the shared weighted-index pool.
    WeightedIndexList = 17,
    /// One-dimensional `f32` vectors, stored in the shared float pool.
    Vector = 18,
    /// Row-major two-dimensional `f32` tensors.
    Matrix = 19,
    /// Row-major three-dimensional `f32` tensors.
    Tensor3 = 20,
    /// Row-major four-dimensional `f32` tensors.
    Tensor4 = 21,
}

const_assert_eq!(RANGE_DESCRIPTOR_WIDTH, 2 * size_of::<u32>() as u32);

impl LogicalType {
    /// Every logical type, in tag order.
    pub const ALL: [LogicalType; 21] = [
        LogicalType::Bool,
        LogicalType::I8,
        LogicalType::I16,
        LogicalType::I32,
        LogicalType::I64,
        LogicalType::U8,
        LogicalType::U16,
        LogicalType::U32,
        LogicalType::U64,
        LogicalType::F32,
        LogicalType::F64,
        LogicalType::Timestamp,
        LogicalType::Duration,
        LogicalType::Utf8,
        LogicalType::Binary,
        LogicalType::IndexList,
        LogicalType::WeightedIndexList,
        LogicalType::Vector,
        LogicalType::Matrix,
        LogicalType::Tensor3,
        LogicalType::Tensor4,
    ];

    /// The number of bytes one element of this type occupies in a table's data region.
    pub const fn on_disk_width(&self) -> u32 {
        match self {
            LogicalType::Bool | LogicalType::I8 | LogicalType::U8 => 1,
            LogicalType::I16 | LogicalType::U16 => 2,
            LogicalType::I32 | LogicalType::U32 | LogicalType::F32 => 4,
            LogicalType::I64
            | LogicalType::U64
            | LogicalType::F64
            | LogicalType::Timestamp
            | LogicalType::Duration => 8,
            LogicalType::Utf8 => 4,
            LogicalType::Binary
            | LogicalType::IndexList
            | LogicalType::WeightedIndexList
            | LogicalType::Vector => RANGE_DESCRIPTOR_WIDTH,
            LogicalType::Matrix => RANGE_DESCRIPTOR_WIDTH + 8,
            LogicalType::Tensor3 => RANGE_DESCRIPTOR_WIDTH + 12,
            LogicalType::Tensor4 => RANGE_DESCRIPTOR_WIDTH + 16,
        }
    }

    /// Whether values of this type are stored inline in the data region, with no pool.
    pub const fn is_fixed_width(&self) -> bool {
        self.is_numeric() || self.is_temporal() || matches!(self, LogicalType::Bool)
    }

    /// Whether the type is an integer or floating point number.
    pub const fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    /// Whether the type is a signed or unsigned integer.
    pub const fn is_int(&self) -> bool {
        matches!(
            self,
            LogicalType::I8
                | LogicalType::I16
                | LogicalType::I32
                | LogicalType::I64
                | LogicalType::U8
                | LogicalType::U16
                | LogicalType::U32
                | LogicalType::U64
        )
    }

    /// Whether the type is a floating point number.
    pub const fn is_float(&self) -> bool {
        matches!(self, LogicalType::F32 | LogicalType::F64)
    }

    /// Whether the type is a point in time or a span of time.
    pub const fn is_temporal(&self) -> bool {
        matches!(self, LogicalType::Timestamp | LogicalType::Duration)
    }

    /// Whether the type is a dense `f32` tensor stored in the float pool.
    pub const fn is_tensor(&self) -> bool {
        matches!(
            self,
            LogicalType::Vector | LogicalType::Matrix | LogicalType::Tensor3 | LogicalType::Tensor4
        )
    }

    /// The one-byte descriptor tag.
    pub fn tag(&self) -> u8 {
        (*self).into()
    }

    /// Resolve a descriptor tag back into a logical type.
    pub fn from_tag(tag: u8) -> StrataResult<Self> {
        Self::try_from(tag).map_err(|_| strata_err!(Malformed: "unknown logical type tag {tag}"))
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogicalType::Bool => "bool",
            LogicalType::I8 => "i8",
            LogicalType::I16 => "i16",
            LogicalType::I32 => "i32",
            LogicalType::I64 => "i64",
            LogicalType::U8 => "u8",
            LogicalType::U16 => "u16",
            LogicalType::U32 => "u32",
            LogicalType::U64 => "u64",
            LogicalType::F32 => "f32",
            LogicalType::F64 => "f64",
            LogicalType::Timestamp => "timestamp",
            LogicalType::Duration => "duration",
            LogicalType::Utf8 => "utf8",
            LogicalType::Binary => "binary",
            LogicalType::IndexList => "index_list",
            LogicalType::WeightedIndexList => "weighted_index_list",
            LogicalType::Vector => "vector",
            LogicalType::Matrix => "matrix",
            LogicalType::Tensor3 => "tensor3",
            LogicalType::Tensor4 => "tensor4",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::LogicalType;

    #[test]
    fn tags_round_trip() {
        for ty in LogicalType::ALL {
            assert_eq!(LogicalType::from_tag(ty.tag()).unwrap(), ty);
        }
    }

    #[test]
    fn unknown_tag_is_malformed() {
        assert!(LogicalType::from_tag(0).unwrap_err().is_malformed());
        assert!(LogicalType::from_tag(200).unwrap_err().is_malformed());
    }

    #[rstest]
    #[case(LogicalType::Bool, 1)]
    #[case(LogicalType::I16, 2)]
    #[case(LogicalType::F32, 4)]
    #[case(LogicalType::Timestamp, 8)]
    #[case(LogicalType::Utf8, 4)]
    #[case(LogicalType::Binary, 8)]
    #[case(LogicalType::Vector, 8)]
    #[case(LogicalType::Matrix, 16)]
    #[case(LogicalType::Tensor3, 20)]
    #[case(LogicalType::Tensor4, 24)]
    fn on_disk_widths(#[case] ty: LogicalType, #[case] width: u32) {
        assert_eq!(ty.on_disk_width(), width);
    }

    #[test]
    fn fixed_width_types_have_no_pool() {
        assert!(LogicalType::Duration.is_fixed_width());
        assert!(!LogicalType::Utf8.is_fixed_width());
        assert!(!LogicalType::Matrix.is_fixed_width());
        assert!(LogicalType::Tensor4.is_tensor());
    }
}
