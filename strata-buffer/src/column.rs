use std::sync::Arc;

use strata_dtype::{LogicalType, Matrix, Tensor3, Tensor4, Value, WeightedIndex};
use strata_error::{StrataResult, strata_err};

use crate::{BufferOptions, CompositeBuffer, Metadata};

/// Match over every [`ColumnData`] variant, binding the inner [`CompositeBuffer`].
#[macro_export]
macro_rules! match_each_column_data {
    ($self:expr, | $buffer:ident | $body:expr) => {{
        use $crate::ColumnData;
        match $self {
            ColumnData::Bool($buffer) => $body,
            ColumnData::I8($buffer) => $body,
            ColumnData::I16($buffer) => $body,
            ColumnData::I32($buffer) => $body,
            ColumnData::I64($buffer) => $body,
            ColumnData::U8($buffer) => $body,
            ColumnData::U16($buffer) => $body,
            ColumnData::U32($buffer) => $body,
            ColumnData::U64($buffer) => $body,
            ColumnData::F32($buffer) => $body,
            ColumnData::F64($buffer) => $body,
            ColumnData::Timestamp($buffer) => $body,
            ColumnData::Duration($buffer) => $body,
            ColumnData::Utf8($buffer) => $body,
            ColumnData::Binary($buffer) => $body,
            ColumnData::IndexList($buffer) => $body,
            ColumnData::WeightedIndexList($buffer) => $body,
            ColumnData::Vector($buffer) => $body,
            ColumnData::Matrix($buffer) => $body,
            ColumnData::Tensor3($buffer) => $body,
            ColumnData::Tensor4($buffer) => $body,
        }
    }};
}

/// The values of one column, stored in a buffer of the column's native element type.
#[derive(Debug)]
pub enum ColumnData {
    /// Booleans.
    Bool(CompositeBuffer<bool>),
    /// Signed 8-bit integers.
    I8(CompositeBuffer<i8>),
    /// Signed 16-bit integers.
    I16(CompositeBuffer<i16>),
    /// Signed 32-bit integers.
    I32(CompositeBuffer<i32>),
    /// Signed 64-bit integers.
    I64(CompositeBuffer<i64>),
    /// Unsigned 8-bit integers.
    U8(CompositeBuffer<u8>),
    /// Unsigned 16-bit integers.
    U16(CompositeBuffer<u16>),
    /// Unsigned 32-bit integers.
    U32(CompositeBuffer<u32>),
    /// Unsigned 64-bit integers.
    U64(CompositeBuffer<u64>),
    /// 32-bit floats.
    F32(CompositeBuffer<f32>),
    /// 64-bit floats.
    F64(CompositeBuffer<f64>),
    /// Microseconds since the Unix epoch.
    Timestamp(CompositeBuffer<i64>),
    /// Microsecond durations.
    Duration(CompositeBuffer<i64>),
    /// Strings.
    Utf8(CompositeBuffer<Arc<str>>),
    /// Opaque byte strings.
    Binary(CompositeBuffer<Vec<u8>>),
    /// Sparse index lists.
    IndexList(CompositeBuffer<Vec<u32>>),
    /// Sparse weighted index lists.
    WeightedIndexList(CompositeBuffer<Vec<WeightedIndex>>),
    /// Dense `f32` vectors.
    Vector(CompositeBuffer<Vec<f32>>),
    /// Two-dimensional tensors.
    Matrix(CompositeBuffer<Matrix>),
    /// Three-dimensional tensors.
    Tensor3(CompositeBuffer<Tensor3>),
    /// Four-dimensional tensors.
    Tensor4(CompositeBuffer<Tensor4>),
}

impl ColumnData {
    /// Create an empty buffer for values of `logical_type`.
    pub fn new(logical_type: LogicalType, options: BufferOptions) -> StrataResult<Self> {
        Ok(match logical_type {
            LogicalType::Bool => ColumnData::Bool(CompositeBuffer::new(options)?),
            LogicalType::I8 => ColumnData::I8(CompositeBuffer::new(options)?),
            LogicalType::I16 => ColumnData::I16(CompositeBuffer::new(options)?),
            LogicalType::I32 => ColumnData::I32(CompositeBuffer::new(options)?),
            LogicalType::I64 => ColumnData::I64(CompositeBuffer::new(options)?),
            LogicalType::U8 => ColumnData::U8(CompositeBuffer::new(options)?),
            LogicalType::U16 => ColumnData::U16(CompositeBuffer::new(options)?),
            LogicalType::U32 => ColumnData::U32(CompositeBuffer::new(options)?),
            LogicalType::U64 => ColumnData::U64(CompositeBuffer::new(options)?),
            LogicalType::F32 => ColumnData::F32(CompositeBuffer::new(options)?),
            LogicalType::F64 => ColumnData::F64(CompositeBuffer::new(options)?),
            LogicalType::Timestamp => ColumnData::Timestamp(CompositeBuffer::new(options)?),
            LogicalType::Duration => ColumnData::Duration(CompositeBuffer::new(options)?),
            LogicalType::Utf8 => ColumnData::Utf8(CompositeBuffer::new(options)?),
            LogicalType::Binary => ColumnData::Binary(CompositeBuffer::new(options)?),
            LogicalType::IndexList => ColumnData::IndexList(CompositeBuffer::new(options)?),
            LogicalType::WeightedIndexList => {
                ColumnData::WeightedIndexList(CompositeBuffer::new(options)?)
            }
            LogicalType::Vector => ColumnData::Vector(CompositeBuffer::new(options)?),
            LogicalType::Matrix => ColumnData::Matrix(CompositeBuffer::new(options)?),
            LogicalType::Tensor3 => ColumnData::Tensor3(CompositeBuffer::new(options)?),
            LogicalType::Tensor4 => ColumnData::Tensor4(CompositeBuffer::new(options)?),
        })
    }

    /// The logical type of the values held.
    pub fn logical_type(&self) -> LogicalType {
        match self {
            ColumnData::Bool(_) => LogicalType::Bool,
            ColumnData::I8(_) => LogicalType::I8,
            ColumnData::I16(_) => LogicalType::I16,
            ColumnData::I32(_) => LogicalType::I32,
            ColumnData::I64(_) => LogicalType::I64,
            ColumnData::U8(_) => LogicalType::U8,
            ColumnData::U16(_) => LogicalType::U16,
            ColumnData::U32(_) => LogicalType::U32,
            ColumnData::U64(_) => LogicalType::U64,
            ColumnData::F32(_) => LogicalType::F32,
            ColumnData::F64(_) => LogicalType::F64,
            ColumnData::Timestamp(_) => LogicalType::Timestamp,
            ColumnData::Duration(_) => LogicalType::Duration,
            ColumnData::Utf8(_) => LogicalType::Utf8,
            ColumnData::Binary(_) => LogicalType::Binary,
            ColumnData::IndexList(_) => LogicalType::IndexList,
            ColumnData::WeightedIndexList(_) => LogicalType::WeightedIndexList,
            ColumnData::Vector(_) => LogicalType::Vector,
            ColumnData::Matrix(_) => LogicalType::Matrix,
            ColumnData::Tensor3(_) => LogicalType::Tensor3,
            ColumnData::Tensor4(_) => LogicalType::Tensor4,
        }
    }

    /// Append a value, which must have the column's logical type.
    pub fn push(&mut self, value: Value) -> StrataResult<()> {
        match (self, value) {
            (ColumnData::Bool(b), Value::Bool(v)) => b.push(v),
            (ColumnData::I8(b), Value::I8(v)) => b.push(v),
            (ColumnData::I16(b), Value::I16(v)) => b.push(v),
            (ColumnData::I32(b), Value::I32(v)) => b.push(v),
            (ColumnData::I64(b), Value::I64(v)) => b.push(v),
            (ColumnData::U8(b), Value::U8(v)) => b.push(v),
            (ColumnData::U16(b), Value::U16(v)) => b.push(v),
            (ColumnData::U32(b), Value::U32(v)) => b.push(v),
            (ColumnData::U64(b), Value::U64(v)) => b.push(v),
            (ColumnData::F32(b), Value::F32(v)) => b.push(v),
            (ColumnData::F64(b), Value::F64(v)) => b.push(v),
            (ColumnData::Timestamp(b), Value::Timestamp(v)) => b.push(v),
            (ColumnData::Duration(b), Value::Duration(v)) => b.push(v),
            (ColumnData::Utf8(b), Value::Utf8(v)) => b.push(v),
            (ColumnData::Binary(b), Value::Binary(v)) => b.push(v),
            (ColumnData::IndexList(b), Value::IndexList(v)) => b.push(v),
            (ColumnData::WeightedIndexList(b), Value::WeightedIndexList(v)) => b.push(v),
            (ColumnData::Vector(b), Value::Vector(v)) => b.push(v),
            (ColumnData::Matrix(b), Value::Matrix(v)) => b.push(v),
            (ColumnData::Tensor3(b), Value::Tensor3(v)) => b.push(v),
            (ColumnData::Tensor4(b), Value::Tensor4(v)) => b.push(v),
            (data, value) => Err(strata_err!(
                MismatchedTypes: data.logical_type(),
                value.logical_type()
            )),
        }
    }

    /// Total number of values appended.
    pub fn len(&self) -> usize {
        match_each_column_data!(self, |buffer| buffer.len())
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of blocks across all tiers.
    pub fn block_count(&self) -> usize {
        match_each_column_data!(self, |buffer| buffer.block_count())
    }

    /// Number of distinct values seen, while distinct tracking is still live.
    pub fn distinct_items(&self) -> Option<usize> {
        match_each_column_data!(self, |buffer| buffer.distinct_items())
    }
}

/// A typed column being accumulated for a table, together with its metadata.
#[derive(Debug)]
pub struct ColumnBuffer {
    data: ColumnData,
    metadata: Metadata,
}

impl ColumnBuffer {
    /// Create an empty column of `logical_type`.
    pub fn new(logical_type: LogicalType, options: BufferOptions) -> StrataResult<Self> {
        Ok(Self {
            data: ColumnData::new(logical_type, options)?,
            metadata: Metadata::default(),
        })
    }

    /// Create a column holding `values`.
    pub fn try_from_values<I>(
        logical_type: LogicalType,
        options: BufferOptions,
        values: I,
    ) -> StrataResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut column = Self::new(logical_type, options)?;
        column.extend(values)?;
        Ok(column)
    }

    /// Replace the column metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The logical type of the column.
    pub fn logical_type(&self) -> LogicalType {
        self.data.logical_type()
    }

    /// Number of values appended.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of distinct values seen, while distinct tracking is still live.
    pub fn distinct_items(&self) -> Option<usize> {
        self.data.distinct_items()
    }

    /// Append a value of the column's logical type.
    pub fn push(&mut self, value: impl Into<Value>) -> StrataResult<()> {
        self.data.push(value.into())
    }

    /// Append every value, in order.
    pub fn extend<I>(&mut self, values: I) -> StrataResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        values.into_iter().try_for_each(|value| self.push(value))
    }

    /// The typed buffer.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// The column metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable access to the column metadata.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use strata_dtype::{LogicalType, Value};

    use crate::{BufferOptions, ColumnBuffer, ColumnData, Metadata};

    #[test]
    fn every_logical_type_has_a_buffer() {
        for ty in LogicalType::ALL {
            let data = ColumnData::new(ty, BufferOptions::default()).unwrap();
            assert_eq!(data.logical_type(), ty);
            assert!(data.is_empty());
        }
    }

    #[test]
    fn push_checks_type() {
        let mut column = ColumnBuffer::new(LogicalType::Timestamp, BufferOptions::default())
            .unwrap()
            .with_metadata(Metadata::new().with("unit", "us"));
        column.push(Value::Timestamp(10)).unwrap();
        let err = column.push(Value::I64(10)).unwrap_err();
        assert!(err.to_string().starts_with("expected type: timestamp but instead got i64"));
        assert_eq!(column.len(), 1);
        assert_eq!(column.metadata().get("unit"), Some("us"));
    }

    #[test]
    fn distinct_items_pass_through() {
        let column = ColumnBuffer::try_from_values(
            LogicalType::Utf8,
            BufferOptions::default().with_max_distinct_items(8),
            ["a", "b", "a"].map(Value::from),
        )
        .unwrap();
        assert_eq!(column.distinct_items(), Some(2));
        assert_eq!(column.data().block_count(), 1);
    }
}
