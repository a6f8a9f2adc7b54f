use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{ControlFlow, Range};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use strata_buffer::{ByteCursor, FixedWidth, decode_fixed};
use strata_dtype::{
    FromValue, LogicalType, Matrix, Tensor3, Tensor4, Value, can_cast, cast,
};
use strata_error::{StrataResult, strata_bail, strata_err};
use strata_io::ReadAt;

use crate::reader::TableState;
use crate::{Pool, RangeDescriptor, pool_region};

/// A lazy, block-based view of one column.
///
/// Values are read one block of rows at a time. Variable-length values are resolved through the
/// shared pools, which are loaded on first use and cached for the table.
pub struct ColumnReader<R> {
    state: Arc<TableState<R>>,
    index: usize,
    target: LogicalType,
}

impl<R> Clone for ColumnReader<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            index: self.index,
            target: self.target,
        }
    }
}

impl<R: ReadAt> Debug for ColumnReader<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnReader")
            .field("index", &self.index)
            .field("native_type", &self.native_type())
            .field("logical_type", &self.target)
            .finish()
    }
}

impl<R: ReadAt> ColumnReader<R> {
    pub(crate) fn new(state: Arc<TableState<R>>, index: usize) -> Self {
        let target = state.descriptor(index).logical_type();
        Self {
            state,
            index,
            target,
        }
    }

    /// Position of the column in the table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The type values are stored as.
    pub fn native_type(&self) -> LogicalType {
        self.state.descriptor(self.index).logical_type()
    }

    /// The type values are returned as.
    pub fn logical_type(&self) -> LogicalType {
        self.target
    }

    /// Number of values.
    pub fn size(&self) -> u64 {
        self.state.row_count()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        usize::try_from(self.size().div_ceil(self.state.block_rows() as u64)).unwrap_or(usize::MAX)
    }

    /// Rows covered by block `block`.
    pub fn block_rows(&self, block: usize) -> StrataResult<Range<u64>> {
        if block >= self.block_count() {
            strata_bail!(OutOfBounds: block, 0, self.block_count());
        }
        let block_rows = self.state.block_rows() as u64;
        let start = block as u64 * block_rows;
        Ok(start..(start + block_rows).min(self.size()))
    }

    /// A reader over the same column returning values converted to `target`.
    ///
    /// Fails with a not-implemented error for conversions [`can_cast`] rejects.
    pub fn cast(&self, target: LogicalType) -> StrataResult<Self> {
        let native = self.native_type();
        if !can_cast(native, target) {
            strata_bail!(NotImplemented: format!("cast to {target}"), native);
        }
        Ok(Self {
            target,
            ..self.clone()
        })
    }

    /// A reader returning `T`, converting from the native type.
    pub fn typed<T: FromValue>(&self) -> StrataResult<TypedColumnReader<R, T>> {
        Ok(TypedColumnReader {
            column: self.cast(T::LOGICAL_TYPE)?,
            _marker: PhantomData,
        })
    }

    /// The values of block `block`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), fields(column = self.index)))]
    pub async fn get_block(&self, block: usize) -> StrataResult<Vec<Value>> {
        let rows = self.block_rows(block)?;
        self.read_rows(rows).await
    }

    /// The value at `row`.
    pub async fn get_item(&self, row: u64) -> StrataResult<Value> {
        if row >= self.size() {
            strata_bail!(OutOfBounds: row as usize, 0, self.size() as usize);
        }
        self.read_rows(row..row + 1)
            .await?
            .pop()
            .ok_or_else(|| strata_err!(Internal: "row {row} decoded to no value"))
    }

    /// Invoke `f` with every block in order until it breaks.
    pub async fn for_each_block<F>(&self, mut f: F) -> StrataResult<ControlFlow<()>>
    where
        F: FnMut(Vec<Value>) -> ControlFlow<()>,
    {
        for block in 0..self.block_count() {
            if f(self.get_block(block).await?).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Every block, in order.
    pub fn blocks(&self) -> impl Stream<Item = StrataResult<Vec<Value>>> + '_ {
        stream::iter(0..self.block_count()).then(move |block| self.get_block(block))
    }

    async fn read_rows(&self, rows: Range<u64>) -> StrataResult<Vec<Value>> {
        let width = u64::from(self.state.descriptor(self.index).element_size());
        let offset = self.state.column_offset(self.index);
        let count = usize::try_from(rows.end - rows.start)?;
        let bytes = self
            .state
            .read_range(offset + rows.start * width..offset + rows.end * width)
            .await?;
        let values = self.decode(bytes, count).await?;
        if self.target == self.native_type() {
            return Ok(values);
        }
        values
            .into_iter()
            .map(|value| cast(value, self.target))
            .collect()
    }

    async fn decode(&self, bytes: Bytes, count: usize) -> StrataResult<Vec<Value>> {
        let logical_type = self.native_type();
        let pool = match pool_region(logical_type) {
            Some(region) => Some(self.state.pool(region).await?),
            None => None,
        };
        match (logical_type, pool) {
            (LogicalType::Bool, _) => fixed(&bytes, Value::Bool),
            (LogicalType::I8, _) => fixed(&bytes, Value::I8),
            (LogicalType::I16, _) => fixed(&bytes, Value::I16),
            (LogicalType::I32, _) => fixed(&bytes, Value::I32),
            (LogicalType::I64, _) => fixed(&bytes, Value::I64),
            (LogicalType::U8, _) => fixed(&bytes, Value::U8),
            (LogicalType::U16, _) => fixed(&bytes, Value::U16),
            (LogicalType::U32, _) => fixed(&bytes, Value::U32),
            (LogicalType::U64, _) => fixed(&bytes, Value::U64),
            (LogicalType::F32, _) => fixed(&bytes, Value::F32),
            (LogicalType::F64, _) => fixed(&bytes, Value::F64),
            (LogicalType::Timestamp, _) => fixed(&bytes, Value::Timestamp),
            (LogicalType::Duration, _) => fixed(&bytes, Value::Duration),
            (LogicalType::Utf8, Some(Pool::Strings(strings))) => decode_fixed::<u32>(&bytes)?
                .into_iter()
                .map(|code| strings.get(code).map(Value::Utf8))
                .collect(),
            (LogicalType::Binary, Some(Pool::Binary(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    Ok(Value::Binary(pool[range.checked_range(pool.len())?].to_vec()))
                })
            }
            (LogicalType::IndexList, Some(Pool::Indices(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    Ok(Value::IndexList(pool[range.checked_range(pool.len())?].to_vec()))
                })
            }
            (LogicalType::WeightedIndexList, Some(Pool::Weighted(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    Ok(Value::WeightedIndexList(
                        pool[range.checked_range(pool.len())?].to_vec(),
                    ))
                })
            }
            (LogicalType::Vector, Some(Pool::Floats(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    Ok(Value::Vector(pool[range.checked_range(pool.len())?].to_vec()))
                })
            }
            (LogicalType::Matrix, Some(Pool::Floats(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    range.check_shape(&[range.rows, range.columns])?;
                    let data = pool[range.checked_range(pool.len())?].to_vec();
                    Ok(Value::Matrix(Matrix::try_new(range.rows, range.columns, data)?))
                })
            }
            (LogicalType::Tensor3, Some(Pool::Floats(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    range.check_shape(&[range.depth, range.rows, range.columns])?;
                    let data = pool[range.checked_range(pool.len())?].to_vec();
                    Ok(Value::Tensor3(Tensor3::try_new(
                        range.depth,
                        range.rows,
                        range.columns,
                        data,
                    )?))
                })
            }
            (LogicalType::Tensor4, Some(Pool::Floats(pool))) => {
                ranges(logical_type, &bytes, count, |range| {
                    range.check_shape(&[range.outer, range.depth, range.rows, range.columns])?;
                    let data = pool[range.checked_range(pool.len())?].to_vec();
                    Ok(Value::Tensor4(Tensor4::try_new(
                        range.outer,
                        range.depth,
                        range.rows,
                        range.columns,
                        data,
                    )?))
                })
            }
            (logical_type, _) => Err(strata_err!(
                Internal: "{logical_type} column resolved to the wrong pool"
            )),
        }
    }
}

fn fixed<T: FixedWidth>(bytes: &[u8], value: fn(T) -> Value) -> StrataResult<Vec<Value>> {
    Ok(decode_fixed::<T>(bytes)?.into_iter().map(value).collect())
}

fn ranges<F>(logical_type: LogicalType, bytes: &[u8], count: usize, mut f: F) -> StrataResult<Vec<Value>>
where
    F: FnMut(RangeDescriptor) -> StrataResult<Value>,
{
    let mut cursor = ByteCursor::new(bytes);
    (0..count)
        .map(|_| f(RangeDescriptor::read(logical_type, &mut cursor)?))
        .collect()
}

/// A [`ColumnReader`] returning native Rust values.
pub struct TypedColumnReader<R, T> {
    column: ColumnReader<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<R, T> Clone for TypedColumnReader<R, T> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: ReadAt, T: FromValue> TypedColumnReader<R, T> {
    /// The underlying dynamically typed reader.
    pub fn column(&self) -> &ColumnReader<R> {
        &self.column
    }

    /// Number of values.
    pub fn size(&self) -> u64 {
        self.column.size()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.column.block_count()
    }

    /// The values of block `block`.
    pub async fn get_block(&self, block: usize) -> StrataResult<Vec<T>> {
        self.column
            .get_block(block)
            .await?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    /// The value at `row`.
    pub async fn get_item(&self, row: u64) -> StrataResult<T> {
        T::from_value(self.column.get_item(row).await?)
    }
}
