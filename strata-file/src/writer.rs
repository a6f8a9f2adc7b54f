use std::sync::Arc;

use rustc_hash::FxHashMap;
use strata_buffer::{BlockElement, ColumnBuffer, ColumnData, CompositeBuffer, Metadata};
use strata_dtype::LogicalType;
use strata_error::{StrataResult, strata_bail};
use strata_io::TableWrite;

use crate::{
    ByteRange, ColumnDescriptor, HEADER_SIZE, PoolWriter, RangeDescriptor, Region, TableHeader,
    TableMetadata,
};

/// Default size of the data-region chunks handed to the sink.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1 << 20;

/// Options for writing a table file.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    flush_threshold: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl WriteOptions {
    /// Hand column data to the sink once this many bytes are buffered.
    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold.max(1);
        self
    }

    /// Bytes of column data buffered before each write.
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }
}

/// Writes [`ColumnBuffer`]s as a table file.
#[derive(Debug, Clone, Default)]
pub struct TableWriter {
    options: WriteOptions,
}

/// A sink that knows how many bytes it has been handed.
struct PositionedWrite<W> {
    inner: W,
    position: u64,
}

impl<W: TableWrite> PositionedWrite<W> {
    async fn write_all(&mut self, buffer: &[u8]) -> StrataResult<()> {
        self.inner.write_all(buffer).await?;
        self.position += buffer.len() as u64;
        Ok(())
    }

    /// Write a whole region, returning where it landed.
    async fn write_region(&mut self, buffer: &[u8]) -> StrataResult<ByteRange> {
        let offset = self.position;
        self.write_all(buffer).await?;
        Ok(ByteRange::new(offset, buffer.len() as u64))
    }
}

impl TableWriter {
    /// Create a writer.
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Write `columns` with `metadata` to `write`, returning the sink.
    ///
    /// Every column must hold the same, non-zero number of values; this is checked before any
    /// byte is written. A failure part way through leaves a partial file that must be discarded.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn write<W: TableWrite>(
        self,
        write: W,
        metadata: &Metadata,
        columns: &[ColumnBuffer],
    ) -> StrataResult<W> {
        let row_count = check_columns(columns)?;
        let column_count = u32::try_from(columns.len())?;
        let mut header = TableHeader::new(column_count, row_count as u64);

        let mut write = PositionedWrite {
            inner: write,
            position: 0,
        };
        write.write_all(&[0; HEADER_SIZE]).await?;

        let descriptors = columns
            .iter()
            .flat_map(|column| ColumnDescriptor::new(column.logical_type()).to_bytes())
            .collect::<Vec<_>>();
        header.set_region(Region::Descriptors, write.write_region(&descriptors).await?);

        let data_offset = write.position;
        let mut pools = PoolWriter::default();
        let mut data = DataWriter {
            write: &mut write,
            chunk: Vec::with_capacity(self.options.flush_threshold),
            flush_threshold: self.options.flush_threshold,
        };
        for column in columns {
            data.write_column(column.data(), &mut pools).await?;
        }
        data.flush().await?;
        header.set_region(
            Region::Data,
            ByteRange::new(data_offset, write.position - data_offset),
        );

        for (region, bytes) in pools.finish()? {
            header.set_region(region, write.write_region(&bytes).await?);
        }

        let table_metadata = TableMetadata {
            table: metadata.clone(),
            columns: columns.iter().map(|c| c.metadata().clone()).collect(),
        };
        header.set_region(
            Region::Metadata,
            write.write_region(&table_metadata.to_bytes()?).await?,
        );

        let mut inner = write.inner;
        inner.write_at(0, &header.to_bytes()).await?;
        inner.flush().await?;

        log::debug!(
            "wrote table of {column_count} columns x {row_count} rows: {}",
            Region::ALL
                .iter()
                .map(|region| format!("{region} {}", header.region(*region)))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(inner)
    }
}

fn check_columns(columns: &[ColumnBuffer]) -> StrataResult<usize> {
    let Some(first) = columns.first() else {
        strata_bail!("a table needs at least one column");
    };
    let row_count = first.len();
    if let Some((index, column)) = columns
        .iter()
        .enumerate()
        .find(|(_, column)| column.len() != row_count)
    {
        strata_bail!(
            "column {index} holds {} values but column 0 holds {row_count}",
            column.len()
        );
    }
    if row_count == 0 {
        strata_bail!("a table needs at least one row");
    }
    Ok(row_count)
}

/// Streams the column-major data region, diverting variable-length payloads into the pools.
struct DataWriter<'a, W> {
    write: &'a mut PositionedWrite<W>,
    chunk: Vec<u8>,
    flush_threshold: usize,
}

impl<W: TableWrite> DataWriter<'_, W> {
    async fn write_column(&mut self, data: &ColumnData, pools: &mut PoolWriter) -> StrataResult<()> {
        match data {
            ColumnData::Bool(buffer) => self.write_fixed(buffer).await,
            ColumnData::I8(buffer) => self.write_fixed(buffer).await,
            ColumnData::I16(buffer) => self.write_fixed(buffer).await,
            ColumnData::I32(buffer) => self.write_fixed(buffer).await,
            ColumnData::I64(buffer) => self.write_fixed(buffer).await,
            ColumnData::U8(buffer) => self.write_fixed(buffer).await,
            ColumnData::U16(buffer) => self.write_fixed(buffer).await,
            ColumnData::U32(buffer) => self.write_fixed(buffer).await,
            ColumnData::U64(buffer) => self.write_fixed(buffer).await,
            ColumnData::F32(buffer) => self.write_fixed(buffer).await,
            ColumnData::F64(buffer) => self.write_fixed(buffer).await,
            ColumnData::Timestamp(buffer) => self.write_fixed(buffer).await,
            ColumnData::Duration(buffer) => self.write_fixed(buffer).await,
            ColumnData::Utf8(buffer) => self.write_strings(buffer, pools).await,
            ColumnData::Binary(buffer) => {
                self.write_ranges(buffer, LogicalType::Binary, |v| pools.push_binary(v))
                    .await
            }
            ColumnData::IndexList(buffer) => {
                self.write_ranges(buffer, LogicalType::IndexList, |v| pools.push_indices(v))
                    .await
            }
            ColumnData::WeightedIndexList(buffer) => {
                self.write_ranges(buffer, LogicalType::WeightedIndexList, |v| {
                    pools.push_weighted(v)
                })
                .await
            }
            ColumnData::Vector(buffer) => {
                self.write_ranges(buffer, LogicalType::Vector, |v| pools.push_floats(v))
                    .await
            }
            ColumnData::Matrix(buffer) => {
                self.write_ranges(buffer, LogicalType::Matrix, |m| {
                    Ok(RangeDescriptor {
                        columns: m.columns(),
                        rows: m.rows(),
                        ..pools.push_floats(m.data())?
                    })
                })
                .await
            }
            ColumnData::Tensor3(buffer) => {
                self.write_ranges(buffer, LogicalType::Tensor3, |t| {
                    Ok(RangeDescriptor {
                        columns: t.columns(),
                        rows: t.rows(),
                        depth: t.depth(),
                        ..pools.push_floats(t.data())?
                    })
                })
                .await
            }
            ColumnData::Tensor4(buffer) => {
                self.write_ranges(buffer, LogicalType::Tensor4, |t| {
                    Ok(RangeDescriptor {
                        columns: t.columns(),
                        rows: t.rows(),
                        depth: t.depth(),
                        outer: t.outer(),
                        ..pools.push_floats(t.data())?
                    })
                })
                .await
            }
        }
    }

    /// Fixed-width blocks are already in their on-disk representation.
    async fn write_fixed<T: BlockElement>(&mut self, buffer: &CompositeBuffer<T>) -> StrataResult<()> {
        for block in buffer.blocks() {
            T::encode_block(&block?, &mut self.chunk)?;
            self.maybe_flush().await?;
        }
        Ok(())
    }

    async fn write_ranges<T, F>(
        &mut self,
        buffer: &CompositeBuffer<T>,
        logical_type: LogicalType,
        mut push: F,
    ) -> StrataResult<()>
    where
        T: BlockElement,
        F: FnMut(&T) -> StrataResult<RangeDescriptor>,
    {
        for block in buffer.blocks() {
            for value in block?.iter() {
                push(value)?.write(logical_type, &mut self.chunk)?;
            }
            self.maybe_flush().await?;
        }
        Ok(())
    }

    /// Strings are interned when the column still tracks distinct values, and appended one pool
    /// slot per row otherwise.
    async fn write_strings(
        &mut self,
        buffer: &CompositeBuffer<Arc<str>>,
        pools: &mut PoolWriter,
    ) -> StrataResult<()> {
        let mut dictionary = buffer
            .distinct_items()
            .map(|distinct| FxHashMap::<Arc<str>, u32>::with_capacity_and_hasher(distinct, Default::default()));
        for block in buffer.blocks() {
            for value in block?.iter() {
                let code = match dictionary.as_mut() {
                    Some(dictionary) => match dictionary.get(value) {
                        Some(code) => *code,
                        None => {
                            let code = pools.push_string(value)?;
                            dictionary.insert(value.clone(), code);
                            code
                        }
                    },
                    None => pools.push_string(value)?,
                };
                self.chunk.extend_from_slice(&code.to_le_bytes());
            }
            self.maybe_flush().await?;
        }
        Ok(())
    }

    async fn maybe_flush(&mut self) -> StrataResult<()> {
        if self.chunk.len() >= self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> StrataResult<()> {
        if !self.chunk.is_empty() {
            self.write.write_all(&self.chunk).await?;
            self.chunk.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strata_buffer::{BufferOptions, ColumnBuffer, Metadata};
    use strata_dtype::{LogicalType, Value};

    use crate::{HEADER_SIZE, Region, TableHeader, TableWriter, WriteOptions};

    fn column(ty: LogicalType, values: impl IntoIterator<Item = Value>) -> ColumnBuffer {
        ColumnBuffer::try_from_values(ty, BufferOptions::default(), values).unwrap()
    }

    #[tokio::test]
    async fn fixed_width_layout() {
        let columns = [
            column(LogicalType::U16, [1u16, 2, 3].map(Value::from)),
            column(LogicalType::Bool, [true, false, true].map(Value::from)),
        ];
        let bytes = TableWriter::default()
            .write(Vec::new(), &Metadata::new(), &columns)
            .await
            .unwrap();

        let header = TableHeader::parse(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(header.column_count(), 2);
        assert_eq!(header.row_count(), 3);
        assert_eq!(header.region(Region::Descriptors).offset, HEADER_SIZE as u64);
        let data = header.region(Region::Data);
        assert_eq!(data.size, 3 * 2 + 3);
        assert_eq!(
            &bytes[data.offset as usize..(data.offset + data.size) as usize],
            &[1, 0, 2, 0, 3, 0, 1, 0, 1]
        );
        for pool in [
            Region::StringPool,
            Region::FloatPool,
            Region::BinaryPool,
            Region::IndexPool,
            Region::WeightedIndexPool,
        ] {
            assert!(header.region(pool).is_absent());
        }
        assert_eq!(header.region(Region::Metadata).offset, data.offset + data.size);
    }

    #[tokio::test]
    async fn rejects_ragged_columns_before_writing() {
        let columns = [
            column(LogicalType::I32, [1, 2].map(Value::from)),
            column(LogicalType::I32, [1].map(Value::from)),
        ];
        let mut out = Vec::new();
        assert!(
            TableWriter::default()
                .write(&mut out, &Metadata::new(), &columns)
                .await
                .is_err()
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn rejects_empty_tables() {
        let no_rows = [column(LogicalType::I32, [])];
        assert!(
            TableWriter::default()
                .write(Vec::new(), &Metadata::new(), &no_rows)
                .await
                .is_err()
        );
        assert!(
            TableWriter::default()
                .write(Vec::new(), &Metadata::new(), &[])
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn small_flush_threshold_writes_identical_bytes() {
        let columns = [column(LogicalType::I64, (0..100i64).map(Value::from))];
        let large = TableWriter::default()
            .write(Vec::new(), &Metadata::new(), &columns)
            .await
            .unwrap();
        let small = TableWriter::new(WriteOptions::default().with_flush_threshold(7))
            .write(Vec::new(), &Metadata::new(), &columns)
            .await
            .unwrap();
        assert_eq!(large, small);
    }
}
