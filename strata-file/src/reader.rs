use std::fmt::{Debug, Formatter};
use std::ops::Range;
use std::pin::pin;
use std::sync::Arc;

use async_once_cell::OnceCell;
use bytes::Bytes;
use futures::future::try_join_all;
use futures::{Stream, StreamExt, TryStreamExt, stream};
use parking_lot::RwLock;
use strata_buffer::{BufferOptions, ColumnBuffer, Metadata};
use strata_dtype::{FromValue, LogicalType, Value};
use strata_error::{StrataError, StrataResult, strata_bail, strata_err};
use strata_io::{ReadAt, TableWrite, UpdateAt};
use strata_metrics::StrataMetrics;

use crate::{
    ColumnDescriptor, ColumnReader, Pool, Region, Row, TableHeader, TableMetadata, TableWriter,
    TypedColumnReader,
};

const POOL_REGIONS: [Region; 5] = [
    Region::StringPool,
    Region::FloatPool,
    Region::BinaryPool,
    Region::IndexPool,
    Region::WeightedIndexPool,
];

/// Everything parsed at open time, shared by the table and its column readers.
pub(crate) struct TableState<R> {
    read: RwLock<Option<R>>,
    header: TableHeader,
    descriptors: Vec<ColumnDescriptor>,
    offsets: Vec<u64>,
    metadata: RwLock<TableMetadata>,
    pools: [OnceCell<Pool>; POOL_REGIONS.len()],
    metrics: StrataMetrics,
    block_rows: usize,
    buffer_options: BufferOptions,
}

impl<R: ReadAt> TableState<R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        read: R,
        header: TableHeader,
        descriptors: Vec<ColumnDescriptor>,
        offsets: Vec<u64>,
        metadata: TableMetadata,
        metrics: StrataMetrics,
        block_rows: usize,
        buffer_options: BufferOptions,
    ) -> Self {
        Self {
            read: RwLock::new(Some(read)),
            header,
            descriptors,
            offsets,
            metadata: RwLock::new(metadata),
            pools: std::array::from_fn(|_| OnceCell::new()),
            metrics,
            block_rows,
            buffer_options,
        }
    }

    /// A handle on the byte source, unless the table has been closed.
    fn handle(&self) -> StrataResult<R> {
        self.read
            .read()
            .clone()
            .ok_or_else(|| strata_err!(Disposed: "table reader"))
    }

    pub(crate) fn row_count(&self) -> u64 {
        self.header.row_count()
    }

    pub(crate) fn block_rows(&self) -> usize {
        self.block_rows
    }

    pub(crate) fn descriptor(&self, column: usize) -> ColumnDescriptor {
        self.descriptors[column]
    }

    pub(crate) fn column_offset(&self, column: usize) -> u64 {
        self.offsets[column]
    }

    pub(crate) async fn read_range(&self, range: Range<u64>) -> StrataResult<Bytes> {
        let bytes = self.handle()?.read_byte_range(range).await?;
        self.metrics.record_read(bytes.len());
        Ok(bytes)
    }

    /// The decoded pool stored in `region`, read from the file on first use.
    ///
    /// Concurrent callers share a single load. A failed load leaves the slot empty so a later
    /// call retries.
    pub(crate) async fn pool(&self, region: Region) -> StrataResult<&Pool> {
        let Some(slot) = POOL_REGIONS.iter().position(|r| *r == region) else {
            strata_bail!(Internal: "{region} is not a pool");
        };
        self.pools[slot]
            .get_or_try_init(async {
                let range = self.header.region(region);
                if range.is_absent() {
                    strata_bail!(Malformed: "{region} is absent but a column refers to it");
                }
                let bytes = self.read_range(range.as_range()).await?;
                self.metrics.record_pool_load();
                log::debug!("loaded {region} of {} bytes", bytes.len());
                Pool::parse(region, bytes)
            })
            .await
    }
}

/// A lazily read table file.
///
/// Opening parses the header, descriptors and metadata. Column data is read one block at a time
/// on request, and each shared pool is read once, the first time a column needs it. Clones share
/// the same state, including the pool cache.
pub struct TableReader<R> {
    state: Arc<TableState<R>>,
}

impl<R> Clone for TableReader<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<R> Debug for TableReader<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableReader")
            .field("header", &self.state.header)
            .field("block_rows", &self.state.block_rows)
            .field("closed", &self.state.read.read().is_none())
            .finish()
    }
}

impl<R: ReadAt> TableReader<R> {
    pub(crate) fn new(state: TableState<R>) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Number of rows.
    pub fn row_count(&self) -> u64 {
        self.state.row_count()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.state.descriptors.len()
    }

    /// Logical type of every column, in column order.
    pub fn column_types(&self) -> Vec<LogicalType> {
        self.state
            .descriptors
            .iter()
            .map(ColumnDescriptor::logical_type)
            .collect()
    }

    /// The parsed header.
    pub fn header(&self) -> &TableHeader {
        &self.state.header
    }

    /// Number of row blocks each column is read in.
    pub fn block_count(&self) -> usize {
        usize::try_from(self.row_count().div_ceil(self.state.block_rows as u64))
            .unwrap_or(usize::MAX)
    }

    /// Table-level metadata.
    pub fn metadata(&self) -> Metadata {
        self.state.metadata.read().table.clone()
    }

    /// Metadata of `column`.
    pub fn column_metadata(&self, column: usize) -> StrataResult<Metadata> {
        self.check_column(column)?;
        Ok(self.state.metadata.read().columns[column].clone())
    }

    /// Whether [`TableReader::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.state.read.read().is_none()
    }

    fn check_column(&self, column: usize) -> StrataResult<()> {
        if column >= self.column_count() {
            strata_bail!(OutOfBounds: column, 0, self.column_count());
        }
        Ok(())
    }

    fn check_open(&self) -> StrataResult<()> {
        self.state.handle().map(drop)
    }

    /// A reader over `column` in its native logical type.
    pub fn column(&self, column: usize) -> StrataResult<ColumnReader<R>> {
        self.check_open()?;
        self.check_column(column)?;
        Ok(ColumnReader::new(self.state.clone(), column))
    }

    /// Readers over `columns`, in the order given.
    pub fn columns(&self, columns: &[usize]) -> StrataResult<Vec<ColumnReader<R>>> {
        columns.iter().map(|c| self.column(*c)).collect()
    }

    /// A reader over `column` that yields `T`, converting from the native type.
    pub fn typed_column<T: FromValue>(&self, column: usize) -> StrataResult<TypedColumnReader<R, T>> {
        self.column(column)?.typed()
    }

    /// Every value of row `row`, read from all columns concurrently.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn row(&self, row: u64) -> StrataResult<Row> {
        if row >= self.row_count() {
            strata_bail!(OutOfBounds: row as usize, 0, self.row_count() as usize);
        }
        let columns = (0..self.column_count())
            .map(|c| self.column(c))
            .collect::<StrataResult<Vec<_>>>()?;
        let values = try_join_all(columns.iter().map(|c| c.get_item(row))).await?;
        Ok(Row::new(values))
    }

    /// Every row, in order. Each block of rows is read from all columns concurrently.
    pub fn rows(&self) -> impl Stream<Item = StrataResult<Row>> + '_ {
        stream::iter(0..self.block_count())
            .then(move |block| self.row_block(block))
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, StrataError>)))
            .try_flatten()
    }

    async fn row_block(&self, block: usize) -> StrataResult<Vec<Row>> {
        let columns = (0..self.column_count())
            .map(|c| self.column(c))
            .collect::<StrataResult<Vec<_>>>()?;
        let blocks = try_join_all(columns.iter().map(|c| c.get_block(block))).await?;
        let len = blocks.first().map_or(0, Vec::len);
        let mut values = blocks.into_iter().map(Vec::into_iter).collect::<Vec<_>>();
        (0..len)
            .map(|_| {
                values
                    .iter_mut()
                    .map(Iterator::next)
                    .collect::<Option<Vec<_>>>()
                    .map(Row::new)
                    .ok_or_else(|| strata_err!(Internal: "column blocks of block {block} disagree in length"))
            })
            .collect()
    }

    /// Write `columns` of this table as a new table file, carrying their metadata across.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, write)))]
    pub async fn write_columns_to<W: TableWrite>(&self, write: W, columns: &[usize]) -> StrataResult<W> {
        let mut buffers = Vec::with_capacity(columns.len());
        for reader in self.columns(columns)? {
            let mut buffer = self.projection_buffer(&reader)?;
            let mut blocks = pin!(reader.blocks());
            while let Some(values) = blocks.try_next().await? {
                buffer.extend(values)?;
            }
            buffers.push(buffer);
        }
        TableWriter::default()
            .write(write, &self.metadata(), &buffers)
            .await
    }

    /// Write the selected rows of every column as a new table file, in the order given.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, write, rows)))]
    pub async fn write_rows_to<W: TableWrite>(&self, write: W, rows: &[u64]) -> StrataResult<W> {
        if let Some(row) = rows.iter().find(|row| **row >= self.row_count()) {
            strata_bail!(OutOfBounds: *row as usize, 0, self.row_count() as usize);
        }
        let block_rows = self.state.block_rows as u64;
        let mut buffers = Vec::with_capacity(self.column_count());
        for reader in self.columns(&(0..self.column_count()).collect::<Vec<_>>())? {
            let mut buffer = self.projection_buffer(&reader)?;
            let mut cached: Option<(u64, Vec<Value>)> = None;
            for row in rows {
                let block = row / block_rows;
                let values = match cached.take() {
                    Some((cached_block, values)) if cached_block == block => values,
                    _ => reader.get_block(usize::try_from(block)?).await?,
                };
                let Some(value) = values.get(usize::try_from(row % block_rows)?) else {
                    strata_bail!(Internal: "row {row} is missing from block {block}");
                };
                buffer.push(value.clone())?;
                cached = Some((block, values));
            }
            buffers.push(buffer);
        }
        TableWriter::default()
            .write(write, &self.metadata(), &buffers)
            .await
    }

    /// An empty buffer for re-encoding `reader`'s column. String columns keep tracking distinct
    /// values so the new file interns them.
    fn projection_buffer(&self, reader: &ColumnReader<R>) -> StrataResult<ColumnBuffer> {
        let mut options = self.state.buffer_options.clone();
        if reader.logical_type() == LogicalType::Utf8 && options.max_distinct_items().is_none() {
            options = options.with_max_distinct_items(usize::try_from(self.row_count())?.saturating_add(1));
        }
        Ok(ColumnBuffer::new(reader.logical_type(), options)?
            .with_metadata(self.column_metadata(reader.index())?))
    }

    /// Release the byte source. Every later read fails with a disposed error.
    pub fn close(&self) -> StrataResult<()> {
        match self.state.read.write().take() {
            Some(_) => {
                log::debug!("closed table reader");
                Ok(())
            }
            None => Err(strata_err!(Disposed: "table reader")),
        }
    }
}

impl<R: UpdateAt> TableReader<R> {
    /// Rewrite the metadata region in place.
    ///
    /// The new records must fit in the space the current region occupies; the remainder is
    /// zero-filled. `columns` must hold one record per column.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn update_metadata(&self, table: Metadata, columns: Vec<Metadata>) -> StrataResult<()> {
        if columns.len() != self.column_count() {
            strata_bail!(
                "{} column metadata records given for {} columns",
                columns.len(),
                self.column_count()
            );
        }
        let metadata = TableMetadata { table, columns };
        let mut bytes = metadata.to_bytes()?;
        let region = self.state.header.region(Region::Metadata);
        let size = usize::try_from(region.size)?;
        if bytes.len() > size {
            strata_bail!(
                "metadata of {} bytes does not fit the {size}-byte metadata region",
                bytes.len()
            );
        }
        bytes.resize(size, 0);
        self.state
            .handle()?
            .update_at(region.offset, Bytes::from(bytes))
            .await?;
        *self.state.metadata.write() = metadata;
        Ok(())
    }
}
