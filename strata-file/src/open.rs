use std::fmt::{Debug, Formatter};

use strata_buffer::BufferOptions;
use strata_error::{ResultExt, StrataResult, strata_bail, strata_err};
use strata_io::ReadAt;
use strata_metrics::StrataMetrics;

use crate::reader::TableState;
use crate::{
    ColumnDescriptor, HEADER_SIZE, Region, TableHeader, TableMetadata, TableReader,
};

/// Default number of rows a [`ColumnReader`](crate::ColumnReader) block spans.
pub const DEFAULT_BLOCK_ROWS: usize = 4096;

/// Options for opening a table file.
#[derive(Clone)]
pub struct TableOpenOptions {
    block_rows: usize,
    metrics: StrataMetrics,
    buffer_options: BufferOptions,
}

impl Default for TableOpenOptions {
    fn default() -> Self {
        Self {
            block_rows: DEFAULT_BLOCK_ROWS,
            metrics: StrataMetrics::default(),
            buffer_options: BufferOptions::default(),
        }
    }
}

impl Debug for TableOpenOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableOpenOptions")
            .field("block_rows", &self.block_rows)
            .field("buffer_options", &self.buffer_options)
            .finish_non_exhaustive()
    }
}

impl TableOpenOptions {
    /// Options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in each block a column is read in.
    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows;
        self
    }

    /// Record reads and pool loads on `metrics`.
    pub fn with_metrics(mut self, metrics: StrataMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Buffer options used when re-encoding projections of the table.
    pub fn with_buffer_options(mut self, buffer_options: BufferOptions) -> Self {
        self.buffer_options = buffer_options;
        self
    }

    /// Parse the header, column descriptors and metadata of the table behind `read`.
    ///
    /// Column data and pools are left on disk until they are first requested.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn open<R: ReadAt>(self, read: R) -> StrataResult<TableReader<R>> {
        if self.block_rows == 0 {
            strata_bail!("block_rows must be greater than zero");
        }

        let file_size = read.size().await?;
        if file_size < HEADER_SIZE as u64 {
            strata_bail!(
                Malformed: "file of {file_size} bytes is shorter than the {HEADER_SIZE}-byte header"
            );
        }
        let header_bytes = read.read_byte_range(0..HEADER_SIZE as u64).await?;
        let header = TableHeader::parse(&header_bytes)?;
        header.validate(file_size)?;
        log::debug!(
            "parsed header: {} columns x {} rows in {file_size} bytes",
            header.column_count(),
            header.row_count()
        );

        let descriptor_bytes = read
            .read_byte_range(header.region(Region::Descriptors).as_range())
            .await?;
        let descriptors = ColumnDescriptor::parse_all(&descriptor_bytes, header.column_count())
            .with_context(|| "parsing column descriptors")?;
        let offsets = column_offsets(&header, &descriptors)?;
        log::debug!("parsed {} column descriptors", descriptors.len());

        let metadata_bytes = read
            .read_byte_range(header.region(Region::Metadata).as_range())
            .await?;
        let metadata = TableMetadata::parse(&metadata_bytes, header.column_count())
            .with_context(|| "parsing metadata region")?;
        log::debug!("parsed metadata, table is ready");

        Ok(TableReader::new(TableState::new(
            read,
            header,
            descriptors,
            offsets,
            metadata,
            self.metrics,
            self.block_rows,
            self.buffer_options,
        )))
    }
}

/// Absolute offset of every column, the running sum of the preceding columns' widths.
fn column_offsets(header: &TableHeader, descriptors: &[ColumnDescriptor]) -> StrataResult<Vec<u64>> {
    let data = header.region(Region::Data);
    let mut offsets = Vec::with_capacity(descriptors.len());
    let mut position = data.offset;
    for descriptor in descriptors {
        offsets.push(position);
        let size = u64::from(descriptor.element_size())
            .checked_mul(header.row_count())
            .ok_or_else(|| strata_err!(Malformed: "column size overflows"))?;
        position = position
            .checked_add(size)
            .ok_or_else(|| strata_err!(Malformed: "column offsets overflow"))?;
    }
    if position != data.end()? {
        strata_bail!(
            Malformed: "columns span {} bytes but the data region holds {}",
            position - data.offset,
            data.size
        );
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use strata_buffer::{BufferOptions, ColumnBuffer, Metadata};
    use strata_dtype::{LogicalType, Value};
    use strata_io::InMemoryFile;

    use crate::{HEADER_SIZE, Region, TableHeader, TableOpenOptions, TableWriter};

    async fn table() -> Vec<u8> {
        let columns = [
            ColumnBuffer::try_from_values(
                LogicalType::I32,
                BufferOptions::default(),
                [1, 2, 3].map(Value::from),
            )
            .unwrap(),
            ColumnBuffer::try_from_values(
                LogicalType::U8,
                BufferOptions::default(),
                [4u8, 5, 6].map(Value::from),
            )
            .unwrap(),
        ];
        TableWriter::default()
            .write(Vec::new(), &Metadata::new().with("k", "v"), &columns)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn opens_written_table() {
        let reader = TableOpenOptions::new()
            .open(InMemoryFile::from(table().await))
            .await
            .unwrap();
        assert_eq!(reader.row_count(), 3);
        assert_eq!(reader.column_types(), vec![LogicalType::I32, LogicalType::U8]);
        assert_eq!(reader.metadata().get("k"), Some("v"));
    }

    #[tokio::test]
    async fn zero_block_rows() {
        let err = TableOpenOptions::new()
            .with_block_rows(0)
            .open(InMemoryFile::from(table().await))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("block_rows"));
    }

    #[tokio::test]
    async fn truncated_file() {
        let mut bytes = table().await;
        bytes.truncate(HEADER_SIZE - 1);
        let err = TableOpenOptions::new()
            .open(InMemoryFile::from(bytes))
            .await
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn data_region_must_cover_columns() {
        let mut bytes = table().await;
        let mut header = TableHeader::parse(&bytes[..HEADER_SIZE]).unwrap();
        let mut data = header.region(Region::Data);
        data.size -= 1;
        header.set_region(Region::Data, data);
        bytes[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        let err = TableOpenOptions::new()
            .open(InMemoryFile::from(bytes))
            .await
            .unwrap_err();
        assert!(err.is_malformed());
    }
}
