//! Strata stores typed columns in block-based buffers that spill to disk, and writes them as
//! column-major table files that are read back lazily, one block of rows at a time.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> strata::error::StrataResult<()> {
//! use strata::buffer::{BufferOptions, ColumnBuffer, Metadata};
//! use strata::dtype::{LogicalType, Value};
//! use strata::file::{TableOpenOptions, TableWriter};
//! use strata::io::InMemoryFile;
//!
//! let mut names = ColumnBuffer::new(LogicalType::Utf8, BufferOptions::default())?;
//! names.extend(["ada", "grace"])?;
//! let mut ages = ColumnBuffer::new(LogicalType::U8, BufferOptions::default())?;
//! ages.extend([36u8, 45])?;
//!
//! let bytes = TableWriter::default()
//!     .write(Vec::new(), &Metadata::new(), &[names, ages])
//!     .await?;
//! let table = TableOpenOptions::new().open(InMemoryFile::from(bytes)).await?;
//! assert_eq!(table.row(1).await?.get(0), Some(&Value::from("grace")));
//! # Ok(())
//! # }
//! ```

pub use {
    strata_buffer as buffer, strata_dtype as dtype, strata_error as error,
    strata_metrics as metrics,
};
#[cfg(feature = "files")]
pub use {strata_file as file, strata_io as io};
