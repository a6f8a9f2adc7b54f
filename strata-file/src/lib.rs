//! Read and write Strata table files.
//!
//! A table file stores a fixed number of equally long, typed columns. Its layout is:
//!
//! ```text
//! [header]                      148 bytes, back-patched once the rest is written
//! [column descriptor] * N       8 bytes each: logical type tag and on-disk element width
//! [column data region]          column-major, fixed width per element
//! [string pool]?                string records addressed by u32 codes
//! [float pool]?                 f32 values of vectors and tensors
//! [binary pool]?                raw bytes of binary values
//! [index pool]?                 u32 values of index lists
//! [weighted index pool]?        (u32, f32) pairs of weighted index lists
//! [metadata region]             one table record followed by one record per column
//! ```
//!
//! Fixed-width values are stored inline in the data region. Variable-length values store a
//! fixed-width [`RangeDescriptor`] inline that addresses a slice of one of the shared pools. A
//! pool that no column uses is absent, recorded as a zero `(offset, size)` pair in the header.
//!
//! Tables are written from [`ColumnBuffer`](strata_buffer::ColumnBuffer)s with a
//! [`TableWriter`] and read back lazily, one block of rows at a time, with a [`TableReader`]
//! opened through [`TableOpenOptions`].

mod column;
mod descriptor;
mod header;
mod metadata;
mod open;
mod pool;
mod range;
mod reader;
mod row;
mod writer;

pub use column::*;
pub use descriptor::*;
pub use header::*;
pub use metadata::*;
pub use open::*;
pub use pool::*;
pub use range::*;
pub use reader::*;
pub use row::*;
pub use writer::*;

/// The magic number at the start of every table file.
pub const MAGIC_BYTES: [u8; 4] = *b"STRT";
/// The current file format version.
pub const VERSION: u16 = 1;
/// Orientation tag of a column-major table. No other orientation is defined.
pub const ORIENTATION_COLUMNS: u8 = 1;
/// Size of the fixed header.
pub const HEADER_SIZE: usize = 148;
/// Size of one column descriptor.
pub const DESCRIPTOR_SIZE: usize = 8;
