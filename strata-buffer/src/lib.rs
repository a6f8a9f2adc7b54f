#![deny(missing_docs)]

//! Append-only column buffers.
//!
//! A [`CompositeBuffer`] accumulates values of one element type into fixed-capacity
//! [`Block`]s. Completed blocks stay in memory up to a configurable quota, after which the
//! oldest block is encoded and appended to a spill file handed out by a [`SpillStorage`]. Every
//! value written can be replayed in append order with [`CompositeBuffer::for_each_block`] or
//! fetched by block index with [`CompositeBuffer::get_block`], wherever it currently lives.
//!
//! [`ColumnBuffer`] closes the set of element types over the [`LogicalType`] tagged union so
//! table writers can hold heterogeneous columns side by side.
//!
//! [`LogicalType`]: strata_dtype::LogicalType

pub use block::*;
pub use column::*;
pub use composite::*;
pub use cursor::*;
pub use encoding::*;
pub use metadata::*;
pub use options::*;
pub use spill::*;

mod block;
mod column;
mod composite;
mod cursor;
mod encoding;
mod metadata;
mod options;
mod spill;
