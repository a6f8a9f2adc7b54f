#![deny(missing_docs)]

//! Logical column types and dynamically typed values.
//!
//! [`LogicalType`] is the closed set of column types a Strata table can hold. Every read and
//! write site matches on it exhaustively, so each variant owns its on-disk element width and
//! the pool, if any, that holds its payload. [`Value`] is the matching dynamically typed cell.

pub use cast::*;
pub use logical::*;
pub use tensor::*;
pub use value::*;

mod cast;
mod logical;
mod tensor;
mod value;
