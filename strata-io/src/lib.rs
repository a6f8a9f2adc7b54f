//! Core traits and implementations for positioned IO.
//!
//! Table files are read through [`ReadAt`], a stateless positioned reader that allows any number
//! of concurrent reads at distinct offsets. Writers stream bytes forward through [`TableWrite`]
//! and back-patch the header once every region has been laid out. Readers that support it can
//! rewrite bytes in place through [`UpdateAt`].

pub use memory::*;
pub use read::*;
#[cfg(feature = "tokio")]
pub use tokio::*;
pub use write::*;

mod memory;
mod read;
#[cfg(feature = "tokio")]
mod tokio;
mod write;
