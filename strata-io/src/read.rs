use std::future::Future;
use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;

/// A trait for types that support asynchronous positioned reads.
///
/// Reads carry their own offset, so there is no shared cursor and any number of reads at
/// distinct offsets may be in flight at once.
///
/// Readers must be cheaply cloneable to allow for easy sharing across tasks or threads.
pub trait ReadAt: Clone + Send + Sync + 'static {
    /// Request an asynchronous positional read. Results will be returned as a [`Bytes`].
    ///
    /// If the reader does not have the requested number of bytes, the returned Future will complete
    /// with an [`UnexpectedEof`][std::io::ErrorKind::UnexpectedEof].
    fn read_byte_range(
        &self,
        range: Range<u64>,
    ) -> impl Future<Output = io::Result<Bytes>> + Send + 'static;

    /// Asynchronously get the number of bytes of data readable.
    fn size(&self) -> impl Future<Output = io::Result<u64>> + Send + 'static;
}

/// A trait for readers whose bytes can be rewritten in place.
///
/// Updates never change the length of the underlying data.
pub trait UpdateAt: ReadAt {
    /// Overwrite `buffer.len()` bytes starting at `offset`.
    ///
    /// Fails with [`UnexpectedEof`][std::io::ErrorKind::UnexpectedEof] if the write would extend
    /// past the current end of the data.
    fn update_at(
        &self,
        offset: u64,
        buffer: Bytes,
    ) -> impl Future<Output = io::Result<()>> + Send + 'static;
}

pub(crate) fn eof(range: &Range<u64>, len: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "byte range {}..{} is past the end of {} bytes",
            range.start, range.end, len
        ),
    )
}

pub(crate) fn slice_range(range: &Range<u64>, len: usize) -> io::Result<Range<usize>> {
    let start = usize::try_from(range.start).map_err(io::Error::other)?;
    let end = usize::try_from(range.end).map_err(io::Error::other)?;
    if start > end || end > len {
        return Err(eof(range, len as u64));
    }
    Ok(start..end)
}

impl<T: ReadAt> ReadAt for Arc<T> {
    fn read_byte_range(
        &self,
        range: Range<u64>,
    ) -> impl Future<Output = io::Result<Bytes>> + Send + 'static {
        T::read_byte_range(self, range)
    }

    fn size(&self) -> impl Future<Output = io::Result<u64>> + Send + 'static {
        T::size(self)
    }
}

impl<T: UpdateAt> UpdateAt for Arc<T> {
    fn update_at(
        &self,
        offset: u64,
        buffer: Bytes,
    ) -> impl Future<Output = io::Result<()>> + Send + 'static {
        T::update_at(self, offset, buffer)
    }
}

impl ReadAt for Bytes {
    fn read_byte_range(
        &self,
        range: Range<u64>,
    ) -> impl Future<Output = io::Result<Bytes>> + Send + 'static {
        let result = slice_range(&range, self.len()).map(|r| self.slice(r));
        std::future::ready(result)
    }

    fn size(&self) -> impl Future<Output = io::Result<u64>> + Send + 'static {
        std::future::ready(Ok(self.len() as u64))
    }
}
