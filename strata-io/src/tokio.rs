use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, SeekFrom};
use std::ops::{Deref, Range};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::{ReadAt, TableWrite, UpdateAt};

/// A cheaply cloneable file that executes positioned operations on the tokio blocking
/// threadpool.
///
/// We use this because the builtin tokio `File` type is not `Clone` and keeps a shared cursor,
/// which would serialize concurrent column reads.
#[derive(Debug, Clone)]
pub struct TokioFile(Arc<File>);

impl TokioFile {
    /// Open a file on the current file system for reading.
    ///
    /// The `TokioFile` takes ownership of the file descriptor, and can be cloned
    /// many times without opening a new file descriptor. When the last instance
    /// of the `TokioFile` is dropped, the file descriptor is closed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self(Arc::new(File::open(path)?)))
    }

    /// Open an existing file for reading and in-place updates.
    pub fn open_rw(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self(Arc::new(file)))
    }
}

// Implement deref coercion for non-mut `File` methods on `TokioFile`.
impl Deref for TokioFile {
    type Target = File;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}

impl ReadAt for TokioFile {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    fn read_byte_range(
        &self,
        range: Range<u64>,
    ) -> impl Future<Output = io::Result<Bytes>> + Send + 'static {
        let this = self.clone();
        blocking(move || {
            let len = usize::try_from(range.end.saturating_sub(range.start))
                .map_err(io::Error::other)?;
            let mut buffer = BytesMut::zeroed(len);
            this.read_exact_at(&mut buffer, range.start)?;
            Ok(buffer.freeze())
        })
    }

    fn size(&self) -> impl Future<Output = io::Result<u64>> + Send + 'static {
        let this = self.clone();
        blocking(move || Ok(this.metadata()?.len()))
    }
}

impl UpdateAt for TokioFile {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, buffer)))]
    fn update_at(
        &self,
        offset: u64,
        buffer: Bytes,
    ) -> impl Future<Output = io::Result<()>> + Send + 'static {
        let this = self.clone();
        blocking(move || {
            let len = this.metadata()?.len();
            if offset + buffer.len() as u64 > len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "in-place update would extend the file",
                ));
            }
            this.write_all_at(&buffer, offset)?;
            this.sync_data()
        })
    }
}

impl TableWrite for tokio::fs::File {
    async fn write_all(&mut self, buffer: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(self, buffer).await
    }

    async fn write_at(&mut self, offset: u64, buffer: &[u8]) -> io::Result<()> {
        let end = self.seek(SeekFrom::End(0)).await?;
        if offset + buffer.len() as u64 > end {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "cannot patch past the end of the written output",
            ));
        }
        self.seek(SeekFrom::Start(offset)).await?;
        AsyncWriteExt::write_all(self, buffer).await?;
        self.seek(SeekFrom::End(0)).await?;
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        AsyncWriteExt::flush(self).await
    }
}
