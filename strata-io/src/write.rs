use std::future::{Future, ready};
use std::io;

use crate::InMemoryFile;
use crate::read::slice_range;

/// An append-only byte sink that can also rewrite bytes it has already written.
///
/// Table writers stream every region forward with [`TableWrite::write_all`] and then patch the
/// fixed-size header at the start of the output with [`TableWrite::write_at`].
pub trait TableWrite {
    /// Append the whole buffer to the end of the output.
    fn write_all(&mut self, buffer: &[u8]) -> impl Future<Output = io::Result<()>>;

    /// Overwrite previously written bytes starting at `offset`.
    ///
    /// The range must lie entirely within what has been written so far. Subsequent calls to
    /// [`TableWrite::write_all`] continue appending at the end.
    fn write_at(&mut self, offset: u64, buffer: &[u8]) -> impl Future<Output = io::Result<()>>;

    /// Flush any buffered bytes to the underlying storage.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>>;
}

impl TableWrite for Vec<u8> {
    fn write_all(&mut self, buffer: &[u8]) -> impl Future<Output = io::Result<()>> {
        self.extend_from_slice(buffer);
        ready(Ok(()))
    }

    fn write_at(&mut self, offset: u64, buffer: &[u8]) -> impl Future<Output = io::Result<()>> {
        let range = offset..offset + buffer.len() as u64;
        let result = slice_range(&range, self.len()).map(|r| self[r].copy_from_slice(buffer));
        ready(result)
    }

    fn flush(&mut self) -> impl Future<Output = io::Result<()>> {
        ready(Ok(()))
    }
}

impl TableWrite for InMemoryFile {
    fn write_all(&mut self, buffer: &[u8]) -> impl Future<Output = io::Result<()>> {
        self.append(buffer);
        ready(Ok(()))
    }

    fn write_at(&mut self, offset: u64, buffer: &[u8]) -> impl Future<Output = io::Result<()>> {
        ready(self.overwrite(offset, buffer))
    }

    fn flush(&mut self) -> impl Future<Output = io::Result<()>> {
        ready(Ok(()))
    }
}

impl<W: TableWrite> TableWrite for &mut W {
    fn write_all(&mut self, buffer: &[u8]) -> impl Future<Output = io::Result<()>> {
        (**self).write_all(buffer)
    }

    fn write_at(&mut self, offset: u64, buffer: &[u8]) -> impl Future<Output = io::Result<()>> {
        (**self).write_at(offset, buffer)
    }

    fn flush(&mut self) -> impl Future<Output = io::Result<()>> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use crate::TableWrite;

    #[tokio::test]
    async fn vec_back_patch() {
        let mut out = Vec::new();
        out.write_all(&[0, 0, 0, 0]).await.unwrap();
        out.write_all(b"tail").await.unwrap();
        out.write_at(0, b"head").await.unwrap();
        out.write_all(b"!").await.unwrap();
        assert_eq!(out, b"headtail!");
    }

    #[tokio::test]
    async fn vec_patch_past_end_fails() {
        let mut out = b"ab".to_vec();
        assert!(out.write_at(1, b"cd").await.is_err());
    }
}
