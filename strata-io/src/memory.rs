use std::future::{Future, ready};
use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::read::slice_range;
use crate::{ReadAt, UpdateAt};

/// A cheaply cloneable, growable in-memory file.
///
/// Clones share the same bytes, so a table can be written into one handle and read back, or
/// updated in place, through another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFile(Arc<RwLock<Vec<u8>>>);

impl InMemoryFile {
    /// Create an empty in-memory file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the file holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copy the current contents out of the file.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0.read())
    }

    pub(crate) fn append(&self, buffer: &[u8]) {
        self.0.write().extend_from_slice(buffer);
    }

    pub(crate) fn overwrite(&self, offset: u64, buffer: &[u8]) -> io::Result<()> {
        let mut data = self.0.write();
        let range = offset..offset + buffer.len() as u64;
        let target = slice_range(&range, data.len())?;
        data[target].copy_from_slice(buffer);
        Ok(())
    }
}

impl From<Vec<u8>> for InMemoryFile {
    fn from(value: Vec<u8>) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }
}

impl ReadAt for InMemoryFile {
    fn read_byte_range(
        &self,
        range: Range<u64>,
    ) -> impl Future<Output = io::Result<Bytes>> + Send + 'static {
        let data = self.0.read();
        let result = slice_range(&range, data.len())
            .map(|r| Bytes::copy_from_slice(&data[r]));
        ready(result)
    }

    fn size(&self) -> impl Future<Output = io::Result<u64>> + Send + 'static {
        ready(Ok(self.len() as u64))
    }
}

impl UpdateAt for InMemoryFile {
    fn update_at(
        &self,
        offset: u64,
        buffer: Bytes,
    ) -> impl Future<Output = io::Result<()>> + Send + 'static {
        ready(self.overwrite(offset, &buffer))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::{InMemoryFile, ReadAt, UpdateAt};

    #[tokio::test]
    async fn clones_share_bytes() {
        let file = InMemoryFile::from(b"hello world".to_vec());
        let clone = file.clone();
        clone.update_at(6, Bytes::from_static(b"there")).await.unwrap();

        let read = file.read_byte_range(0..11).await.unwrap();
        assert_eq!(read.as_ref(), b"hello there");
    }

    #[tokio::test]
    async fn update_cannot_grow() {
        let file = InMemoryFile::from(b"abc".to_vec());
        assert!(file.update_at(2, Bytes::from_static(b"de")).await.is_err());
        assert_eq!(file.size().await.unwrap(), 3);
    }
}
