use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use strata_error::{StrataError, StrataResult};
use uuid::Uuid;

/// Hands out the overflow file of a buffer on its first spill.
pub trait SpillStorage: Debug + Send + Sync {
    /// Create a fresh, uniquely named random-access file for the buffer `owner`.
    fn acquire(&self, owner: Uuid) -> StrataResult<SpillFile>;
}

/// Creates `<dir>/<owner>.spill` files, removed again when the owning buffer is dropped.
#[derive(Debug, Clone)]
pub struct TempDirSpillStorage {
    dir: PathBuf,
}

impl TempDirSpillStorage {
    /// Spill into `dir`, which must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory spill files are created in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for TempDirSpillStorage {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl SpillStorage for TempDirSpillStorage {
    fn acquire(&self, owner: Uuid) -> StrataResult<SpillFile> {
        let path = self.dir.join(format!("{owner}.spill"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                StrataError::from(err).with_context(format!("creating spill file {}", path.display()))
            })?;
        log::debug!("created spill file {}", path.display());
        Ok(SpillFile::owned(file, path))
    }
}

/// An append-only overflow file read back with positioned reads.
#[derive(Debug)]
pub struct SpillFile {
    file: File,
    path: Option<PathBuf>,
    len: u64,
}

impl SpillFile {
    /// Wrap a file that is removed from `path` on drop.
    pub fn owned(file: File, path: PathBuf) -> Self {
        Self {
            file,
            path: Some(path),
            len: 0,
        }
    }

    /// Wrap a file that has no name, or whose lifetime is managed elsewhere.
    pub fn anonymous(file: File) -> Self {
        Self {
            file,
            path: None,
            len: 0,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the file, if it has one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `bytes` and return the offset they were written at.
    pub fn append(&mut self, bytes: &[u8]) -> StrataResult<u64> {
        let offset = self.len;
        self.file.write_all_at(bytes, offset)?;
        self.len += bytes.len() as u64;
        Ok(offset)
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read(&self, offset: u64, len: usize) -> StrataResult<Vec<u8>> {
        let mut buffer = vec![0; len];
        self.file.read_exact_at(&mut buffer, offset)?;
        Ok(buffer)
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = std::fs::remove_file(&path) {
                log::warn!("failed to remove spill file {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::{SpillFile, SpillStorage, TempDirSpillStorage};

    #[test]
    fn spill_file_is_named_after_owner_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempDirSpillStorage::new(dir.path());
        let owner = Uuid::new_v4();

        let mut file = storage.acquire(owner).unwrap();
        let path = file.path().unwrap().to_path_buf();
        assert_eq!(path, dir.path().join(format!("{owner}.spill")));

        assert_eq!(file.append(b"abc").unwrap(), 0);
        assert_eq!(file.append(b"defg").unwrap(), 3);
        assert_eq!(file.read(3, 4).unwrap(), b"defg");
        assert_eq!(file.len(), 7);

        // a second buffer with the same id cannot clobber the file
        assert!(storage.acquire(owner).is_err());

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn anonymous_file() {
        let mut file = SpillFile::anonymous(tempfile::tempfile().unwrap());
        file.append(&[1, 2, 3]).unwrap();
        assert_eq!(file.read(1, 2).unwrap(), vec![2, 3]);
        assert!(file.read(2, 5).is_err());
    }
}
