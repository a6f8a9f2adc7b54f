use strata_error::{StrataResult, strata_err};

/// A bounds-checked little-endian reader over a byte slice.
///
/// Every read that runs past the end of the slice fails as malformed instead of panicking.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Start reading at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume the next `len` bytes.
    pub fn take(&mut self, len: usize) -> StrataResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                strata_err!(
                    Malformed: "needed {len} bytes at offset {} but only {} remain",
                    self.pos,
                    self.remaining()
                )
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Consume the next `N` bytes as an array.
    pub fn array<const N: usize>(&mut self) -> StrataResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Consume one byte.
    pub fn u8(&mut self) -> StrataResult<u8> {
        Ok(u8::from_le_bytes(self.array()?))
    }

    /// Consume a little-endian `u16`.
    pub fn u16(&mut self) -> StrataResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Consume a little-endian `u32`.
    pub fn u32(&mut self) -> StrataResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Consume a little-endian `u64`.
    pub fn u64(&mut self) -> StrataResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Consume a little-endian `f32`.
    pub fn f32(&mut self) -> StrataResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }
}
