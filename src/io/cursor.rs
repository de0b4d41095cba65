// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Checked little-endian cursor shared by every format reader.
//!
//! All reads validate `offset + len <= data.len()` before slicing and fail
//! with [`BagMapError::TruncatedInput`] instead of reading past the buffer.

use byteorder::{ByteOrder, LittleEndian};

use crate::{BagMapError, Result};

/// Cursor over a borrowed byte buffer.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use bagmap::io::cursor::ByteCursor;
///
/// let data = [0x2A, 0x00, 0x00, 0x00, 0x01];
/// let mut cursor = ByteCursor::new(&data);
/// assert_eq!(cursor.read_u32()?, 42);
/// assert_eq!(cursor.remaining(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a cursor positioned at `offset`.
    ///
    /// The offset may equal `data.len()`; anything past it is truncation.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        if offset > data.len() {
            return Err(BagMapError::truncated(offset, data.len(), 0));
        }
        Ok(Self { data, offset })
    }

    /// Current read position.
    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Remaining bytes available to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Check if at end of buffer.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Underlying buffer.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| BagMapError::truncated(len, self.remaining(), self.offset))?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Advance by `len` bytes without reading them.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    /// Read a little-endian f32.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    /// Read a little-endian f64.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Read a u32 length prefix followed by that many bytes.
    pub fn read_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Read a u32-length-prefixed string (lossy UTF-8).
    pub fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.read_prefixed()?).into_owned())
    }

    /// Read a u32-count-prefixed array of f32.
    pub fn read_f32_array(&mut self) -> Result<Vec<f32>> {
        let count = self.read_u32()? as usize;
        let bytes = count
            .checked_mul(4)
            .ok_or_else(|| BagMapError::truncated(usize::MAX, self.remaining(), self.offset))?;
        let raw = self.read_bytes(bytes)?;
        Ok(raw.chunks_exact(4).map(LittleEndian::read_f32).collect())
    }

    /// Read `N` consecutive little-endian f64 values.
    pub fn read_f64_array<const N: usize>(&mut self) -> Result<[f64; N]> {
        let raw = self.read_bytes(N * 8)?;
        let mut values = [0.0; N];
        for (value, chunk) in values.iter_mut().zip(raw.chunks_exact(8)) {
            *value = LittleEndian::read_f64(chunk);
        }
        Ok(values)
    }
}
