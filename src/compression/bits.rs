// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MSB-first bit reader used by the BWT/Huffman decoder.

use crate::{BagMapError, Result};

/// Reads bits most-significant-first from a byte slice.
///
/// Holds at most 56 buffered bits, enough to peek a 48-bit block marker.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u64,
    count: u32,
}

impl<'a> BitReader<'a> {
    /// Create a reader at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            count: 0,
        }
    }

    fn fill(&mut self, n: u32) -> Result<()> {
        debug_assert!(n <= 48);
        while self.count < n {
            let byte = *self.data.get(self.pos).ok_or_else(|| {
                BagMapError::truncated(
                    ((n - self.count) as usize).div_ceil(8),
                    0,
                    self.pos,
                )
            })?;
            self.pos += 1;
            self.buffer = (self.buffer << 8) | u64::from(byte);
            self.count += 8;
        }
        Ok(())
    }

    /// Look at the next `n` bits (n <= 48) without consuming them.
    pub fn peek_bits(&mut self, n: u32) -> Result<u64> {
        self.fill(n)?;
        Ok((self.buffer >> (self.count - n)) & mask(n))
    }

    /// Consume the next `n` bits (n <= 48).
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        let value = self.peek_bits(n)?;
        self.count -= n;
        self.buffer &= mask(self.count);
        Ok(value)
    }

    /// Consume a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Consume `n` bits (n <= 32) as a u32.
    #[inline]
    pub fn read_u32(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        Ok(self.read_bits(n)? as u32)
    }

    /// Byte offset of the next unread byte in the input.
    pub fn byte_position(&self) -> usize {
        self.pos
    }
}

#[inline]
fn mask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}
