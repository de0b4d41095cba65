// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Chunk decompression.
//!
//! Bag chunks declare their compression in the `compression` header field.
//! Three identifiers are recognised:
//! - `none` - payload is stored as-is
//! - `bz2` - [`BitHuffmanCodec`] (BWT + Huffman)
//! - `lz4` - [`BlockMatchCodec`] (LZ77 blocks), needs the chunk's `size`
//!
//! Anything else fails closed with
//! [`BagMapError::UnsupportedCompression`](crate::BagMapError::UnsupportedCompression).

pub mod bits;
pub mod bz2;
pub mod lz4;

use std::borrow::Cow;

pub use bz2::BitHuffmanCodec;
pub use lz4::BlockMatchCodec;

use crate::{BagMapError, Result};

/// Chunk compression identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Stored without compression
    None,
    /// BWT/Huffman stream
    Bz2,
    /// LZ4 block
    Lz4,
}

impl std::str::FromStr for Compression {
    type Err = BagMapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Compression::None),
            "bz2" => Ok(Compression::Bz2),
            "lz4" => Ok(Compression::Lz4),
            other => Err(BagMapError::unsupported(format!(
                "unknown chunk compression '{other}'"
            ))),
        }
    }
}

impl Compression {
    /// Identifier as written in the chunk header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bz2 => "bz2",
            Compression::Lz4 => "lz4",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatches a chunk payload to the codec named by its header.
pub struct ChunkDecompressor;

impl ChunkDecompressor {
    /// Decompress a chunk payload.
    ///
    /// `uncompressed_size` is the chunk header's `size` field. It is required
    /// for `lz4` and, when present, checked against the `bz2` output.
    pub fn decompress<'a>(
        compression: Compression,
        data: &'a [u8],
        uncompressed_size: Option<usize>,
    ) -> Result<Cow<'a, [u8]>> {
        match compression {
            Compression::None => Ok(Cow::Borrowed(data)),
            Compression::Bz2 => {
                let decoded = BitHuffmanCodec::decode(data)?;
                if let Some(expected) = uncompressed_size {
                    if decoded.len() != expected {
                        return Err(BagMapError::format(
                            "ChunkDecompressor",
                            format!(
                                "bz2 chunk decoded to {} bytes, header declares {expected}",
                                decoded.len()
                            ),
                        ));
                    }
                }
                Ok(Cow::Owned(decoded))
            }
            Compression::Lz4 => {
                let expected = uncompressed_size.ok_or_else(|| {
                    BagMapError::format("ChunkDecompressor", "lz4 chunk is missing its size field")
                })?;
                BlockMatchCodec::decode(data, expected).map(Cow::Owned)
            }
        }
    }

    /// Parse the identifier and decompress in one step.
    pub fn decompress_named<'a>(
        compression: &str,
        data: &'a [u8],
        uncompressed_size: Option<usize>,
    ) -> Result<Cow<'a, [u8]>> {
        Self::decompress(compression.parse()?, data, uncompressed_size)
    }
}
