// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Burrows-Wheeler / Huffman chunk decoder (bzip2 stream format).
//!
//! # Stream Structure
//!
//! ```text
//! "BZh" <level '1'..'9'>
//! repeat:
//!   0x314159265359 (48 bits)   block marker
//!   <crc: 32> <randomised: 1> <origin: 24>
//!   <used-byte bitmap: 16 + 16 * active groups>
//!   <tables: 3> <selectors: 15> <MTF-coded selectors> <delta-coded lengths>
//!   <Huffman-coded symbols ... EOB>
//! 0x177245385090 (48 bits)     end of stream, followed by a 32-bit stream crc
//! ```
//!
//! Decoding a block runs the encoder's stages backwards: Huffman decoding,
//! zero-run expansion (RUNA/RUNB), move-to-front inversion, BWT inversion and
//! finally expansion of the initial 4-byte run-length stage.

use crate::compression::bits::BitReader;
use crate::{BagMapError, Result};

const BLOCK_MAGIC: u64 = 0x3141_5926_5359;
const EOS_MAGIC: u64 = 0x1772_4538_5090;

/// Symbols decoded per selector before switching tables.
const GROUP_SIZE: usize = 50;
const MIN_TABLES: usize = 2;
const MAX_TABLES: usize = 6;
const MAX_CODE_LEN: usize = 20;
const RUN_A: u16 = 0;
const RUN_B: u16 = 1;
/// Upper bound for a single RUNA/RUNB accumulation step.
const MAX_RUN_WEIGHT: usize = 2 * 1024 * 1024;

const CONTEXT: &str = "BitHuffmanCodec";

/// Decoder for BWT/Huffman compressed chunk payloads.
pub struct BitHuffmanCodec;

impl BitHuffmanCodec {
    /// Decode a complete stream, concatenating every block's output.
    ///
    /// Fails on a bad stream header, an unknown block signature, randomised
    /// blocks and any malformed table or symbol data.
    pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 4 || &data[..3] != b"BZh" {
            return Err(BagMapError::format(CONTEXT, "missing 'BZh' stream header"));
        }
        let level = data[3];
        if !(b'1'..=b'9').contains(&level) {
            return Err(BagMapError::format(
                CONTEXT,
                format!("invalid block size indicator 0x{level:02x}"),
            ));
        }
        let max_block = usize::from(level - b'0') * 100_000;

        let mut reader = BitReader::new(&data[4..]);
        let mut output = Vec::new();
        let mut blocks = 0usize;

        loop {
            let marker = reader.peek_bits(48)?;
            if marker == EOS_MAGIC {
                reader.read_bits(48)?;
                // Whole-stream checksum is not verified.
                reader.read_bits(32)?;
                break;
            }
            if marker != BLOCK_MAGIC {
                return Err(BagMapError::format(
                    CONTEXT,
                    format!("invalid block signature 0x{marker:012x}"),
                ));
            }
            reader.read_bits(48)?;
            let block = decode_block(&mut reader, max_block)?;
            tracing::debug!(block = blocks, bytes = block.len(), "decoded bwt block");
            output.extend_from_slice(&block);
            blocks += 1;
        }

        Ok(output)
    }
}

/// Canonical Huffman decode table for one coding group.
struct HuffmanTable {
    min_len: usize,
    max_len: usize,
    limit: [i32; MAX_CODE_LEN + 1],
    base: [i32; MAX_CODE_LEN + 2],
    perm: Vec<u16>,
}

impl HuffmanTable {
    fn new(lengths: &[u8]) -> Self {
        let min_len = lengths.iter().copied().min().unwrap_or(1) as usize;
        let max_len = lengths.iter().copied().max().unwrap_or(1) as usize;

        let mut perm = Vec::with_capacity(lengths.len());
        for len in min_len..=max_len {
            for (symbol, &l) in lengths.iter().enumerate() {
                if l as usize == len {
                    perm.push(symbol as u16);
                }
            }
        }

        // base[i] starts as the number of codes shorter than i.
        let mut base = [0i32; MAX_CODE_LEN + 2];
        for &l in lengths {
            base[l as usize + 1] += 1;
        }
        for i in 1..base.len() {
            base[i] += base[i - 1];
        }

        let mut limit = [0i32; MAX_CODE_LEN + 1];
        let mut code = 0i32;
        for len in min_len..=max_len {
            code += base[len + 1] - base[len];
            limit[len] = code - 1;
            code <<= 1;
        }
        for len in (min_len + 1)..=max_len {
            base[len] = ((limit[len - 1] + 1) << 1) - base[len];
        }

        Self {
            min_len,
            max_len,
            limit,
            base,
            perm,
        }
    }

    fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut len = self.min_len;
        let mut code = reader.read_u32(len as u32)? as i32;
        loop {
            if len > self.max_len {
                return Err(BagMapError::format(CONTEXT, "invalid Huffman code"));
            }
            if code <= self.limit[len] {
                break;
            }
            len += 1;
            code = (code << 1) | i32::from(reader.read_bit()?);
        }
        usize::try_from(code - self.base[len])
            .ok()
            .and_then(|rank| self.perm.get(rank).copied())
            .ok_or_else(|| BagMapError::format(CONTEXT, "Huffman code out of range"))
    }
}

/// Tracks which table codes the next symbol.
struct SymbolSource<'s> {
    tables: &'s [HuffmanTable],
    selectors: &'s [u8],
    selector_idx: usize,
    group_remaining: usize,
}

impl SymbolSource<'_> {
    fn next(&mut self, reader: &mut BitReader<'_>) -> Result<u16> {
        if self.group_remaining == 0 {
            if self.selector_idx >= self.selectors.len() {
                return Err(BagMapError::format(CONTEXT, "selector overrun"));
            }
            self.selector_idx += 1;
            self.group_remaining = GROUP_SIZE;
        }
        self.group_remaining -= 1;
        let table = &self.tables[usize::from(self.selectors[self.selector_idx - 1])];
        table.decode_symbol(reader)
    }
}

fn decode_block(reader: &mut BitReader<'_>, max_block: usize) -> Result<Vec<u8>> {
    // Per-block checksum is not verified.
    reader.read_bits(32)?;
    if reader.read_bit()? {
        return Err(BagMapError::unsupported("randomised BWT blocks"));
    }
    let origin = reader.read_u32(24)? as usize;

    let seq_to_byte = read_used_bytes(reader)?;
    let in_use = seq_to_byte.len();
    let alpha_size = in_use + 2;
    let end_of_block = (alpha_size - 1) as u16;

    let n_tables = reader.read_u32(3)? as usize;
    if !(MIN_TABLES..=MAX_TABLES).contains(&n_tables) {
        return Err(BagMapError::format(
            CONTEXT,
            format!("table count {n_tables} outside {MIN_TABLES}..={MAX_TABLES}"),
        ));
    }
    let n_selectors = reader.read_u32(15)? as usize;
    if n_selectors == 0 {
        return Err(BagMapError::format(CONTEXT, "selector count is zero"));
    }

    let selectors = read_selectors(reader, n_tables, n_selectors)?;
    let tables = (0..n_tables)
        .map(|_| read_code_lengths(reader, alpha_size).map(|l| HuffmanTable::new(&l)))
        .collect::<Result<Vec<_>>>()?;

    let mut source = SymbolSource {
        tables: &tables,
        selectors: &selectors,
        selector_idx: 0,
        group_remaining: 0,
    };

    // Symbol stream -> BWT last column.
    let mut mtf: Vec<u8> = (0..in_use).map(|i| i as u8).collect();
    let mut counts = [0usize; 256];
    let mut last_column: Vec<u8> = Vec::new();
    let mut symbol = source.next(reader)?;

    loop {
        if symbol == end_of_block {
            break;
        }

        if symbol == RUN_A || symbol == RUN_B {
            let mut run = 0usize;
            let mut weight = 1usize;
            while symbol == RUN_A || symbol == RUN_B {
                if weight >= MAX_RUN_WEIGHT {
                    return Err(BagMapError::format(CONTEXT, "run length too long"));
                }
                run += if symbol == RUN_A { weight } else { weight << 1 };
                weight <<= 1;
                symbol = source.next(reader)?;
            }
            if last_column.len() + run > max_block {
                return Err(BagMapError::overflow(CONTEXT, "block exceeds declared size"));
            }
            let byte = seq_to_byte[usize::from(mtf[0])];
            counts[usize::from(byte)] += run;
            last_column.resize(last_column.len() + run, byte);
            continue;
        }

        let index = usize::from(symbol - 1);
        if index >= in_use {
            return Err(BagMapError::format(CONTEXT, "MTF index out of range"));
        }
        if last_column.len() >= max_block {
            return Err(BagMapError::overflow(CONTEXT, "block exceeds declared size"));
        }
        let value = mtf[index];
        mtf.copy_within(0..index, 1);
        mtf[0] = value;
        let byte = seq_to_byte[usize::from(value)];
        counts[usize::from(byte)] += 1;
        last_column.push(byte);

        symbol = source.next(reader)?;
    }

    let bwt = inverse_bwt(&last_column, &counts, origin)?;
    Ok(undo_initial_rle(&bwt))
}

/// Read the two-level used-byte bitmap and return the in-use alphabet.
fn read_used_bytes(reader: &mut BitReader<'_>) -> Result<Vec<u8>> {
    let groups = reader.read_u32(16)?;
    let mut seq_to_byte = Vec::with_capacity(256);
    for group in 0..16u32 {
        if groups & (0x8000 >> group) == 0 {
            continue;
        }
        let bits = reader.read_u32(16)?;
        for bit in 0..16u32 {
            if bits & (0x8000 >> bit) != 0 {
                seq_to_byte.push((group * 16 + bit) as u8);
            }
        }
    }
    if seq_to_byte.is_empty() {
        return Err(BagMapError::format(CONTEXT, "block uses no symbols"));
    }
    Ok(seq_to_byte)
}

/// Unary-coded, move-to-front encoded table selectors.
fn read_selectors(reader: &mut BitReader<'_>, n_tables: usize, count: usize) -> Result<Vec<u8>> {
    let mut mtf: Vec<u8> = (0..n_tables as u8).collect();
    let mut selectors = Vec::with_capacity(count);
    for _ in 0..count {
        let mut index = 0usize;
        while reader.read_bit()? {
            index += 1;
            if index >= n_tables {
                return Err(BagMapError::format(CONTEXT, "selector exceeds table count"));
            }
        }
        let value = mtf[index];
        mtf.copy_within(0..index, 1);
        mtf[0] = value;
        selectors.push(value);
    }
    Ok(selectors)
}

/// 5-bit starting length, then per-symbol unary deltas.
fn read_code_lengths(reader: &mut BitReader<'_>, alpha_size: usize) -> Result<Vec<u8>> {
    let mut current = reader.read_u32(5)? as i32;
    let mut lengths = Vec::with_capacity(alpha_size);
    for _ in 0..alpha_size {
        loop {
            if !(1..=MAX_CODE_LEN as i32).contains(&current) {
                return Err(BagMapError::format(
                    CONTEXT,
                    format!("code length {current} outside 1..={MAX_CODE_LEN}"),
                ));
            }
            if !reader.read_bit()? {
                break;
            }
            current += if reader.read_bit()? { -1 } else { 1 };
        }
        lengths.push(current as u8);
    }
    Ok(lengths)
}

/// Invert the BWT with a counting-sort successor table.
fn inverse_bwt(last_column: &[u8], counts: &[usize; 256], origin: usize) -> Result<Vec<u8>> {
    if last_column.is_empty() {
        return Ok(Vec::new());
    }
    if origin >= last_column.len() {
        return Err(BagMapError::format(
            CONTEXT,
            format!(
                "origin pointer {origin} outside block of {} bytes",
                last_column.len()
            ),
        ));
    }

    let mut starts = [0usize; 256];
    let mut running = 0usize;
    for (start, &count) in starts.iter_mut().zip(counts.iter()) {
        *start = running;
        running += count;
    }

    let mut next = vec![0u32; last_column.len()];
    for (i, &byte) in last_column.iter().enumerate() {
        let slot = &mut starts[usize::from(byte)];
        next[*slot] = i as u32;
        *slot += 1;
    }

    let mut output = Vec::with_capacity(last_column.len());
    let mut pos = next[origin] as usize;
    for _ in 0..last_column.len() {
        output.push(last_column[pos]);
        pos = next[pos] as usize;
    }
    Ok(output)
}

/// Expand the encoder's first stage: four equal bytes are followed by a
/// count of further repetitions.
fn undo_initial_rle(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    let mut last: Option<u8> = None;
    let mut run = 0usize;

    for &byte in data {
        if run == 4 {
            if let Some(repeated) = last {
                output.resize(output.len() + usize::from(byte), repeated);
            }
            run = 0;
            last = None;
            continue;
        }
        output.push(byte);
        if last == Some(byte) {
            run += 1;
        } else {
            last = Some(byte);
            run = 1;
        }
    }
    output
}
