// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! LZ77-style block decoder (LZ4 block format).
//!
//! Each sequence is `token | literal-length ext | literals | offset u16le |
//! match-length ext`. The final sequence carries literals only. The output
//! length must be known up front; the chunk header's `size` field supplies it.

use crate::{BagMapError, Result};

const MIN_MATCH: usize = 4;
const EXTEND: usize = 15;
const CODEC: &str = "BlockMatchCodec";
/// Most output bytes one input byte can encode (a 255 length extension).
const MAX_EXPANSION: usize = 255;

/// Decoder for LZ4 block compressed chunk payloads.
pub struct BlockMatchCodec;

impl BlockMatchCodec {
    /// Decode `input` into exactly `expected_len` bytes.
    pub fn decode(input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let max_len = input
            .len()
            .saturating_mul(MAX_EXPANSION)
            .saturating_add(MIN_MATCH + EXTEND);
        if expected_len > max_len {
            return Err(BagMapError::overflow(
                CODEC,
                format!(
                    "declared size {expected_len} exceeds {max_len} bytes decodable from {} input bytes",
                    input.len()
                ),
            ));
        }
        let mut output = vec![0u8; expected_len];
        let mut ip = 0usize;
        let mut op = 0usize;

        while ip < input.len() {
            let token = input[ip];
            ip += 1;

            let literal_len = read_length(input, &mut ip, usize::from(token >> 4))?;
            let literal_end = ip
                .checked_add(literal_len)
                .filter(|&end| end <= input.len())
                .ok_or_else(|| BagMapError::overflow(CODEC, "literal run exceeds input"))?;
            if op + literal_len > expected_len {
                return Err(BagMapError::overflow(CODEC, "literal run exceeds output"));
            }
            output[op..op + literal_len].copy_from_slice(&input[ip..literal_end]);
            ip = literal_end;
            op += literal_len;

            if ip >= input.len() {
                break;
            }

            if ip + 2 > input.len() {
                return Err(BagMapError::truncated(2, input.len() - ip, ip));
            }
            let offset = usize::from(u16::from_le_bytes([input[ip], input[ip + 1]]));
            ip += 2;
            if offset == 0 || offset > op {
                return Err(BagMapError::format(
                    CODEC,
                    format!("invalid match offset {offset} at output position {op}"),
                ));
            }

            let match_len = read_length(input, &mut ip, usize::from(token & 0x0F))? + MIN_MATCH;
            if op + match_len > expected_len {
                return Err(BagMapError::overflow(CODEC, "match copy exceeds output"));
            }
            // Byte-wise so overlapping windows replicate runs.
            for _ in 0..match_len {
                output[op] = output[op - offset];
                op += 1;
            }
        }

        if op != expected_len {
            return Err(BagMapError::format(
                CODEC,
                format!("stream produced {op} bytes, expected {expected_len}"),
            ));
        }
        Ok(output)
    }
}

/// Apply the 15-means-extend rule to a 4-bit length code.
fn read_length(input: &[u8], ip: &mut usize, code: usize) -> Result<usize> {
    let mut length = code;
    if code == EXTEND {
        loop {
            let byte = *input
                .get(*ip)
                .ok_or_else(|| BagMapError::truncated(1, 0, *ip))?;
            *ip += 1;
            length += usize::from(byte);
            if byte != 255 {
                break;
            }
        }
    }
    Ok(length)
}
