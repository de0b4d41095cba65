// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Typed ROS1 bag records and the generic record reader.
//!
//! # BAG Format Structure (Version 2.0)
//!
//! ## File Header
//! - Magic: "#ROSBAG V2.0\n" (13 bytes)
//! - Followed by bag header record in standard record format
//!
//! ## Record Format
//! All records follow: `<header_len: u32><header><data_len: u32><data>`
//! where header contains `<field_len: u32><field_name>=<field_value>` pairs
//!
//! ## Op Codes
//! - 0x02: Message data
//! - 0x03: Bag header
//! - 0x04: Index data
//! - 0x05: Chunk
//! - 0x06: Chunk info
//! - 0x07: Connection

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::io::cursor::ByteCursor;
use crate::{BagMapError, Result};

/// Magic prefix of a version 2.0 bag.
pub const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

/// Upper bound for a record header or a single header field.
pub const MAX_HEADER_LEN: usize = 1024 * 1024;

/// BAG op codes
pub const OP_MSG_DATA: u8 = 0x02;
pub const OP_BAG_HEADER: u8 = 0x03;
pub const OP_INDEX_DATA: u8 = 0x04;
pub const OP_CHUNK: u8 = 0x05;
pub const OP_CHUNK_INFO: u8 = 0x06;
pub const OP_CONNECTION: u8 = 0x07;

/// Header fields of one record, in file order.
///
/// Values borrow from the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct FieldMap<'a> {
    entries: Vec<(&'a [u8], &'a [u8])>,
}

impl<'a> FieldMap<'a> {
    /// Parse a sequence of `<field_len: u32><name>=<value>` entries.
    ///
    /// Fields without a `=` separator are skipped. A field longer than
    /// [`MAX_HEADER_LEN`] or running past `bytes` is a framing error.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let mut entries = Vec::new();

        while !cursor.is_at_end() {
            let field_len = cursor.read_u32()? as usize;
            if field_len > MAX_HEADER_LEN {
                return Err(BagMapError::format(
                    "FieldMap::parse",
                    format!("field length {field_len} exceeds {MAX_HEADER_LEN} bytes"),
                ));
            }
            let field = cursor.read_bytes(field_len)?;
            match field.iter().position(|&b| b == b'=') {
                Some(eq) => entries.push((&field[..eq], &field[eq + 1..])),
                None if field.is_empty() => {}
                None => debug!(
                    position = cursor.position(),
                    "Skipping header field without '=' separator"
                ),
            }
        }

        Ok(Self { entries })
    }

    /// Raw value of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&'a [u8]> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name.as_bytes())
            .map(|(_, value)| *value)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no fields were parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add every field of `other` whose name is not already present.
    pub fn merge_missing(&mut self, other: FieldMap<'a>) {
        for (key, value) in other.entries {
            if !self.entries.iter().any(|(existing, _)| *existing == key) {
                self.entries.push((key, value));
            }
        }
    }

    /// The `op` byte.
    pub fn op(&self) -> Option<u8> {
        self.get("op").and_then(|v| v.first().copied())
    }

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get(name)
            .filter(|v| v.len() >= 4)
            .map(LittleEndian::read_u32)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name)
            .filter(|v| v.len() >= 8)
            .map(LittleEndian::read_u64)
    }

    /// ROS time field (`sec: u32, nsec: u32`) as nanoseconds.
    pub fn get_time(&self, name: &str) -> Option<u64> {
        self.get(name).filter(|v| v.len() >= 8).map(|v| {
            let sec = u64::from(LittleEndian::read_u32(&v[..4]));
            let nsec = u64::from(LittleEndian::read_u32(&v[4..8]));
            sec * 1_000_000_000 + nsec
        })
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    fn require_u32(&self, name: &str, context: &str) -> Result<u32> {
        self.get_u32(name).ok_or_else(|| {
            BagMapError::format(context, format!("missing or short '{name}' field"))
        })
    }
}

/// A record as framed on disk, before interpretation of its op.
#[derive(Debug, Clone)]
pub struct RawRecord<'a> {
    /// Offset of the record's header length prefix
    pub offset: usize,
    /// Header fields (CONNECTION records include their data-section fields)
    pub fields: FieldMap<'a>,
    /// Data section
    pub data: &'a [u8],
    /// Offset of the following record
    pub next_offset: usize,
}

impl<'a> RawRecord<'a> {
    /// Read one record at the cursor position and advance past it.
    pub fn read(cursor: &mut ByteCursor<'a>) -> Result<Self> {
        let offset = cursor.position();

        let header_len = cursor.read_u32()? as usize;
        if header_len > MAX_HEADER_LEN {
            return Err(BagMapError::format(
                "RawRecord::read",
                format!("header length {header_len} at offset {offset} exceeds {MAX_HEADER_LEN} bytes"),
            ));
        }
        let header = cursor.read_bytes(header_len)?;
        let data_len = cursor.read_u32()? as usize;
        let data = cursor.read_bytes(data_len)?;

        let mut fields = FieldMap::parse(header)?;
        if fields.op() == Some(OP_CONNECTION) && !data.is_empty() {
            // type, md5sum and message_definition live in the data section.
            match FieldMap::parse(data) {
                Ok(data_fields) => fields.merge_missing(data_fields),
                Err(e) => warn!(
                    offset,
                    error = %e,
                    "Connection data section is malformed, using header fields only"
                ),
            }
        }

        Ok(Self {
            offset,
            fields,
            data,
            next_offset: cursor.position(),
        })
    }
}

/// Bag header record (op=0x03).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BagHeaderRecord {
    /// Offset of the index section
    pub index_pos: Option<u64>,
    /// Number of connections in the file
    pub conn_count: Option<u32>,
    /// Number of chunks in the file
    pub chunk_count: Option<u32>,
}

/// Connection record (op=0x07).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    /// Connection ID
    pub id: u32,
    /// Topic name
    pub topic: String,
    /// Message type, e.g. `sensor_msgs/LaserScan`
    pub message_type: String,
    /// MD5 sum of message definition
    pub md5sum: Option<String>,
    /// Message definition text
    pub message_definition: Option<String>,
    /// Publishing node
    pub caller_id: Option<String>,
}

/// Chunk record (op=0x05).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord<'a> {
    /// Compression identifier ("none", "bz2", "lz4")
    pub compression: String,
    /// Uncompressed payload size
    pub size: Option<u32>,
    /// Compressed payload
    pub data: &'a [u8],
}

/// Chunk info record (op=0x06).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkInfoRecord {
    pub ver: Option<u32>,
    /// Offset of the described chunk record
    pub chunk_pos: Option<u64>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    /// `(connection id, message count)` pairs
    pub counts: Vec<(u32, u32)>,
}

impl ChunkInfoRecord {
    /// Total messages across all connections in the chunk.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&(_, n)| u64::from(n)).sum()
    }
}

/// Index data record (op=0x04).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDataRecord {
    pub ver: Option<u32>,
    /// Connection the entries belong to
    pub conn: u32,
    /// Number of index entries
    pub count: u32,
}

/// Message data record (op=0x02).
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDataRecord<'a> {
    /// Connection ID
    pub conn: u32,
    /// Receive time in nanoseconds
    pub time: u64,
    /// Serialized message
    pub data: &'a [u8],
}

/// A bag record, interpreted by its op code.
#[derive(Debug, Clone, PartialEq)]
pub enum BagRecord<'a> {
    BagHeader(BagHeaderRecord),
    Connection(ConnectionRecord),
    Chunk(ChunkRecord<'a>),
    ChunkInfo(ChunkInfoRecord),
    IndexData(IndexDataRecord),
    MessageData(MessageDataRecord<'a>),
}

impl<'a> BagRecord<'a> {
    /// Interpret a framed record by its `op` field.
    pub fn from_raw(raw: &RawRecord<'a>) -> Result<Self> {
        let fields = &raw.fields;
        let op = fields.op().ok_or_else(|| {
            BagMapError::format(
                "BagRecord",
                format!("record at offset {} has no op field", raw.offset),
            )
        })?;

        match op {
            OP_BAG_HEADER => Ok(BagRecord::BagHeader(BagHeaderRecord {
                index_pos: fields.get_u64("index_pos"),
                conn_count: fields.get_u32("conn_count"),
                chunk_count: fields.get_u32("chunk_count"),
            })),
            OP_CONNECTION => {
                let id = fields.require_u32("conn", "Connection")?;
                let topic = fields.get_string("topic").ok_or_else(|| {
                    BagMapError::format("Connection", format!("connection {id} has no topic"))
                })?;
                Ok(BagRecord::Connection(ConnectionRecord {
                    id,
                    topic,
                    message_type: fields.get_string("type").unwrap_or_default(),
                    md5sum: fields.get_string("md5sum"),
                    message_definition: fields.get_string("message_definition"),
                    caller_id: fields.get_string("callerid"),
                }))
            }
            OP_CHUNK => Ok(BagRecord::Chunk(ChunkRecord {
                compression: fields
                    .get_string("compression")
                    .unwrap_or_else(|| "none".to_string()),
                size: fields.get_u32("size"),
                data: raw.data,
            })),
            OP_CHUNK_INFO => Ok(BagRecord::ChunkInfo(parse_chunk_info(fields, raw.data))),
            OP_INDEX_DATA => Ok(BagRecord::IndexData(IndexDataRecord {
                ver: fields.get_u32("ver"),
                conn: fields.require_u32("conn", "IndexData")?,
                count: fields.get_u32("count").unwrap_or(0),
            })),
            OP_MSG_DATA => Ok(BagRecord::MessageData(MessageDataRecord {
                conn: fields.require_u32("conn", "MessageData")?,
                time: fields.get_time("time").unwrap_or(0),
                data: raw.data,
            })),
            other => Err(BagMapError::format(
                "BagRecord",
                format!("unknown op 0x{other:02x} at offset {}", raw.offset),
            )),
        }
    }

    /// Op code of this record.
    pub fn op(&self) -> u8 {
        match self {
            BagRecord::BagHeader(_) => OP_BAG_HEADER,
            BagRecord::Connection(_) => OP_CONNECTION,
            BagRecord::Chunk(_) => OP_CHUNK,
            BagRecord::ChunkInfo(_) => OP_CHUNK_INFO,
            BagRecord::IndexData(_) => OP_INDEX_DATA,
            BagRecord::MessageData(_) => OP_MSG_DATA,
        }
    }
}

/// Chunk info counts come in two layouts.
///
/// Version 2.0 bags store `count` (number of connections) in the header and
/// `count` pairs of `(conn: u32, count: u32)` in the data section. Some
/// writers put a single `conn`/`count` pair in the header instead.
fn parse_chunk_info(fields: &FieldMap<'_>, data: &[u8]) -> ChunkInfoRecord {
    let mut info = ChunkInfoRecord {
        ver: fields.get_u32("ver"),
        chunk_pos: fields.get_u64("chunk_pos"),
        start_time: fields.get_time("start_time"),
        end_time: fields.get_time("end_time"),
        counts: Vec::new(),
    };

    if let (Some(conn), Some(count)) = (fields.get_u32("conn"), fields.get_u32("count")) {
        info.counts.push((conn, count));
        return info;
    }

    let available = data.len() / 8;
    let pairs = fields
        .get_u32("count")
        .map_or(available, |n| (n as usize).min(available));
    info.counts = data
        .chunks_exact(8)
        .take(pairs)
        .map(|pair| {
            (
                LittleEndian::read_u32(&pair[..4]),
                LittleEndian::read_u32(&pair[4..]),
            )
        })
        .collect();
    info
}

/// A typed record with its position in the buffer.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    /// Offset of the record's header length prefix
    pub offset: usize,
    /// Offset of the following record
    pub next_offset: usize,
    /// Interpreted record
    pub body: BagRecord<'a>,
}

/// Iterates over the records of a buffer region.
///
/// Yields `Err` once on the first malformed record and then stops, so a scan
/// phase can abort without losing what it already collected.
pub struct RecordReader<'a> {
    cursor: ByteCursor<'a>,
    end: usize,
    failed: bool,
}

impl<'a> RecordReader<'a> {
    /// Read records from `start` to the end of `data`.
    pub fn new(data: &'a [u8], start: usize) -> Result<Self> {
        Self::bounded(data, start, data.len())
    }

    /// Read records from `start` until `end` (clamped to the buffer).
    pub fn bounded(data: &'a [u8], start: usize, end: usize) -> Result<Self> {
        Ok(Self {
            cursor: ByteCursor::at(data, start)?,
            end: end.min(data.len()),
            failed: false,
        })
    }

    /// Offset of the next record.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    fn read_next(&mut self) -> Result<Record<'a>> {
        let raw = RawRecord::read(&mut self.cursor)?;
        let body = BagRecord::from_raw(&raw)?;
        Ok(Record {
            offset: raw.offset,
            next_offset: raw.next_offset,
            body,
        })
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.position() >= self.end {
            return None;
        }
        let result = self.read_next();
        self.failed = result.is_err();
        Some(result)
    }
}
