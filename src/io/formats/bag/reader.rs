// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 bag reader: topic discovery and targeted message extraction.
//!
//! Discovery never needs a full in-memory index. It tries, in order:
//! 1. connection and chunk-info records in the index section at `index_pos`
//! 2. connection records between the bag header and the first chunk
//! 3. a bounded linear scan that looks inside chunks and counts message
//!    records directly
//!
//! A malformed record aborts only the phase that hit it. Connection ids
//! already resolved by an earlier phase are never counted twice.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compression::{ChunkDecompressor, Compression};
use crate::{BagMapError, Result};

use super::record::{BagRecord, ChunkRecord, ConnectionRecord, RawRecord, RecordReader, MAGIC};
use crate::io::cursor::ByteCursor;

/// Top-level record cap for the fallback linear scan.
pub const FALLBACK_RECORD_CAP: usize = 5000;

/// A topic discovered in the bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicInfo {
    /// Topic name
    pub name: String,
    /// Message type of the first connection on the topic
    #[serde(rename = "type")]
    pub message_type: String,
    /// Messages across every connection on the topic
    pub message_count: u64,
}

/// A message pulled out of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMessage {
    /// Receive time in nanoseconds
    pub timestamp: u64,
    /// Connection the message was recorded on
    pub conn: u32,
    /// Serialized message bytes
    pub payload: Vec<u8>,
}

impl ExtractedMessage {
    /// Receive time in seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp as f64 / 1e9
    }
}

/// Where records start and where the chunk section ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagLayout {
    /// Offset of the bag header record (13 with magic, 0 in degraded mode)
    pub header_start: usize,
    /// Offset of the first record after the bag header
    pub data_start: usize,
    /// Offset of the index section, when the header declares one
    pub index_pos: Option<usize>,
    /// Whether the magic prefix was present
    pub has_magic: bool,
}

impl BagLayout {
    /// Locate the bag header and read `index_pos`.
    ///
    /// Without the magic prefix, headers are assumed to start at offset 0.
    pub fn read(data: &[u8]) -> Result<Self> {
        let has_magic = data.starts_with(MAGIC);
        let header_start = if has_magic {
            MAGIC.len()
        } else {
            warn!("Bag magic '#ROSBAG V2.0' not found, reading headers from offset 0");
            0
        };

        let mut cursor = ByteCursor::at(data, header_start)?;
        let raw = RawRecord::read(&mut cursor)?;
        let (data_start, index_pos) = match BagRecord::from_raw(&raw)? {
            BagRecord::BagHeader(header) => {
                let index_pos = header
                    .index_pos
                    .and_then(|pos| usize::try_from(pos).ok())
                    .filter(|&pos| pos > 0);
                (raw.next_offset, index_pos)
            }
            other => {
                warn!(
                    op = other.op(),
                    "First record is not a bag header, scanning from it"
                );
                (header_start, None)
            }
        };

        debug!(header_start, data_start, index_pos = ?index_pos, "Bag layout");
        Ok(Self {
            header_start,
            data_start,
            index_pos,
            has_magic,
        })
    }

    /// End of the chunk section: `index_pos` if in bounds, else end of file.
    pub fn chunk_end(&self, len: usize) -> usize {
        self.index_pos.filter(|&pos| pos <= len).unwrap_or(len)
    }
}

/// Connections and per-connection counts gathered by topic discovery.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Connections keyed by id
    pub connections: BTreeMap<u32, ConnectionRecord>,
    /// Messages per connection id
    pub counts: HashMap<u32, u64>,
}

impl Discovery {
    /// Run every discovery phase over `data`.
    pub fn scan(data: &[u8], layout: &BagLayout) -> Self {
        let mut discovery = Self::default();

        let saw_chunk_info = discovery.scan_index(data, layout);
        if discovery.connections.is_empty() {
            discovery.scan_header_region(data, layout);
        }
        if discovery.connections.is_empty() || !saw_chunk_info {
            discovery.scan_linear(data, layout, !saw_chunk_info);
        }

        info!(
            connections = discovery.connections.len(),
            messages = discovery.counts.values().sum::<u64>(),
            "Topic discovery complete"
        );
        discovery
    }

    fn resolve(&mut self, conn: ConnectionRecord) {
        if let std::collections::btree_map::Entry::Vacant(entry) = self.connections.entry(conn.id)
        {
            debug!(conn = conn.id, topic = %conn.topic, "Connection");
            entry.insert(conn);
        }
    }

    /// Phase 1: connection and chunk-info records after `index_pos`.
    /// Returns whether any chunk-info record was seen.
    fn scan_index(&mut self, data: &[u8], layout: &BagLayout) -> bool {
        let Some(index_pos) = layout.index_pos.filter(|&pos| pos < data.len()) else {
            return false;
        };
        let Ok(reader) = RecordReader::new(data, index_pos) else {
            return false;
        };

        let mut saw_chunk_info = false;
        for result in reader {
            match result {
                Ok(record) => match record.body {
                    BagRecord::Connection(conn) => self.resolve(conn),
                    BagRecord::ChunkInfo(info) => {
                        saw_chunk_info = true;
                        for (conn, count) in info.counts {
                            *self.counts.entry(conn).or_default() += u64::from(count);
                        }
                    }
                    _ => {}
                },
                Err(e) => {
                    warn!(phase = "index", error = %e, "Discovery phase aborted");
                    break;
                }
            }
        }
        debug!(
            connections = self.connections.len(),
            saw_chunk_info, "Index section scanned"
        );
        saw_chunk_info
    }

    /// Phase 2: connection records between the bag header and the first chunk.
    fn scan_header_region(&mut self, data: &[u8], layout: &BagLayout) {
        let Ok(reader) = RecordReader::bounded(data, layout.data_start, layout.chunk_end(data.len()))
        else {
            return;
        };
        for result in reader {
            match result {
                Ok(record) => match record.body {
                    BagRecord::Connection(conn) => self.resolve(conn),
                    BagRecord::Chunk(_) => break,
                    _ => {}
                },
                Err(e) => {
                    warn!(phase = "header", error = %e, "Discovery phase aborted");
                    break;
                }
            }
        }
        debug!(connections = self.connections.len(), "Header region scanned");
    }

    /// Phase 3: bounded linear scan, looking inside chunks.
    fn scan_linear(&mut self, data: &[u8], layout: &BagLayout, count_messages: bool) {
        let end = layout.chunk_end(data.len());
        let Ok(reader) = RecordReader::bounded(data, layout.data_start, end) else {
            return;
        };

        for result in reader.take(FALLBACK_RECORD_CAP) {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(phase = "linear", error = %e, "Discovery phase aborted");
                    break;
                }
            };
            match record.body {
                BagRecord::Connection(conn) => self.resolve(conn),
                BagRecord::MessageData(msg) if count_messages => {
                    *self.counts.entry(msg.conn).or_default() += 1;
                }
                BagRecord::Chunk(chunk) => {
                    self.scan_chunk(&chunk, record.offset, count_messages);
                }
                _ => {}
            }
        }
        debug!(connections = self.connections.len(), "Linear scan complete");
    }

    fn scan_chunk(&mut self, chunk: &ChunkRecord<'_>, offset: usize, count_messages: bool) {
        let inner = match decompress_chunk(chunk) {
            Ok(inner) => inner,
            Err(e) => {
                warn!(offset, error = %e, "Skipping chunk that failed to decompress");
                return;
            }
        };
        let Ok(reader) = RecordReader::new(&inner, 0) else {
            return;
        };
        for result in reader {
            match result {
                Ok(record) => match record.body {
                    BagRecord::Connection(conn) => self.resolve(conn),
                    BagRecord::MessageData(msg) if count_messages => {
                        *self.counts.entry(msg.conn).or_default() += 1;
                    }
                    _ => {}
                },
                Err(e) => {
                    warn!(offset, error = %e, "Stopping at malformed record inside chunk");
                    break;
                }
            }
        }
    }

    /// Aggregate connections into topics, in connection id order.
    pub fn topics(&self) -> Vec<TopicInfo> {
        let mut topics: Vec<TopicInfo> = Vec::new();
        for conn in self.connections.values() {
            let count = self.counts.get(&conn.id).copied().unwrap_or(0);
            match topics.iter_mut().find(|t| t.name == conn.topic) {
                Some(topic) => topic.message_count += count,
                None => topics.push(TopicInfo {
                    name: conn.topic.clone(),
                    message_type: conn.message_type.clone(),
                    message_count: count,
                }),
            }
        }
        topics
    }

    /// Every connection id recorded on `topic`.
    pub fn connection_ids(&self, topic: &str) -> Vec<u32> {
        self.connections
            .values()
            .filter(|c| c.topic == topic)
            .map(|c| c.id)
            .collect()
    }
}

fn decompress_chunk<'a>(chunk: &ChunkRecord<'a>) -> Result<std::borrow::Cow<'a, [u8]>> {
    let compression: Compression = chunk.compression.parse()?;
    ChunkDecompressor::decompress(compression, chunk.data, chunk.size.map(|s| s as usize))
}

/// Work unit for extraction: a chunk to decode or a bare message record.
enum Extractable<'a> {
    Chunk { offset: usize, chunk: ChunkRecord<'a> },
    Message(ExtractedMessage),
}

/// Discover topics in a bag held in memory.
pub fn open_for_topics(data: &[u8]) -> Result<Vec<TopicInfo>> {
    let layout = BagLayout::read(data)?;
    Ok(Discovery::scan(data, &layout).topics())
}

/// Extract every message on `topic` from a bag held in memory.
///
/// Fails with [`BagMapError::TopicNotFound`] when no connection carries the
/// topic. Chunk decode failures fail the whole extraction.
pub fn extract(data: &[u8], topic: &str) -> Result<Vec<ExtractedMessage>> {
    let layout = BagLayout::read(data)?;
    let discovery = Discovery::scan(data, &layout);
    extract_with(data, &layout, &discovery, topic, None)
}

fn extract_with(
    data: &[u8],
    layout: &BagLayout,
    discovery: &Discovery,
    topic: &str,
    num_threads: Option<usize>,
) -> Result<Vec<ExtractedMessage>> {
    let conn_ids = discovery.connection_ids(topic);
    if conn_ids.is_empty() {
        return Err(BagMapError::topic_not_found(topic));
    }
    let start = Instant::now();

    let mut work = Vec::new();
    let end = layout.chunk_end(data.len());
    for result in RecordReader::bounded(data, layout.data_start, end)? {
        let record = result?;
        match record.body {
            BagRecord::Chunk(chunk) => work.push(Extractable::Chunk {
                offset: record.offset,
                chunk,
            }),
            BagRecord::MessageData(msg) if conn_ids.contains(&msg.conn) => {
                work.push(Extractable::Message(ExtractedMessage {
                    timestamp: msg.time,
                    conn: msg.conn,
                    payload: msg.data.to_vec(),
                }));
            }
            _ => {}
        }
    }

    let num_threads = num_threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|index| format!("bag-extract-{index}"))
        .build()
        .map_err(|e| BagMapError::Io(format!("failed to create thread pool: {e}")))?;

    // Collecting an indexed parallel iterator keeps chunk order.
    let batches: Vec<Vec<ExtractedMessage>> = pool.install(|| {
        work.into_par_iter()
            .map(|item| match item {
                Extractable::Chunk { offset, chunk } => {
                    extract_from_chunk(&chunk, offset, &conn_ids)
                }
                Extractable::Message(msg) => Ok(vec![msg]),
            })
            .collect::<Result<_>>()
    })?;

    let messages: Vec<ExtractedMessage> = batches.into_iter().flatten().collect();
    info!(
        topic,
        messages = messages.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Extraction complete"
    );
    Ok(messages)
}

fn extract_from_chunk(
    chunk: &ChunkRecord<'_>,
    offset: usize,
    conn_ids: &[u32],
) -> Result<Vec<ExtractedMessage>> {
    let inner = decompress_chunk(chunk)?;
    let mut messages = Vec::new();
    for result in RecordReader::new(&inner, 0)? {
        if let BagRecord::MessageData(msg) = result?.body {
            if conn_ids.contains(&msg.conn) {
                messages.push(ExtractedMessage {
                    timestamp: msg.time,
                    conn: msg.conn,
                    payload: msg.data.to_vec(),
                });
            }
        }
    }
    debug!(
        offset,
        compression = %chunk.compression,
        matched = messages.len(),
        "Chunk extracted"
    );
    Ok(messages)
}

/// Backing storage for an opened bag.
enum BagData {
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl Deref for BagData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            BagData::Mapped(mmap) => mmap,
            BagData::Owned(bytes) => bytes,
        }
    }
}

/// An opened bag with its discovered topics.
///
/// # Example
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use bagmap::BagReader;
///
/// let reader = BagReader::open("run.bag")?;
/// for topic in reader.topics() {
///     println!("{} ({}) {}", topic.name, topic.message_type, topic.message_count);
/// }
/// let scans = reader.extract("/scan")?;
/// # Ok(())
/// # }
/// ```
pub struct BagReader {
    data: BagData,
    layout: BagLayout,
    discovery: Discovery,
    topics: Vec<TopicInfo>,
    num_threads: Option<usize>,
}

impl BagReader {
    /// Memory-map a bag file and discover its topics.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(BagMapError::format(
                "BagReader::open",
                format!("{} is empty", path.display()),
            ));
        }
        // SAFETY: the map is read-only and the file is not modified while open.
        let mmap = unsafe { memmap2::Mmap::map(&file) }?;
        Self::from_data(BagData::Mapped(mmap))
    }

    /// Discover topics in an in-memory bag.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_data(BagData::Owned(bytes))
    }

    fn from_data(data: BagData) -> Result<Self> {
        let layout = BagLayout::read(&data)?;
        let discovery = Discovery::scan(&data, &layout);
        let topics = discovery.topics();
        info!(topics = topics.len(), bytes = data.len(), "Bag opened");
        Ok(Self {
            data,
            layout,
            discovery,
            topics,
            num_threads: None,
        })
    }

    /// Limit the worker threads used for chunk decompression.
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads.max(1));
        self
    }

    /// Discovered topics.
    pub fn topics(&self) -> &[TopicInfo] {
        &self.topics
    }

    /// Look up a topic by name.
    pub fn topic(&self, name: &str) -> Option<&TopicInfo> {
        self.topics.iter().find(|t| t.name == name)
    }

    /// Discovered connections, keyed by id.
    pub fn connections(&self) -> &BTreeMap<u32, ConnectionRecord> {
        &self.discovery.connections
    }

    /// Record layout of the file.
    pub fn layout(&self) -> &BagLayout {
        &self.layout
    }

    /// Size of the bag in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the bag has no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extract every message on `topic`, in file order.
    pub fn extract(&self, topic: &str) -> Result<Vec<ExtractedMessage>> {
        extract_with(
            &self.data,
            &self.layout,
            &self.discovery,
            topic,
            self.num_threads,
        )
    }
}

impl std::fmt::Debug for BagReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagReader")
            .field("len", &self.data.len())
            .field("layout", &self.layout)
            .field("topics", &self.topics)
            .finish()
    }
}
