// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.
//!
//! Synthetic bags are written record by record so tests control every
//! byte: chunk compression, presence of the index section and the magic.

#![allow(dead_code)]

use std::io::Write;

pub const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

const OP_MSG_DATA: u8 = 0x02;
const OP_BAG_HEADER: u8 = 0x03;
const OP_INDEX_DATA: u8 = 0x04;
const OP_CHUNK: u8 = 0x05;
const OP_CHUNK_INFO: u8 = 0x06;
const OP_CONNECTION: u8 = 0x07;

// ============================================================================
// Record Framing
// ============================================================================

/// `u32 len | name=value` header field.
pub fn field(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + name.len() + 1 + value.len());
    out.extend(&((name.len() + 1 + value.len()) as u32).to_le_bytes());
    out.extend(name.as_bytes());
    out.push(b'=');
    out.extend(value);
    out
}

/// `u32 hlen | fields | u32 dlen | data` record.
pub fn record(fields: &[Vec<u8>], data: &[u8]) -> Vec<u8> {
    let header = fields.concat();
    let mut out = Vec::with_capacity(8 + header.len() + data.len());
    out.extend(&(header.len() as u32).to_le_bytes());
    out.extend(&header);
    out.extend(&(data.len() as u32).to_le_bytes());
    out.extend(data);
    out
}

fn time_bytes(ns: u64) -> Vec<u8> {
    let mut out = ((ns / 1_000_000_000) as u32).to_le_bytes().to_vec();
    out.extend(&((ns % 1_000_000_000) as u32).to_le_bytes());
    out
}

fn connection_record(conn: &Connection) -> Vec<u8> {
    let data = [
        field("topic", conn.topic.as_bytes()),
        field("type", conn.message_type.as_bytes()),
        field("md5sum", b"0123456789abcdef0123456789abcdef"),
        field("message_definition", b""),
    ]
    .concat();
    record(
        &[
            field("op", &[OP_CONNECTION]),
            field("conn", &conn.id.to_le_bytes()),
            field("topic", conn.topic.as_bytes()),
        ],
        &data,
    )
}

fn message_record(msg: &Message) -> Vec<u8> {
    record(
        &[
            field("op", &[OP_MSG_DATA]),
            field("conn", &msg.conn.to_le_bytes()),
            field("time", &time_bytes(msg.time_ns)),
        ],
        &msg.payload,
    )
}

/// Compress a chunk body the way `compression` names it.
///
/// Unknown identifiers leave the body as is.
pub fn compress(compression: &str, data: &[u8]) -> Vec<u8> {
    match compression {
        "bz2" => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        "lz4" => lz4_flex::block::compress(data),
        _ => data.to_vec(),
    }
}

// ============================================================================
// Bag Builder
// ============================================================================

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: u32,
    pub topic: String,
    pub message_type: String,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub conn: u32,
    pub time_ns: u64,
    pub payload: Vec<u8>,
}

pub fn msg(conn: u32, time_ns: u64, payload: Vec<u8>) -> Message {
    Message {
        conn,
        time_ns,
        payload,
    }
}

#[derive(Debug, Clone)]
struct Chunk {
    compression: String,
    messages: Vec<Message>,
}

/// Writes a bag with one chunk per [`BagBuilder::chunk`] call.
///
/// Connection records go at the start of the first chunk and, when the
/// index is enabled, again in the index section followed by one
/// CHUNK_INFO per chunk.
#[derive(Debug, Clone)]
pub struct BagBuilder {
    magic: bool,
    index: bool,
    connections: Vec<Connection>,
    chunks: Vec<Chunk>,
}

impl Default for BagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BagBuilder {
    pub fn new() -> Self {
        Self {
            magic: true,
            index: true,
            connections: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn connection(mut self, id: u32, topic: &str, message_type: &str) -> Self {
        self.connections.push(Connection {
            id,
            topic: topic.to_string(),
            message_type: message_type.to_string(),
        });
        self
    }

    pub fn chunk(mut self, compression: &str, messages: Vec<Message>) -> Self {
        self.chunks.push(Chunk {
            compression: compression.to_string(),
            messages,
        });
        self
    }

    pub fn without_magic(mut self) -> Self {
        self.magic = false;
        self
    }

    pub fn without_index(mut self) -> Self {
        self.index = false;
        self
    }

    /// Total message records across all chunks.
    pub fn message_count(&self) -> usize {
        self.chunks.iter().map(|c| c.messages.len()).sum()
    }

    fn bag_header(&self, index_pos: u64) -> Vec<u8> {
        record(
            &[
                field("op", &[OP_BAG_HEADER]),
                field("index_pos", &index_pos.to_le_bytes()),
                field("conn_count", &(self.connections.len() as u32).to_le_bytes()),
                field("chunk_count", &(self.chunks.len() as u32).to_le_bytes()),
            ],
            &[],
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let prefix_len = if self.magic { MAGIC.len() } else { 0 };
        let data_start = prefix_len + self.bag_header(0).len();

        let mut body = Vec::new();
        let mut chunk_infos = Vec::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            let chunk_pos = (data_start + body.len()) as u64;

            let mut inner = Vec::new();
            if i == 0 {
                for conn in &self.connections {
                    inner.extend(connection_record(conn));
                }
            }
            let mut per_conn: Vec<(u32, Vec<u64>)> = Vec::new();
            for message in &chunk.messages {
                inner.extend(message_record(message));
                match per_conn.iter_mut().find(|(c, _)| *c == message.conn) {
                    Some((_, times)) => times.push(message.time_ns),
                    None => per_conn.push((message.conn, vec![message.time_ns])),
                }
            }

            body.extend(record(
                &[
                    field("op", &[OP_CHUNK]),
                    field("compression", chunk.compression.as_bytes()),
                    field("size", &(inner.len() as u32).to_le_bytes()),
                ],
                &compress(&chunk.compression, &inner),
            ));

            // Index data after each chunk; entry offsets are not read.
            for (conn, times) in &per_conn {
                let mut entries = Vec::new();
                for &t in times {
                    entries.extend(time_bytes(t));
                    entries.extend(&0u32.to_le_bytes());
                }
                body.extend(record(
                    &[
                        field("op", &[OP_INDEX_DATA]),
                        field("ver", &1u32.to_le_bytes()),
                        field("conn", &conn.to_le_bytes()),
                        field("count", &(times.len() as u32).to_le_bytes()),
                    ],
                    &entries,
                ));
            }

            let start = chunk.messages.iter().map(|m| m.time_ns).min().unwrap_or(0);
            let end = chunk.messages.iter().map(|m| m.time_ns).max().unwrap_or(0);
            let mut counts = Vec::new();
            for (conn, times) in &per_conn {
                counts.extend(&conn.to_le_bytes());
                counts.extend(&(times.len() as u32).to_le_bytes());
            }
            chunk_infos.push(record(
                &[
                    field("op", &[OP_CHUNK_INFO]),
                    field("ver", &1u32.to_le_bytes()),
                    field("chunk_pos", &chunk_pos.to_le_bytes()),
                    field("start_time", &time_bytes(start)),
                    field("end_time", &time_bytes(end)),
                    field("count", &(per_conn.len() as u32).to_le_bytes()),
                ],
                &counts,
            ));
        }

        let index_pos = if self.index {
            (data_start + body.len()) as u64
        } else {
            0
        };

        let mut bag = Vec::with_capacity(data_start + body.len());
        if self.magic {
            bag.extend(MAGIC);
        }
        bag.extend(self.bag_header(index_pos));
        bag.extend(body);
        if self.index {
            for conn in &self.connections {
                bag.extend(connection_record(conn));
            }
            for info in chunk_infos {
                bag.extend(info);
            }
        }
        bag
    }
}

// ============================================================================
// Message Encoders
// ============================================================================

fn header(out: &mut Vec<u8>, stamp_ns: u64, frame_id: &str) {
    out.extend(&0u32.to_le_bytes());
    out.extend(time_bytes(stamp_ns));
    out.extend(&(frame_id.len() as u32).to_le_bytes());
    out.extend(frame_id.as_bytes());
}

/// `sensor_msgs/LaserScan` with range limits [0.05, 30].
pub fn laser_scan(stamp_ns: u64, angle_min: f32, angle_increment: f32, ranges: &[f32]) -> Vec<u8> {
    let mut out = Vec::new();
    header(&mut out, stamp_ns, "laser");
    let angle_max = angle_min + angle_increment * ranges.len().saturating_sub(1) as f32;
    for v in [angle_min, angle_max, angle_increment, 0.0, 0.1, 0.05, 30.0] {
        out.extend(&v.to_le_bytes());
    }
    out.extend(&(ranges.len() as u32).to_le_bytes());
    for r in ranges {
        out.extend(&r.to_le_bytes());
    }
    out.extend(&0u32.to_le_bytes());
    out
}

fn push_pose(out: &mut Vec<u8>, x: f64, y: f64, yaw: f64) {
    for v in [x, y, 0.0] {
        out.extend(&v.to_le_bytes());
    }
    let (qz, qw) = ((yaw / 2.0).sin(), (yaw / 2.0).cos());
    for v in [0.0, 0.0, qz, qw] {
        out.extend(&v.to_le_bytes());
    }
}

/// `nav_msgs/Odometry` including the twist block.
pub fn odometry(stamp_ns: u64, x: f64, y: f64, yaw: f64) -> Vec<u8> {
    let mut out = Vec::new();
    header(&mut out, stamp_ns, "odom");
    out.extend(&9u32.to_le_bytes());
    out.extend(b"base_link");
    push_pose(&mut out, x, y, yaw);
    out.extend(std::iter::repeat(0u8).take(36 * 8));
    out.extend(std::iter::repeat(0u8).take(6 * 8 + 36 * 8));
    out
}

/// `tf2_msgs/TFMessage` from `(parent, child, x, y, yaw)` transforms.
pub fn tf_message(stamp_ns: u64, transforms: &[(&str, &str, f64, f64, f64)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(&(transforms.len() as u32).to_le_bytes());
    for &(parent, child, x, y, yaw) in transforms {
        header(&mut out, stamp_ns, parent);
        out.extend(&(child.len() as u32).to_le_bytes());
        out.extend(child.as_bytes());
        push_pose(&mut out, x, y, yaw);
    }
    out
}

// ============================================================================
// Fixtures
// ============================================================================

pub const SCAN_TYPE: &str = "sensor_msgs/LaserScan";
pub const ODOM_TYPE: &str = "nav_msgs/Odometry";
pub const TF_TYPE: &str = "tf2_msgs/TFMessage";

/// A robot driving along +x in front of a wall at x = 3, with scans at
/// 10 Hz and odometry at 20 Hz, split over chunks compressed with `codec`.
pub fn corridor_bag(codec: &str, scans: usize) -> Vec<u8> {
    let mut messages = Vec::new();
    for i in 0..scans {
        let t = i as u64 * 100_000_000;
        let x = i as f64 * 0.05;
        messages.push(msg(1, t, odometry(t, x, 0.0, 0.0)));
        messages.push(msg(1, t + 50_000_000, odometry(t + 50_000_000, x + 0.025, 0.0, 0.0)));
        let ranges: Vec<f32> = (0..9).map(|_| (3.0 - x) as f32).collect();
        messages.push(msg(0, t + 10_000_000, laser_scan(t, -0.2, 0.05, &ranges)));
    }

    let mut builder = BagBuilder::new()
        .connection(0, "/scan", SCAN_TYPE)
        .connection(1, "/odom", ODOM_TYPE);
    for part in messages.chunks(12) {
        builder = builder.chunk(codec, part.to_vec());
    }
    builder.build()
}
