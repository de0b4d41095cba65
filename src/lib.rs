// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Bagmap
//!
//! ROS1 bag replay into 2D occupancy grid maps.
//!
//! The library reads recorded robot logs and turns laser scans plus odometry
//! into map_server style maps:
//! - **Bag reading** in the [`io::formats::bag`](crate::io::formats::bag) module
//! - **Chunk codecs** (bzip2 and LZ4 block decoders) in [`compression`]
//! - **Message decoding** for LaserScan, Odometry and TF in [`msgs`]
//! - **Mapping** with a log-odds occupancy grid in [`mapping`]
//! - **Playback** of progressive frames in [`playback`] and [`session`]
//!
//! ## Architecture
//!
//! - `io/` - checked byte cursor, bag records, topic discovery and extraction
//! - `compression/` - chunk decompression dispatch and the codecs
//! - `msgs/` - fixed-layout ROS1 message decoders
//! - `mapping/` - configuration, grid, mapper and PGM/YAML export
//! - `playback/` - timestamp-ordered frame sequencing
//! - `session` - worker thread speaking typed commands and events
//!
//! ## Example: Building a map
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bagmap::mapping::{decode_odometry, decode_scans, MapExport};
//! use bagmap::{BagReader, MapConfig, OccupancyMapper};
//!
//! let reader = BagReader::open("run.bag")?;
//! let scans = decode_scans(&reader.extract("/scan")?);
//! let odom = decode_odometry(&reader.extract("/odom")?);
//!
//! let config = MapConfig::default();
//! let (grid, _trajectory) = OccupancyMapper::build_map(&scans, &odom, &config)?;
//! MapExport::new(&grid, "map.pgm", config.occupied_thresh, config.free_thresh)
//!     .write_files("map")?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{BagMapError, Result};

// Chunk decompression
pub mod compression;

// I/O (cursor, bag format)
pub mod io;

// Message decoders
pub mod msgs;

// Occupancy mapping
pub mod mapping;

// Playback and sessions
pub mod playback;
pub mod session;

// Re-export key types
pub use compression::{ChunkDecompressor, Compression};
pub use io::{BagReader, ExtractedMessage, TopicInfo};
pub use mapping::{MapConfig, MapExport, OccupancyGrid, OccupancyMapper, SensorModel};
pub use msgs::Pose2D;
pub use playback::{PlaybackSequencer, PlaybackState};
pub use session::{Command, Event, Session, SessionHandle, Stats};
