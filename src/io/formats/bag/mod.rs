// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! BAG format implementation.
//!
//! This module provides a read-only ROS1 bag implementation with:
//! - Typed records and a bounds-checked record reader
//! - Index-assisted topic discovery with linear-scan fallbacks
//! - Parallel chunk decompression for targeted message extraction

// Record framing and typed records
pub mod record;

// Topic discovery and extraction
pub mod reader;

// Re-exports
pub use reader::{
    extract, open_for_topics, BagLayout, BagReader, Discovery, ExtractedMessage, TopicInfo,
};
pub use record::{BagRecord, ConnectionRecord, RecordReader};
