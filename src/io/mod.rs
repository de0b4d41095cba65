// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for recorded robot logs.
//!
//! This module provides the checked byte cursor shared by every reader and
//! the container format implementations.

pub mod cursor;
pub mod formats;

// Re-exports
pub use cursor::ByteCursor;
pub use formats::bag::{BagReader, ExtractedMessage, TopicInfo};
