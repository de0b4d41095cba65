// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout bagmap.
//!
//! - [`BagMapError`] - error taxonomy with stable codes

pub mod error;

pub use error::{BagMapError, Result};
