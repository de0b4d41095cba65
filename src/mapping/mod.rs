// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Occupancy mapping.
//!
//! - [`config`] - [`MapConfig`] and the [`SensorModel`] choice
//! - [`grid`] - log-odds [`OccupancyGrid`] and Bresenham rays
//! - [`mapper`] - [`OccupancyMapper::build_map`] and pose lookup
//! - [`export`] - PGM raster and YAML sidecar

pub mod config;
pub mod export;
pub mod grid;
pub mod mapper;

pub use config::{MapConfig, SensorModel};
pub use export::{ternary_raster, MapExport};
pub use grid::{BresenhamLine, CellState, GridCoord, OccupancyGrid};
pub use mapper::{
    decode_odometry, decode_scans, decode_tf_poses, OccupancyMapper, PoseResolver, PoseSample,
    ScanSample,
};
