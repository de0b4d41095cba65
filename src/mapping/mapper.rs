// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Scan + odometry to occupancy grid.
//!
//! Poses are taken from recorded odometry, nearest in time; there is no scan
//! matching. The grid is rebuilt from scratch on every call, so identical
//! inputs always produce identical grids.

use std::time::Instant;

use tracing::{debug, warn};

use super::config::{MapConfig, SensorModel};
use super::grid::{BresenhamLine, OccupancyGrid};
use crate::io::formats::bag::ExtractedMessage;
use crate::msgs::{LaserScan, Odometry, Pose2D, TfMessage};
use crate::Result;

/// A decoded scan with its receive time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSample {
    /// Receive time in nanoseconds
    pub timestamp: u64,
    pub scan: LaserScan,
}

/// A robot pose with its receive time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Receive time in nanoseconds
    pub timestamp: u64,
    pub pose: Pose2D,
}

/// Decode scan messages, skipping payloads that fail to decode.
pub fn decode_scans(messages: &[ExtractedMessage]) -> Vec<ScanSample> {
    messages
        .iter()
        .filter_map(|msg| match LaserScan::decode(&msg.payload) {
            Ok(scan) => Some(ScanSample {
                timestamp: msg.timestamp,
                scan,
            }),
            Err(e) => {
                warn!(timestamp = msg.timestamp, error = %e, "Skipping undecodable scan");
                None
            }
        })
        .collect()
}

/// Decode odometry messages into pose samples, skipping undecodable ones.
pub fn decode_odometry(messages: &[ExtractedMessage]) -> Vec<PoseSample> {
    messages
        .iter()
        .filter_map(|msg| match Odometry::decode(&msg.payload) {
            Ok(odom) => Some(PoseSample {
                timestamp: msg.timestamp,
                pose: odom.pose,
            }),
            Err(e) => {
                warn!(timestamp = msg.timestamp, error = %e, "Skipping undecodable odometry");
                None
            }
        })
        .collect()
}

/// Pose samples from tf messages whose child frame is the robot body.
pub fn decode_tf_poses(messages: &[ExtractedMessage]) -> Vec<PoseSample> {
    let mut poses = Vec::new();
    for msg in messages {
        match TfMessage::decode(&msg.payload) {
            Ok(tf) => poses.extend(tf.base_transforms().map(|t| PoseSample {
                timestamp: msg.timestamp,
                pose: t.pose(),
            })),
            Err(e) => warn!(timestamp = msg.timestamp, error = %e, "Skipping undecodable tf"),
        }
    }
    poses
}

/// Nearest-in-time pose lookup over odometry sorted by timestamp.
pub struct PoseResolver<'a> {
    samples: &'a [PoseSample],
}

impl<'a> PoseResolver<'a> {
    /// `samples` must be sorted by timestamp.
    pub fn new(samples: &'a [PoseSample]) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        Self { samples }
    }

    /// Sample with the smallest `|t - timestamp|`; ties go to the earlier one.
    pub fn nearest(&self, timestamp: u64) -> Option<&'a PoseSample> {
        let after = self.samples.partition_point(|s| s.timestamp < timestamp);
        let before = after.checked_sub(1).map(|i| &self.samples[i]);
        let at_or_after = self.samples.get(after);
        match (before, at_or_after) {
            (Some(b), Some(a)) => {
                if timestamp - b.timestamp <= a.timestamp - timestamp {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (b, a) => b.or(a),
        }
    }
}

/// World pose of cell (0, 0) for a grid of `config`'s size.
///
/// A pinned `config.origin` wins. Otherwise the grid is centered on the
/// midpoint of the odometry bounding box, or on the world origin when there
/// is no odometry.
pub fn place_grid(config: &MapConfig, odometry: &[PoseSample]) -> Pose2D {
    if let Some([x, y, yaw]) = config.origin {
        return Pose2D::new(x, y, yaw);
    }

    let (cx, cy) = if odometry.is_empty() {
        (0.0, 0.0)
    } else {
        let (min_x, max_x, min_y, max_y) = odometry.iter().fold(
            (
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
            ),
            |(min_x, max_x, min_y, max_y), s| {
                (
                    min_x.min(s.pose.x),
                    max_x.max(s.pose.x),
                    min_y.min(s.pose.y),
                    max_y.max(s.pose.y),
                )
            },
        );
        ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0)
    };

    Pose2D::new(
        cx - config.width as f64 * config.resolution / 2.0,
        cy - config.height as f64 * config.resolution / 2.0,
        0.0,
    )
}

/// Builds occupancy grids from scans and poses.
pub struct OccupancyMapper;

impl OccupancyMapper {
    /// Build a grid from `scans`, returning it with the robot trajectory.
    ///
    /// `odometry` may be empty, in which case the robot sits at the grid
    /// center with yaw 0. It is sorted here if it is not already.
    pub fn build_map(
        scans: &[ScanSample],
        odometry: &[PoseSample],
        config: &MapConfig,
    ) -> Result<(OccupancyGrid, Vec<Pose2D>)> {
        config.validate()?;
        let start = Instant::now();

        let sorted;
        let odometry = if odometry.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
            odometry
        } else {
            let mut owned = odometry.to_vec();
            owned.sort_by_key(|s| s.timestamp);
            sorted = owned;
            &sorted[..]
        };

        let mut grid = OccupancyGrid::new(config, place_grid(config, odometry));
        let resolver = PoseResolver::new(odometry);
        let (center_x, center_y) = grid.center();
        let fixed_pose = Pose2D::new(center_x, center_y, 0.0);

        let mut trajectory = Vec::with_capacity(scans.len());
        let mut beams = 0usize;
        for sample in scans {
            let pose = resolver
                .nearest(sample.timestamp)
                .map_or(fixed_pose, |s| s.pose);
            beams += integrate_scan(&mut grid, &sample.scan, pose, config);
            trajectory.push(pose);
        }

        debug!(
            scans = scans.len(),
            beams,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Map built"
        );
        Ok((grid, trajectory))
    }
}

/// Apply one scan at `pose`. Returns the number of beams used.
fn integrate_scan(
    grid: &mut OccupancyGrid,
    scan: &LaserScan,
    pose: Pose2D,
    config: &MapConfig,
) -> usize {
    let mut used = 0;

    for (i, &range) in scan.ranges.iter().enumerate().step_by(config.downsample) {
        if !scan.is_valid_range(range) {
            continue;
        }
        let angle = scan.beam_angle(i) + pose.yaw;
        let range = f64::from(range);
        let hit = (pose.x + range * angle.cos(), pose.y + range * angle.sin());
        let end = grid.world_to_cell(hit.0, hit.1);

        match config.model {
            SensorModel::LogOdds => {
                // Only the part of the ray inside the grid is traced.
                if let Some((from, to)) = grid.clip_segment((pose.x, pose.y), hit) {
                    for cell in BresenhamLine::new(from, to) {
                        if cell == end {
                            break;
                        }
                        grid.apply_miss(cell);
                    }
                }
                grid.apply_hit(end);
            }
            SensorModel::EndpointOnly => {
                grid.mark_occupied(end);
            }
        }
        used += 1;
    }
    used
}
