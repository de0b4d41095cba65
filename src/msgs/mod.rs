// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Fixed-layout decoders for the ROS1 messages the mapper consumes.
//!
//! Every decoder is a pure function of its input bytes. Reads go through
//! [`ByteCursor`](crate::io::cursor::ByteCursor); running past the payload
//! yields [`BagMapError::Decode`](crate::BagMapError::Decode).
//!
//! - [`LaserScan`] - `sensor_msgs/LaserScan`
//! - [`Odometry`] - `nav_msgs/Odometry`
//! - [`TfMessage`] - `tf2_msgs/TFMessage` (and the older `tf/tfMessage`)

pub mod laser_scan;
pub mod odometry;
pub mod tf;

pub use laser_scan::LaserScan;
pub use odometry::{Odometry, Twist2D};
pub use tf::{Tf, TfMessage};

use serde::Serialize;

use crate::io::cursor::ByteCursor;
use crate::{BagMapError, Result};

/// ROS message type names.
pub mod types {
    pub const LASER_SCAN: &str = "sensor_msgs/LaserScan";
    pub const ODOMETRY: &str = "nav_msgs/Odometry";
    pub const TF2_MESSAGE: &str = "tf2_msgs/TFMessage";
    pub const TF_MESSAGE: &str = "tf/tfMessage";
}

/// ROS time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    /// Seconds as `sec + nsec / 1e9`.
    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.sec) + f64::from(self.nsec) / 1e9
    }

    /// Nanoseconds since the epoch.
    pub fn as_nanos(&self) -> u64 {
        u64::from(self.sec) * 1_000_000_000 + u64::from(self.nsec)
    }

    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            sec: cursor.read_u32()?,
            nsec: cursor.read_u32()?,
        })
    }
}

/// `std_msgs/Header`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            seq: cursor.read_u32()?,
            stamp: Time::read(cursor)?,
            frame_id: cursor.read_string()?,
        })
    }
}

/// Planar robot pose in the odometry frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    /// Heading in radians
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

/// Yaw (rotation about z) of a unit quaternion.
pub fn quaternion_to_yaw(x: f64, y: f64, z: f64, w: f64) -> f64 {
    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    siny_cosp.atan2(cosy_cosp)
}

/// Run `f` over a cursor and report any failure as a decode error for `message_type`.
fn decode_with<T>(
    message_type: &str,
    data: &[u8],
    f: impl FnOnce(&mut ByteCursor<'_>) -> Result<T>,
) -> Result<T> {
    let mut cursor = ByteCursor::new(data);
    f(&mut cursor).map_err(|e| match e {
        BagMapError::Decode { .. } => e,
        other => BagMapError::decode(message_type, other.to_string()),
    })
}
