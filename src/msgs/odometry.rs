// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! `nav_msgs/Odometry`.

use serde::Serialize;

use super::{decode_with, quaternion_to_yaw, types, Header, Pose2D};
use crate::Result;

/// Planar velocity in the child frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Twist2D {
    pub vx: f64,
    pub vy: f64,
    pub wz: f64,
}

/// A decoded odometry sample reduced to the plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: Pose2D,
    pub z: f64,
    pub pose_covariance: Vec<f64>,
    /// Absent when the payload ends after the pose covariance
    pub twist: Option<Twist2D>,
}

impl Odometry {
    /// Decode the ROS1 wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_with(types::ODOMETRY, data, |cursor| {
            let header = Header::read(cursor)?;
            let child_frame_id = cursor.read_string()?;
            let [x, y, z] = cursor.read_f64_array::<3>()?;
            let [qx, qy, qz, qw] = cursor.read_f64_array::<4>()?;
            let pose_covariance = cursor.read_f64_array::<36>()?.to_vec();

            let twist = if cursor.is_at_end() {
                None
            } else {
                let [vx, vy, _vz] = cursor.read_f64_array::<3>()?;
                let [_wx, _wy, wz] = cursor.read_f64_array::<3>()?;
                cursor.read_f64_array::<36>()?;
                Some(Twist2D { vx, vy, wz })
            };

            Ok(Self {
                header,
                child_frame_id,
                pose: Pose2D::new(x, y, quaternion_to_yaw(qx, qy, qz, qw)),
                z,
                pose_covariance,
                twist,
            })
        })
    }

    /// Header stamp in seconds.
    pub fn stamp(&self) -> f64 {
        self.header.stamp.as_secs_f64()
    }
}
