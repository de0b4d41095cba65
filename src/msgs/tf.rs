// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! `tf2_msgs/TFMessage`: a list of `geometry_msgs/TransformStamped`.

use super::{decode_with, quaternion_to_yaw, types, Header, Pose2D, Time};
use crate::Result;

/// Robot body frames whose transforms can stand in for odometry.
pub const BASE_FRAMES: [&str; 2] = ["base_link", "base_footprint"];

/// One planar transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Tf {
    pub parent: String,
    pub child: String,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub stamp: Time,
}

impl Tf {
    /// The transform as a pose of `child` in `parent`.
    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.yaw)
    }

    /// Whether the child frame is the robot body (leading `/` ignored).
    pub fn is_base_frame(&self) -> bool {
        BASE_FRAMES.contains(&self.child.trim_start_matches('/'))
    }
}

/// A decoded transform list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TfMessage {
    pub transforms: Vec<Tf>,
}

impl TfMessage {
    /// Decode the ROS1 wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_with(types::TF2_MESSAGE, data, |cursor| {
            let count = cursor.read_u32()? as usize;
            // A transform takes at least 76 bytes.
            let mut transforms = Vec::with_capacity(count.min(cursor.remaining() / 76));
            for _ in 0..count {
                let header = Header::read(cursor)?;
                let child = cursor.read_string()?;
                let [x, y, _z] = cursor.read_f64_array::<3>()?;
                let [qx, qy, qz, qw] = cursor.read_f64_array::<4>()?;
                transforms.push(Tf {
                    parent: header.frame_id,
                    child,
                    x,
                    y,
                    yaw: quaternion_to_yaw(qx, qy, qz, qw),
                    stamp: header.stamp,
                });
            }
            Ok(Self { transforms })
        })
    }

    /// Transforms whose child frame is the robot body.
    pub fn base_transforms(&self) -> impl Iterator<Item = &Tf> {
        self.transforms.iter().filter(|t| t.is_base_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(parent: &str, child: &str, x: f64, y: f64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(&0u32.to_le_bytes());
        out.extend(&2u32.to_le_bytes());
        out.extend(&0u32.to_le_bytes());
        out.extend(&(parent.len() as u32).to_le_bytes());
        out.extend(parent.as_bytes());
        out.extend(&(child.len() as u32).to_le_bytes());
        out.extend(child.as_bytes());
        for v in [x, y, 0.0, 0.0, 0.0, 0.0, 1.0] {
            out.extend(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_transforms() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend(transform("odom", "/base_link", 1.0, 2.0));
        bytes.extend(transform("map", "odom", 0.0, 0.0));

        let msg = TfMessage::decode(&bytes).unwrap();
        assert_eq!(msg.transforms.len(), 2);
        assert_eq!(msg.transforms[0].parent, "odom");
        assert_eq!(msg.transforms[0].stamp.sec, 2);

        let base: Vec<_> = msg.base_transforms().collect();
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].pose(), Pose2D::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_count_past_payload_is_decode_error() {
        let mut bytes = 3u32.to_le_bytes().to_vec();
        bytes.extend(transform("odom", "base_footprint", 0.0, 0.0));
        assert_eq!(TfMessage::decode(&bytes).unwrap_err().code(), "DECODE_ERROR");
    }
}
