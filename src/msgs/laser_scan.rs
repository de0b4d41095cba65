// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! `sensor_msgs/LaserScan`.

use super::{decode_with, types, Header};
use crate::Result;

/// A decoded planar range scan.
///
/// `ranges.len()` is the beam count; beam `i` points at
/// `angle_min + i * angle_increment` in the sensor frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaserScan {
    pub header: Header,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub time_increment: f32,
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

impl LaserScan {
    /// Decode the ROS1 wire layout.
    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_with(types::LASER_SCAN, data, |cursor| {
            Ok(Self {
                header: Header::read(cursor)?,
                angle_min: cursor.read_f32()?,
                angle_max: cursor.read_f32()?,
                angle_increment: cursor.read_f32()?,
                time_increment: cursor.read_f32()?,
                scan_time: cursor.read_f32()?,
                range_min: cursor.read_f32()?,
                range_max: cursor.read_f32()?,
                ranges: cursor.read_f32_array()?,
                intensities: cursor.read_f32_array()?,
            })
        })
    }

    /// Header stamp in seconds.
    pub fn stamp(&self) -> f64 {
        self.header.stamp.as_secs_f64()
    }

    /// Angle of beam `index` in the sensor frame.
    pub fn beam_angle(&self, index: usize) -> f64 {
        f64::from(self.angle_min) + index as f64 * f64::from(self.angle_increment)
    }

    /// A range is usable when finite and within `[range_min, range_max]`.
    pub fn is_valid_range(&self, range: f32) -> bool {
        range.is_finite() && range >= self.range_min && range <= self.range_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(scan: &LaserScan) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(&scan.header.seq.to_le_bytes());
        out.extend(&scan.header.stamp.sec.to_le_bytes());
        out.extend(&scan.header.stamp.nsec.to_le_bytes());
        out.extend(&(scan.header.frame_id.len() as u32).to_le_bytes());
        out.extend(scan.header.frame_id.as_bytes());
        for v in [
            scan.angle_min,
            scan.angle_max,
            scan.angle_increment,
            scan.time_increment,
            scan.scan_time,
            scan.range_min,
            scan.range_max,
        ] {
            out.extend(&v.to_le_bytes());
        }
        for array in [&scan.ranges, &scan.intensities] {
            out.extend(&(array.len() as u32).to_le_bytes());
            for v in array.iter() {
                out.extend(&v.to_le_bytes());
            }
        }
        out
    }

    fn sample() -> LaserScan {
        LaserScan {
            header: Header {
                seq: 7,
                stamp: crate::msgs::Time {
                    sec: 10,
                    nsec: 250_000_000,
                },
                frame_id: "laser".to_string(),
            },
            angle_min: -1.0,
            angle_max: 1.0,
            angle_increment: 0.5,
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![1.0, 2.0, f32::NAN, 20.0, 0.05],
            intensities: vec![],
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_layout() {
        let scan = sample();
        let decoded = LaserScan::decode(&encode(&scan)).unwrap();
        assert_eq!(decoded.header.seq, 7);
        assert_eq!(decoded.header.frame_id, "laser");
        assert_eq!(decoded.stamp(), 10.25);
        assert_eq!(decoded.ranges.len(), 5);
        assert_eq!(decoded.ranges[1], 2.0);
        assert!(decoded.intensities.is_empty());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = encode(&sample());
        let a = LaserScan::decode(&bytes).unwrap();
        let b = LaserScan::decode(&bytes).unwrap();
        assert_eq!(a.ranges[..2], b.ranges[..2]);
        assert_eq!(a.header, b.header);
    }

    #[test]
    fn test_truncated_payload_is_decode_error() {
        let mut bytes = encode(&sample());
        bytes.truncate(bytes.len() - 3);
        let err = LaserScan::decode(&bytes).unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
        assert!(err.to_string().contains("sensor_msgs/LaserScan"));
    }

    #[test]
    fn test_valid_ranges_and_angles() {
        let scan = sample();
        let valid: Vec<bool> = scan.ranges.iter().map(|&r| scan.is_valid_range(r)).collect();
        assert_eq!(valid, vec![true, true, false, false, false]);
        assert_eq!(scan.beam_angle(4), 1.0);
    }
}
