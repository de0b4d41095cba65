// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Map configuration.
//!
//! Loaded from TOML with snake_case keys; every key is optional:
//!
//! ```toml
//! resolution = 0.05
//! width = 1024
//! height = 1024
//! # origin = [-25.6, -25.6, 0.0]   # omit for automatic placement
//! p_hit = 0.65
//! p_miss = 0.35
//! l_min = -2.0
//! l_max = 3.5
//! l0 = 0.0
//! downsample = 2
//! occupied_thresh = 0.65
//! free_thresh = 0.196
//! model = "log_odds"             # or "endpoint_only"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BagMapError, Result};

/// How scans update the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorModel {
    /// Log-odds accumulation with free-space ray tracing
    #[default]
    LogOdds,
    /// Mark beam endpoints occupied, leave everything else unknown
    EndpointOnly,
}

/// Grid geometry, sensor model and export thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Meters per cell
    pub resolution: f64,
    /// Cells along x
    pub width: usize,
    /// Cells along y
    pub height: usize,
    /// World pose `[x, y, yaw]` of cell (0, 0); `None` places the grid automatically
    pub origin: Option<[f64; 3]>,
    /// Probability that a cell containing a beam endpoint is occupied
    pub p_hit: f64,
    /// Probability that a cell a beam passed through is occupied
    pub p_miss: f64,
    /// Lower clamp of the log-odds accumulator
    pub l_min: f64,
    /// Upper clamp of the log-odds accumulator
    pub l_max: f64,
    /// Initial log-odds of every cell
    pub l0: f64,
    /// Keep every n-th beam
    pub downsample: usize,
    /// Probability at or above which a cell exports as occupied
    pub occupied_thresh: f64,
    /// Probability at or below which a cell exports as free
    pub free_thresh: f64,
    pub model: SensorModel,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: 0.05,
            width: 1024,
            height: 1024,
            origin: None,
            p_hit: 0.65,
            p_miss: 0.35,
            l_min: -2.0,
            l_max: 3.5,
            l0: 0.0,
            downsample: 2,
            occupied_thresh: 0.65,
            free_thresh: 0.196,
            model: SensorModel::LogOdds,
        }
    }
}

/// `ln(p / (1 - p))`
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

impl MapConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| BagMapError::invalid_config("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BagMapError::invalid_config("toml", e.to_string()))
    }

    /// Check the invariants the mapper relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(BagMapError::invalid_config(
                "resolution",
                format!("must be finite and positive, got {}", self.resolution),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(BagMapError::invalid_config(
                "width/height",
                format!("must be non-zero, got {}x{}", self.width, self.height),
            ));
        }
        if let Some(origin) = self.origin {
            if origin.iter().any(|v| !v.is_finite()) {
                return Err(BagMapError::invalid_config("origin", "must be finite"));
            }
        }
        if !(0.0 < self.p_miss && self.p_miss < 0.5) {
            return Err(BagMapError::invalid_config(
                "p_miss",
                format!("must lie in (0, 0.5), got {}", self.p_miss),
            ));
        }
        if !(0.5 < self.p_hit && self.p_hit < 1.0) {
            return Err(BagMapError::invalid_config(
                "p_hit",
                format!("must lie in (0.5, 1), got {}", self.p_hit),
            ));
        }
        if !(self.l_min < self.l0 && self.l0 < self.l_max) {
            return Err(BagMapError::invalid_config(
                "l0",
                format!(
                    "need l_min < l0 < l_max, got {} < {} < {}",
                    self.l_min, self.l0, self.l_max
                ),
            ));
        }
        if !(0.0 < self.free_thresh
            && self.free_thresh < self.occupied_thresh
            && self.occupied_thresh < 1.0)
        {
            return Err(BagMapError::invalid_config(
                "occupied_thresh/free_thresh",
                format!(
                    "need 0 < free_thresh < occupied_thresh < 1, got {} and {}",
                    self.free_thresh, self.occupied_thresh
                ),
            ));
        }
        if self.downsample == 0 {
            return Err(BagMapError::invalid_config("downsample", "must be at least 1"));
        }
        Ok(())
    }

    /// Log-odds added to a cell containing a beam endpoint.
    pub fn hit_update(&self) -> f64 {
        logit(self.p_hit)
    }

    /// Log-odds added to a cell a beam passed through (negative).
    pub fn miss_update(&self) -> f64 {
        logit(self.p_miss)
    }
}
