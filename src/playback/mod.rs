// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Timestamp-ordered progressive playback.
//!
//! ```text
//! Idle --load--> Loaded --play--> Playing --pause--> Paused
//!                  ^                 |  ^               |
//!                  |                 |  +-----play------+
//!                  |               stop / end
//!                  |                 v
//!                  +----load---- Stopped --play--> Playing
//! ```
//!
//! Each frame re-renders the grid from the scan prefix `[0..=index]`, so a
//! full playback costs O(n^2) scan integrations. The sequencer holds no
//! timer; the caller sleeps for the delay returned by [`PlaybackSequencer::step`].

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::mapping::{MapConfig, MapExport, OccupancyGrid, OccupancyMapper, PoseSample, ScanSample};
use crate::msgs::Pose2D;
use crate::{BagMapError, Result};

/// Shortest delay between two frames.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(1);

/// Default raster name written into exported sidecars.
pub const DEFAULT_IMAGE_NAME: &str = "map.pgm";

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    /// Nothing loaded
    Idle,
    /// Messages loaded, never played
    Loaded,
    Playing,
    Paused,
    /// Stopped by the caller or by reaching the last message
    Stopped,
}

/// A rendered map.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Number of scans integrated
    pub frame: usize,
    /// Scans loaded
    pub total: usize,
    /// Receive time of the last integrated scan (0 when none)
    pub timestamp: u64,
    pub grid: OccupancyGrid,
    pub trajectory: Vec<Pose2D>,
}

impl Frame {
    /// Last robot pose, if any scan was integrated.
    pub fn pose(&self) -> Option<Pose2D> {
        self.trajectory.last().copied()
    }
}

/// Result of one playback step.
#[derive(Debug, Clone)]
pub struct Step {
    pub frame: Frame,
    /// Time to wait before the next step; `None` when playback finished
    pub delay: Option<Duration>,
}

/// Orders scans by time and renders progressive frames.
#[derive(Debug, Clone)]
pub struct PlaybackSequencer {
    state: PlaybackState,
    config: MapConfig,
    scans: Vec<ScanSample>,
    odometry: Vec<PoseSample>,
    current_index: usize,
    speed: f64,
    last_rendered: Option<usize>,
    mark_start: Option<usize>,
    mark_end: Option<usize>,
    image_name: String,
}

impl PlaybackSequencer {
    /// Create an idle sequencer.
    pub fn new(config: MapConfig) -> Self {
        Self {
            state: PlaybackState::Idle,
            config,
            scans: Vec::new(),
            odometry: Vec::new(),
            current_index: 0,
            speed: 1.0,
            last_rendered: None,
            mark_start: None,
            mark_end: None,
            image_name: DEFAULT_IMAGE_NAME.to_string(),
        }
    }

    /// Raster file name written into exported sidecars.
    pub fn with_image_name(mut self, image_name: impl Into<String>) -> Self {
        self.image_name = image_name.into();
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Replace the map configuration; later frames use it.
    pub fn set_config(&mut self, config: MapConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Index of the next scan to integrate.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Number of loaded scans.
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Inclusive `(start, end)` scan indices captured by the marks.
    pub fn marks(&self) -> (Option<usize>, Option<usize>) {
        (self.mark_start, self.mark_end)
    }

    /// Load scans and poses, replacing anything loaded before.
    ///
    /// Both lists are stably sorted by timestamp. Returns the full map.
    pub fn load(&mut self, mut scans: Vec<ScanSample>, mut odometry: Vec<PoseSample>) -> Result<Frame> {
        scans.sort_by_key(|s| s.timestamp);
        odometry.sort_by_key(|s| s.timestamp);
        self.scans = scans;
        self.odometry = odometry;
        self.current_index = 0;
        self.last_rendered = None;
        self.mark_start = None;
        self.mark_end = None;
        self.state = PlaybackState::Loaded;
        info!(
            scans = self.scans.len(),
            poses = self.odometry.len(),
            "Playback loaded"
        );
        self.full_map()
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.state == PlaybackState::Idle {
            return Err(BagMapError::invalid_state("nothing loaded"));
        }
        Ok(())
    }

    fn validate_speed(speed: f64) -> Result<()> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(BagMapError::invalid_config(
                "speed",
                format!("must be finite and positive, got {speed}"),
            ));
        }
        Ok(())
    }

    /// Start or resume playback at `speed`.
    ///
    /// Fails without changing state when no scans are loaded.
    pub fn play(&mut self, speed: f64) -> Result<()> {
        self.ensure_loaded()?;
        Self::validate_speed(speed)?;
        if self.scans.is_empty() {
            return Err(BagMapError::invalid_state("no messages loaded"));
        }
        if self.current_index >= self.scans.len() {
            self.current_index = 0;
        }
        self.speed = speed;
        self.state = PlaybackState::Playing;
        debug!(index = self.current_index, speed, "Playback started");
        Ok(())
    }

    /// Pause a running playback.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Err(BagMapError::invalid_state(format!(
                "cannot pause while {:?}",
                self.state
            )));
        }
        self.state = PlaybackState::Paused;
        Ok(())
    }

    /// Rewind to the first scan and return the full map.
    pub fn stop(&mut self) -> Result<Frame> {
        self.ensure_loaded()?;
        self.current_index = 0;
        self.last_rendered = None;
        self.state = PlaybackState::Stopped;
        self.full_map()
    }

    /// Change the speed multiplier without changing state.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        Self::validate_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    /// Render the frame ending at `index` (clamped) and continue from there.
    ///
    /// Seeking to the last scan while playing ends playback the same way
    /// [`step`](Self::step) does.
    pub fn seek(&mut self, index: usize) -> Result<Frame> {
        self.ensure_loaded()?;
        if self.scans.is_empty() {
            return Err(BagMapError::invalid_state("no messages loaded"));
        }
        let index = index.min(self.scans.len() - 1);
        let frame = self.render_prefix(index)?;
        self.current_index = index + 1;
        if self.state == PlaybackState::Playing && self.current_index >= self.scans.len() {
            self.finish();
        }
        Ok(frame)
    }

    /// Render the next frame and compute the delay until the one after.
    ///
    /// Rendering the last scan moves to `Stopped`.
    pub fn step(&mut self) -> Result<Step> {
        if self.state != PlaybackState::Playing {
            return Err(BagMapError::invalid_state(format!(
                "cannot step while {:?}",
                self.state
            )));
        }
        let index = self.current_index;
        let frame = self.render_prefix(index)?;
        self.current_index = index + 1;

        let delay = match self.scans.get(self.current_index) {
            Some(next) => {
                let gap = next.timestamp.saturating_sub(self.scans[index].timestamp);
                let nanos = (gap as f64 / self.speed).round() as u64;
                Some(Duration::from_nanos(nanos).max(MIN_FRAME_DELAY))
            }
            None => {
                self.finish();
                None
            }
        };
        Ok(Step { frame, delay })
    }

    fn finish(&mut self) {
        self.state = PlaybackState::Stopped;
        self.current_index = 0;
        info!(frames = self.scans.len(), "Playback finished");
    }

    /// Capture the last rendered frame as the export range start.
    pub fn mark_start(&mut self) -> Result<usize> {
        self.ensure_loaded()?;
        let index = self.last_rendered.unwrap_or(0);
        self.mark_start = Some(index);
        Ok(index)
    }

    /// Capture the last rendered frame as the export range end.
    pub fn mark_end(&mut self) -> Result<usize> {
        self.ensure_loaded()?;
        let index = self.last_rendered.unwrap_or(0);
        self.mark_end = Some(index);
        Ok(index)
    }

    /// Export the last rendered frame, or the full map when nothing was rendered.
    pub fn export_now(&self) -> Result<MapExport> {
        self.ensure_loaded()?;
        let (grid, _) = match self.last_rendered {
            Some(index) => self.build(&self.scans[..=index])?,
            None => self.build(&self.scans)?,
        };
        Ok(self.export(&grid))
    }

    /// Export the map of the marked scan range.
    pub fn export_range(&self) -> Result<MapExport> {
        match (self.mark_start, self.mark_end) {
            (Some(start), Some(end)) => self.export_between(start, end),
            _ => Err(BagMapError::invalid_state("export range needs both marks")),
        }
    }

    /// Export the map built from scans `start..=end` only.
    pub fn export_between(&self, start: usize, end: usize) -> Result<MapExport> {
        self.ensure_loaded()?;
        if start > end {
            return Err(BagMapError::invalid_state(format!(
                "range start {start} is after end {end}"
            )));
        }
        if end >= self.scans.len() {
            return Err(BagMapError::invalid_state(format!(
                "range end {end} is past the last scan ({})",
                self.scans.len()
            )));
        }
        let (grid, _) = self.build(&self.scans[start..=end])?;
        Ok(self.export(&grid))
    }

    fn export(&self, grid: &OccupancyGrid) -> MapExport {
        MapExport::new(
            grid,
            &self.image_name,
            self.config.occupied_thresh,
            self.config.free_thresh,
        )
    }

    fn build(&self, scans: &[ScanSample]) -> Result<(OccupancyGrid, Vec<Pose2D>)> {
        OccupancyMapper::build_map(scans, &self.odometry, &self.config)
    }

    fn render_prefix(&mut self, index: usize) -> Result<Frame> {
        if index >= self.scans.len() {
            return Err(BagMapError::invalid_state(format!(
                "frame {index} is past the last scan ({})",
                self.scans.len()
            )));
        }
        let (grid, trajectory) = self.build(&self.scans[..=index])?;
        self.last_rendered = Some(index);
        Ok(Frame {
            frame: index + 1,
            total: self.scans.len(),
            timestamp: self.scans[index].timestamp,
            grid,
            trajectory,
        })
    }

    fn full_map(&self) -> Result<Frame> {
        let (grid, trajectory) = self.build(&self.scans)?;
        Ok(Frame {
            frame: self.scans.len(),
            total: self.scans.len(),
            timestamp: self.scans.last().map_or(0, |s| s.timestamp),
            grid,
            trajectory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::LaserScan;

    fn config() -> MapConfig {
        MapConfig {
            resolution: 0.1,
            width: 64,
            height: 64,
            downsample: 1,
            ..Default::default()
        }
    }

    fn scan_at(timestamp: u64) -> ScanSample {
        ScanSample {
            timestamp,
            scan: LaserScan {
                angle_increment: 0.1,
                range_min: 0.1,
                range_max: 10.0,
                ranges: vec![1.0, 1.5],
                ..Default::default()
            },
        }
    }

    fn loaded(timestamps: &[u64]) -> PlaybackSequencer {
        let mut seq = PlaybackSequencer::new(config());
        seq.load(timestamps.iter().map(|&t| scan_at(t)).collect(), Vec::new())
            .unwrap();
        seq
    }

    #[test]
    fn test_play_requires_messages() {
        let mut seq = PlaybackSequencer::new(config());
        assert!(seq.play(1.0).is_err());
        assert_eq!(seq.state(), PlaybackState::Idle);

        seq.load(Vec::new(), Vec::new()).unwrap();
        assert_eq!(seq.state(), PlaybackState::Loaded);
        let err = seq.play(1.0).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(seq.state(), PlaybackState::Loaded);
    }

    #[test]
    fn test_load_sorts_by_timestamp() {
        let mut seq = loaded(&[30, 10, 20]);
        seq.play(1.0).unwrap();
        let step = seq.step().unwrap();
        assert_eq!(step.frame.timestamp, 10);
        assert_eq!(step.frame.frame, 1);
        assert_eq!(step.frame.total, 3);
    }

    #[test]
    fn test_step_delays_scale_with_speed() {
        let mut seq = loaded(&[0, 1_000_000_000, 1_000_000_100]);
        seq.play(2.0).unwrap();

        let first = seq.step().unwrap();
        assert_eq!(first.delay, Some(Duration::from_millis(500)));

        // 100 ns apart clamps to the minimum delay.
        let second = seq.step().unwrap();
        assert_eq!(second.delay, Some(MIN_FRAME_DELAY));

        let last = seq.step().unwrap();
        assert_eq!(last.delay, None);
        assert_eq!(last.frame.frame, 3);
        assert_eq!(seq.state(), PlaybackState::Stopped);
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn test_pause_resume_and_speed() {
        let mut seq = loaded(&[0, 10, 20]);
        assert!(seq.pause().is_err());
        seq.play(1.0).unwrap();
        seq.step().unwrap();
        seq.pause().unwrap();
        assert_eq!(seq.state(), PlaybackState::Paused);
        assert!(seq.step().is_err());

        seq.set_speed(4.0).unwrap();
        assert_eq!(seq.state(), PlaybackState::Paused);
        assert!(seq.set_speed(0.0).is_err());

        seq.play(4.0).unwrap();
        assert_eq!(seq.step().unwrap().frame.frame, 2);
    }

    #[test]
    fn test_stop_rewinds_and_rebuilds() {
        let mut seq = loaded(&[0, 10, 20]);
        seq.play(1.0).unwrap();
        seq.step().unwrap();
        let frame = seq.stop().unwrap();
        assert_eq!(seq.state(), PlaybackState::Stopped);
        assert_eq!(seq.current_index(), 0);
        assert_eq!(frame.frame, 3);
        assert_eq!(frame.trajectory.len(), 3);
    }

    #[test]
    fn test_seek_clamps_and_keeps_state() {
        let mut seq = loaded(&[0, 10, 20]);
        let frame = seq.seek(99).unwrap();
        assert_eq!(frame.frame, 3);
        assert_eq!(seq.state(), PlaybackState::Loaded);

        seq.seek(0).unwrap();
        assert_eq!(seq.current_index(), 1);
        seq.play(1.0).unwrap();
        assert_eq!(seq.step().unwrap().frame.frame, 2);
    }

    #[test]
    fn test_seek_to_last_while_playing_stops() {
        let mut seq = loaded(&[0, 10, 20]);
        seq.play(1.0).unwrap();
        let frame = seq.seek(2).unwrap();
        assert_eq!(frame.frame, 3);
        assert_eq!(seq.state(), PlaybackState::Stopped);
        assert_eq!(seq.current_index(), 0);
        assert!(seq.step().is_err());

        // Playing again restarts from the first scan.
        seq.play(1.0).unwrap();
        seq.seek(99).unwrap();
        assert_eq!(seq.state(), PlaybackState::Stopped);
        seq.play(1.0).unwrap();
        assert_eq!(seq.step().unwrap().frame.frame, 1);
    }

    #[test]
    fn test_seek_to_last_while_paused_keeps_state() {
        let mut seq = loaded(&[0, 10, 20]);
        seq.play(1.0).unwrap();
        seq.step().unwrap();
        seq.pause().unwrap();
        seq.seek(2).unwrap();
        assert_eq!(seq.state(), PlaybackState::Paused);

        seq.play(1.0).unwrap();
        assert_eq!(seq.step().unwrap().frame.frame, 1);
    }

    #[test]
    fn test_marks_and_range_export() {
        let mut seq = loaded(&[0, 10, 20, 30]);
        assert_eq!(seq.mark_start().unwrap(), 0);
        seq.seek(2).unwrap();
        assert_eq!(seq.mark_end().unwrap(), 2);
        assert_eq!(seq.marks(), (Some(0), Some(2)));

        let export = seq.export_range().unwrap();
        assert_eq!(export.width, 64);
        assert!(export.yaml.contains("image: map.pgm"));

        assert!(seq.export_between(3, 1).is_err());
        assert!(seq.export_between(0, 4).is_err());
    }

    #[test]
    fn test_export_range_requires_marks() {
        let seq = loaded(&[0, 10]);
        assert_eq!(seq.export_range().unwrap_err().code(), "INVALID_STATE");
    }

    #[test]
    fn test_export_now_matches_rendered_prefix() {
        let mut seq = loaded(&[0, 10, 20]);
        let full = seq.export_now().unwrap();
        let frame = seq.seek(0).unwrap();
        let partial = seq.export_now().unwrap();
        assert_eq!(partial.pgm, crate::mapping::export::to_pgm(&frame.grid));
        assert_eq!(full.pgm.len(), partial.pgm.len());
    }
}
