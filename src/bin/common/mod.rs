// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};

use bagmap::mapping::{decode_odometry, decode_scans, decode_tf_poses, PoseSample, ScanSample};
use bagmap::{BagReader, MapConfig};

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Format a duration in nanoseconds to human-readable string.
pub fn format_duration(nanos: u64) -> String {
    let secs = nanos / 1_000_000_000;
    let millis = (nanos % 1_000_000_000) / 1_000_000;

    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

/// Format a timestamp in nanoseconds to human-readable string.
pub fn format_timestamp(nanos: u64) -> String {
    let secs = nanos / 1_000_000_000;
    let sub = (nanos % 1_000_000_000) as u32;
    match chrono::DateTime::<chrono::Utc>::from_timestamp(secs as i64, sub) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        None => format!("{} ns", nanos),
    }
}

/// Parse an inclusive scan index range `START:END`.
pub fn parse_index_range(s: &str) -> CliResult<(usize, usize)> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Range must be in format START:END, got '{s}'"))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid range start '{start}': {e}"))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid range end '{end}': {e}"))?;
    if end < start {
        return Err(anyhow::anyhow!("Range end {end} is before start {start}"));
    }
    Ok((start, end))
}

/// Load a map config file, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<MapConfig> {
    let config = match path {
        Some(path) => MapConfig::from_file(path)?,
        None => MapConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Topics chosen on the command line.
#[derive(clap::Args, Clone, Debug)]
pub struct TopicArgs {
    /// Input bag file
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// LaserScan topic
    #[arg(long)]
    pub scan: String,

    /// Odometry topic
    #[arg(long)]
    pub odom: Option<String>,

    /// TF topic, used for poses when no odometry topic is given
    #[arg(long)]
    pub tf: Option<String>,

    /// Map config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl TopicArgs {
    /// Extract and decode the selected topics.
    pub fn load(&self, reader: &BagReader) -> Result<(Vec<ScanSample>, Vec<PoseSample>)> {
        let scans = decode_scans(&reader.extract(&self.scan)?);
        if scans.is_empty() {
            return Err(bagmap::BagMapError::no_messages(&self.scan).into());
        }
        let poses = match (&self.odom, &self.tf) {
            (Some(topic), _) => decode_odometry(&reader.extract(topic)?),
            (None, Some(topic)) => decode_tf_poses(&reader.extract(topic)?),
            (None, None) => Vec::new(),
        };
        Ok((scans, poses))
    }
}

/// Progress bar wrapper for consistent progress reporting.
pub struct ProgressBar {
    inner: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a new progress bar; hidden when stderr is not a terminal.
    pub fn new(total: u64, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let inner = if std::io::stderr().is_terminal() {
            let pb = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.set_prefix(prefix);
            Some(pb)
        } else {
            None
        };

        Self { inner }
    }

    pub fn set_position(&self, pos: u64) {
        if let Some(pb) = &self.inner {
            pb.set_position(pos);
        }
    }

    pub fn set_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.set_message(msg);
        }
    }

    /// Finish the progress bar with a message.
    pub fn finish_with_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.finish_with_message(msg);
        }
    }
}
