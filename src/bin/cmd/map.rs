// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Map command - build an occupancy grid and export it.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;

use crate::common::{format_duration, load_config, parse_index_range, Result, TopicArgs};
use bagmap::mapping::export::image_name;
use bagmap::{BagReader, PlaybackSequencer};

/// Build a map from every scan (or a scan range) and write PGM + YAML.
#[derive(Args, Clone, Debug)]
pub struct MapCmd {
    #[command(flatten)]
    topics: TopicArgs,

    /// Output path stem; writes <STEM>.pgm and <STEM>.yaml
    #[arg(short, long, default_value = "map")]
    output: PathBuf,

    /// Inclusive scan index range START:END
    #[arg(long)]
    range: Option<String>,

    /// Worker threads for chunk decompression
    #[arg(long)]
    threads: Option<usize>,
}

impl MapCmd {
    pub fn run(self) -> Result<()> {
        let started = Instant::now();
        let config = load_config(self.topics.config.as_deref())?;
        let range = self.range.as_deref().map(parse_index_range).transpose()?;

        let mut reader = BagReader::open(&self.topics.input)?;
        if let Some(threads) = self.threads {
            reader = reader.with_threads(threads);
        }
        let (scans, poses) = self.topics.load(&reader)?;
        println!(
            "Loaded {} scans and {} poses from {}",
            scans.len(),
            poses.len(),
            self.topics.input.display()
        );

        let mut sequencer =
            PlaybackSequencer::new(config).with_image_name(image_name(&self.output));
        let full = sequencer.load(scans, poses)?;
        let export = match range {
            Some((start, end)) => sequencer.export_between(start, end)?,
            None => sequencer.export_now()?,
        };
        let (pgm, yaml) = export.write_files(&self.output)?;

        let (free, unknown, occupied) = full.grid.count_cells();
        println!(
            "Full map {}x{}: {occupied} occupied, {free} free, {unknown} unknown",
            full.grid.width(),
            full.grid.height()
        );
        println!("Wrote {} and {}", pgm.display(), yaml.display());
        println!(
            "Done in {}",
            format_duration(started.elapsed().as_nanos() as u64)
        );
        Ok(())
    }
}
