// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Play command - replay scans through a mapping session.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::common::{format_timestamp, load_config, ProgressBar, Result, TopicArgs};
use bagmap::mapping::export::image_name;
use bagmap::{Command, Event, PlaybackState, SessionHandle};

/// How long to wait for the worker before giving up.
const EVENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Replay scans progressively on a session worker.
#[derive(Args, Clone, Debug)]
pub struct PlayCmd {
    #[command(flatten)]
    topics: TopicArgs,

    /// Playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Export the final map to <STEM>.pgm and <STEM>.yaml
    #[arg(long, value_name = "STEM")]
    export: Option<PathBuf>,
}

impl PlayCmd {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.topics.config.as_deref())?;
        let session = SessionHandle::spawn(config)?;

        session.send(Command::OpenPath(self.topics.input.clone()))?;
        session.send(Command::SelectTopics {
            scan: self.topics.scan.clone(),
            odom: self.topics.odom.clone(),
            tf: self.topics.tf.clone(),
        })?;
        session.send(Command::Play(self.speed))?;

        let mut progress: Option<ProgressBar> = None;
        let mut playing = false;
        loop {
            let event = session
                .recv_timeout(EVENT_TIMEOUT)
                .ok_or_else(|| anyhow::anyhow!("Session stopped responding"))?;
            match event {
                Event::Error { code, message } => {
                    return Err(anyhow::anyhow!("{message} ({code})"));
                }
                Event::TopicsAvailable(topics) => {
                    println!("{} topics available", topics.len());
                }
                Event::Loaded { scans, poses } => {
                    println!("Loaded {scans} scans and {poses} poses");
                    progress = Some(ProgressBar::new(scans as u64, "Playing"));
                }
                Event::StateChanged(PlaybackState::Playing) => playing = true,
                Event::StateChanged(PlaybackState::Stopped) if playing => break,
                Event::Stats(stats) => {
                    if let (Some(pb), Some(frame)) = (&progress, stats.current_frame) {
                        pb.set_position(frame as u64);
                        pb.set_message(format!("{:.1} fps", stats.fps));
                    }
                }
                Event::Pose { pose, timestamp } if playing => {
                    if let Some(pb) = &progress {
                        pb.set_message(format!(
                            "{} ({:.2}, {:.2})",
                            format_timestamp(timestamp),
                            pose.x,
                            pose.y
                        ));
                    }
                }
                _ => {}
            }
        }
        if let Some(pb) = &progress {
            pb.finish_with_message("finished".to_string());
        }

        if let Some(stem) = self.export {
            session.send(Command::ExportNow)?;
            loop {
                match session.recv_timeout(EVENT_TIMEOUT) {
                    Some(Event::ExportDone(export)) => {
                        let export = export.with_image(&image_name(&stem));
                        let (pgm, yaml) = export.write_files(&stem)?;
                        println!("Wrote {} and {}", pgm.display(), yaml.display());
                        break;
                    }
                    Some(Event::Error { code, message }) => {
                        return Err(anyhow::anyhow!("{message} ({code})"));
                    }
                    Some(_) => {}
                    None => return Err(anyhow::anyhow!("Export timed out")),
                }
            }
        }

        session.shutdown();
        Ok(())
    }
}
