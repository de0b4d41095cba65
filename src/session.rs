// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Mapping session driven by typed commands and events.
//!
//! A [`Session`] owns one open bag and one [`PlaybackSequencer`]. It never
//! calls back into caller code: every outcome is an [`Event`] sent on a
//! channel. [`SessionHandle::spawn`] runs a session on its own worker thread
//! and uses the command channel's receive deadline as the frame timer, so
//! pausing or stopping only cancels the pending frame.

use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::io::{BagReader, TopicInfo};
use crate::mapping::{
    decode_odometry, decode_scans, decode_tf_poses, ternary_raster, MapConfig, MapExport,
};
use crate::msgs::Pose2D;
use crate::playback::{Frame, PlaybackSequencer, PlaybackState};
use crate::{BagMapError, Result};

/// Inbound session commands.
#[derive(Debug, Clone)]
pub enum Command {
    /// Open a bag from memory, replacing any open bag
    Open(Vec<u8>),
    /// Open a bag from disk, replacing any open bag
    OpenPath(PathBuf),
    /// Extract and load the chosen topics
    SelectTopics {
        scan: String,
        odom: Option<String>,
        tf: Option<String>,
    },
    /// Replace the map configuration
    SetConfig(MapConfig),
    Play(f64),
    Pause,
    Stop,
    SetSpeed(f64),
    Seek(usize),
    MarkStart,
    MarkEnd,
    ExportNow,
    ExportRange,
    Shutdown,
}

/// Session performance counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Frames per second over the last frame interval
    pub fps: f64,
    /// Time spent in the last extraction or render
    pub decode_ms: f64,
    /// Bag bytes plus grid storage
    pub memory_mb: f64,
    pub current_frame: Option<usize>,
    pub total_frames: Option<usize>,
}

/// Outbound session events.
#[derive(Debug, Clone)]
pub enum Event {
    TopicsAvailable(Vec<TopicInfo>),
    /// Topics loaded into playback
    Loaded { scans: usize, poses: usize },
    StateChanged(PlaybackState),
    Pose { pose: Pose2D, timestamp: u64 },
    /// Ternary raster, rows top-down; ownership passes to the receiver
    GridFrame {
        width: usize,
        height: usize,
        raster: Vec<u8>,
        timestamp: u64,
    },
    Stats(Stats),
    /// Capture of a range mark
    Marked { start: bool, index: usize },
    ExportDone(MapExport),
    Error { code: &'static str, message: String },
}

/// One bag, one playback cursor.
pub struct Session {
    events: Sender<Event>,
    reader: Option<BagReader>,
    sequencer: PlaybackSequencer,
    next_frame_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    stats: Stats,
}

impl Session {
    /// Create a session that sends its events on `events`.
    pub fn new(config: MapConfig, events: Sender<Event>) -> Self {
        Self {
            events,
            reader: None,
            sequencer: PlaybackSequencer::new(config),
            next_frame_at: None,
            last_frame_at: None,
            stats: Stats::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.sequencer.state()
    }

    pub fn sequencer(&self) -> &PlaybackSequencer {
        &self.sequencer
    }

    /// When the next playback frame is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.next_frame_at
    }

    /// Apply a command, reporting failures as [`Event::Error`].
    ///
    /// Returns `false` once the session should shut down.
    pub fn handle(&mut self, command: Command) -> bool {
        if matches!(command, Command::Shutdown) {
            return false;
        }
        if let Err(e) = self.apply(command) {
            warn!(code = e.code(), error = %e, "Session command failed");
            self.emit(Event::Error {
                code: e.code(),
                message: e.to_string(),
            });
        }
        true
    }

    /// Render the next playback frame when one is due.
    pub fn tick(&mut self) {
        if self.sequencer.state() != PlaybackState::Playing {
            self.next_frame_at = None;
            return;
        }
        let started = Instant::now();
        match self.sequencer.step() {
            Ok(step) => {
                self.stats.decode_ms = started.elapsed().as_secs_f64() * 1000.0;
                if let Some(last) = self.last_frame_at {
                    let interval = started.duration_since(last).as_secs_f64();
                    if interval > 0.0 {
                        self.stats.fps = 1.0 / interval;
                    }
                }
                self.last_frame_at = Some(started);
                self.emit_frame(step.frame);
                match step.delay {
                    Some(delay) => self.next_frame_at = Some(Instant::now() + delay),
                    None => {
                        self.next_frame_at = None;
                        self.last_frame_at = None;
                        self.emit(Event::StateChanged(PlaybackState::Stopped));
                    }
                }
            }
            Err(e) => {
                self.next_frame_at = None;
                self.emit(Event::Error {
                    code: e.code(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Open(bytes) => {
                let reader = BagReader::from_bytes(bytes);
                self.open(reader)
            }
            Command::OpenPath(path) => {
                let reader = BagReader::open(path);
                self.open(reader)
            }
            Command::SelectTopics { scan, odom, tf } => {
                self.select_topics(&scan, odom.as_deref(), tf.as_deref())
            }
            Command::SetConfig(config) => self.sequencer.set_config(config),
            Command::Play(speed) => {
                self.sequencer.play(speed)?;
                self.next_frame_at = Some(Instant::now());
                self.emit(Event::StateChanged(PlaybackState::Playing));
                Ok(())
            }
            Command::Pause => {
                self.sequencer.pause()?;
                self.next_frame_at = None;
                self.last_frame_at = None;
                self.emit(Event::StateChanged(PlaybackState::Paused));
                Ok(())
            }
            Command::Stop => {
                let frame = self.sequencer.stop()?;
                self.next_frame_at = None;
                self.last_frame_at = None;
                self.emit(Event::StateChanged(PlaybackState::Stopped));
                self.emit_frame(frame);
                Ok(())
            }
            Command::SetSpeed(speed) => self.sequencer.set_speed(speed),
            Command::Seek(index) => {
                let was_playing = self.sequencer.state() == PlaybackState::Playing;
                let frame = self.sequencer.seek(index)?;
                self.emit_frame(frame);
                if was_playing && self.sequencer.state() == PlaybackState::Stopped {
                    self.next_frame_at = None;
                    self.last_frame_at = None;
                    self.emit(Event::StateChanged(PlaybackState::Stopped));
                }
                Ok(())
            }
            Command::MarkStart => {
                let index = self.sequencer.mark_start()?;
                self.emit(Event::Marked { start: true, index });
                Ok(())
            }
            Command::MarkEnd => {
                let index = self.sequencer.mark_end()?;
                self.emit(Event::Marked {
                    start: false,
                    index,
                });
                Ok(())
            }
            Command::ExportNow => {
                let export = self.sequencer.export_now()?;
                self.emit(Event::ExportDone(export));
                Ok(())
            }
            Command::ExportRange => {
                let export = self.sequencer.export_range()?;
                self.emit(Event::ExportDone(export));
                Ok(())
            }
            Command::Shutdown => Ok(()),
        }
    }

    /// Replace the open bag. A failed open still drops the previous one.
    fn open(&mut self, reader: Result<BagReader>) -> Result<()> {
        let was_idle = self.sequencer.state() == PlaybackState::Idle;
        let config = self.sequencer.config().clone();
        self.sequencer = PlaybackSequencer::new(config);
        self.reader = None;
        self.next_frame_at = None;
        self.last_frame_at = None;
        self.stats = Stats::default();

        let reader = match reader {
            Ok(reader) => reader,
            Err(e) => {
                if !was_idle {
                    self.emit(Event::StateChanged(PlaybackState::Idle));
                }
                return Err(e);
            }
        };
        let topics = reader.topics().to_vec();
        info!(topics = topics.len(), "Session bag replaced");
        self.reader = Some(reader);
        self.sequencer.load(Vec::new(), Vec::new())?;
        self.emit(Event::TopicsAvailable(topics));
        self.emit(Event::StateChanged(PlaybackState::Loaded));
        Ok(())
    }

    fn select_topics(&mut self, scan: &str, odom: Option<&str>, tf: Option<&str>) -> Result<()> {
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| BagMapError::invalid_state("no file open"))?;
        let started = Instant::now();

        let scans = decode_scans(&reader.extract(scan)?);
        if scans.is_empty() {
            return Err(BagMapError::no_messages(scan));
        }
        let poses = match (odom, tf) {
            (Some(topic), _) => decode_odometry(&reader.extract(topic)?),
            (None, Some(topic)) => decode_tf_poses(&reader.extract(topic)?),
            (None, None) => Vec::new(),
        };
        debug!(
            scans = scans.len(),
            poses = poses.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Topics extracted"
        );
        let (scan_count, pose_count) = (scans.len(), poses.len());

        let frame = self.sequencer.load(scans, poses)?;
        self.stats.decode_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.emit(Event::Loaded {
            scans: scan_count,
            poses: pose_count,
        });
        self.emit(Event::StateChanged(PlaybackState::Loaded));
        self.emit_frame(frame);
        Ok(())
    }

    fn emit_frame(&mut self, frame: Frame) {
        let bag_bytes = self.reader.as_ref().map_or(0, BagReader::len);
        self.stats.memory_mb =
            (bag_bytes + frame.grid.memory_usage()) as f64 / (1024.0 * 1024.0);
        self.stats.current_frame = Some(frame.frame);
        self.stats.total_frames = Some(frame.total);

        if let Some(pose) = frame.pose() {
            self.emit(Event::Pose {
                pose,
                timestamp: frame.timestamp,
            });
        }
        self.emit(Event::GridFrame {
            width: frame.grid.width(),
            height: frame.grid.height(),
            raster: ternary_raster(&frame.grid),
            timestamp: frame.timestamp,
        });
        self.emit(Event::Stats(self.stats.clone()));
    }

    fn emit(&self, event: Event) {
        // A dropped receiver only means nobody is listening any more.
        if self.events.send(event).is_err() {
            debug!("Session event dropped, receiver gone");
        }
    }
}

/// Run `session` until `Shutdown` or until every command sender is dropped.
pub fn run_worker(mut session: Session, commands: Receiver<Command>) {
    loop {
        let command = match session.deadline() {
            Some(deadline) => match commands.recv_deadline(deadline) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };
        match command {
            Some(command) => {
                if !session.handle(command) {
                    break;
                }
            }
            None => session.tick(),
        }
    }
    debug!("Session worker exited");
}

/// A session running on its own worker thread.
pub struct SessionHandle {
    commands: Sender<Command>,
    events: Receiver<Event>,
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawn a worker thread for a new session.
    pub fn spawn(config: MapConfig) -> Result<Self> {
        config.validate()?;
        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let session = Session::new(config, event_tx);
        let worker = std::thread::Builder::new()
            .name("bagmap-session".to_string())
            .spawn(move || run_worker(session, command_rx))?;
        Ok(Self {
            commands: command_tx,
            events: event_rx,
            worker: Some(worker),
        })
    }

    /// Queue a command for the worker.
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| BagMapError::invalid_state("session worker has exited"))
    }

    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Session worker panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Session, Receiver<Event>) {
        let (tx, rx) = unbounded();
        (Session::new(MapConfig::default(), tx), rx)
    }

    fn errors(rx: &Receiver<Event>) -> Vec<&'static str> {
        rx.try_iter()
            .filter_map(|e| match e {
                Event::Error { code, .. } => Some(code),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_commands_without_file_report_errors() {
        let (mut session, rx) = session();
        assert!(session.handle(Command::SelectTopics {
            scan: "/scan".to_string(),
            odom: None,
            tf: None,
        }));
        assert!(session.handle(Command::Play(1.0)));
        assert!(session.handle(Command::ExportNow));
        assert_eq!(
            errors(&rx),
            vec!["INVALID_STATE", "INVALID_STATE", "INVALID_STATE"]
        );
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_shutdown_stops_handling() {
        let (mut session, _rx) = session();
        assert!(!session.handle(Command::Shutdown));
    }

    #[test]
    fn test_open_empty_buffer_reports_error() {
        let (mut session, rx) = session();
        session.handle(Command::Open(Vec::new()));
        assert_eq!(errors(&rx).len(), 1);
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_tick_outside_playback_clears_deadline() {
        let (mut session, rx) = session();
        session.tick();
        assert!(session.deadline().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handle_spawn_and_shutdown() {
        let handle = SessionHandle::spawn(MapConfig::default()).unwrap();
        handle.send(Command::Pause).unwrap();
        match handle.recv_timeout(Duration::from_secs(5)) {
            Some(Event::Error { code, .. }) => assert_eq!(code, "INVALID_STATE"),
            other => panic!("unexpected event: {other:?}"),
        }
        handle.shutdown();
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let config = MapConfig {
            resolution: 0.0,
            ..Default::default()
        };
        assert!(SessionHandle::spawn(config).is_err());
    }
}
