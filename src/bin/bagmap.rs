// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Bagmap CLI
//!
//! Build occupancy grid maps from ROS1 bag files.
//!
//! ## Usage
//!
//! ```sh
//! # Show file information
//! bagmap inspect info run.bag
//!
//! # List topics
//! bagmap inspect topics run.bag --json
//!
//! # Build and export a map
//! bagmap map run.bag --scan /scan --odom /odom --output office
//!
//! # Replay progressively
//! bagmap play run.bag --scan /scan --odom /odom --speed 4
//! ```

mod cmd;
mod common;

use std::process;

use clap::{Parser, Subcommand};
use cmd::{InspectCmd, MapCmd, PlayCmd};
use common::Result;

/// Bagmap - laser scans to occupancy grids
///
/// Replays the scan, odometry and TF topics of a ROS1 bag into a 2D
/// log-odds occupancy grid and exports it in map_server format.
#[derive(Parser, Clone)]
#[command(name = "bagmap")]
#[command(about = "Build 2D occupancy grid maps from ROS1 bag files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Inspect file contents (info, topics)
    #[command(subcommand)]
    Inspect(InspectCmd),

    /// Build a map and export it as PGM + YAML
    Map(MapCmd),

    /// Replay scans frame by frame
    Play(PlayCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(cmd) => cmd.run(),
        Commands::Map(cmd) => cmd.run(),
        Commands::Play(cmd) => cmd.run(),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
