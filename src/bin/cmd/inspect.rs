// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show file information and topics.

use std::path::PathBuf;

use clap::Subcommand;

use crate::common::{format_duration, format_timestamp, Result};
use bagmap::BagReader;

/// Inspect file contents.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// Show basic file information and connections
    Info {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List all topics in the file
    Topics {
        /// Input bag file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print topics as JSON
        #[arg(long)]
        json: bool,

        /// Also extract each topic and show its time span
        #[arg(long)]
        times: bool,
    },
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        match self {
            InspectCmd::Info { input } => cmd_info(input),
            InspectCmd::Topics { input, json, times } => cmd_topics(input, json, times),
        }
    }
}

/// Cmd: Show file info
fn cmd_info(input: PathBuf) -> Result<()> {
    let reader = BagReader::open(&input)?;
    let layout = reader.layout();

    println!("=== {} ===", input.display());
    println!("Size:        {} bytes", reader.len());
    println!("Magic:       {}", if layout.has_magic { "ok" } else { "missing" });
    match layout.index_pos {
        Some(pos) => println!("Index:       at offset {pos}"),
        None => println!("Index:       none"),
    }
    println!("Connections: {}", reader.connections().len());
    println!("Topics:      {}", reader.topics().len());
    let total: u64 = reader.topics().iter().map(|t| t.message_count).sum();
    println!("Messages:    {total}");

    if !reader.connections().is_empty() {
        println!();
        for (id, conn) in reader.connections() {
            println!("  [{id}] {} ({})", conn.topic, conn.message_type);
            if let Some(md5) = &conn.md5sum {
                println!("       md5: {md5}");
            }
            if let Some(caller) = &conn.caller_id {
                println!("       caller: {caller}");
            }
        }
    }

    Ok(())
}

/// Cmd: List topics
fn cmd_topics(input: PathBuf, json: bool, times: bool) -> Result<()> {
    let reader = BagReader::open(&input)?;
    let topics = reader.topics();

    if json {
        println!("{}", serde_json::to_string_pretty(topics)?);
        return Ok(());
    }

    let width = topics.iter().map(|t| t.name.len()).max().unwrap_or(5).max(5);
    println!("{:<width$}  {:>8}  TYPE", "TOPIC", "COUNT");
    for topic in topics {
        println!(
            "{:<width$}  {:>8}  {}",
            topic.name, topic.message_count, topic.message_type
        );
        if times {
            let messages = reader.extract(&topic.name)?;
            let first = messages.iter().map(|m| m.timestamp).min();
            let last = messages.iter().map(|m| m.timestamp).max();
            if let (Some(first), Some(last)) = (first, last) {
                println!(
                    "{:<width$}  from {} for {}",
                    "",
                    format_timestamp(first),
                    format_duration(last - first)
                );
            }
        }
    }

    Ok(())
}
