//! CLI Module
//!
//! Command-line interface for non-destructive recording edits.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::interval::Interval;

/// Trimline - cut and trim WAVE recordings without touching the source
#[derive(Parser, Debug)]
#[command(name = "trimline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show format, duration and payload checksum of a recording
    #[command(name = "info")]
    Info {
        /// Input WAVE file
        input: PathBuf,
    },

    /// Remove time ranges and export the result
    #[command(name = "cut")]
    Cut {
        /// Input WAVE file (never modified)
        input: PathBuf,

        /// Output WAVE file
        output: PathBuf,

        /// Range to remove as START:END in milliseconds; END may be `end`
        #[arg(short, long = "exclude", value_parser = parse_range, required = true)]
        exclude: Vec<Interval<i64>>,

        /// Apply each range to the already-edited timeline, in order
        #[arg(long = "virtual")]
        virtual_time: bool,

        /// Export options (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Keep only one time range and export it
    #[command(name = "keep")]
    Keep {
        /// Input WAVE file (never modified)
        input: PathBuf,

        /// Output WAVE file
        output: PathBuf,

        /// Start of the kept range in milliseconds
        #[arg(long)]
        from: i64,

        /// End of the kept range in milliseconds
        #[arg(long)]
        to: i64,

        /// Export options (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Parse `START:END` milliseconds, where `END` may be `end`.
pub fn parse_range(value: &str) -> std::result::Result<Interval<i64>, String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", value))?;

    let start: i64 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start '{}'", start))?;
    let end: i64 = match end.trim() {
        "end" => i64::MAX,
        other => other
            .parse()
            .map_err(|_| format!("invalid end '{}'", other))?,
    };

    if start >= end {
        return Err(format!("start {} must be before end {}", start, end));
    }

    Ok(Interval::new(start, end))
}
