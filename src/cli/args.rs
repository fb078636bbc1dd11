//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

fn sample_period_parser() -> clap::builder::RangedU64ValueParser {
    clap::value_parser!(u64).range(10..=1000)
}

#[derive(Parser)]
#[command(name = "fexscope", version, about = "Real-time JIT profiling HUD for FEX-Emu")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Attach to a running FEX process and monitor it live
    Live {
        pid: i32,
        /// Sample period in milliseconds
        #[arg(short, long, default_value = "1000", value_parser = sample_period_parser())]
        sample_period: u64,
        /// Also record every frame to this file
        #[arg(short, long, value_name = "FILE")]
        record: Option<PathBuf>,
    },

    /// Replay a recorded session in the TUI
    Replay {
        path: PathBuf,
    },

    /// Record a session headlessly (no TUI)
    Record {
        pid: i32,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Sample period in milliseconds
        #[arg(short, long, default_value = "1000", value_parser = sample_period_parser())]
        sample_period: u64,
        /// Stop after this many seconds (0 = until the target exits)
        #[arg(long, default_value = "0")]
        duration: u64,
    },

    /// Wait for a FEX process to appear, then attach
    Watch {
        /// Sample period in milliseconds
        #[arg(short, long, default_value = "1000", value_parser = sample_period_parser())]
        sample_period: u64,
        #[arg(short, long, value_name = "FILE")]
        record: Option<PathBuf>,
    },

    /// Choose among running FEX processes, then attach
    Pick {
        /// Sample period in milliseconds
        #[arg(short, long, default_value = "1000", value_parser = sample_period_parser())]
        sample_period: u64,
        #[arg(short, long, value_name = "FILE")]
        record: Option<PathBuf>,
    },

    /// Export a recording to CSV
    Export {
        input: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}
