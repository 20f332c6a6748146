//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// QueryRunner - resumable hourly remote SQL runner
#[derive(Debug, Parser)]
#[command(
    name = "qr",
    about = "Run hourly SQL jobs on a remote query service, resuming from a progress ledger",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every configured step (or one) to completion
    Run {
        /// Only run this step
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Show outstanding slots without submitting anything
    Plan {
        /// Only plan this step
        #[arg(short, long)]
        step: Option<String>,
    },

    /// Validate the configuration
    Check,
}
