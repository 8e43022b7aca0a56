//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "autoreply")]
#[command(about = "Autonomous chat responder worker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to .autoreply/config.yaml plus local overrides
    #[arg(short, long, global = true, env = "AUTOREPLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the worker until interrupted
    Run,

    /// Run a single pass of one use case
    #[command(subcommand)]
    Once(OnceCommands),

    /// Inspect or sweep the judgment cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Use cases runnable as a single pass.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceCommands {
    /// Check every active scope and respond where warranted
    Check,
    /// Refresh channel memory summaries
    Summarize,
    /// Mirror the platform channel list
    SyncChannels,
}

/// Judgment cache commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommands {
    /// List cached judgments, soonest re-check first
    List {
        /// Maximum number of rows to display
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
    /// Delete judgments whose skip window has passed
    Purge,
}

/// Configuration commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the effective configuration with secrets masked
    Show,
}
