//! CLI module - Command-line interface for animedl
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// animedl - Anime episode downloader
/// Keeps a local library of series and downloads their episodes
#[derive(Parser)]
#[command(name = "animedl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as background daemon with download worker and scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Check every series for new episodes and download them
    #[command(alias = "-c", alias = "--check")]
    Check,

    /// Move failed episodes back to pending and download them again
    RetryFailed,

    /// Search the catalog without adding anything
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Search the catalog and add a series to the library
    #[command(alias = "a")]
    Add {
        /// Search query for the series
        #[arg(required = true)]
        query: Vec<String>,

        /// Pick this result (1-based) instead of asking
        #[arg(long)]
        pick: Option<usize>,

        /// Download the pending episodes right away
        #[arg(long)]
        download: bool,
    },

    /// List every series in the library
    #[command(alias = "ls", alias = "l")]
    List,

    /// List the episodes of a series
    #[command(alias = "eps")]
    Episodes {
        /// Series ID
        id: i32,
    },

    /// List every downloaded episode
    Downloaded,

    /// Download a pending episode now
    Download {
        /// Episode ID
        id: i32,
    },

    /// Cancel a pending or downloading episode
    Cancel {
        /// Episode ID
        id: i32,
    },

    /// Skip a pending or downloading episode
    Skip {
        /// Episode ID
        id: i32,
    },

    /// Resume a failed, skipped or cancelled episode
    Resume {
        /// Episode ID
        id: i32,
    },

    /// Cancel every unfinished episode of a series
    CancelSeries {
        /// Series ID
        id: i32,
    },

    /// Skip every unfinished episode of a series
    SkipSeries {
        /// Series ID
        id: i32,
    },

    /// Resume every failed, skipped or cancelled episode of a series
    ResumeSeries {
        /// Series ID
        id: i32,
    },

    /// Remove a series, its episodes and its files
    #[command(alias = "rm", alias = "r")]
    Remove {
        /// Series ID
        id: i32,

        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Create a default config file
    #[command(alias = "--init")]
    Init,
}
