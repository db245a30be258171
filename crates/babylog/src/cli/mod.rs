//! Command-line interface for babylog.
//!
//! This module provides the CLI structure and command definitions for the
//! `babylog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, CacheCommand, ClearCommand, ConfigCommand, EntryKindArg, FetchCommand,
    ListCommand, NotifyCommand, OutputFormat, RemoveCommand, StatusCommand, WorkerCommand,
};

use crate::logging::Verbosity;

/// babylog - Log feedings and diaper changes
///
/// Keeps a local log of newborn care events, with a background worker that
/// caches the app shell for offline use and delivers notifications.
#[derive(Debug, Parser)]
#[command(name = "babylog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a care event
    Add(AddCommand),

    /// Show the log
    List(ListCommand),

    /// Remove one entry
    Remove(RemoveCommand),

    /// Remove every entry
    Clear(ClearCommand),

    /// Ask the worker to show a notification
    Notify(NotifyCommand),

    /// Fetch a URL through the worker
    Fetch(FetchCommand),

    /// Inspect the offline cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Run the background worker
    #[command(subcommand)]
    Worker(WorkerCommand),

    /// Show log, storage and worker status
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Whether the command needs the background worker.
    #[must_use]
    pub fn needs_worker(&self) -> bool {
        matches!(
            self.command,
            Command::Notify(_) | Command::Fetch(_) | Command::Worker(_)
        )
    }
}
