//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand, ValueEnum};

use crate::entry::{EntryKind, LogEntry};
use crate::error::{Error, Result};
use crate::worker::NotificationOptions;

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// What happened
    #[arg(value_enum)]
    pub kind: EntryKindArg,

    /// Feeding duration in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// When it happened (RFC 3339, e.g. "2024-03-05T14:07:00Z"); defaults to now
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,
}

impl AddCommand {
    /// Build the entry these arguments describe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntry`] if `--at` is not a valid timestamp or a
    /// duration is given for a kind that is not timed.
    pub fn to_entry(&self) -> Result<LogEntry> {
        let kind = EntryKind::from(self.kind);
        if self.duration.is_some() && !kind.is_timed() {
            return Err(Error::invalid_entry(format!(
                "--duration only applies to feedings, not {kind}"
            )));
        }

        let mut entry = LogEntry::new(kind);
        entry.duration_seconds = self.duration;
        if let Some(at) = &self.at {
            let timestamp = DateTime::parse_from_rfc3339(at)
                .map_err(|e| Error::invalid_entry(format!("invalid time {at:?}: {e}")))?;
            entry = entry.at(timestamp.with_timezone(&Utc));
        }
        Ok(entry)
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Remove command arguments.
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// 1-based position as shown by `list`
    pub position: usize,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Notify command arguments.
#[derive(Debug, Args)]
pub struct NotifyCommand {
    /// Notification title
    pub title: String,

    /// Notification body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Notification tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Click the notification once shown
    #[arg(long)]
    pub click: bool,
}

impl NotifyCommand {
    /// The notification options these arguments describe.
    #[must_use]
    pub fn options(&self) -> NotificationOptions {
        let mut options = NotificationOptions::new();
        if let Some(body) = &self.body {
            options = options.with("body", body.as_str());
        }
        if let Some(tag) = &self.tag {
            options = options.with("tag", tag.as_str());
        }
        options
    }
}

/// Fetch command arguments.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// URL, absolute or relative to the configured origin
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,
}

/// Cache commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List cache buckets and what the current one holds
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Worker commands.
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Run the worker, posting each JSON message read from stdin
    Start,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<std::path::PathBuf>,
    },
}

/// Entry kind argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntryKindArg {
    /// A feeding
    Feeding,
    /// A dirty diaper
    Poop,
    /// A wet diaper
    Pee,
}

impl From<EntryKindArg> for EntryKind {
    fn from(arg: EntryKindArg) -> Self {
        match arg {
            EntryKindArg::Feeding => Self::Feeding,
            EntryKindArg::Poop => Self::Poop,
            EntryKindArg::Pee => Self::Pee,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output, in the stored log format
    Json,
}
