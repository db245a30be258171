//! Error types for babylog.
//!
//! This module defines the crate-wide error type used by the storage layer,
//! configuration and application shell. The background worker carries its
//! own [`WorkerError`](crate::worker::WorkerError), which converts into
//! [`Error`] when it crosses into the application.

use std::path::PathBuf;
use thiserror::Error;

use crate::worker::WorkerError;

/// The main error type for babylog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Log Errors ===
    /// A log position does not refer to an existing entry.
    #[error("no entry at position {position} (log has {len} entries)")]
    EntryOutOfRange {
        /// The requested 1-based position.
        position: usize,
        /// Number of entries in the log.
        len: usize,
    },

    /// An entry kind or timestamp given on the command line was not understood.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    // === Worker Errors ===
    /// The background worker failed.
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// The background worker is not available (disabled or failed to register).
    #[error("background worker is not available")]
    WorkerUnavailable,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for babylog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new invalid entry error.
    #[must_use]
    pub fn invalid_entry(message: impl Into<String>) -> Self {
        Self::InvalidEntry(message.into())
    }

    /// Check if this error means the worker could not be reached.
    #[must_use]
    pub fn is_worker_unavailable(&self) -> bool {
        matches!(
            self,
            Self::WorkerUnavailable | Self::Worker(WorkerError::NotRunning)
        )
    }
}
