//! Background worker: offline cache and notification delivery.
//!
//! The worker runs as its own tokio task and is reached only through a
//! [`WorkerHandle`]. It owns one versioned cache bucket, intercepts GET
//! requests (network first, cache as fallback), shows notifications when the
//! front end asks for one, and focuses or opens the app when a notification
//! is clicked.
//!
//! Everything the worker talks to is injected through a [`Platform`]:
//!
//! - [`Network`] performs requests ([`HttpNetwork`] in production).
//! - [`CacheStorage`] holds named buckets ([`SqliteCacheStorage`]).
//! - [`Notifier`] displays notifications ([`ConsoleNotifier`]).
//! - [`Clients`] lists and opens app windows ([`WindowRegistry`]).
//!
//! # Lifecycle
//!
//! ```text
//! Parsed ──install──▶ Installing ──▶ Installed ──activate──▶ Activating ──▶ Activated
//!                         │
//!                         └──(precache failed)──▶ Redundant
//! ```
//!
//! [`register`] drives a new worker through install and activation, or
//! resumes it directly when its cache bucket already exists.

mod cache;
mod clients;
mod handle;
mod http;
mod message;
mod notify;
mod precache;
mod registration;
mod service;

use std::sync::Arc;

use thiserror::Error;

pub use cache::{Cache, CacheStorage, CachedEntry, SqliteCacheStorage};
pub use clients::{Client, ClientKind, Clients, MatchOptions, WindowRegistry};
pub use handle::WorkerHandle;
pub use http::{HttpNetwork, Method, Network, Request, Response};
pub use message::{PageMessage, SEND_NOTIFICATION};
pub use notify::{ConsoleNotifier, Notification, NotificationOptions, Notifier};
pub use precache::{PrecacheEntry, PrecacheManifest};
pub use registration::register;
pub use service::{ActivationReport, ClickOutcome, FetchOutcome, InstallReport, Worker, WorkerState};

use crate::config::Config;

/// The app's page URL; what a notification click focuses or opens.
pub const APP_URL: &str = "/";

/// Errors raised by the worker and its platform.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A network request failed before a response was received.
    #[error("network request failed: {0}")]
    Network(String),

    /// A cache storage operation failed.
    #[error("cache operation failed: {0}")]
    Cache(String),

    /// Displaying or closing a notification failed.
    #[error("notification failed: {0}")]
    Notification(String),

    /// Listing, focusing or opening a client failed.
    #[error("client operation failed: {0}")]
    Client(String),

    /// A precache request returned a non-success status.
    #[error("precache request for {url} returned status {status}")]
    PrecacheStatus {
        /// The precached URL.
        url: String,
        /// The status that was returned.
        status: u16,
    },

    /// Installation failed; nothing was cached.
    #[error("install failed: {} precache request(s) failed", .0.len())]
    Install(Vec<WorkerError>),

    /// The precache manifest could not be read.
    #[error("invalid precache manifest: {0}")]
    Manifest(String),

    /// A lifecycle step was attempted from the wrong state.
    #[error("cannot {action} a worker that is {state}")]
    InvalidState {
        /// The attempted step.
        action: &'static str,
        /// The state the worker was in.
        state: WorkerState,
    },

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Task(String),

    /// The worker task has stopped.
    #[error("worker is not running")]
    NotRunning,
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

impl WorkerError {
    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a cache error.
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    /// Create a notification error.
    #[must_use]
    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification(message.into())
    }

    /// Create a client error.
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }
}

impl From<rusqlite::Error> for WorkerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

/// The services a worker is given at construction.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Performs network requests.
    pub network: Arc<dyn Network>,
    /// Holds the named cache buckets.
    pub caches: Arc<dyn CacheStorage>,
    /// Displays notifications.
    pub notifier: Arc<dyn Notifier>,
    /// Lists and opens app windows.
    pub clients: Arc<dyn Clients>,
}

impl Platform {
    /// Assemble a platform from its parts.
    #[must_use]
    pub fn new(
        network: Arc<dyn Network>,
        caches: Arc<dyn CacheStorage>,
        notifier: Arc<dyn Notifier>,
        clients: Arc<dyn Clients>,
    ) -> Self {
        Self {
            network,
            caches,
            notifier,
            clients,
        }
    }

    /// Build the production platform described by `config`, with notifications
    /// printed to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the cache database cannot be created.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Self::with_notifier(config, Arc::new(ConsoleNotifier::stdout()))
    }

    /// Build the production platform described by `config` with a given notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the cache database cannot be created.
    pub fn with_notifier(config: &Config, notifier: Arc<dyn Notifier>) -> crate::Result<Self> {
        let network = HttpNetwork::new(&config.worker.origin, config.request_timeout())?;
        let caches = SqliteCacheStorage::open(config.database_path())?;
        Ok(Self::new(
            Arc::new(network),
            Arc::new(caches),
            notifier,
            Arc::new(WindowRegistry::new()),
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            WorkerError::network("refused").to_string(),
            "network request failed: refused"
        );
        assert_eq!(WorkerError::NotRunning.to_string(), "worker is not running");
    }

    #[test]
    fn test_install_error_counts_failures() {
        let err = WorkerError::Install(vec![
            WorkerError::network("a"),
            WorkerError::PrecacheStatus {
                url: "/b".to_string(),
                status: 404,
            },
        ]);
        assert_eq!(err.to_string(), "install failed: 2 precache request(s) failed");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = WorkerError::InvalidState {
            action: "activate",
            state: WorkerState::Redundant,
        };
        assert_eq!(err.to_string(), "cannot activate a worker that is redundant");
    }

    #[test]
    fn test_precache_status_display() {
        let err = WorkerError::PrecacheStatus {
            url: "/index.html".to_string(),
            status: 500,
        };
        let msg = err.to_string();
        assert!(msg.contains("/index.html"));
        assert!(msg.contains("500"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: WorkerError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, WorkerError::Cache(_)));
    }
}
