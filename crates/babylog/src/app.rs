//! Application shell: the loaded log plus the optional background worker.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::entry::LogEntry;
use crate::error::{Error, Result};
use crate::storage::{load_entries, save_entries, EntryLoad, Storage};
use crate::worker::{self, Platform, PrecacheManifest, WorkerHandle};

/// The running application.
///
/// Holds the entry log in memory and writes the whole list back after every
/// change. Worker registration runs in the background; its outcome is only
/// logged.
#[derive(Debug)]
pub struct App {
    config: Config,
    storage: Storage,
    entries: Vec<LogEntry>,
    reset_reason: Option<String>,
    registration: Option<JoinHandle<Option<WorkerHandle>>>,
    worker: Option<WorkerHandle>,
}

impl App {
    /// Load the entry log and build the application.
    #[must_use]
    pub fn mount(config: Config, storage: Storage) -> Self {
        let (entries, reset_reason) = match load_entries(&storage) {
            EntryLoad::Empty => (Vec::new(), None),
            EntryLoad::Loaded(entries) => (entries, None),
            EntryLoad::Reset { reason } => {
                warn!(%reason, "Stored log was unreadable; starting empty");
                (Vec::new(), Some(reason))
            }
        };
        info!(entries = entries.len(), "Mounted app");

        Self {
            config,
            storage,
            entries,
            reset_reason,
            registration: None,
            worker: None,
        }
    }

    /// The configuration the app was mounted with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backing store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Why the stored log was discarded at mount, if it was.
    #[must_use]
    pub fn reset_reason(&self) -> Option<&str> {
        self.reset_reason.as_deref()
    }

    /// Append an entry and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be saved.
    pub fn add(&mut self, entry: LogEntry) -> Result<()> {
        self.entries.push(entry);
        if let Err(e) = self.save() {
            self.entries.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Remove the entry at 1-based `position` and save.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryOutOfRange`] if there is no such entry, or an
    /// error if the log cannot be saved.
    pub fn remove(&mut self, position: usize) -> Result<LogEntry> {
        if position == 0 || position > self.entries.len() {
            return Err(Error::EntryOutOfRange {
                position,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(position - 1);
        self.save()?;
        Ok(removed)
    }

    /// Remove every entry and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be saved.
    pub fn clear(&mut self) -> Result<usize> {
        let count = self.entries.len();
        self.entries.clear();
        self.save()?;
        Ok(count)
    }

    fn save(&self) -> Result<()> {
        save_entries(&self.storage, &self.entries)
    }

    /// Start registering the background worker.
    ///
    /// Returns immediately. Registration is skipped when the worker is
    /// disabled in config. Success is logged at info, failure at warn; neither
    /// is retried.
    pub fn register_worker(&mut self, platform: Platform) {
        if !self.config.worker.enabled {
            info!("Background worker disabled; skipping registration");
            return;
        }
        if self.registration.is_some() || self.worker.is_some() {
            debug!("Worker registration already started");
            return;
        }

        let config = self.config.worker.clone();
        self.registration = Some(tokio::spawn(async move {
            let registered = match PrecacheManifest::from_config(&config) {
                Ok(precache) => worker::register(&config, &platform, precache).await,
                Err(e) => Err(e),
            };
            match registered {
                Ok(handle) => {
                    info!(version = %handle.version(), "Worker registration succeeded");
                    Some(handle)
                }
                Err(e) => {
                    warn!(error = %e, "Worker registration failed");
                    None
                }
            }
        }));
    }

    /// Wait for registration and return the worker, if it came up.
    pub async fn worker(&mut self) -> Option<WorkerHandle> {
        if let Some(registration) = self.registration.take() {
            self.worker = registration.await.unwrap_or_else(|e| {
                warn!(error = %e, "Worker registration task failed");
                None
            });
        }
        self.worker.clone()
    }

    /// Like [`App::worker`], but an absent worker is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnavailable`] if the worker is disabled or
    /// failed to register.
    pub async fn require_worker(&mut self) -> Result<WorkerHandle> {
        self.worker().await.ok_or(Error::WorkerUnavailable)
    }

    /// Stop the worker, draining in-flight events and cache writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task failed.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(worker) = self.worker().await {
            worker.shutdown().await?;
        }
        Ok(())
    }
}

/// Open the configured store, mount the app and start worker registration.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub fn bootstrap(config: Config, platform: Platform) -> Result<App> {
    let storage = Storage::open(config.database_path())?;
    let mut app = App::mount(config, storage);
    app.register_worker(platform);
    Ok(app)
}
