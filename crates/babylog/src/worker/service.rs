//! The worker itself: lifecycle and event handlers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use super::{
    Cache, CacheStorage, Client, Clients, MatchOptions, Network, Notification, Notifier,
    PageMessage, Platform, PrecacheManifest, Request, Response, Result, WorkerError, APP_URL,
};

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Created, not yet installed.
    Parsed,
    /// Precaching.
    Installing,
    /// Precached, waiting to activate.
    Installed,
    /// Pruning stale caches and claiming clients.
    Activating,
    /// Handling events.
    Activated,
    /// Install failed; the worker will never run.
    Redundant,
}

impl WorkerState {
    /// Lowercase name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    /// Number of URLs stored in the bucket.
    pub precached: usize,
}

/// Result of activation. Activation itself always completes.
#[derive(Debug, Default)]
pub struct ActivationReport {
    /// Stale buckets that were deleted, sorted by name.
    pub deleted: Vec<String>,
    /// Deletions or claims that failed.
    pub failures: Vec<WorkerError>,
    /// Number of clients claimed.
    pub claimed: usize,
}

impl ActivationReport {
    /// Whether every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What fetch interception produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the caller performs the request itself.
    Passthrough,
    /// Live response from the network.
    Network(Response),
    /// Network failed; response served from the cache.
    Cache(Response),
    /// Network failed and nothing was cached.
    Unavailable,
}

impl FetchOutcome {
    /// The response, if there is one.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Network(response) | Self::Cache(response) => Some(response),
            Self::Passthrough | Self::Unavailable => None,
        }
    }
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An existing app window was focused.
    Focused(Client),
    /// A new app window was opened.
    Opened(Option<Client>),
    /// Nothing could be focused or opened.
    Nothing,
}

/// A background worker bound to one cache version.
pub struct Worker {
    version: String,
    caches: Arc<dyn CacheStorage>,
    cache: Cache,
    network: Arc<dyn Network>,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
    precache: PrecacheManifest,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    cache_writes: Mutex<JoinSet<()>>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("version", &self.version)
            .field("state", &self.state())
            .field("precache", &self.precache.len())
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Create a worker for cache version `version`.
    #[must_use]
    pub fn new(version: impl Into<String>, platform: &Platform, precache: PrecacheManifest) -> Self {
        let version = version.into();
        Self {
            cache: Cache::new(Arc::clone(&platform.caches), version.clone()),
            version,
            caches: Arc::clone(&platform.caches),
            network: Arc::clone(&platform.network),
            notifier: Arc::clone(&platform.notifier),
            clients: Arc::clone(&platform.clients),
            precache,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            cache_writes: Mutex::new(JoinSet::new()),
        }
    }

    /// The cache version, which is also the bucket name.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The current bucket.
    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether install asked to activate without waiting.
    #[must_use]
    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        debug!(from = %previous, to = %next, "Worker state change");
        *state = next;
    }

    fn transition(&self, action: &'static str, from: WorkerState, to: WorkerState) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current = *state;
        if current != from {
            return Err(WorkerError::InvalidState {
                action,
                state: current,
            });
        }
        debug!(from = %current, to = %to, "Worker state change");
        *state = to;
        Ok(())
    }

    /// Fetch every precache URL and store them all in the current bucket.
    ///
    /// Fetches run concurrently. If any fails, or returns a non-2xx status,
    /// nothing is stored and the worker becomes [`WorkerState::Redundant`].
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidState`] unless the worker is freshly
    /// created, and [`WorkerError::Install`] with every failure otherwise.
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition("install", WorkerState::Parsed, WorkerState::Installing)?;
        info!(version = %self.version, "Installing worker");

        let mut urls: Vec<String> = Vec::new();
        for url in self.precache.urls() {
            let url = self.network.resolve(&url);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        let mut fetches = JoinSet::new();
        for (index, url) in urls.into_iter().enumerate() {
            let network = Arc::clone(&self.network);
            fetches.spawn(async move {
                let request = Request::get(url);
                let result = match network.fetch(&request).await {
                    Ok(response) if response.is_success() => Ok(response),
                    Ok(response) => Err(WorkerError::PrecacheStatus {
                        url: request.url.clone(),
                        status: response.status,
                    }),
                    Err(e) => Err(e),
                };
                (index, request, result)
            });
        }

        let mut fetched = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, request, Ok(response))) => fetched.push((index, request, response)),
                Ok((_, request, Err(e))) => {
                    warn!(url = %request.url, error = %e, "Precache request failed");
                    failures.push(e);
                }
                Err(e) => failures.push(WorkerError::Task(e.to_string())),
            }
        }

        if failures.is_empty() {
            fetched.sort_by_key(|(index, _, _)| *index);
            let entries: Vec<(Request, Response)> = fetched
                .into_iter()
                .map(|(_, request, response)| (request, response))
                .collect();
            match self.cache.add_all(&entries).await {
                Ok(()) => {
                    self.set_state(WorkerState::Installed);
                    self.skip_waiting.store(true, Ordering::SeqCst);
                    info!(version = %self.version, precached = entries.len(), "Worker installed");
                    return Ok(InstallReport {
                        precached: entries.len(),
                    });
                }
                Err(e) => failures.push(e),
            }
        }

        self.set_state(WorkerState::Redundant);
        let err = WorkerError::Install(failures);
        warn!(version = %self.version, error = %err, "Worker install failed");
        Err(err)
    }

    /// Delete every bucket other than the current one, then claim open clients.
    ///
    /// Deletions run concurrently and are all awaited before clients are
    /// claimed. Failures are collected in the report.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidState`] unless the worker is installed.
    pub async fn activate(&self) -> Result<ActivationReport> {
        self.transition("activate", WorkerState::Installed, WorkerState::Activating)?;
        Ok(self.finish_activation().await)
    }

    /// Mark an already-installed version as active without reinstalling.
    ///
    /// Stale buckets are pruned and clients claimed exactly as in
    /// [`Worker::activate`], so an activation that was interrupted, or whose
    /// deletions failed, completes on the next start.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidState`] unless the worker is freshly created.
    pub async fn resume(&self) -> Result<ActivationReport> {
        self.transition("resume", WorkerState::Parsed, WorkerState::Activating)?;
        info!(version = %self.version, "Resuming installed worker");
        Ok(self.finish_activation().await)
    }

    async fn finish_activation(&self) -> ActivationReport {
        let mut report = ActivationReport::default();

        let names = match self.caches.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list caches");
                report.failures.push(e);
                Vec::new()
            }
        };

        let mut deletions = JoinSet::new();
        for name in names.into_iter().filter(|name| *name != self.version) {
            let caches = Arc::clone(&self.caches);
            deletions.spawn(async move {
                let result = caches.delete(&name).await;
                (name, result)
            });
        }

        while let Some(joined) = deletions.join_next().await {
            match joined {
                Ok((name, Ok(true))) => {
                    info!(bucket = %name, "Deleted stale cache");
                    report.deleted.push(name);
                }
                Ok((_, Ok(false))) => {}
                Ok((name, Err(e))) => {
                    warn!(bucket = %name, error = %e, "Failed to delete stale cache");
                    report.failures.push(e);
                }
                Err(e) => report.failures.push(WorkerError::Task(e.to_string())),
            }
        }
        report.deleted.sort();

        match self.clients.claim().await {
            Ok(claimed) => report.claimed = claimed,
            Err(e) => {
                warn!(error = %e, "Failed to claim clients");
                report.failures.push(e);
            }
        }

        self.set_state(WorkerState::Activated);
        info!(
            version = %self.version,
            deleted = report.deleted.len(),
            claimed = report.claimed,
            "Worker activated"
        );
        report
    }

    /// Intercept a request: network first, falling back to the cache.
    ///
    /// Only GET requests are intercepted, and only once the worker is active.
    /// A live 200 response is written to the cache in the background.
    pub async fn handle_fetch(&self, request: Request) -> FetchOutcome {
        if !request.is_get() {
            trace!(method = %request.method, url = %request.url, "Passing through");
            return FetchOutcome::Passthrough;
        }
        if self.state() != WorkerState::Activated {
            trace!(url = %request.url, state = %self.state(), "Worker not active, passing through");
            return FetchOutcome::Passthrough;
        }

        let request = Request::new(request.method, self.network.resolve(&request.url));
        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.spawn_cache_write(request, response.clone()).await;
                }
                FetchOutcome::Network(response)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                match self.cache.match_request(&request).await {
                    Ok(Some(cached)) => FetchOutcome::Cache(cached),
                    Ok(None) => FetchOutcome::Unavailable,
                    Err(e) => {
                        warn!(url = %request.url, error = %e, "Cache lookup failed");
                        FetchOutcome::Unavailable
                    }
                }
            }
        }
    }

    async fn spawn_cache_write(&self, request: Request, response: Response) {
        let cache = self.cache.clone();
        let mut writes = self.cache_writes.lock().await;
        while let Some(done) = writes.try_join_next() {
            if let Err(e) = done {
                warn!(error = %e, "Cache write task failed");
            }
        }
        writes.spawn(async move {
            if let Err(e) = cache.put(&request, &response).await {
                warn!(url = %request.url, error = %e, "Cache write failed");
            }
        });
    }

    /// Wait for every background cache write to finish.
    pub async fn settle_cache_writes(&self) {
        let mut writes = self.cache_writes.lock().await;
        while let Some(done) = writes.join_next().await {
            if let Err(e) = done {
                warn!(error = %e, "Cache write task failed");
            }
        }
    }

    /// Handle a message posted by the page.
    ///
    /// Returns the notification shown, if any. Unknown messages are ignored.
    pub async fn handle_message(&self, value: &Value) -> Option<Notification> {
        let Some(message) = PageMessage::from_value(value) else {
            debug!(message = %value, "Ignoring unrecognized message");
            return None;
        };

        match message {
            PageMessage::SendNotification { title, options } => {
                match self.notifier.show(&title, &options).await {
                    Ok(notification) => Some(notification),
                    Err(e) => {
                        warn!(title = %title, error = %e, "Failed to show notification");
                        None
                    }
                }
            }
        }
    }

    /// Close a clicked notification and bring the app forward.
    ///
    /// Focuses a window already showing the app if there is one, otherwise
    /// opens a new one when the platform allows it.
    pub async fn handle_notification_click(&self, notification: &Notification) -> ClickOutcome {
        info!(tag = notification.tag().unwrap_or_default(), "Notification clicked");
        if let Err(e) = self.notifier.close(notification).await {
            warn!(error = %e, "Failed to close notification");
        }

        let windows = match self
            .clients
            .match_all(MatchOptions::windows().include_uncontrolled())
            .await
        {
            Ok(windows) => windows,
            Err(e) => {
                warn!(error = %e, "Failed to list windows");
                Vec::new()
            }
        };

        if let Some(window) = windows.iter().find(|c| c.url == APP_URL && c.focusable) {
            return match self.clients.focus(window.id).await {
                Ok(client) => ClickOutcome::Focused(client),
                Err(e) => {
                    warn!(id = window.id, error = %e, "Failed to focus window");
                    ClickOutcome::Nothing
                }
            };
        }

        if !self.clients.can_open_window() {
            return ClickOutcome::Nothing;
        }
        match self.clients.open_window(APP_URL).await {
            Ok(client) => ClickOutcome::Opened(client),
            Err(e) => {
                warn!(error = %e, "Failed to open window");
                ClickOutcome::Nothing
            }
        }
    }

    /// Note that a notification was dismissed.
    pub fn handle_notification_close(&self, notification: &Notification) {
        info!(tag = notification.tag().unwrap_or_default(), "Notification closed");
    }
}
