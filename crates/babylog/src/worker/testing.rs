//! Fakes for exercising the worker without a network or a display.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    CacheStorage, Network, Notification, NotificationOptions, Notifier, Platform,
    PrecacheEntry, PrecacheManifest, Request, Response, Result, SqliteCacheStorage,
    WindowRegistry, Worker, WorkerError,
};

/// Scripted [`Network`]. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Option<Response>>>,
    offline: AtomicBool,
    requests: Mutex<Vec<Request>>,
    origin: Mutex<Option<String>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `status` and `body`.
    pub(crate) fn route(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Some(Response::new(url, status, body)));
    }

    /// Fail requests for `url` at the network layer.
    pub(crate) fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), None);
    }

    /// Fail every request at the network layer.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Resolve root-relative paths against `origin`.
    pub(crate) fn set_origin(&self, origin: &str) {
        *self.origin.lock().unwrap() = Some(origin.trim_end_matches('/').to_string());
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(WorkerError::network("offline"));
        }
        match self.routes.lock().unwrap().get(&request.url) {
            Some(Some(response)) => Ok(response.clone()),
            Some(None) => Err(WorkerError::network(format!("{} unreachable", request.url))),
            None => Ok(Response::new(request.url.clone(), 404, "")),
        }
    }

    fn resolve(&self, url: &str) -> String {
        match self.origin.lock().unwrap().as_deref() {
            Some(origin) if url.starts_with('/') => format!("{origin}{url}"),
            _ => url.to_string(),
        }
    }
}

/// [`Notifier`] that records instead of displaying.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    next_id: AtomicU64,
    shown: Mutex<Vec<Notification>>,
    closed: Mutex<Vec<u64>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }

    pub(crate) fn closed(&self) -> Vec<u64> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<Notification> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WorkerError::notification("permission denied"));
        }
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            title: title.to_string(),
            options: options.clone(),
        };
        self.shown.lock().unwrap().push(notification.clone());
        Ok(notification)
    }

    async fn close(&self, notification: &Notification) -> Result<()> {
        self.closed.lock().unwrap().push(notification.id);
        Ok(())
    }
}

/// A platform built from fakes, with handles kept for inspection.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) network: Arc<FakeNetwork>,
    pub(crate) caches: Arc<SqliteCacheStorage>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) clients: Arc<WindowRegistry>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_clients(WindowRegistry::new())
    }

    pub(crate) fn with_clients(clients: WindowRegistry) -> Self {
        Self {
            network: Arc::new(FakeNetwork::new()),
            caches: Arc::new(SqliteCacheStorage::open_in_memory().unwrap()),
            notifier: Arc::new(RecordingNotifier::new()),
            clients: Arc::new(clients),
        }
    }

    pub(crate) fn platform(&self) -> Platform {
        Platform::new(
            self.network.clone(),
            self.caches.clone(),
            self.notifier.clone(),
            self.clients.clone(),
        )
    }

    pub(crate) fn worker(&self, version: &str, precache: &[&str]) -> Worker {
        Worker::new(version, &self.platform(), manifest(precache))
    }

    pub(crate) async fn bucket_names(&self) -> Vec<String> {
        self.caches.keys().await.unwrap()
    }
}

pub(crate) fn manifest(urls: &[&str]) -> PrecacheManifest {
    urls.iter().copied().map(PrecacheEntry::from).collect()
}
