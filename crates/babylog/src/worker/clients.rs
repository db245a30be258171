//! Open app windows the worker can find, focus and open.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{Result, WorkerError};

/// What kind of context a client is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// A page in a window.
    Window,
    /// Another worker.
    Worker,
}

/// A context attached to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Platform-assigned identifier.
    pub id: u64,
    /// The URL the client is showing.
    pub url: String,
    /// What kind of client this is.
    pub kind: ClientKind,
    /// Whether the client can be focused.
    pub focusable: bool,
    /// Whether the worker controls the client.
    pub controlled: bool,
    /// Whether the client currently has focus.
    pub focused: bool,
}

/// Filter for [`Clients::match_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Only return clients of this kind.
    pub kind: Option<ClientKind>,
    /// Include clients the worker does not control.
    pub include_uncontrolled: bool,
}

impl MatchOptions {
    /// Match window clients only.
    #[must_use]
    pub fn windows() -> Self {
        Self {
            kind: Some(ClientKind::Window),
            include_uncontrolled: false,
        }
    }

    /// Also match uncontrolled clients.
    #[must_use]
    pub fn include_uncontrolled(mut self) -> Self {
        self.include_uncontrolled = true;
        self
    }

    fn matches(&self, client: &Client) -> bool {
        self.kind.map_or(true, |kind| client.kind == kind)
            && (self.include_uncontrolled || client.controlled)
    }
}

/// The set of clients attached to the app.
#[async_trait]
pub trait Clients: Send + Sync + fmt::Debug {
    /// List clients matching `options`.
    async fn match_all(&self, options: MatchOptions) -> Result<Vec<Client>>;

    /// Focus the client with the given id.
    async fn focus(&self, id: u64) -> Result<Client>;

    /// Whether new windows can be opened.
    fn can_open_window(&self) -> bool;

    /// Open a new window at `url`.
    ///
    /// `None` means the window opened but is not visible to the worker.
    async fn open_window(&self, url: &str) -> Result<Option<Client>>;

    /// Take control of every uncontrolled client. Returns how many were claimed.
    async fn claim(&self) -> Result<usize>;
}

/// In-process [`Clients`] that tracks windows the CLI knows about.
#[derive(Debug)]
pub struct WindowRegistry {
    windows: Mutex<Vec<Client>>,
    next_id: AtomicU64,
    can_open: bool,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowRegistry {
    /// An empty registry that can open windows.
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            can_open: true,
        }
    }

    /// An empty registry that cannot open windows.
    #[must_use]
    pub fn without_window_opening() -> Self {
        Self {
            can_open: false,
            ..Self::new()
        }
    }

    /// Register an uncontrolled window at `url`.
    pub fn add_window(&self, url: impl Into<String>, focusable: bool) -> Client {
        let client = Client {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            url: url.into(),
            kind: ClientKind::Window,
            focusable,
            controlled: false,
            focused: false,
        };
        if let Ok(mut windows) = self.windows.lock() {
            windows.push(client.clone());
        }
        client
    }

    /// Snapshot of every registered window.
    #[must_use]
    pub fn windows(&self) -> Vec<Client> {
        self.windows
            .lock()
            .map(|windows| windows.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Client>>> {
        self.windows
            .lock()
            .map_err(|_| WorkerError::client("window registry lock poisoned"))
    }
}

#[async_trait]
impl Clients for WindowRegistry {
    async fn match_all(&self, options: MatchOptions) -> Result<Vec<Client>> {
        let windows = self.lock()?;
        Ok(windows.iter().filter(|c| options.matches(c)).cloned().collect())
    }

    async fn focus(&self, id: u64) -> Result<Client> {
        let mut windows = self.lock()?;
        if !windows.iter().any(|c| c.id == id && c.focusable) {
            return Err(WorkerError::client(format!("window {id} cannot be focused")));
        }

        let mut focused = None;
        for client in windows.iter_mut() {
            client.focused = client.id == id;
            if client.focused {
                focused = Some(client.clone());
            }
        }
        debug!(id, "Focused window");
        focused.ok_or_else(|| WorkerError::client(format!("window {id} not found")))
    }

    fn can_open_window(&self) -> bool {
        self.can_open
    }

    async fn open_window(&self, url: &str) -> Result<Option<Client>> {
        if !self.can_open {
            return Err(WorkerError::client("opening windows is not supported"));
        }

        let client = Client {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            url: url.to_string(),
            kind: ClientKind::Window,
            focusable: true,
            controlled: true,
            focused: true,
        };
        let mut windows = self.lock()?;
        for other in windows.iter_mut() {
            other.focused = false;
        }
        windows.push(client.clone());
        debug!(id = client.id, url, "Opened window");
        Ok(Some(client))
    }

    async fn claim(&self) -> Result<usize> {
        let mut windows = self.lock()?;
        let mut claimed = 0;
        for client in windows.iter_mut().filter(|c| !c.controlled) {
            client.controlled = true;
            claimed += 1;
        }
        Ok(claimed)
    }
}
