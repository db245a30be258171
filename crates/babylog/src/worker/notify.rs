//! Notification display.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Result, WorkerError};

/// Options passed through to the notifier untouched.
///
/// Only `tag` (used in log lines) and `body` (rendered by
/// [`ConsoleNotifier`]) are ever read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationOptions(Map<String, Value>);

impl NotificationOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Read an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The notification tag, if set to a string.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.get("tag").and_then(Value::as_str)
    }

    /// The notification body, if set to a string.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.get("body").and_then(Value::as_str)
    }

    /// Whether no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for NotificationOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A notification that has been shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notifier-assigned identifier.
    pub id: u64,
    /// The title it was shown with.
    pub title: String,
    /// The options it was shown with.
    pub options: NotificationOptions,
}

impl Notification {
    /// The notification tag, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.options.tag()
    }
}

/// Something that can display notifications.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Display a notification.
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<Notification>;

    /// Dismiss a displayed notification.
    async fn close(&self, notification: &Notification) -> Result<()>;
}

/// [`Notifier`] that prints notifications to a terminal.
pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
    next_id: AtomicU64,
    displayed: Mutex<Vec<Notification>>,
}

impl fmt::Debug for ConsoleNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleNotifier")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl ConsoleNotifier {
    /// Print notifications to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// Print notifications to the given writer.
    #[must_use]
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            next_id: AtomicU64::new(1),
            displayed: Mutex::new(Vec::new()),
        }
    }

    /// Notifications currently displayed, oldest first.
    #[must_use]
    pub fn displayed(&self) -> Vec<Notification> {
        self.displayed
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }

    /// The most recently displayed notification still open.
    #[must_use]
    pub fn last_displayed(&self) -> Option<Notification> {
        self.displayed().pop()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<Notification> {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            title: title.to_string(),
            options: options.clone(),
        };

        {
            let mut out = self
                .out
                .lock()
                .map_err(|_| WorkerError::notification("output lock poisoned"))?;
            writeln!(out, "🔔 {title}").map_err(|e| WorkerError::notification(e.to_string()))?;
            if let Some(body) = options.body() {
                writeln!(out, "   {body}").map_err(|e| WorkerError::notification(e.to_string()))?;
            }
            out.flush()
                .map_err(|e| WorkerError::notification(e.to_string()))?;
        }

        if let Ok(mut shown) = self.displayed.lock() {
            shown.push(notification.clone());
        }
        info!(id = notification.id, title, "Displayed notification");
        Ok(notification)
    }

    async fn close(&self, notification: &Notification) -> Result<()> {
        let mut shown = self
            .displayed
            .lock()
            .map_err(|_| WorkerError::notification("notification list lock poisoned"))?;
        shown.retain(|n| n.id != notification.id);
        debug!(id = notification.id, "Closed notification");
        Ok(())
    }
}
