//! Messages the page posts to the worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NotificationOptions;

/// Type tag of the notification request message.
pub const SEND_NOTIFICATION: &str = "SEND_NOTIFICATION";

/// A message the worker understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageMessage {
    /// Ask the worker to display a notification.
    #[serde(rename = "SEND_NOTIFICATION")]
    SendNotification {
        /// Notification title.
        title: String,
        /// Passed through to the notifier.
        #[serde(default)]
        options: NotificationOptions,
    },
}

impl PageMessage {
    /// Build a notification request.
    #[must_use]
    pub fn send_notification(title: impl Into<String>, options: NotificationOptions) -> Self {
        Self::SendNotification {
            title: title.into(),
            options,
        }
    }

    /// The message as posted on the wire.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse a posted message; `None` for unknown types and malformed payloads.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        PageMessage::deserialize(value).ok()
    }
}
