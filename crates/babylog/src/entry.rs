//! Log entry types for babylog.
//!
//! A [`LogEntry`] records one care event. The serialized shape is shared with
//! the stored log (`{"type", "timestamp", "durationSeconds"}`), so field names
//! and the millisecond timestamp encoding must not change.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The kind of care event an entry records.
///
/// Tags outside the known set are kept verbatim in [`EntryKind::Other`] so a
/// log written by a newer version survives a load/save cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    /// A feeding, optionally timed.
    Feeding,
    /// A dirty diaper.
    Poop,
    /// A wet diaper.
    Pee,
    /// Any tag this version does not recognise.
    Other(String),
}

impl EntryKind {
    /// The tag used in the stored log.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Feeding => "feeding",
            Self::Poop => "poop",
            Self::Pee => "pee",
            Self::Other(tag) => tag,
        }
    }

    /// A capitalised label for display.
    #[must_use]
    pub fn label(&self) -> String {
        let tag = self.as_tag();
        let mut chars = tag.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => "Unknown".to_string(),
        }
    }

    /// Whether this kind can carry a duration.
    #[must_use]
    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Feeding)
    }
}

impl From<String> for EntryKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "feeding" => Self::Feeding,
            "poop" => Self::Poop,
            "pee" => Self::Pee,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for EntryKind {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Other(tag) => tag,
            known => known.as_tag().to_string(),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A single care event.
///
/// Entries have no identity beyond their position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// When it happened, stored as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// How long a feeding lasted, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
}

impl LogEntry {
    /// Create an entry of the given kind, timestamped now.
    #[must_use]
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now().trunc_subsecs(3),
            duration_seconds: None,
        }
    }

    /// Create a feeding entry, timestamped now.
    #[must_use]
    pub fn feeding(duration_seconds: Option<u64>) -> Self {
        Self {
            duration_seconds,
            ..Self::new(EntryKind::Feeding)
        }
    }

    /// Replace the timestamp.
    ///
    /// Timestamps are stored in whole milliseconds, so anything finer is
    /// dropped here rather than on the way through storage.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(3);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_entries_have_millisecond_timestamps() {
        let entry = LogEntry::new(EntryKind::Pee);
        assert_eq!(entry.timestamp.timestamp_subsec_nanos() % 1_000_000, 0);

        let json = serde_json::to_string(&entry).unwrap();
        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_at_drops_sub_millisecond_precision() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let entry = LogEntry::new(EntryKind::Poop).at(precise);
        assert_eq!(entry.timestamp, Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
    }

    #[test]
    fn test_entry_kind_from_tag() {
        assert_eq!(EntryKind::from("feeding"), EntryKind::Feeding);
        assert_eq!(EntryKind::from("poop"), EntryKind::Poop);
        assert_eq!(EntryKind::from("pee"), EntryKind::Pee);
        assert_eq!(EntryKind::from("nap"), EntryKind::Other("nap".to_string()));
    }

    #[test]
    fn test_entry_kind_tags_are_case_sensitive() {
        assert_eq!(
            EntryKind::from("Feeding"),
            EntryKind::Other("Feeding".to_string())
        );
    }

    #[test]
    fn test_entry_kind_display() {
        assert_eq!(EntryKind::Feeding.to_string(), "feeding");
        assert_eq!(EntryKind::Other("bath".to_string()).to_string(), "bath");
    }

    #[test]
    fn test_entry_kind_label() {
        assert_eq!(EntryKind::Feeding.label(), "Feeding");
        assert_eq!(EntryKind::Pee.label(), "Pee");
        assert_eq!(EntryKind::Other(String::new()).label(), "Unknown");
    }

    #[test]
    fn test_only_feeding_is_timed() {
        assert!(EntryKind::Feeding.is_timed());
        assert!(!EntryKind::Poop.is_timed());
        assert!(!EntryKind::Other("nap".to_string()).is_timed());
    }

    #[test]
    fn test_serialized_shape() {
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let entry = LogEntry::feeding(Some(90)).at(timestamp);
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "type": "feeding",
                "timestamp": 1_700_000_000_123_i64,
                "durationSeconds": 90
            })
        );
    }

    #[test]
    fn test_duration_omitted_when_absent() {
        let entry = LogEntry::new(EntryKind::Pee);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("durationSeconds"));
    }

    #[test]
    fn test_unknown_kind_survives_serialization() {
        let json = r#"{"type":"bath","timestamp":1700000000000}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, EntryKind::Other("bath".to_string()));

        let back = serde_json::to_string(&entry).unwrap();
        assert!(back.contains(r#""type":"bath""#));
    }

    #[test]
    fn test_feeding_constructor() {
        let entry = LogEntry::feeding(Some(300));
        assert_eq!(entry.kind, EntryKind::Feeding);
        assert_eq!(entry.duration_seconds, Some(300));
    }
}
