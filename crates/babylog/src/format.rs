//! Display helpers for log entries.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::entry::{EntryKind, LogEntry};

/// Long-form date followed by a 12-hour clock time.
const TIME_FORMAT: &str = "%B %-d, %Y %I:%M %p";

/// Render an instant in the local time zone, e.g. `October 19, 2026 09:15 AM`.
#[must_use]
pub fn format_time(timestamp: DateTime<Utc>) -> String {
    format_time_in(timestamp, &Local)
}

/// Render an instant in the given time zone.
#[must_use]
pub fn format_time_in<Tz>(timestamp: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.with_timezone(tz).format(TIME_FORMAT).to_string()
}

/// Render a duration as `45s` or `1m 30s`.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let mins = seconds / 60;
    let secs = seconds % 60;
    if mins == 0 {
        format!("{secs}s")
    } else {
        format!("{mins}m {secs}s")
    }
}

/// Icon for an entry kind. Unknown kinds get a placeholder.
#[must_use]
pub fn icon(kind: &EntryKind) -> &'static str {
    match kind {
        EntryKind::Feeding => "🍼",
        EntryKind::Poop => "💩",
        EntryKind::Pee => "💧",
        EntryKind::Other(_) => "❓",
    }
}

/// Icon for a raw tag.
#[must_use]
pub fn icon_for_tag(tag: &str) -> &'static str {
    icon(&EntryKind::from(tag))
}

/// One display line for an entry, using local time.
#[must_use]
pub fn format_entry(entry: &LogEntry) -> String {
    format_entry_in(entry, &Local)
}

/// One display line for an entry in the given time zone.
#[must_use]
pub fn format_entry_in<Tz>(entry: &LogEntry, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut line = format!(
        "{} {}  {}",
        icon(&entry.kind),
        entry.kind.label(),
        format_time_in(entry.timestamp, tz)
    );
    if entry.kind.is_timed() {
        if let Some(seconds) = entry.duration_seconds {
            line.push_str(&format!("  ({})", format_duration(seconds)));
        }
    }
    line
}
