//! The entry log, stored as one serialized block.
//!
//! The whole list lives under [`STORAGE_KEY`] and is overwritten on every
//! save. There is no merging and no partial write: the last writer wins.

use tracing::{debug, error};

use crate::entry::LogEntry;
use crate::error::Result;

use super::Storage;

/// The key the entry log is stored under.
pub const STORAGE_KEY: &str = "babyLog";

/// Outcome of reading the entry log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLoad {
    /// Nothing has been stored yet.
    Empty,
    /// The stored log was read successfully.
    Loaded(Vec<LogEntry>),
    /// The stored log could not be read and was treated as empty.
    Reset {
        /// Why the stored value was discarded.
        reason: String,
    },
}

impl EntryLoad {
    /// The loaded entries; empty for [`EntryLoad::Empty`] and [`EntryLoad::Reset`].
    #[must_use]
    pub fn into_entries(self) -> Vec<LogEntry> {
        match self {
            Self::Loaded(entries) => entries,
            Self::Empty | Self::Reset { .. } => Vec::new(),
        }
    }

    /// Whether the stored value was discarded.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }
}

/// Read the entry log.
///
/// Never fails: an unreadable or unparseable log is logged and reported as
/// [`EntryLoad::Reset`].
#[must_use]
pub fn load_entries(storage: &Storage) -> EntryLoad {
    let saved = match storage.get_item(STORAGE_KEY) {
        Ok(Some(saved)) => saved,
        Ok(None) => return EntryLoad::Empty,
        Err(e) => {
            error!(error = %e, "Failed to load entries");
            return EntryLoad::Reset {
                reason: e.to_string(),
            };
        }
    };

    match serde_json::from_str::<Vec<LogEntry>>(&saved) {
        Ok(entries) => {
            debug!(count = entries.len(), "Loaded entries");
            EntryLoad::Loaded(entries)
        }
        Err(e) => {
            error!(error = %e, "Failed to load entries");
            EntryLoad::Reset {
                reason: e.to_string(),
            }
        }
    }
}

/// Overwrite the stored entry log with `entries`.
///
/// # Errors
///
/// Returns an error if serialization or the storage write fails.
pub fn save_entries(storage: &Storage, entries: &[LogEntry]) -> Result<()> {
    let serialized = serde_json::to_string(entries)?;
    storage.set_item(STORAGE_KEY, &serialized)?;
    debug!(count = entries.len(), "Saved entries");
    Ok(())
}
