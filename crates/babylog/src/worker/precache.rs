//! The list of URLs cached at install time.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Result, WorkerError};
use crate::config::WorkerConfig;

/// One manifest entry: a bare URL or an object with a `url` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrecacheEntry {
    /// A bare URL.
    Url(String),
    /// A URL with build metadata.
    Entry {
        /// The URL to precache.
        url: String,
        /// Content revision, unused beyond being accepted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
}

impl PrecacheEntry {
    /// The URL to precache.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::Entry { url, .. } => url,
        }
    }
}

impl From<&str> for PrecacheEntry {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

/// An ordered precache manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecacheManifest(Vec<PrecacheEntry>);

impl PrecacheManifest {
    /// Build a manifest from entries.
    #[must_use]
    pub fn new(entries: Vec<PrecacheEntry>) -> Self {
        Self(entries)
    }

    /// Parse a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Manifest`] if the JSON is not a list of entries.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| WorkerError::Manifest(e.to_string()))
    }

    /// Read a JSON manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Manifest`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| WorkerError::Manifest(format!("{}: {e}", path.display())))?;
        let manifest = Self::from_json(&json)?;
        debug!(path = %path.display(), count = manifest.len(), "Loaded precache manifest");
        Ok(manifest)
    }

    /// The manifest configured for the worker: the inline list followed by the
    /// manifest file, if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Manifest`] if the manifest file is unreadable.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let mut manifest = Self(
            config
                .precache
                .iter()
                .map(|url| PrecacheEntry::Url(url.clone()))
                .collect(),
        );
        if let Some(path) = &config.precache_manifest {
            manifest.extend(Self::load(path)?);
        }
        Ok(manifest)
    }

    /// Append another manifest.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Unique URLs in first-seen order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .map(PrecacheEntry::url)
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect()
    }

    /// Number of entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PrecacheEntry> for PrecacheManifest {
    fn from_iter<I: IntoIterator<Item = PrecacheEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
