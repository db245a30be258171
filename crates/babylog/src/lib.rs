//! `babylog` - A newborn care log with an offline cache and notification worker
//!
//! This library keeps a local log of feedings and diaper changes, formats it
//! for display, and runs a background worker that caches app responses for
//! offline use and shows notifications on request.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod format;
pub mod logging;
pub mod storage;
pub mod worker;

pub use app::{bootstrap, App};
pub use config::Config;
pub use entry::{EntryKind, LogEntry};
pub use error::{Error, Result};
pub use format::{format_duration, format_entry, format_time, icon};
pub use logging::init_logging;
pub use storage::{load_entries, save_entries, EntryLoad, Storage, StorageStats};
pub use worker::{register, Platform, WorkerHandle};
