//! `SQLite` schema definitions for babylog.
//!
//! One database file holds both the page-side key-value store and the
//! worker's cache buckets; the two sides never touch each other's tables.

/// SQL statement to create the key-value table backing [`Storage`](super::Storage).
pub const CREATE_KV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the table of named cache buckets.
pub const CREATE_CACHE_BUCKETS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS cache_buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the table of cached responses.
///
/// At most one response per URL per bucket.
pub const CREATE_CACHE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS cache_entries (
    bucket TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    body_hash TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (bucket, url)
)
";

/// SQL statement to create an index on the bucket column for whole-bucket deletes.
pub const CREATE_CACHE_BUCKET_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_cache_entries_bucket ON cache_entries(bucket)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_KV_TABLE,
    CREATE_CACHE_BUCKETS_TABLE,
    CREATE_CACHE_ENTRIES_TABLE,
    CREATE_CACHE_BUCKET_INDEX,
    CREATE_METADATA_TABLE,
];
