//! Named cache buckets of responses.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, trace};

use super::http::{Request, Response};
use super::{Result, WorkerError};
use crate::storage::{open_connection, open_memory_connection, MEMORY_PATH};

/// Summary of one cached response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// The request URL the response is stored under.
    pub url: String,
    /// The stored status.
    pub status: u16,
    /// Body size in bytes.
    pub size: u64,
    /// BLAKE3 hex digest of the body.
    pub body_hash: String,
    /// When the response was last written.
    pub stored_at: DateTime<Utc>,
}

/// Storage for named cache buckets.
///
/// Each bucket maps a request URL to the last response stored for it. Only
/// GET requests ever match.
#[async_trait]
pub trait CacheStorage: Send + Sync + fmt::Debug {
    /// Create the bucket if it does not exist.
    async fn open(&self, name: &str) -> Result<()>;

    /// Whether a bucket exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Names of all buckets.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete a bucket and everything in it. Returns `false` if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Store one response, creating the bucket if needed.
    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<()>;

    /// Store a set of responses atomically, creating the bucket if needed.
    /// Either all are stored or none are.
    async fn put_all(&self, name: &str, entries: &[(Request, Response)]) -> Result<()>;

    /// Look up the response stored for `request`.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>>;

    /// Summaries of everything in a bucket, by URL.
    async fn entries(&self, name: &str) -> Result<Vec<CachedEntry>>;
}

/// Handle on one bucket of a [`CacheStorage`].
///
/// Cheap to clone; every clone refers to the same bucket.
#[derive(Debug, Clone)]
pub struct Cache {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl Cache {
    /// Create a handle on bucket `name`. The bucket is created lazily.
    #[must_use]
    pub fn new(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> Self {
        Self {
            storage,
            name: name.into(),
        }
    }

    /// The bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the bucket if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn open(&self) -> Result<()> {
        self.storage.open(&self.name).await
    }

    /// Store one response.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<()> {
        self.storage.put(&self.name, request, response).await
    }

    /// Store a set of responses atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails; nothing is stored then.
    pub async fn add_all(&self, entries: &[(Request, Response)]) -> Result<()> {
        self.storage.put_all(&self.name, entries).await
    }

    /// Look up the response stored for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        self.storage.match_request(&self.name, request).await
    }

    /// Summaries of everything in the bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn entries(&self) -> Result<Vec<CachedEntry>> {
        self.storage.entries(&self.name).await
    }
}

/// [`CacheStorage`] in the babylog `SQLite` database.
#[derive(Debug)]
pub struct SqliteCacheStorage {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
    /// Open or create cache storage in the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create in-memory cache storage for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> crate::Result<Self> {
        Ok(Self {
            path: PathBuf::from(MEMORY_PATH),
            conn: Mutex::new(open_memory_connection()?),
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| WorkerError::cache("cache storage lock poisoned"))
    }

    fn ensure_bucket(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
        let created = conn.execute(
            "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?1)",
            [name],
        )?;
        if created > 0 {
            info!(bucket = name, "Created cache bucket");
        }
        Ok(created > 0)
    }

    fn write_entry(
        conn: &Connection,
        name: &str,
        request: &Request,
        response: &Response,
    ) -> Result<()> {
        let body_hash = blake3::hash(&response.body).to_hex().to_string();
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| WorkerError::cache(e.to_string()))?;
        let stored_at = Utc::now().to_rfc3339();

        let existing: Option<(u16, String)> = conn
            .query_row(
                "SELECT status, body_hash FROM cache_entries WHERE bucket = ?1 AND url = ?2",
                params![name, request.url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if existing.as_ref() == Some(&(response.status, body_hash.clone())) {
            // Same body as before: refresh metadata, skip rewriting the blob
            conn.execute(
                "UPDATE cache_entries SET headers = ?3, stored_at = ?4 WHERE bucket = ?1 AND url = ?2",
                params![name, request.url, headers, stored_at],
            )?;
            trace!(bucket = name, url = %request.url, "Cached body unchanged");
            return Ok(());
        }

        conn.execute(
            r"
            INSERT OR REPLACE INTO cache_entries
                (bucket, url, status, headers, body, body_hash, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                name,
                request.url,
                response.status,
                headers,
                response.body,
                body_hash,
                stored_at,
            ],
        )?;
        debug!(bucket = name, url = %request.url, size = response.body.len(), "Cached response");
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_bucket(&conn, name)?;
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_buckets WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM cache_buckets ORDER BY created_at, name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed_entries = tx.execute("DELETE FROM cache_entries WHERE bucket = ?1", [name])?;
        let removed = tx.execute("DELETE FROM cache_buckets WHERE name = ?1", [name])?;
        tx.commit()?;

        if removed > 0 {
            info!(bucket = name, entries = removed_entries, "Deleted cache bucket");
        }
        Ok(removed > 0)
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::ensure_bucket(&tx, name)?;
        Self::write_entry(&tx, name, request, response)?;
        tx.commit()?;
        Ok(())
    }

    async fn put_all(&self, name: &str, entries: &[(Request, Response)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::ensure_bucket(&tx, name)?;
        for (request, response) in entries {
            Self::write_entry(&tx, name, request, response)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        if !request.is_get() {
            return Ok(None);
        }

        let conn = self.lock()?;
        let row: Option<(u16, String, Vec<u8>)> = conn
            .query_row(
                "SELECT status, headers, body FROM cache_entries WHERE bucket = ?1 AND url = ?2",
                params![name, request.url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((status, headers, body)) = row else {
            return Ok(None);
        };
        let headers: Vec<(String, String)> =
            serde_json::from_str(&headers).map_err(|e| WorkerError::cache(e.to_string()))?;

        Ok(Some(Response {
            url: request.url.clone(),
            status,
            headers,
            body,
        }))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CachedEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT url, status, length(body), body_hash, stored_at
            FROM cache_entries WHERE bucket = ?1 ORDER BY url
            ",
        )?;

        let entries = stmt
            .query_map([name], |row| {
                let size: i64 = row.get(2)?;
                let stored_at: String = row.get(4)?;
                Ok(CachedEntry {
                    url: row.get(0)?,
                    status: row.get(1)?,
                    size: u64::try_from(size).unwrap_or(0),
                    body_hash: row.get(3)?,
                    stored_at: DateTime::parse_from_rfc3339(&stored_at)
                        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Method;

    fn storage() -> Arc<SqliteCacheStorage> {
        Arc::new(SqliteCacheStorage::open_in_memory().expect("failed to create cache storage"))
    }

    #[tokio::test]
    async fn test_open_creates_bucket_once() {
        let caches = storage();
        caches.open("baby-log-v1").await.unwrap();
        caches.open("baby-log-v1").await.unwrap();

        assert!(caches.has("baby-log-v1").await.unwrap());
        assert_eq!(caches.keys().await.unwrap(), vec!["baby-log-v1"]);
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let caches = storage();
        let request = Request::get("/index.html");
        let response = Response::new("/index.html", 200, "<html>")
            .with_header("content-type", "text/html");

        caches.put("v1", &request, &response).await.unwrap();

        let found = caches.match_request("v1", &request).await.unwrap();
        assert_eq!(found, Some(response));
        assert!(caches.has("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_response() {
        let caches = storage();
        let request = Request::get("/data.json");

        caches
            .put("v1", &request, &Response::new("/data.json", 200, "old"))
            .await
            .unwrap();
        caches
            .put("v1", &request, &Response::new("/data.json", 200, "new"))
            .await
            .unwrap();

        let found = caches.match_request("v1", &request).await.unwrap().unwrap();
        assert_eq!(found.text(), "new");
        assert_eq!(caches.entries("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_body_keeps_hash() {
        let caches = storage();
        let request = Request::get("/a");
        let response = Response::new("/a", 200, "same");

        caches.put("v1", &request, &response).await.unwrap();
        let first = caches.entries("v1").await.unwrap();
        caches.put("v1", &request, &response).await.unwrap();
        let second = caches.entries("v1").await.unwrap();

        assert_eq!(first[0].body_hash, second[0].body_hash);
        assert_eq!(second[0].size, 4);
    }

    #[tokio::test]
    async fn test_match_ignores_non_get() {
        let caches = storage();
        caches
            .put("v1", &Request::get("/x"), &Response::new("/x", 200, "x"))
            .await
            .unwrap();

        let post = Request::new(Method::Post, "/x");
        assert_eq!(caches.match_request("v1", &post).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_match_is_per_bucket() {
        let caches = storage();
        let request = Request::get("/x");
        caches
            .put("old", &request, &Response::new("/x", 200, "x"))
            .await
            .unwrap();

        assert_eq!(caches.match_request("new", &request).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_removes_bucket_and_entries() {
        let caches = storage();
        let request = Request::get("/x");
        caches
            .put("old", &request, &Response::new("/x", 200, "x"))
            .await
            .unwrap();

        assert!(caches.delete("old").await.unwrap());
        assert!(!caches.delete("old").await.unwrap());
        assert!(!caches.has("old").await.unwrap());

        // Recreating the bucket does not resurrect old entries
        caches.open("old").await.unwrap();
        assert_eq!(caches.match_request("old", &request).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_all_stores_everything() {
        let caches = storage();
        let entries = vec![
            (Request::get("/"), Response::new("/", 200, "index")),
            (Request::get("/app.js"), Response::new("/app.js", 200, "js")),
        ];

        caches.put_all("v1", &entries).await.unwrap();

        let stored: Vec<String> = caches
            .entries("v1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(stored, vec!["/", "/app.js"]);
    }

    #[tokio::test]
    async fn test_put_all_empty_creates_bucket() {
        let caches = storage();
        caches.put_all("v1", &[]).await.unwrap();
        assert!(caches.has("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_handle_delegates_to_bucket() {
        let caches = storage();
        let cache = Cache::new(caches.clone(), "baby-log-v1");
        assert_eq!(cache.name(), "baby-log-v1");
        assert!(!caches.has("baby-log-v1").await.unwrap());

        cache
            .put(&Request::get("/"), &Response::new("/", 200, "hi"))
            .await
            .unwrap();

        assert!(caches.has("baby-log-v1").await.unwrap());
        assert!(cache.match_request(&Request::get("/")).await.unwrap().is_some());
        assert_eq!(cache.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_backed_storage_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("babylog.db");

        {
            let caches = SqliteCacheStorage::open(&path).unwrap();
            caches
                .put("v1", &Request::get("/"), &Response::new("/", 200, "hi"))
                .await
                .unwrap();
        }

        let caches = SqliteCacheStorage::open(&path).unwrap();
        assert_eq!(caches.path(), path.as_path());
        assert!(caches
            .match_request("v1", &Request::get("/"))
            .await
            .unwrap()
            .is_some());
    }
}
