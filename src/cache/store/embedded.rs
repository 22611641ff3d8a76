//! Embedded Store
//!
//! SQLite-backed persistence for scraped listings and analysis results.
//! Entries live until `clear_all`; TTLs are ignored.
//!
//! SQLite connections are blocking and not `Sync`, so the single connection
//! sits behind a mutex and every call runs on the blocking pool. The mutex
//! is the single writer gate; reads queue behind it as well.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{Found, Store};
use crate::cache::{CacheKey, Operation};
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scraped_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    platform TEXT NOT NULL,
    resource TEXT NOT NULL,
    detail_level INTEGER NOT NULL,
    payload BLOB NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (platform, resource, detail_level)
);
CREATE TABLE IF NOT EXISTS analysis_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    platform TEXT NOT NULL,
    resource TEXT NOT NULL,
    filter_fingerprint TEXT NOT NULL,
    detail_level INTEGER NOT NULL,
    payload BLOB NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (platform, resource, filter_fingerprint, detail_level)
);
";

// == Embedded Store ==
/// File-backed backend. `None` once closed.
pub struct EmbeddedStore {
    conn: Arc<Mutex<Option<Connection>>>,
    path: String,
}

impl EmbeddedStore {
    /// Opens (creating if needed) the database at `path` and its schema.
    pub async fn open(path: impl Into<String>) -> StoreResult<Self> {
        let path = path.into();
        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> StoreResult<Connection> {
            if let Some(parent) = Path::new(&db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e)))?;
                }
            }
            let conn = Connection::open(&db_path)?;
            conn.busy_timeout(Duration::from_secs(10))?;
            conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("open task failed: {}", e)))??;

        let store = Self::from_connection(conn, path)?;
        info!(path = %store.path, "Embedded store opened");
        Ok(store)
    }

    /// Opens a private in-memory database. Used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, path: String) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Connection) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| StoreError::Unavailable("store is closed".to_string()))?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

fn select_exact(conn: &Connection, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
    let payload: Option<Vec<u8>> = match key.operation {
        Operation::Scrape => conn
            .query_row(
                "SELECT payload FROM scraped_items
                 WHERE platform = ?1 AND resource = ?2 AND detail_level = ?3",
                params![key.platform, key.resource, key.detail_level],
                |row| row.get(0),
            )
            .optional()?,
        Operation::Analysis => conn
            .query_row(
                "SELECT payload FROM analysis_results
                 WHERE platform = ?1 AND resource = ?2 AND filter_fingerprint = ?3 AND detail_level = ?4",
                params![key.platform, key.resource, key.filter_fingerprint, key.detail_level],
                |row| row.get(0),
            )
            .optional()?,
    };
    Ok(payload)
}

fn upsert(conn: &Connection, key: &CacheKey, payload: &[u8]) -> StoreResult<()> {
    let created_at = Utc::now().to_rfc3339();
    match key.operation {
        Operation::Scrape => conn.execute(
            "INSERT INTO scraped_items (platform, resource, detail_level, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (platform, resource, detail_level)
             DO UPDATE SET payload = excluded.payload, created_at = excluded.created_at",
            params![key.platform, key.resource, key.detail_level, payload, created_at],
        )?,
        Operation::Analysis => conn.execute(
            "INSERT INTO analysis_results
                 (platform, resource, filter_fingerprint, detail_level, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (platform, resource, filter_fingerprint, detail_level)
             DO UPDATE SET payload = excluded.payload, created_at = excluded.created_at",
            params![
                key.platform,
                key.resource,
                key.filter_fingerprint,
                key.detail_level,
                payload,
                created_at
            ],
        )?,
    };
    Ok(())
}

#[async_trait]
impl Store for EmbeddedStore {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        let key = key.clone();
        self.with_conn(move |conn| select_exact(conn, &key)).await
    }

    async fn put(&self, key: &CacheKey, payload: Vec<u8>, _ttl: Option<Duration>) -> StoreResult<()> {
        let key = key.clone();
        self.with_conn(move |conn| match upsert(conn, &key, &payload) {
            // Another writer got there first: the row now exists, which is all we need.
            Err(StoreError::ConstraintConflict(msg)) => match select_exact(conn, &key)? {
                Some(_) => {
                    debug!(key = %key, "Upsert raced, keeping existing row");
                    Ok(())
                }
                None => Err(StoreError::ConstraintConflict(msg)),
            },
            other => other,
        })
        .await
    }

    async fn find_at_least(&self, key: &CacheKey, min_detail_level: u32) -> StoreResult<Option<Found>> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let row = match key.operation {
                Operation::Scrape => conn
                    .query_row(
                        "SELECT payload, detail_level FROM scraped_items
                         WHERE platform = ?1 AND resource = ?2 AND detail_level >= ?3
                         ORDER BY detail_level ASC LIMIT 1",
                        params![key.platform, key.resource, min_detail_level],
                        |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, u32>(1)?)),
                    )
                    .optional()?,
                Operation::Analysis => conn
                    .query_row(
                        "SELECT payload, detail_level FROM analysis_results
                         WHERE platform = ?1 AND resource = ?2 AND filter_fingerprint = ?3
                           AND detail_level >= ?4
                         ORDER BY detail_level ASC LIMIT 1",
                        params![key.platform, key.resource, key.filter_fingerprint, min_detail_level],
                        |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, u32>(1)?)),
                    )
                    .optional()?,
            };
            Ok(row.map(|(payload, detail_level)| Found { payload, detail_level }))
        })
        .await
    }

    async fn clear_all(&self) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let scraped = tx.execute("DELETE FROM scraped_items", [])?;
            let analyses = tx.execute("DELETE FROM analysis_results", [])?;
            tx.commit()?;
            Ok(scraped + analyses)
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StoreError::from(e))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("close task failed: {}", e)))?
    }
}
