//! Networked Store
//!
//! Shared Redis cache. Every call is bounded by a short timeout and TTLs are
//! enforced by Redis itself. Redis has no range queries, so
//! `find_at_least` probes a handful of exact keys above the requested level;
//! the store accelerates lookups but is never the authority on staleness.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;

use super::{Found, Store};
use crate::cache::CacheKey;
use crate::error::{StoreError, StoreResult};

/// Number of consecutive detail levels probed by `find_at_least`.
pub const PROBE_WINDOW: u32 = 3;

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Key prefix for all cache keys
    pub prefix: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Per-operation timeout
    pub operation_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: "listing_cache:".to_string(),
            connect_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_millis(500),
        }
    }
}

// == Networked Store ==
/// Redis-backed shared cache. The connection re-establishes itself after
/// Redis restarts; calls made while it is down fail as misses.
pub struct NetworkedStore {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl NetworkedStore {
    /// Connects to Redis. Fails if the server is unreachable within
    /// `connect_timeout`.
    pub async fn connect(config: RedisConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let conn = with_timeout(config.connect_timeout, ConnectionManager::new(client)).await?;
        info!(url = %config.url, "Networked store connected");
        Ok(Self { conn, config })
    }

    fn prefixed_key(&self, key: &CacheKey) -> String {
        prefixed(&self.config.prefix, key)
    }

    async fn timed<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        with_timeout(self.config.operation_timeout, op).await
    }
}

fn prefixed(prefix: &str, key: &CacheKey) -> String {
    format!("{}{}", prefix, key.storage_key())
}

/// Candidate levels probed for a request at `min_detail_level`.
fn probe_levels(min_detail_level: u32) -> impl Iterator<Item = u32> {
    (0..PROBE_WINDOW).filter_map(move |offset| min_detail_level.checked_add(offset))
}

async fn with_timeout<T, F>(limit: Duration, op: F) -> StoreResult<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Unavailable(format!(
            "redis call timed out after {:?}",
            limit
        ))),
    }
}

#[async_trait]
impl Store for NetworkedStore {
    fn name(&self) -> &'static str {
        "networked"
    }

    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let prefixed = self.prefixed_key(key);
        self.timed(async move { conn.get::<_, Option<Vec<u8>>>(prefixed).await })
            .await
    }

    async fn put(&self, key: &CacheKey, payload: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let prefixed = self.prefixed_key(key);
        self.timed(async move {
            match ttl {
                Some(ttl) => conn.set_ex::<_, _, ()>(prefixed, payload, ttl.as_secs().max(1)).await,
                None => conn.set::<_, _, ()>(prefixed, payload).await,
            }
        })
        .await
    }

    async fn find_at_least(&self, key: &CacheKey, min_detail_level: u32) -> StoreResult<Option<Found>> {
        for level in probe_levels(min_detail_level) {
            if let Some(payload) = self.get(&key.at_level(level)).await? {
                return Ok(Some(Found {
                    payload,
                    detail_level: level,
                }));
            }
        }
        Ok(None)
    }

    async fn clear_all(&self) -> StoreResult<usize> {
        let pattern = format!("{}*", self.config.prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = self
                .timed(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(200)
                        .query_async(&mut conn),
                )
                .await?;

            if !keys.is_empty() {
                let count: usize = self.timed(conn.del(&keys)).await?;
                removed += count;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{KeyDeriver, Operation};

    #[test]
    fn test_prefixed_key_layout() {
        let key = KeyDeriver::derive(Operation::Scrape, "ebay", "https://ebay.example/1", 2, &[] as &[&str]);
        let prefixed = prefixed("listing_cache:", &key);
        assert!(prefixed.starts_with("listing_cache:scrape:ebay:"));
        assert!(prefixed.ends_with(":2:https://ebay.example/1"));
    }

    #[test]
    fn test_probe_levels_window() {
        assert_eq!(probe_levels(3).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(
            probe_levels(u32::MAX - 1).collect::<Vec<_>>(),
            vec![u32::MAX - 1, u32::MAX]
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not a redis url".to_string(),
            ..RedisConfig::default()
        };
        let err = NetworkedStore::connect(config).await.err().unwrap();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(300),
            ..RedisConfig::default()
        };
        assert!(NetworkedStore::connect(config).await.is_err());
    }

    /// Needs a live server: `REDIS_URL=redis://127.0.0.1:6379 cargo test`.
    #[tokio::test]
    async fn test_recovers_after_connection_killed() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let config = RedisConfig {
            url: url.clone(),
            prefix: "listing_cache_test_reconnect:".to_string(),
            ..RedisConfig::default()
        };
        let store = NetworkedStore::connect(config).await.unwrap();
        let key = KeyDeriver::derive(Operation::Scrape, "vinted", "https://vinted.example/1", 1, &[] as &[&str]);
        store.put(&key, b"listing".to_vec(), Some(Duration::from_secs(30))).await.unwrap();

        // Drops every client connection, as a server restart would.
        let mut admin = Client::open(url.as_str()).unwrap().get_multiplexed_async_connection().await.unwrap();
        let killed: i64 = redis::cmd("CLIENT")
            .arg("KILL")
            .arg("TYPE")
            .arg("normal")
            .query_async(&mut admin)
            .await
            .unwrap();
        assert!(killed >= 1);

        let mut recovered = None;
        for _ in 0..20 {
            if let Ok(found) = store.get(&key).await {
                recovered = found;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(recovered.as_deref(), Some(&b"listing"[..]));
        store.clear_all().await.unwrap();
    }
}
