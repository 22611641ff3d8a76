//! Store Chain
//!
//! The ephemeral map always answers first; an optional second tier (SQLite or
//! Redis) backs it. Second-tier failures are logged and treated as misses;
//! the chain only reports an error when the map itself fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{EphemeralStore, Found, Store};
use crate::cache::CacheKey;
use crate::error::{StoreError, StoreResult};

// == Store Chain ==
pub struct StoreChain {
    ephemeral: Arc<EphemeralStore>,
    secondary: Option<Arc<dyn Store>>,
    /// TTL given to entries copied up from the second tier
    backfill_ttl: Option<Duration>,
}

impl StoreChain {
    pub fn new(ephemeral: Arc<EphemeralStore>, secondary: Option<Arc<dyn Store>>) -> Self {
        Self {
            ephemeral,
            secondary,
            backfill_ttl: None,
        }
    }

    pub fn with_backfill_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.backfill_ttl = ttl;
        self
    }

    /// Ephemeral-only chain.
    pub fn ephemeral_only(ephemeral: Arc<EphemeralStore>) -> Self {
        Self::new(ephemeral, None)
    }

    pub fn ephemeral(&self) -> &Arc<EphemeralStore> {
        &self.ephemeral
    }

    pub fn secondary(&self) -> Option<&Arc<dyn Store>> {
        self.secondary.as_ref()
    }

    /// Copies a second-tier hit into the map so the next read stays in-process.
    async fn backfill(&self, key: &CacheKey, payload: &[u8]) {
        if let Err(err) = self.ephemeral.put(key, payload.to_vec(), self.backfill_ttl).await {
            debug!(key = %key, error = %err, "Ephemeral backfill failed");
        }
    }
}

fn log_failure(backend: &str, op: &str, key: &CacheKey, err: &StoreError) {
    warn!(backend, op, key = %key, error = %err, "Cache backend call failed, continuing uncached");
}

#[async_trait]
impl Store for StoreChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        match self.ephemeral.get(key).await {
            Ok(Some(payload)) => return Ok(Some(payload)),
            Ok(None) => {}
            Err(err) => log_failure(self.ephemeral.name(), "get", key, &err),
        }

        let Some(secondary) = &self.secondary else {
            return Ok(None);
        };
        match secondary.get(key).await {
            Ok(Some(payload)) => {
                self.backfill(key, &payload).await;
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                log_failure(secondary.name(), "get", key, &err);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, payload: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut last_err = None;

        if let Some(secondary) = &self.secondary {
            if let Err(err) = secondary.put(key, payload.clone(), ttl).await {
                log_failure(secondary.name(), "put", key, &err);
                last_err = Some(err);
            }
        }

        match self.ephemeral.put(key, payload, ttl).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log_failure(self.ephemeral.name(), "put", key, &err);
                Err(last_err.unwrap_or(err))
            }
        }
    }

    async fn find_at_least(&self, key: &CacheKey, min_detail_level: u32) -> StoreResult<Option<Found>> {
        let local = match self.ephemeral.find_at_least(key, min_detail_level).await {
            Ok(found) => found,
            Err(err) => {
                log_failure(self.ephemeral.name(), "find_at_least", key, &err);
                None
            }
        };

        // Exact level already in memory: nothing smaller can exist elsewhere.
        if local.as_ref().is_some_and(|f| f.detail_level == min_detail_level) {
            return Ok(local);
        }

        let Some(secondary) = &self.secondary else {
            return Ok(local);
        };
        let remote = match secondary.find_at_least(key, min_detail_level).await {
            Ok(found) => found,
            Err(err) => {
                log_failure(secondary.name(), "find_at_least", key, &err);
                None
            }
        };

        match (local, remote) {
            (Some(l), Some(r)) if r.detail_level < l.detail_level => {
                self.backfill(&key.at_level(r.detail_level), &r.payload).await;
                Ok(Some(r))
            }
            (None, Some(r)) => {
                self.backfill(&key.at_level(r.detail_level), &r.payload).await;
                Ok(Some(r))
            }
            (local, _) => Ok(local),
        }
    }

    async fn clear_all(&self) -> StoreResult<usize> {
        let mut cleared = self.ephemeral.clear_all().await?;
        if let Some(secondary) = &self.secondary {
            match secondary.clear_all().await {
                Ok(count) => cleared += count,
                Err(err) => warn!(backend = secondary.name(), error = %err, "Failed to clear cache backend"),
            }
        }
        Ok(cleared)
    }

    async fn close(&self) -> StoreResult<()> {
        if let Some(secondary) = &self.secondary {
            secondary.close().await?;
        }
        self.ephemeral.close().await
    }
}
