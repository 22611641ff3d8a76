//! Ephemeral Store
//!
//! In-process map keyed by the storage form of [`CacheKey`]. Lost on restart.
//! Expired entries are dropped lazily on read and eagerly by the sweeper;
//! the entry count is bounded by evicting the oldest insertions first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Found, Store};
use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheKey, StoreEntry};
use crate::error::StoreResult;

/// Outcome of one sweeper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries whose TTL had elapsed
    pub expired: usize,
    /// Entries dropped to get back under capacity
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, StoreEntry>,
    /// Storage keys by insertion time, oldest at the front
    order: VecDeque<String>,
    evictions: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<StoreEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    fn evict_over(&mut self, max_entries: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                evicted += 1;
            }
        }
        self.evictions += evicted as u64;
        evicted
    }
}

// == Ephemeral Store ==
/// In-memory backend with FIFO capacity bound and TTL support.
#[derive(Debug)]
pub struct EphemeralStore {
    state: RwLock<MemoryState>,
    max_entries: usize,
}

impl EphemeralStore {
    // == Constructor ==
    /// Creates an empty store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_entries,
        }
    }

    // == Sweep ==
    /// Removes expired entries, then evicts the oldest entries beyond capacity.
    ///
    /// Reading an entry never refreshes its age.
    pub async fn sweep(&self) -> SweepReport {
        let now = current_timestamp_ms();
        let mut state = self.state.write().await;

        let expired_keys: HashSet<String> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        let expired = expired_keys.len();
        if expired > 0 {
            state.order.retain(|k| !expired_keys.contains(k));
            for key in &expired_keys {
                state.entries.remove(key);
            }
            state.evictions += expired as u64;
        }

        let evicted = state.evict_over(self.max_entries);
        SweepReport { expired, evicted }
    }

    /// Returns the current number of entries, expired or not.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Total entries removed by TTL or capacity so far.
    pub async fn evictions(&self) -> u64 {
        self.state.read().await.evictions
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[async_trait]
impl Store for EphemeralStore {
    fn name(&self) -> &'static str {
        "ephemeral"
    }

    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>> {
        let storage_key = key.storage_key();
        {
            let state = self.state.read().await;
            match state.entries.get(&storage_key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.payload.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it now instead of waiting for the sweeper.
        let mut state = self.state.write().await;
        if state
            .entries
            .get(&storage_key)
            .is_some_and(StoreEntry::is_expired)
        {
            state.remove(&storage_key);
            state.evictions += 1;
        }
        Ok(None)
    }

    async fn put(&self, key: &CacheKey, payload: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let ttl_seconds = ttl.map(|t| t.as_secs().max(1)).unwrap_or(0);
        let entry = StoreEntry::new(key, payload, ttl_seconds);

        let mut state = self.state.write().await;
        // A replacement is a fresh insertion: it moves to the back of the queue.
        state.remove(&entry.key);
        state.order.push_back(entry.key.clone());
        state.entries.insert(entry.key.clone(), entry);
        state.evict_over(self.max_entries);
        Ok(())
    }

    async fn find_at_least(&self, key: &CacheKey, min_detail_level: u32) -> StoreResult<Option<Found>> {
        let family = key.family();
        let now = current_timestamp_ms();
        let state = self.state.read().await;

        let best = state
            .entries
            .values()
            .filter(|entry| {
                entry.family == family
                    && entry.key == key.at_level(entry.detail_level).storage_key()
                    && entry.detail_level >= min_detail_level
                    && !entry.is_expired_at(now)
            })
            .min_by_key(|entry| entry.detail_level);

        Ok(best.map(|entry| Found {
            payload: entry.payload.clone(),
            detail_level: entry.detail_level,
        }))
    }

    async fn clear_all(&self) -> StoreResult<usize> {
        let mut state = self.state.write().await;
        let count = state.entries.len();
        state.entries.clear();
        state.order.clear();
        Ok(count)
    }
}
