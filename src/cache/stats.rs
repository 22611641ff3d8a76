//! Cache Statistics Module
//!
//! Tracks gateway performance metrics including hits, misses, and collapsed work.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Exact-key hits
    pub hits: u64,
    /// Hits served from a higher detail level and projected down
    pub partial_hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Compute functions actually invoked
    pub computations: u64,
    /// Callers that awaited another caller's computation
    pub collapsed: u64,
    /// Ephemeral entries removed by TTL or capacity
    pub evictions: u64,
    /// Current number of ephemeral entries
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Partial hits count as hits. Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.partial_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_partial_hit(&mut self) {
        self.partial_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_computation(&mut self) {
        self.computations += 1;
    }

    pub fn record_collapsed(&mut self) {
        self.collapsed += 1;
    }

    /// Adds the counters of another snapshot.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.partial_hits += other.partial_hits;
        self.misses += other.misses;
        self.computations += other.computations;
        self.collapsed += other.collapsed;
        self.evictions += other.evictions;
        self.total_entries += other.total_entries;
    }
}
