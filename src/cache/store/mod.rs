//! Store Module
//!
//! One asynchronous interface over the interchangeable storage backends:
//! - [`EphemeralStore`]: in-process map, TTL enforced by the sweeper
//! - [`EmbeddedStore`]: SQLite file, survives restarts, range queries on detail level
//! - [`NetworkedStore`]: shared Redis cache, TTL enforced by Redis
//!
//! [`StoreChain`] layers the ephemeral map in front of an optional second tier.

mod chain;
mod embedded;
mod memory;
mod networked;

use std::time::Duration;

use async_trait::async_trait;

use crate::cache::CacheKey;
use crate::error::StoreResult;

pub use chain::StoreChain;
pub use memory::{EphemeralStore, SweepReport};
pub use embedded::EmbeddedStore;
pub use networked::{NetworkedStore, RedisConfig};

/// A payload found by [`Store::find_at_least`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub payload: Vec<u8>,
    /// Detail level the payload was stored at
    pub detail_level: u32,
}

// == Store Trait ==
/// Storage backend contract.
///
/// Every method may fail; callers treat a failed read as a miss and log
/// and drop a failed write.
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Exact-key lookup.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<Vec<u8>>>;

    /// Insert-or-replace. `ttl` of `None` means no expiry; backends without
    /// expiry support ignore it.
    async fn put(&self, key: &CacheKey, payload: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Record of `key`'s family with the smallest detail level that is
    /// `>= min_detail_level`. `key.detail_level` itself is ignored.
    async fn find_at_least(&self, key: &CacheKey, min_detail_level: u32) -> StoreResult<Option<Found>>;

    /// Removes everything, returning how many entries were dropped.
    async fn clear_all(&self) -> StoreResult<usize>;

    /// Releases backend resources. Further calls may fail.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
