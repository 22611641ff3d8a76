//! Staleness Policy
//!
//! A record produced at detail level `D` satisfies any request at `D' <= D`:
//! more images considered is never less informative. Reused records are
//! projected down to the requested level so callers cannot tell them apart
//! from a fresh computation at that level.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::store::Store;
use crate::cache::{CacheKey, Codec};
use crate::models::{FilterResult, Listing};

// == Project ==
/// Values that can be narrowed to a lower detail level.
pub trait Project {
    /// Returns the value as it would have been produced at `detail_level`.
    fn project(self, detail_level: u32) -> Self;
}

impl Project for Listing {
    fn project(mut self, detail_level: u32) -> Self {
        self.truncate_images(detail_level as usize);
        self
    }
}

impl Project for Vec<FilterResult> {
    fn project(mut self, detail_level: u32) -> Self {
        let cap = detail_level as usize;
        for result in &mut self {
            result.images_considered = result.images_considered.min(cap);
        }
        self
    }
}

/// Outcome of [`StalenessPolicy::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// Stored at exactly the requested level
    Exact(T),
    /// Stored at a higher level and projected down
    Projected { value: T, stored_level: u32 },
    /// Nothing at or above the requested level
    Miss,
}

impl<T> Resolution<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Resolution::Exact(value) | Resolution::Projected { value, .. } => Some(value),
            Resolution::Miss => None,
        }
    }
}

// == Staleness Policy ==
pub struct StalenessPolicy;

impl StalenessPolicy {
    /// Whether a record stored at `stored_level` can answer `requested_level`.
    pub fn satisfies(stored_level: u32, requested_level: u32) -> bool {
        stored_level >= requested_level
    }

    /// Looks for the cheapest record able to answer `key` at its detail level.
    ///
    /// Backend and decoding failures are reported as a miss.
    pub async fn resolve<T>(store: &dyn Store, key: &CacheKey) -> Resolution<T>
    where
        T: Project + DeserializeOwned,
    {
        let requested = key.detail_level;
        let found = match store.find_at_least(key, requested).await {
            Ok(Some(found)) => found,
            Ok(None) => return Resolution::Miss,
            Err(err) => {
                warn!(key = %key, error = %err, "Detail-level lookup failed, treating as miss");
                return Resolution::Miss;
            }
        };

        if !Self::satisfies(found.detail_level, requested) {
            // A backend returned a record below the floor; never serve it.
            return Resolution::Miss;
        }

        let value: T = match Codec::decode(&found.payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, error = %err, "Stored payload unreadable, treating as miss");
                return Resolution::Miss;
            }
        };

        if found.detail_level == requested {
            Resolution::Exact(value)
        } else {
            debug!(key = %key, stored_level = found.detail_level, "Projecting higher-detail record");
            Resolution::Projected {
                value: value.project(requested),
                stored_level: found.detail_level,
            }
        }
    }
}
