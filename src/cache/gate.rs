//! Memoization Gate
//!
//! Lookup, in-flight collapsing, compute-on-miss and store-on-success for one
//! result type. At any instant at most one computation runs per distinct
//! [`CacheKey`] in this process; concurrent callers for the same key await
//! the running computation instead of starting their own.
//!
//! Computations run on their own task. A caller that gives up waiting does
//! not cancel the computation, the other waiters, or the store write.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::staleness::{Project, Resolution, StalenessPolicy};
use crate::cache::store::Store;
use crate::cache::{CacheKey, CacheStats, Codec};
use crate::error::{GatewayError, Result};

type Outcome<T> = std::result::Result<Arc<T>, GatewayError>;
type SharedComputation<T> = Shared<BoxFuture<'static, Outcome<T>>>;

fn lock<M>(mutex: &Mutex<M>) -> MutexGuard<'_, M> {
    // Holders never panic mid-update, so a poisoned map is still consistent.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// == In-Flight Registry ==
/// Process-local map from key to the computation currently producing it.
pub struct InFlightRegistry<T> {
    slots: Mutex<HashMap<CacheKey, SharedComputation<T>>>,
    /// Bumped every time a computation ends, before its slot is freed
    completed: AtomicU64,
}

impl<T> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            completed: AtomicU64::new(0),
        }
    }

    /// Count of computations that have ended so far.
    fn epoch(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the running computation for `key`, or registers the one built
    /// by `start`. The flag is true when this caller registered it.
    fn join_or_register<F>(&self, key: &CacheKey, start: F) -> (SharedComputation<T>, bool)
    where
        F: FnOnce() -> SharedComputation<T>,
    {
        let mut slots = lock(&self.slots);
        if let Some(running) = slots.get(key) {
            return (running.clone(), false);
        }
        let computation = start();
        slots.insert(key.clone(), computation.clone());
        (computation, true)
    }

    fn finish(&self, key: &CacheKey) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        lock(&self.slots).remove(key);
    }

    /// Number of computations currently running.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the registry slot when the computation task ends, however it ends.
struct InFlightGuard<T> {
    registry: Arc<InFlightRegistry<T>>,
    key: CacheKey,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        self.registry.finish(&self.key);
    }
}

// == Memoization Gate ==
pub struct MemoizationGate<T> {
    store: Arc<dyn Store>,
    in_flight: Arc<InFlightRegistry<T>>,
    ttl: Option<Duration>,
    stats: Mutex<CacheStats>,
}

impl<T> MemoizationGate<T>
where
    T: Project + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a gate over `store`. Results are stored with `ttl`
    /// (`None` = no expiry).
    pub fn new(store: Arc<dyn Store>, ttl: Option<Duration>) -> Self {
        Self {
            store,
            in_flight: Arc::new(InFlightRegistry::new()),
            ttl,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    // == Execute ==
    /// Returns the cached result for `key` or runs `compute` to produce it.
    ///
    /// A record stored at a higher detail level than `key.detail_level` is
    /// reused and projected down. Compute failures reach this caller and
    /// every waiter, and are never stored.
    pub async fn execute<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let epoch = self.in_flight.epoch();
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }
        self.compute_or_join(key, epoch, compute).await
    }

    /// Joins or starts the computation for `key` after a miss observed at
    /// registry `epoch`.
    async fn compute_or_join<F, Fut>(&self, key: &CacheKey, epoch: u64, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (computation, started) = self
            .in_flight
            .join_or_register(key, || self.spawn_computation(key.clone(), epoch, compute()));

        {
            let mut stats = lock(&self.stats);
            if started {
                stats.record_computation();
            } else {
                stats.record_collapsed();
                debug!(key = %key, "Joining in-flight computation");
            }
        }

        computation.await.map(|value| (*value).clone())
    }

    async fn lookup(&self, key: &CacheKey) -> Option<T> {
        match StalenessPolicy::resolve::<T>(self.store.as_ref(), key).await {
            Resolution::Exact(value) => {
                debug!(key = %key, "Cache hit");
                lock(&self.stats).record_hit();
                Some(value)
            }
            Resolution::Projected { value, stored_level } => {
                debug!(key = %key, stored_level, "Cache hit at higher detail level");
                lock(&self.stats).record_partial_hit();
                Some(value)
            }
            Resolution::Miss => {
                debug!(key = %key, "Cache miss");
                lock(&self.stats).record_miss();
                None
            }
        }
    }

    fn spawn_computation<Fut>(&self, key: CacheKey, epoch: u64, compute: Fut) -> SharedComputation<T>
    where
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let ttl = self.ttl;
        let guard = InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            key: key.clone(),
        };

        let task = tokio::spawn(async move {
            let guard = guard;
            // Another computation ended since the miss; it may have stored this key.
            if guard.registry.epoch() != epoch {
                match StalenessPolicy::resolve::<T>(store.as_ref(), &key).await {
                    Resolution::Exact(value) | Resolution::Projected { value, .. } => {
                        debug!(key = %key, "Result stored since miss, skipping computation");
                        return Ok(Arc::new(value));
                    }
                    Resolution::Miss => {}
                }
            }
            match compute.await {
                Ok(value) => {
                    persist(store.as_ref(), &key, &value, ttl).await;
                    Ok(Arc::new(value))
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Computation failed, nothing cached");
                    Err(GatewayError::from(err))
                }
            }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => Err(GatewayError::Internal(format!("computation task failed: {}", err))),
            }
        }
        .boxed()
        .shared()
    }

    /// Snapshot of this gate's counters.
    pub fn stats(&self) -> CacheStats {
        lock(&self.stats).clone()
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Best-effort write; failures only cost a future recomputation.
async fn persist<T: Serialize>(store: &dyn Store, key: &CacheKey, value: &T, ttl: Option<Duration>) {
    let payload = match Codec::encode(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(key = %key, error = %err, "Result not serializable, skipping cache write");
            return;
        }
    };
    match store.put(key, payload, ttl).await {
        Ok(()) => debug!(key = %key, "Cache set"),
        Err(err) => warn!(key = %key, error = %err, "Cache write failed"),
    }
}
