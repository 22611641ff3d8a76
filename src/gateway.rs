//! Cache Gateway
//!
//! The surface the request layer talks to. Wraps the scraping and analysis
//! collaborators in one memoization gate each, over a shared store chain.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::store::Store;
use crate::cache::{
    CacheStats, EmbeddedStore, EphemeralStore, KeyDeriver, MemoizationGate, NetworkedStore, Operation,
    RedisConfig, StoreChain,
};
use crate::collab::{FilterEvaluator, ListingFetcher};
use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::models::{FilterResult, Listing};
use crate::tasks::spawn_sweeper;

// == Cache Gateway ==
pub struct CacheGateway {
    store: Arc<StoreChain>,
    listings: MemoizationGate<Listing>,
    analyses: MemoizationGate<Vec<FilterResult>>,
    fetcher: Arc<dyn ListingFetcher>,
    evaluator: Arc<dyn FilterEvaluator>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CacheGateway {
    /// Builds a gateway over `store`. Entries are written with `ttl`
    /// (`None` = no expiry). No sweeper runs until [`Self::start_sweeper`].
    pub fn new(
        store: StoreChain,
        ttl: Option<Duration>,
        fetcher: Arc<dyn ListingFetcher>,
        evaluator: Arc<dyn FilterEvaluator>,
    ) -> Self {
        let store = Arc::new(store);
        let shared: Arc<dyn Store> = store.clone();
        Self {
            listings: MemoizationGate::new(Arc::clone(&shared), ttl),
            analyses: MemoizationGate::new(shared, ttl),
            store,
            fetcher,
            evaluator,
            sweeper: Mutex::new(None),
        }
    }

    /// Builds the store chain described by `config`, then starts the sweeper.
    ///
    /// A second tier that cannot be opened is logged and skipped; the
    /// gateway then runs on the ephemeral map alone.
    pub async fn from_config(
        config: &Config,
        fetcher: Arc<dyn ListingFetcher>,
        evaluator: Arc<dyn FilterEvaluator>,
    ) -> Self {
        let ephemeral = Arc::new(EphemeralStore::new(config.max_ephemeral_entries));
        let secondary = open_secondary(config).await;
        let chain = StoreChain::new(ephemeral, secondary).with_backfill_ttl(config.ttl());

        let gateway = Self::new(chain, config.ttl(), fetcher, evaluator);
        gateway.start_sweeper(Duration::from_secs(config.sweep_interval.max(1)));
        gateway
    }

    /// Starts the ephemeral sweeper, replacing any previous one.
    pub fn start_sweeper(&self, interval: Duration) {
        let handle = spawn_sweeper(Arc::clone(self.store.ephemeral()), interval);
        let previous = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    // == Get Or Fetch Listing ==
    /// Returns the listing at `url` holding at most `detail_level` images,
    /// scraping it only when no stored listing of at least that level exists.
    pub async fn get_or_fetch_listing(
        &self,
        platform: &str,
        url: &str,
        html: &str,
        detail_level: u32,
    ) -> Result<Listing> {
        let key = KeyDeriver::derive(Operation::Scrape, platform, url, detail_level, &[] as &[&str]);

        let fetcher = Arc::clone(&self.fetcher);
        let (platform, url, html) = (platform.to_string(), url.to_string(), html.to_string());
        self.listings
            .execute(&key, move || async move {
                let mut listing = fetcher.fetch_listing(&platform, &url, &html).await?;
                listing.truncate_images(detail_level as usize);
                Ok::<_, anyhow::Error>(listing)
            })
            .await
    }

    // == Get Or Evaluate ==
    /// Returns one verdict per distinct filter for `listing` judged on at most
    /// `detail_level` images. Filter order and duplicates do not matter.
    pub async fn get_or_evaluate<S: AsRef<str>>(
        &self,
        listing: &Listing,
        filters: &[S],
        detail_level: u32,
    ) -> Result<Vec<FilterResult>> {
        let key = KeyDeriver::derive(
            Operation::Analysis,
            &listing.platform,
            &listing.url,
            detail_level,
            filters,
        );

        let evaluator = Arc::clone(&self.evaluator);
        let filters = KeyDeriver::normalize_filters(filters);
        let mut listing = listing.clone();
        listing.truncate_images(detail_level as usize);

        self.analyses
            .execute(&key, move || async move {
                let images_considered = listing.images.len();
                let mut results = evaluator.evaluate(&listing, &filters).await?;
                for result in &mut results {
                    result.images_considered = images_considered;
                }
                Ok::<_, anyhow::Error>(results)
            })
            .await
    }

    // == Get Or Analyze ==
    /// Scrape then evaluate, both memoized.
    pub async fn get_or_analyze<S: AsRef<str>>(
        &self,
        platform: &str,
        url: &str,
        html: &str,
        filters: &[S],
        detail_level: u32,
    ) -> Result<Vec<FilterResult>> {
        let listing = self.get_or_fetch_listing(platform, url, html, detail_level).await?;
        self.get_or_evaluate(&listing, filters, detail_level).await
    }

    // == Clear Cache ==
    /// Empties every backend in use and returns how many entries were dropped.
    ///
    /// Computations already running still store their result when they finish.
    pub async fn clear_cache(&self) -> usize {
        match self.store.clear_all().await {
            Ok(cleared) => {
                info!(cleared, "Cache cleared");
                cleared
            }
            Err(err) => {
                warn!(error = %err, "Failed to clear cache");
                0
            }
        }
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.listings.stats();
        stats.merge(&self.analyses.stats());

        let ephemeral = self.store.ephemeral();
        stats.evictions = ephemeral.evictions().await;
        stats.total_entries = ephemeral.len().await;
        stats
    }

    /// Computations currently running across both gates.
    pub fn in_flight(&self) -> usize {
        self.listings.in_flight() + self.analyses.in_flight()
    }

    // == Close ==
    /// Stops the sweeper and releases backend resources.
    pub async fn close(&self) {
        let sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        match self.store.close().await {
            Ok(()) => info!("Cache backends closed"),
            Err(err) => warn!(error = %err, "Failed to close cache backends"),
        }
    }
}

async fn open_secondary(config: &Config) -> Option<Arc<dyn Store>> {
    match config.backend {
        BackendKind::Ephemeral => None,
        BackendKind::Embedded => match EmbeddedStore::open(config.store_path.clone()).await {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                warn!(path = %config.store_path, error = %err, "Embedded store unavailable, running ephemeral-only");
                None
            }
        },
        BackendKind::Networked => {
            let redis = RedisConfig {
                url: config.networked_endpoint.clone(),
                operation_timeout: Duration::from_millis(config.remote_timeout_ms),
                ..RedisConfig::default()
            };
            match NetworkedStore::connect(redis).await {
                Ok(store) => Some(Arc::new(store)),
                Err(err) => {
                    warn!(url = %config.networked_endpoint, error = %err, "Networked store unavailable, running ephemeral-only");
                    None
                }
            }
        }
    }
}
