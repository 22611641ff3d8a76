//! Sweeper Task
//!
//! Background task that periodically drops expired and over-capacity entries
//! from the ephemeral store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::EphemeralStore;

/// Spawns a background task that sweeps `store` every `interval`.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(EphemeralStore::new(1000));
/// let sweeper = spawn_sweeper(store.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper(store: Arc<EphemeralStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting ephemeral sweeper");

        loop {
            tokio::time::sleep(interval).await;

            let report = store.sweep().await;
            if report.expired > 0 || report.evicted > 0 {
                info!(
                    expired = report.expired,
                    evicted = report.evicted,
                    "Sweep removed entries"
                );
            } else {
                debug!("Sweep: nothing to remove");
            }
        }
    })
}
