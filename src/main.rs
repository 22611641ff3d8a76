//! Listing Cache - memoizing gateway for marketplace scrapes and AI verdicts
//!
//! Binary entry point: loads configuration, builds the gateway and serves
//! the HTTP API until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_cache::api::{create_router, AppState};
use listing_cache::collab::{HttpFilterEvaluator, HttpListingFetcher};
use listing_cache::{CacheGateway, Config};

/// Main entry point for the listing cache gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the store chain and start the sweeper
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM, drain requests then close the backends
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting listing cache gateway");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, ttl={}s, max_ephemeral_entries={}, port={}, sweep_interval={}s",
        config.backend,
        config.ttl_seconds,
        config.max_ephemeral_entries,
        config.server_port,
        config.sweep_interval
    );

    let fetcher = Arc::new(HttpListingFetcher::new(config.scraper_endpoint.clone())?);
    let evaluator = Arc::new(HttpFilterEvaluator::new(config.analyzer_endpoint.clone())?);
    let gateway = CacheGateway::from_config(&config, fetcher, evaluator).await;

    let state = AppState::new(gateway);
    let gateway = Arc::clone(&state.gateway);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    gateway.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
