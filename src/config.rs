//! Configuration Module
//!
//! Handles loading and managing gateway configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Which second-tier backend sits behind the ephemeral map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process map only
    Ephemeral,
    /// Ephemeral map in front of the SQLite file store
    Embedded,
    /// Ephemeral map in front of a shared Redis cache
    Networked,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ephemeral" | "memory" => Ok(BackendKind::Ephemeral),
            "embedded" | "sqlite" => Ok(BackendKind::Embedded),
            "networked" | "redis" => Ok(BackendKind::Networked),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Gateway configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Second-tier backend selection
    pub backend: BackendKind,
    /// TTL in seconds applied to every stored entry (0 = no expiry)
    pub ttl_seconds: u64,
    /// Maximum number of entries the ephemeral map may hold
    pub max_ephemeral_entries: usize,
    /// SQLite database file for the embedded backend
    pub store_path: String,
    /// Redis URL for the networked backend
    pub networked_endpoint: String,
    /// Timeout in milliseconds for each networked backend call
    pub remote_timeout_ms: u64,
    /// Sweeper interval in seconds
    pub sweep_interval: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Endpoint of the scraping subsystem
    pub scraper_endpoint: String,
    /// Endpoint of the analysis subsystem
    pub analyzer_endpoint: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - ephemeral | embedded | networked (default: ephemeral)
    /// - `CACHE_TTL_SECONDS` - Entry TTL in seconds (default: 1800)
    /// - `MAX_EPHEMERAL_ENTRIES` - Ephemeral capacity (default: 1000)
    /// - `CACHE_DB_PATH` - SQLite file (default: data/cache.db)
    /// - `REDIS_URL` - Redis endpoint (default: redis://127.0.0.1:6379)
    /// - `REMOTE_TIMEOUT_MS` - Redis call timeout (default: 500)
    /// - `SWEEP_INTERVAL` - Sweeper frequency in seconds (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SCRAPER_ENDPOINT` / `ANALYZER_ENDPOINT` - collaborator URLs
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend = match env::var("CACHE_BACKEND") {
            Ok(raw) => raw.parse().unwrap_or_else(|err: String| {
                warn!("{}, falling back to ephemeral", err);
                BackendKind::Ephemeral
            }),
            Err(_) => defaults.backend,
        };

        Self {
            backend,
            ttl_seconds: parse_var("CACHE_TTL_SECONDS").unwrap_or(defaults.ttl_seconds),
            max_ephemeral_entries: parse_var("MAX_EPHEMERAL_ENTRIES")
                .unwrap_or(defaults.max_ephemeral_entries),
            store_path: env::var("CACHE_DB_PATH").unwrap_or(defaults.store_path),
            networked_endpoint: env::var("REDIS_URL").unwrap_or(defaults.networked_endpoint),
            remote_timeout_ms: parse_var("REMOTE_TIMEOUT_MS").unwrap_or(defaults.remote_timeout_ms),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            scraper_endpoint: env::var("SCRAPER_ENDPOINT").unwrap_or(defaults.scraper_endpoint),
            analyzer_endpoint: env::var("ANALYZER_ENDPOINT").unwrap_or(defaults.analyzer_endpoint),
        }
    }

    /// TTL as a `Duration`, or `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ephemeral,
            ttl_seconds: 1800,
            max_ephemeral_entries: 1000,
            store_path: "data/cache.db".to_string(),
            networked_endpoint: "redis://127.0.0.1:6379".to_string(),
            remote_timeout_ms: 500,
            sweep_interval: 60,
            server_port: 3000,
            scraper_endpoint: "http://127.0.0.1:8001/scrape".to_string(),
            analyzer_endpoint: "http://127.0.0.1:8002/analyze".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Ephemeral);
        assert_eq!(config.ttl_seconds, 1800);
        assert_eq!(config.max_ephemeral_entries, 1000);
        assert_eq!(config.store_path, "data/cache.db");
        assert_eq!(config.sweep_interval, 60);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("embedded".parse::<BackendKind>(), Ok(BackendKind::Embedded));
        assert_eq!(" Redis ".parse::<BackendKind>(), Ok(BackendKind::Networked));
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Ephemeral));
        assert!("mongo".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let config = Config {
            ttl_seconds: 0,
            ..Config::default()
        };
        assert!(config.ttl().is_none());
        assert_eq!(Config::default().ttl(), Some(Duration::from_secs(1800)));
    }
}
