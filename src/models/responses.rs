//! Response DTOs for the gateway API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::CacheStats;
use crate::models::FilterResult;

/// Response body for POST /analyze
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    /// Filter description -> verdict
    pub filters: BTreeMap<String, Option<bool>>,
}

impl AnalysisResponse {
    pub fn from_results(results: &[FilterResult]) -> Self {
        Self {
            filters: results
                .iter()
                .map(|r| (r.description.clone(), r.value))
                .collect(),
        }
    }
}

/// Response body for POST /system/cache/clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub status: String,
    pub message: String,
    pub entries_cleared: usize,
}

impl ClearResponse {
    pub fn new(entries_cleared: usize) -> Self {
        Self {
            status: "ok".to_string(),
            message: "Cache cleared".to_string(),
            entries_cleared,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Exact-key cache hits
    pub hits: u64,
    /// Hits served by projecting a higher detail level
    pub partial_hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Collaborator invocations
    pub computations: u64,
    /// Callers that joined an in-flight computation
    pub collapsed: u64,
    /// Ephemeral entries evicted by TTL or capacity
    pub evictions: u64,
    /// Current number of ephemeral entries
    pub total_entries: usize,
    /// Hit rate ((hits + partial_hits) / lookups)
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            partial_hits: stats.partial_hits,
            misses: stats.misses,
            computations: stats.computations,
            collapsed: stats.collapsed,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_response_maps_descriptions() {
        let results = vec![
            FilterResult::new("red", Some(true)),
            FilterResult::new("leather", None),
        ];
        let resp = AnalysisResponse::from_results(&results);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["filters"]["red"], true);
        assert!(json["filters"]["leather"].is_null());
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 6,
            partial_hits: 2,
            misses: 2,
            ..CacheStats::default()
        };
        let resp = StatsResponse::from(stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_clear_response_serialize() {
        let json = serde_json::to_string(&ClearResponse::new(3)).unwrap();
        assert!(json.contains("\"entries_cleared\":3"));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
