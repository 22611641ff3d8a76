//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::error::{GatewayError, Result};
use crate::gateway::CacheGateway;
use crate::models::{
    AnalysisRequest, AnalysisResponse, ClearResponse, HealthResponse, Listing, ListingRequest,
    StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CacheGateway>,
}

impl AppState {
    pub fn new(gateway: CacheGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

/// Handler for POST /listings
///
/// Returns the scraped listing truncated to `max_images` images.
pub async fn listing_handler(
    State(state): State<AppState>,
    Json(req): Json<ListingRequest>,
) -> Result<Json<Listing>> {
    if let Some(error_msg) = req.item.validate() {
        return Err(GatewayError::InvalidRequest(error_msg));
    }

    let listing = state
        .gateway
        .get_or_fetch_listing(&req.item.platform, &req.item.url, &req.item.html, req.max_images)
        .await?;

    Ok(Json(listing))
}

/// Handler for POST /analyze
///
/// Scrapes the item and evaluates every filter, both memoized.
pub async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(GatewayError::InvalidRequest(error_msg));
    }

    let results = state
        .gateway
        .get_or_analyze(
            &req.item.platform,
            &req.item.url,
            &req.item.html,
            req.filters.as_slice(),
            req.max_images,
        )
        .await?;

    Ok(Json(AnalysisResponse::from_results(&results)))
}

/// Handler for POST /system/cache/clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.gateway.clear_cache().await;
    Json(ClearResponse::new(cleared))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.gateway.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
