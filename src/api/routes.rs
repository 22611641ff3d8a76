//! API Routes
//!
//! Configures the Axum router with all gateway endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    analyze_handler, clear_handler, health_handler, listing_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /listings` - Scrape a listing (memoized)
/// - `POST /analyze` - Scrape and evaluate filters (memoized)
/// - `POST /system/cache/clear` - Empty every cache backend
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: any origin, the browser extension calls from marketplace pages
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/listings", post(listing_handler))
        .route("/analyze", post(analyze_handler))
        .route("/system/cache/clear", post(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EphemeralStore, StoreChain};
    use crate::collab::{FilterEvaluator, ListingFetcher};
    use crate::gateway::CacheGateway;
    use crate::models::{FilterResult, Listing};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct Fixed;

    #[async_trait]
    impl ListingFetcher for Fixed {
        async fn fetch_listing(&self, platform: &str, url: &str, _html: &str) -> anyhow::Result<Listing> {
            Ok(Listing::new(platform, url, "Lamp"))
        }
    }

    #[async_trait]
    impl FilterEvaluator for Fixed {
        async fn evaluate(&self, _listing: &Listing, filters: &[String]) -> anyhow::Result<Vec<FilterResult>> {
            Ok(filters.iter().map(|f| FilterResult::new(f.as_str(), None)).collect())
        }
    }

    fn create_test_app() -> Router {
        let chain = StoreChain::ephemeral_only(Arc::new(EphemeralStore::new(100)));
        let gateway = CacheGateway::new(chain, None, Arc::new(Fixed), Arc::new(Fixed));
        create_router(AppState::new(gateway))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_analyze_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"item":{"platform":"ebay","url":"https://ebay.example/3","html":"<p/>"},"filters":["brass"]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clear_requires_post() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/system/cache/clear")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
