//! API Module
//!
//! HTTP handlers and routing for the gateway REST API.
//!
//! # Endpoints
//! - `POST /listings` - Scrape a listing (memoized)
//! - `POST /analyze` - Scrape and evaluate filters (memoized)
//! - `POST /system/cache/clear` - Empty every cache backend
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
