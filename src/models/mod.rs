//! Models Module
//!
//! Listing/verdict types plus request and response DTOs for the API.

pub mod listing;
pub mod requests;
pub mod responses;

pub use listing::{FilterResult, Image, Listing};
pub use requests::{AnalysisRequest, ItemSource, ListingRequest};
pub use responses::{AnalysisResponse, ClearResponse, HealthResponse, StatsResponse};
