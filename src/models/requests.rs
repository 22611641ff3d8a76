//! Request DTOs for the gateway API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Detail level used when a request omits `max_images`.
pub const DEFAULT_MAX_IMAGES: u32 = 1;

fn default_max_images() -> u32 {
    DEFAULT_MAX_IMAGES
}

/// Raw listing page as captured by the browser extension.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSource {
    /// Marketplace identifier (e.g. "vinted")
    pub platform: String,
    /// Listing URL
    pub url: String,
    /// Page HTML
    pub html: String,
}

impl ItemSource {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.platform.trim().is_empty() {
            return Some("Platform cannot be empty".to_string());
        }
        if self.platform.contains(':') {
            return Some("Platform cannot contain ':'".to_string());
        }
        if self.url.trim().is_empty() {
            return Some("URL cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /listings
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRequest {
    #[serde(flatten)]
    pub item: ItemSource,
    /// Number of images to keep
    #[serde(default = "default_max_images")]
    pub max_images: u32,
}

/// Request body for POST /analyze
///
/// # Fields
/// - `item`: the listing page to scrape
/// - `filters`: free-text filter descriptions
/// - `max_images`: detail level (number of images considered)
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub item: ItemSource,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default = "default_max_images")]
    pub max_images: u32,
}

impl AnalysisRequest {
    /// Validates the request data
    pub fn validate(&self) -> Option<String> {
        if let Some(msg) = self.item.validate() {
            return Some(msg);
        }
        if self.filters.iter().any(|f| f.trim().is_empty()) {
            return Some("Filters cannot be blank".to_string());
        }
        None
    }
}
