//! Listing and verdict types exchanged with the collaborators.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A listing image, referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

// == Listing ==
/// A normalized scraped marketplace item.
///
/// Platform-specific attributes (price, brand, condition, ...) are kept in
/// `extra` so that every marketplace shares one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub platform: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Listing {
    pub fn new(platform: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            url: url.into(),
            title: title.into(),
            images: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Adds images (builder style).
    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images.extend(urls.into_iter().map(Image::new));
        self
    }

    /// Keeps at most `max_images` images.
    pub fn truncate_images(&mut self, max_images: usize) {
        self.images.truncate(max_images);
    }
}

// == Filter Result ==
/// Verdict for one free-text filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    #[serde(alias = "desc")]
    pub description: String,
    /// `None` when the model could not decide
    #[serde(default)]
    pub value: Option<bool>,
    /// Number of listing images the verdict was based on
    #[serde(default)]
    pub images_considered: usize,
}

impl FilterResult {
    pub fn new(description: impl Into<String>, value: Option<bool>) -> Self {
        Self {
            description: description.into(),
            value,
            images_considered: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_keeps_platform_fields() {
        let json = r#"{
            "platform": "vinted",
            "url": "https://vinted.example/items/42",
            "title": "Leather jacket",
            "images": [{"url": "https://img.example/1.jpg"}],
            "price": "40.00",
            "brand": "Acme"
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.images.len(), 1);
        assert_eq!(listing.extra["brand"], "Acme");

        let back = serde_json::to_value(&listing).unwrap();
        assert_eq!(back["price"], "40.00");
    }

    #[test]
    fn test_truncate_images() {
        let mut listing = Listing::new("ebay", "https://ebay.example/1", "Lamp")
            .with_images(["a", "b", "c"]);
        listing.truncate_images(2);
        assert_eq!(listing.images, vec![Image::new("a"), Image::new("b")]);

        listing.truncate_images(10);
        assert_eq!(listing.images.len(), 2);
    }

    #[test]
    fn test_filter_result_accepts_short_field_name() {
        let result: FilterResult = serde_json::from_str(r#"{"desc": "red", "value": true}"#).unwrap();
        assert_eq!(result.description, "red");
        assert_eq!(result.value, Some(true));
        assert_eq!(result.images_considered, 0);
    }
}
