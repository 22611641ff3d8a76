//! Cache Key Module
//!
//! Builds stable, order-independent identities for memoized operations.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Query parameters that only carry tracking/attribution data.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "msclkid",
    "igshid",
    "mc_cid",
    "mc_eid",
    "ref",
    "referrer",
    "ref_src",
    "homepage_session_id",
    "_ga",
];

// == Operation ==
/// Kind of memoized work. Each kind has exactly one payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Fetching and parsing a listing page
    Scrape,
    /// Evaluating filters against a listing
    Analysis,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Scrape => "scrape",
            Operation::Analysis => "analysis",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Key ==
/// Value-equal identity of one memoized result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: Operation,
    pub platform: String,
    /// Canonicalized listing URL
    pub resource: String,
    /// Number of images considered
    pub detail_level: u32,
    /// Hex SHA-256 over the normalized filter set
    pub filter_fingerprint: String,
}

impl CacheKey {
    /// Same identity at a different detail level.
    pub fn at_level(&self, detail_level: u32) -> Self {
        Self {
            detail_level,
            ..self.clone()
        }
    }

    /// Storage form without the detail level. All levels of one
    /// (operation, platform, resource, filters) share this prefix.
    ///
    /// The resource goes last since it may contain the separator; the
    /// platform has `%` and `:` percent-escaped so it never does.
    pub fn family(&self) -> String {
        format!(
            "{}:{}:{}",
            self.operation,
            escape_segment(&self.platform),
            self.filter_fingerprint
        )
    }

    /// Full storage form used by the map and Redis backends.
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.family(), self.detail_level, self.resource)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

// == Key Deriver ==
/// Pure derivation of [`CacheKey`]s from request fields.
pub struct KeyDeriver;

impl KeyDeriver {
    /// Builds the key for `operation` on a listing.
    ///
    /// Filters are fingerprinted as a set: order and duplicates do not
    /// matter, but the raw text does (no case folding).
    pub fn derive<S: AsRef<str>>(
        operation: Operation,
        platform: &str,
        resource: &str,
        detail_level: u32,
        filters: &[S],
    ) -> CacheKey {
        CacheKey {
            operation,
            platform: platform.to_string(),
            resource: Self::canonical_resource(resource),
            detail_level,
            filter_fingerprint: Self::fingerprint(filters),
        }
    }

    /// Sorted, deduplicated filter descriptions.
    pub fn normalize_filters<S: AsRef<str>>(filters: &[S]) -> Vec<String> {
        filters
            .iter()
            .map(|f| f.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// SHA-256 over the JSON array of normalized filters.
    ///
    /// JSON gives a delimiter that cannot be forged by the filter text
    /// itself, so `["a,b"]` and `["a", "b"]` never collide. The empty set
    /// hashes `[]`.
    pub fn fingerprint<S: AsRef<str>>(filters: &[S]) -> String {
        let normalized = Self::normalize_filters(filters);
        let mut hasher = Sha256::new();
        for (i, filter) in normalized.iter().enumerate() {
            hasher.update(if i == 0 { "[" } else { "," });
            hasher.update(serde_json::Value::from(filter.as_str()).to_string());
        }
        hasher.update(if normalized.is_empty() { "[]" } else { "]" });
        hex::encode(hasher.finalize())
    }

    /// Strips tracking query parameters and the fragment from a listing URL.
    ///
    /// Inputs that do not parse as URLs are only trimmed.
    pub fn canonical_resource(raw: &str) -> String {
        let trimmed = raw.trim();
        let Ok(mut url) = Url::parse(trimmed) else {
            return trimmed.to_string();
        };

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !is_tracking_param(name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        url.set_fragment(None);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        url.to_string()
    }
}

fn escape_segment(raw: &str) -> Cow<'_, str> {
    if raw.contains(['%', ':']) {
        Cow::Owned(raw.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: [&str; 0] = [];

    #[test]
    fn test_fingerprint_ignores_order_and_duplicates() {
        let a = KeyDeriver::fingerprint(&["red", "leather"]);
        let b = KeyDeriver::fingerprint(&["leather", "red", "red"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_is_case_sensitive() {
        assert_ne!(
            KeyDeriver::fingerprint(&["Red"]),
            KeyDeriver::fingerprint(&["red"])
        );
    }

    #[test]
    fn test_fingerprint_delimiter_cannot_be_forged() {
        assert_ne!(
            KeyDeriver::fingerprint(&["a,b"]),
            KeyDeriver::fingerprint(&["a", "b"])
        );
        assert_ne!(
            KeyDeriver::fingerprint(&["a\",\"b"]),
            KeyDeriver::fingerprint(&["a", "b"])
        );
    }

    #[test]
    fn test_empty_filter_set_is_distinct() {
        let empty = KeyDeriver::fingerprint(&EMPTY);
        assert_eq!(empty, KeyDeriver::fingerprint(&EMPTY));
        assert_ne!(empty, KeyDeriver::fingerprint(&[""]));
        assert_ne!(empty, KeyDeriver::fingerprint(&["red"]));
    }

    #[test]
    fn test_canonical_resource_strips_tracking() {
        let canonical = KeyDeriver::canonical_resource(
            "https://vinted.example/items/42?utm_source=mail&size=M&referrer=catalog#photos",
        );
        assert_eq!(canonical, "https://vinted.example/items/42?size=M");

        let bare = KeyDeriver::canonical_resource(" https://vinted.example/items/42?fbclid=x ");
        assert_eq!(bare, "https://vinted.example/items/42");
    }

    #[test]
    fn test_canonical_resource_keeps_unparseable_input() {
        assert_eq!(KeyDeriver::canonical_resource("  item-42 "), "item-42");
    }

    #[test]
    fn test_cosmetic_url_variants_share_a_key() {
        let a = KeyDeriver::derive(
            Operation::Analysis,
            "vinted",
            "https://vinted.example/items/42?utm_campaign=x",
            2,
            &["red"],
        );
        let b = KeyDeriver::derive(
            Operation::Analysis,
            "vinted",
            "https://vinted.example/items/42",
            2,
            &["red"],
        );
        assert_eq!(a, b);
        assert_eq!(a.storage_key(), b.storage_key());
    }

    #[test]
    fn test_family_excludes_detail_level() {
        let key = KeyDeriver::derive(Operation::Scrape, "ebay", "https://ebay.example/1", 3, &EMPTY);
        let other = key.at_level(7);
        assert_eq!(key.family(), other.family());
        assert_ne!(key.storage_key(), other.storage_key());
        assert!(key.storage_key().ends_with(":3:https://ebay.example/1"));
    }

    #[test]
    fn test_operations_never_share_keys() {
        let scrape = KeyDeriver::derive(Operation::Scrape, "ebay", "u", 1, &EMPTY);
        let analysis = KeyDeriver::derive(Operation::Analysis, "ebay", "u", 1, &EMPTY);
        assert_ne!(scrape, analysis);
        assert_ne!(scrape.storage_key(), analysis.storage_key());
    }

    #[test]
    fn test_separator_in_platform_cannot_forge_a_key() {
        let fingerprint = KeyDeriver::fingerprint(&EMPTY);
        // Unescaped, both would be "scrape:x:<fp>:1:y:<fp>:1:u"
        let crafted = KeyDeriver::derive(Operation::Scrape, &format!("x:{}:1:y", fingerprint), "u", 1, &EMPTY);
        let victim = KeyDeriver::derive(Operation::Scrape, "x", &format!("y:{}:1:u", fingerprint), 1, &EMPTY);
        assert_ne!(crafted.storage_key(), victim.storage_key());
        assert_ne!(crafted.family(), victim.family());

        let colon = KeyDeriver::derive(Operation::Scrape, "a:b", "u", 1, &EMPTY);
        let escaped = KeyDeriver::derive(Operation::Scrape, "a%3Ab", "u", 1, &EMPTY);
        assert_ne!(colon.storage_key(), escaped.storage_key());
        assert!(colon.storage_key().starts_with("scrape:a%3Ab:"));
        assert!(escaped.storage_key().starts_with("scrape:a%253Ab:"));
    }
}
