//! Collaborators
//!
//! The expensive, non-deterministic work the gateway memoizes: scraping a
//! listing page and asking a model to judge filters against a listing.
//! Both are reached through traits so tests and alternative deployments can
//! plug in their own implementations.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::models::{FilterResult, Listing};

/// Timeout for one collaborator call. Model calls can be slow.
const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(120);

// == Traits ==
/// Turns a captured listing page into a structured [`Listing`].
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    async fn fetch_listing(&self, platform: &str, url: &str, html: &str) -> anyhow::Result<Listing>;
}

/// Judges free-text filters against a listing.
///
/// Returns one verdict per filter, in any order.
#[async_trait]
pub trait FilterEvaluator: Send + Sync {
    async fn evaluate(&self, listing: &Listing, filters: &[String]) -> anyhow::Result<Vec<FilterResult>>;
}

// == HTTP Implementations ==
fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(COLLABORATOR_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

async fn post_json<B, T>(client: &reqwest::Client, endpoint: &str, body: &B) -> anyhow::Result<T>
where
    B: Serialize + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let response = client
        .post(endpoint)
        .json(body)
        .send()
        .await
        .with_context(|| format!("request to {} failed", endpoint))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", endpoint))?;

    response
        .json()
        .await
        .with_context(|| format!("unreadable response from {}", endpoint))
}

/// Scraper reached over HTTP. Posts `{platform, url, html}` and expects a
/// listing back.
pub struct HttpListingFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpListingFetcher {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ListingFetcher for HttpListingFetcher {
    async fn fetch_listing(&self, platform: &str, url: &str, html: &str) -> anyhow::Result<Listing> {
        let body = json!({ "platform": platform, "url": url, "html": html });
        post_json(&self.client, &self.endpoint, &body).await
    }
}

/// Analyzer reached over HTTP. Posts `{item, filters: [{desc}]}` and expects
/// a list of `{desc, value}` verdicts back.
pub struct HttpFilterEvaluator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFilterEvaluator {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl FilterEvaluator for HttpFilterEvaluator {
    async fn evaluate(&self, listing: &Listing, filters: &[String]) -> anyhow::Result<Vec<FilterResult>> {
        let filters: Vec<_> = filters.iter().map(|f| json!({ "desc": f })).collect();
        let body = json!({ "item": listing, "filters": filters });
        post_json(&self.client, &self.endpoint, &body).await
    }
}
