//! The fetch seam used by adapters and the importer.
//!
//! Adapters never talk to `reqwest` directly; they go through [`Fetch`], which the
//! production [`RateLimitedFetcher`] implements by pairing the retrying HTTP client
//! with a [`RateLimiter`]. Tests substitute an in-memory implementation.

use crate::error::FetchError;
use crate::http_client::EnhancedHttpClient;
use crate::rate_limit::{RateLimiter, RequestKind};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get_text(&self, url: &str, kind: RequestKind) -> Result<String, FetchError>;

    async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, FetchError>;

    /// Form POST returning the response body; paced like a document request.
    async fn post_form(&self, url: &str, form: &[(&str, &str)], referer: Option<&str>) -> Result<String, FetchError>;
}

/// Sequential fetcher: one request at a time, a limiter pause after each.
pub struct RateLimitedFetcher {
    client: EnhancedHttpClient,
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitedFetcher {
    pub fn new(client: EnhancedHttpClient, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { client, limiter }
    }
}

#[async_trait]
impl Fetch for RateLimitedFetcher {
    async fn get_text(&self, url: &str, kind: RequestKind) -> Result<String, FetchError> {
        log::debug!("GET {} ({:?})", url, kind);
        let result = self.client.get_text(url).await;
        self.limiter.after_request(kind).await;
        result
    }

    async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, FetchError> {
        log::debug!("GET {} (image)", url);
        let result = self.client.get_bytes(url, referer).await;
        self.limiter.after_request(RequestKind::Image).await;
        result
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)], referer: Option<&str>) -> Result<String, FetchError> {
        log::debug!("POST {} ({} fields)", url, form.len());
        let result = self.client.post_form(url, form, referer).await;
        self.limiter.after_request(RequestKind::Document).await;
        result
    }
}
