//! Request pacing.
//!
//! Target sites publish no limits, so every request is followed by a fixed pause
//! whose length depends on what was requested. The limiter is a trait object so
//! tests can run without waiting.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

/// What a request was for; each kind gets its own delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// HTML pages: series pages, catalog pages, chapter readers.
    Document,
    /// JSON API calls.
    Api,
    /// Page and cover images.
    Image,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Called once after every request, successful or not.
    async fn after_request(&self, kind: RequestKind);
}

#[derive(Debug, Clone)]
pub struct FixedIntervalLimiter {
    document: Duration,
    api: Duration,
    image: Duration,
}

impl FixedIntervalLimiter {
    pub fn new(document: Duration, api: Duration, image: Duration) -> Self {
        Self {
            document,
            api,
            image,
        }
    }

    pub fn delay_for(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Document => self.document,
            RequestKind::Api => self.api,
            RequestKind::Image => self.image,
        }
    }
}

impl Default for FixedIntervalLimiter {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1000),
            Duration::from_millis(500),
            Duration::from_millis(200),
        )
    }
}

#[async_trait]
impl RateLimiter for FixedIntervalLimiter {
    async fn after_request(&self, kind: RequestKind) {
        let delay = self.delay_for(kind);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

#[async_trait]
impl RateLimiter for NoopLimiter {
    async fn after_request(&self, _kind: RequestKind) {}
}
