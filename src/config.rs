use crate::error::ConfigError;
use crate::http_client::{EnhancedHttpClient, HttpClientConfig};
use crate::models::Quality;
use crate::rate_limit::FixedIntervalLimiter;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Root of the `covers/` and `pages/` trees
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Cover reference used when the cover download fails
    #[serde(default = "default_placeholder_cover")]
    pub placeholder_cover: String,

    #[serde(default)]
    pub empty_selection: EmptySelectionPolicy,

    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default)]
    pub default_quality: Quality,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub mangadex: MangaDexConfig,
}

/// What to do when a range expression other than "all" selects nothing.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptySelectionPolicy {
    /// Import the whole catalog instead.
    #[default]
    ImportAll,
    /// Fail the job with `ImportError::EmptySelection`.
    Reject,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of retry attempts for retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    #[serde(default = "default_true")]
    pub enable_cookies: bool,

    /// Enable gzip/brotli compression
    #[serde(default = "default_true")]
    pub enable_compression: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Pause after HTML page requests
    #[serde(default = "default_document_delay")]
    pub document_delay_ms: u64,

    /// Pause after JSON API requests
    #[serde(default = "default_api_delay")]
    pub api_delay_ms: u64,

    /// Pause after every image download
    #[serde(default = "default_image_delay")]
    pub image_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MangaDexConfig {
    #[serde(default = "default_mangadex_api")]
    pub api_base: String,

    #[serde(default = "default_mangadex_uploads")]
    pub uploads_base: String,

    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: u32,
}

fn default_true() -> bool { true }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_placeholder_cover() -> String { "covers/placeholder.jpg".to_string() }
fn default_language() -> String { "en".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_max_retries() -> usize { 3 }
fn default_initial_retry_delay() -> u64 { 500 }
fn default_max_retry_delay() -> u64 { 8000 }
fn default_document_delay() -> u64 { 1000 }
fn default_api_delay() -> u64 { 500 }
fn default_image_delay() -> u64 { 200 }
fn default_mangadex_api() -> String { "https://api.mangadex.org".to_string() }
fn default_mangadex_uploads() -> String { "https://uploads.mangadex.org".to_string() }
fn default_feed_page_size() -> u32 { 100 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
            enable_cookies: true,
            enable_compression: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            document_delay_ms: default_document_delay(),
            api_delay_ms: default_api_delay(),
            image_delay_ms: default_image_delay(),
        }
    }
}

impl Default for MangaDexConfig {
    fn default() -> Self {
        Self {
            api_base: default_mangadex_api(),
            uploads_base: default_mangadex_uploads(),
            feed_page_size: default_feed_page_size(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            placeholder_cover: default_placeholder_cover(),
            empty_selection: EmptySelectionPolicy::default(),
            default_language: default_language(),
            default_quality: Quality::default(),
            http: HttpConfig::default(),
            rate_limit: RateLimitConfig::default(),
            mangadex: MangaDexConfig::default(),
        }
    }
}

impl Config {
    /// Read `config.toml` from the working directory, falling back to defaults
    /// when it is missing or unreadable.
    pub fn load() -> Self {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if !path.exists() {
            return Self::default();
        }
        match Self::from_path(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Ignoring {}: {}", DEFAULT_CONFIG_PATH, e);
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<Config>(content)?)
    }
}

impl HttpConfig {
    pub fn create_http_client(&self) -> Result<EnhancedHttpClient, reqwest::Error> {
        EnhancedHttpClient::with_config(HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
            enable_cookies: self.enable_cookies,
            enable_gzip: self.enable_compression,
        })
    }
}

impl RateLimitConfig {
    pub fn create_limiter(&self) -> FixedIntervalLimiter {
        FixedIntervalLimiter::new(
            Duration::from_millis(self.document_delay_ms),
            Duration::from_millis(self.api_delay_ms),
            Duration::from_millis(self.image_delay_ms),
        )
    }
}
