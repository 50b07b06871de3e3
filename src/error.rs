//! Error types for the import pipeline.
//!
//! Three layers: [`FetchError`] for a single HTTP request, [`SourceError`] for an
//! adapter operation and [`ImportError`] for the fatal outcomes of a whole job.
//! Transient failures never leave their loop; they are recorded as
//! [`ItemFetchError`] entries in the import report instead.

use crate::report::ImportReport;
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("no response recorded for {0}")]
    Missing(String),
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Http { url, .. } | FetchError::Status { url, .. } => url,
            FetchError::Missing(url) => url,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid JSON from source: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not parse source markup: {0}")]
    Parse(String),
    #[error("url does not match this source: {0}")]
    UnsupportedUrl(String),
}

/// One page, chapter or catalog page that could not be fetched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemFetchError {
    pub url: String,
    pub reason: String,
}

impl ItemFetchError {
    pub fn new(url: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&FetchError> for ItemFetchError {
    fn from(err: &FetchError) -> Self {
        ItemFetchError::new(err.url(), err)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("invalid url for source: {url}")]
    InvalidUrl { url: String },
    #[error("metadata extraction failed: {reason}")]
    Metadata { reason: String },
    #[error("no chapters found")]
    CatalogEmpty,
    #[error("range \"{expression}\" selects no chapters")]
    EmptySelection { expression: String },
    #[error("no chapters were successfully downloaded")]
    NoChaptersDownloaded { report: Box<ImportReport> },
    #[error("import cancelled before any chapter completed")]
    Cancelled,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}
