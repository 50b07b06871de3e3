//! Source adapters and the registry that picks one for a URL.
//!
//! Every supported site family implements [`SourceAdapter`]. The importer only
//! ever talks to the trait; which adapter runs is decided by
//! [`SourceRegistry::find_for_url`] from the shape of the URL.

pub mod gallery;
pub mod mangadex;
pub mod markup;
pub mod series_reader;
pub mod wp_manga;

pub use gallery::GallerySource;
pub use mangadex::MangaDexSource;
pub use series_reader::SeriesReaderSource;
pub use wp_manga::WpMangaSource;

use crate::config::Config;
use crate::error::{FetchError, SourceError};
use crate::fetcher::Fetch;
use crate::helpers::{attribution, collapse_whitespace, truncate_description};
use crate::models::{Catalog, ChapterCandidate, Quality, SourceKind, SourceMetadata};
use crate::rate_limit::RequestKind;
use crate::storage::PageStore;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Per-job state handed to every adapter call.
pub struct SourceContext {
    pub url: Url,
    pub language: String,
    pub quality: Quality,
    fetcher: Arc<dyn Fetch>,
    landing: OnceCell<String>,
    cancel: CancellationToken,
}

impl SourceContext {
    pub fn new(url: Url, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            url,
            language: "en".to_string(),
            quality: Quality::Full,
            fetcher,
            landing: OnceCell::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Polled by adapters between catalog pages.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn fetcher(&self) -> &dyn Fetch {
        self.fetcher.as_ref()
    }

    /// The HTML of the source URL, fetched once per job and shared between
    /// metadata extraction and the first catalog page.
    pub async fn landing_page(&self) -> Result<&str, FetchError> {
        self.landing
            .get_or_try_init(|| self.fetcher.get_text(self.url.as_str(), RequestKind::Document))
            .await
            .map(String::as_str)
    }

    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether `url` has this source's canonical shape. Never touches the network.
    fn validate(&self, url: &Url) -> bool;

    async fn extract_metadata(&self, ctx: &SourceContext) -> Result<SourceMetadata, SourceError>;

    async fn list_chapters(&self, ctx: &SourceContext) -> Result<Catalog, SourceError>;

    /// Ordered page image URLs for one chapter.
    async fn resolve_pages(
        &self,
        ctx: &SourceContext,
        chapter: &ChapterCandidate,
    ) -> Result<Vec<String>, SourceError>;

    /// Referer sent with image requests.
    fn referer(&self, ctx: &SourceContext) -> Option<String> {
        Some(format!("{}/", ctx.origin()))
    }

    /// Best-effort cover download; `None` means "use the placeholder".
    async fn download_cover(
        &self,
        ctx: &SourceContext,
        metadata: &SourceMetadata,
        store: &PageStore,
    ) -> Option<String> {
        let cover_url = metadata.cover_url.as_deref()?;
        let referer = self.referer(ctx);
        let bytes = match ctx.fetcher().get_bytes(cover_url, referer.as_deref()).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                log::warn!("{}: cover {} was empty", self.name(), cover_url);
                return None;
            }
            Err(e) => {
                log::warn!("{}: cover download failed: {}", self.name(), e);
                return None;
            }
        };
        match store.save_cover(cover_url, &bytes).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("{}: could not store cover: {}", self.name(), e);
                None
            }
        }
    }
}

/// Fill in the fallbacks every adapter shares: a usable title is mandatory,
/// author and description are not.
pub fn finish_metadata(
    source_name: &str,
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    cover_url: Option<String>,
) -> Result<SourceMetadata, SourceError> {
    let title = title
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SourceError::Parse("no title found".to_string()))?;
    let author = author
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let description = description
        .map(|d| truncate_description(&d))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| attribution(source_name));
    Ok(SourceMetadata {
        title,
        author,
        description,
        cover_url: cover_url.filter(|c| !c.trim().is_empty()),
    })
}

/// Registry of available adapters, consulted in registration order.
pub struct SourceRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new(config: &Config) -> Self {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(MangaDexSource::new(config.mangadex.clone())),
            Box::new(GallerySource::new()),
            Box::new(SeriesReaderSource::new()),
            Box::new(WpMangaSource::new()),
        ];
        Self { adapters }
    }

    pub fn with_adapters(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn find_for_url(&self, url: &Url) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.validate(url))
            .map(|a| a.as_ref())
    }

    pub fn get(&self, kind: SourceKind) -> Option<&dyn SourceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.kind() == kind)
            .map(|a| a.as_ref())
    }

    pub fn all(&self) -> &[Box<dyn SourceAdapter>] {
        &self.adapters
    }
}

/// The URL without query, fragment or trailing slash, for building child paths.
pub(crate) fn series_base(url: &Url) -> String {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.as_str().trim_end_matches('/').to_string()
}

/// Path segments of a URL without empty pieces.
pub(crate) fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default()
}
