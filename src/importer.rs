//! The import orchestrator.
//!
//! [`Importer::import`] drives one adapter through the whole job: validate,
//! metadata, cover, catalog, range filter, dedupe, then a strictly sequential
//! chapter and page download loop. Item failures are recorded in the
//! [`ImportReport`]; only the fatal kinds of [`ImportError`] end a job early.

use crate::config::{Config, EmptySelectionPolicy};
use crate::dedupe::{dedupe, sort_ascending};
use crate::error::{ImportError, ItemFetchError};
use crate::fetcher::{Fetch, RateLimitedFetcher};
use crate::models::{ChapterCandidate, ChapterResult, ImportRequest, ImportResult, Title};
use crate::range;
use crate::rate_limit::RateLimiter;
use crate::report::{ChapterReport, ChapterStatus, ImportReport, PageOutcome};
use crate::sanitize::{chapter_folder, sanitize};
use crate::sources::{SourceAdapter, SourceContext, SourceRegistry};
use crate::storage::PageStore;
use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A successful job: the result for the persistence layer plus the report of
/// everything that was skipped on the way.
#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub result: ImportResult,
    pub report: ImportReport,
}

pub struct Importer {
    registry: SourceRegistry,
    fetcher: Arc<dyn Fetch>,
    store: PageStore,
    config: Config,
}

impl Importer {
    pub fn new(registry: SourceRegistry, fetcher: Arc<dyn Fetch>, store: PageStore, config: Config) -> Self {
        Self {
            registry,
            fetcher,
            store,
            config,
        }
    }

    /// Production wiring: retrying HTTP client, fixed-interval limiter and a
    /// page store rooted at `config.upload_dir`.
    pub fn from_config(config: Config) -> Result<Self, reqwest::Error> {
        let client = config.http.create_http_client()?;
        let limiter: Arc<dyn RateLimiter> = Arc::new(config.rate_limit.create_limiter());
        let fetcher: Arc<dyn Fetch> = Arc::new(RateLimitedFetcher::new(client, limiter));
        let registry = SourceRegistry::new(&config);
        let store = PageStore::new(&config.upload_dir);
        Ok(Self::new(registry, fetcher, store, config))
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn select_adapter(&self, request: &ImportRequest) -> Result<(&dyn SourceAdapter, Url), ImportError> {
        let invalid = || ImportError::InvalidUrl {
            url: request.url.clone(),
        };
        let url = Url::parse(request.url.trim()).map_err(|_| invalid())?;
        let adapter = match request.source {
            Some(kind) => self.registry.get(kind).filter(|a| a.validate(&url)),
            None => self.registry.find_for_url(&url),
        };
        adapter.map(|a| (a, url)).ok_or_else(invalid)
    }

    pub async fn import(
        &self,
        request: &ImportRequest,
        cancel: &CancellationToken,
    ) -> Result<ImportOutcome, ImportError> {
        let (adapter, url) = self.select_adapter(request)?;
        log::info!("Importing {} with the {} adapter", url, adapter.name());

        let ctx = SourceContext::new(url, self.fetcher.clone())
            .with_language(request.language.clone())
            .with_quality(request.quality)
            .with_cancellation(cancel.clone());
        let mut report = ImportReport::new(adapter.name(), &request.url);

        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        let metadata = adapter.extract_metadata(&ctx).await.map_err(|e| {
            log::error!("Metadata extraction failed for {}: {}", request.url, e);
            ImportError::Metadata { reason: e.to_string() }
        })?;
        log::info!("Title: {} by {}", metadata.title, metadata.author);

        let cover = adapter.download_cover(&ctx, &metadata, &self.store).await;
        if cover.is_none() {
            report.cover_error = Some(match &metadata.cover_url {
                Some(cover_url) => format!("could not store cover from {}", cover_url),
                None => "no cover image found".to_string(),
            });
        }
        report.cover = cover.clone();
        let title = Title {
            name: metadata.title.clone(),
            author: metadata.author,
            description: metadata.description,
            cover: cover.unwrap_or_else(|| self.config.placeholder_cover.clone()),
            created_at: Utc::now(),
        };

        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        let catalog = match adapter.list_chapters(&ctx).await {
            Ok(catalog) => catalog,
            Err(e) => {
                log::error!("Could not list chapters for {}: {}", request.url, e);
                return Err(ImportError::CatalogEmpty);
            }
        };
        report.catalog_size = catalog.chapters.len();
        report.catalog_failures = catalog.failures;
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        if catalog.chapters.is_empty() {
            return Err(ImportError::CatalogEmpty);
        }

        let selection = self.select(&request.range, catalog.chapters, &mut report)?;
        let mut chapters = dedupe(selection);
        sort_ascending(&mut chapters);
        report.selected = chapters.len();
        log::info!(
            "{} of {} catalog entries selected for download",
            chapters.len(),
            report.catalog_size
        );

        let title_folder = sanitize(&title.name);
        let mut results: Vec<ChapterResult> = Vec::new();
        for chapter in &chapters {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let (chapter_report, result) = self
                .download_chapter(adapter, &ctx, &title_folder, chapter, cancel)
                .await;
            if chapter_report.status == ChapterStatus::Cancelled {
                report.cancelled = true;
            }
            report.record_chapter(chapter_report);
            results.extend(result);
        }
        report.finish();

        if results.is_empty() {
            if report.cancelled {
                return Err(ImportError::Cancelled);
            }
            return Err(ImportError::NoChaptersDownloaded {
                report: Box::new(report),
            });
        }
        log::info!(
            "Imported {} chapters of '{}' ({:.1}% of pages stored)",
            report.completed_chapters(),
            title.name,
            report.page_success_rate()
        );
        Ok(ImportOutcome {
            result: ImportResult {
                title,
                chapters: results,
            },
            report,
        })
    }

    /// Apply the range expression. A selection that matches nothing either
    /// falls back to the whole catalog or fails, depending on the policy.
    fn select(
        &self,
        expression: &str,
        catalog: Vec<ChapterCandidate>,
        report: &mut ImportReport,
    ) -> Result<Vec<ChapterCandidate>, ImportError> {
        let range = range::expand(expression);
        if range.is_all() {
            return Ok(catalog);
        }
        if range.is_empty() {
            log::warn!("Range '{}' has no usable terms", expression);
        }
        let selected = range.filter(&catalog);
        if !selected.is_empty() {
            return Ok(selected);
        }
        match self.config.empty_selection {
            EmptySelectionPolicy::ImportAll => {
                log::warn!(
                    "Range '{}' selects none of the {} chapters, importing all of them",
                    expression,
                    catalog.len()
                );
                report.selection_fallback = true;
                Ok(catalog)
            }
            EmptySelectionPolicy::Reject => Err(ImportError::EmptySelection {
                expression: expression.to_string(),
            }),
        }
    }

    async fn download_chapter(
        &self,
        adapter: &dyn SourceAdapter,
        ctx: &SourceContext,
        title_folder: &str,
        chapter: &ChapterCandidate,
        cancel: &CancellationToken,
    ) -> (ChapterReport, Option<ChapterResult>) {
        let mut report = ChapterReport {
            number: chapter.reported_number.clone(),
            source_id: chapter.id.clone(),
            status: ChapterStatus::Completed,
            pages: Vec::new(),
        };

        let urls = match adapter.resolve_pages(ctx, chapter).await {
            Ok(urls) => urls,
            Err(e) => {
                report.status = ChapterStatus::ResolveFailed(ItemFetchError::new(&chapter.id, &e));
                return (report, None);
            }
        };
        log::debug!("Chapter {}: {} pages to fetch", chapter.reported_number, urls.len());

        let folder = chapter_folder(&chapter.reported_number);
        let referer = adapter.referer(ctx);
        let mut saved: Vec<String> = Vec::new();
        for (position, url) in urls.iter().enumerate() {
            if cancel.is_cancelled() {
                self.store.discard(&saved).await;
                report.status = ChapterStatus::Cancelled;
                return (report, None);
            }
            let index = position + 1;
            let outcome = match ctx.fetcher().get_bytes(url, referer.as_deref()).await {
                Ok(bytes) if bytes.is_empty() => PageOutcome::Failed {
                    index,
                    error: ItemFetchError::new(url.as_str(), "empty response body"),
                },
                Ok(bytes) => match self.store.save_page(title_folder, &folder, index, url, &bytes).await {
                    Ok(path) => {
                        saved.push(path.clone());
                        PageOutcome::Saved { index, path }
                    }
                    Err(e) => PageOutcome::Failed {
                        index,
                        error: ItemFetchError::new(url.as_str(), format!("could not write page: {}", e)),
                    },
                },
                Err(e) => PageOutcome::Failed {
                    index,
                    error: ItemFetchError::from(&e),
                },
            };
            if let PageOutcome::Failed { error, .. } = &outcome {
                log::warn!("Chapter {} page {} skipped: {}", chapter.reported_number, index, error.reason);
            }
            report.pages.push(outcome);
        }

        if saved.is_empty() {
            report.status = ChapterStatus::NoPages;
            return (report, None);
        }
        let result = ChapterResult {
            number: chapter.reported_number.clone(),
            title: chapter.title.clone(),
            pages: saved,
        };
        (report, Some(result))
    }
}
