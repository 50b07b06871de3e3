//! Outcome bookkeeping for one import job
//!
//! Tracks what happened to every catalog page, chapter and page image so the
//! caller can see exactly which items were skipped and why.

use crate::error::ItemFetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    Saved { index: usize, path: String },
    Failed { index: usize, error: ItemFetchError },
}

impl PageOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, PageOutcome::Saved { .. })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ChapterStatus {
    Completed,
    /// Page list could not be resolved.
    ResolveFailed(ItemFetchError),
    /// Resolved, but not a single page was stored.
    NoPages,
    /// Stopped mid-chapter; its files were removed.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterReport {
    pub number: String,
    pub source_id: String,
    pub status: ChapterStatus,
    pub pages: Vec<PageOutcome>,
}

impl ChapterReport {
    pub fn saved_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_saved()).count()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &ItemFetchError> {
        self.pages.iter().filter_map(|p| match p {
            PageOutcome::Failed { error, .. } => Some(error),
            PageOutcome::Saved { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub catalog_size: usize,
    pub selected: usize,
    /// A non-"all" range matched nothing and the whole catalog was used instead.
    pub selection_fallback: bool,
    pub catalog_failures: Vec<ItemFetchError>,
    pub cover: Option<String>,
    pub cover_error: Option<String>,
    pub chapters: Vec<ChapterReport>,
    pub cancelled: bool,
}

impl ImportReport {
    pub fn new(source: &str, url: &str) -> Self {
        Self {
            source: source.to_string(),
            url: url.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            catalog_size: 0,
            selected: 0,
            selection_fallback: false,
            catalog_failures: Vec::new(),
            cover: None,
            cover_error: None,
            chapters: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record_chapter(&mut self, chapter: ChapterReport) {
        match &chapter.status {
            ChapterStatus::Completed => log::info!(
                "Chapter {}: {} pages saved, {} failed",
                chapter.number,
                chapter.saved_pages(),
                chapter.pages.len() - chapter.saved_pages()
            ),
            ChapterStatus::ResolveFailed(e) => {
                log::warn!("Chapter {}: could not resolve pages: {}", chapter.number, e.reason)
            }
            ChapterStatus::NoPages => {
                log::warn!("Chapter {}: no pages downloaded, dropping it", chapter.number)
            }
            ChapterStatus::Cancelled => {
                log::warn!("Chapter {}: cancelled mid-download", chapter.number)
            }
        }
        self.chapters.push(chapter);
    }

    pub fn completed_chapters(&self) -> usize {
        self.chapters
            .iter()
            .filter(|c| c.status == ChapterStatus::Completed)
            .count()
    }

    pub fn failed_pages(&self) -> usize {
        self.chapters.iter().map(|c| c.failed_pages().count()).sum()
    }

    /// Share of attempted pages that were stored, in percent.
    pub fn page_success_rate(&self) -> f64 {
        let attempted: usize = self.chapters.iter().map(|c| c.pages.len()).sum();
        if attempted == 0 {
            0.0
        } else {
            let saved: usize = self.chapters.iter().map(|c| c.saved_pages()).sum();
            (saved as f64 / attempted as f64) * 100.0
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
