use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The source families the importer knows how to read.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Gallery,
    WpManga,
    MangaDex,
    SeriesReader,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Gallery => "Gallery",
            SourceKind::WpManga => "WP-Manga",
            SourceKind::MangaDex => "MangaDex",
            SourceKind::SeriesReader => "Series Reader",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gallery" => Ok(SourceKind::Gallery),
            "wp-manga" | "wpmanga" | "blog" => Ok(SourceKind::WpManga),
            "mangadex" | "md" => Ok(SourceKind::MangaDex),
            "series" | "series-reader" | "reader" => Ok(SourceKind::SeriesReader),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Image quality tier for sources that serve more than one rendition.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    #[default]
    Full,
    DataSaver,
}

impl Quality {
    /// Path segment used by the MangaDex at-home servers.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Quality::Full => "data",
            Quality::DataSaver => "data-saver",
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" | "data" | "highest" | "high" => Ok(Quality::Full),
            "data-saver" | "datasaver" | "saver" | "low" => Ok(Quality::DataSaver),
            other => Err(format!("unknown quality '{}'", other)),
        }
    }
}

/// Title metadata as read from a source, before the cover is stored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceMetadata {
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Title {
    pub name: String,
    pub author: String,
    pub description: String,
    /// Path of the stored cover relative to the upload root, or the placeholder.
    pub cover: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of a source's chapter catalog.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChapterCandidate {
    /// Source-internal reference: a chapter URL or an API id.
    pub id: String,
    pub number: f64,
    /// The number exactly as the source printed it.
    pub reported_number: String,
    pub title: Option<String>,
    pub page_hint: u32,
}

impl ChapterCandidate {
    pub fn new(id: impl Into<String>, reported_number: &str) -> Self {
        Self {
            id: id.into(),
            number: crate::helpers::parse_chapter_number(reported_number),
            reported_number: reported_number.trim().to_string(),
            title: None,
            page_hint: 0,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_page_hint(mut self, page_hint: u32) -> Self {
        self.page_hint = page_hint;
        self
    }
}

/// Everything a catalog walk produced, including catalog pages that failed.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub chapters: Vec<ChapterCandidate>,
    pub failures: Vec<crate::error::ItemFetchError>,
}

impl Catalog {
    pub fn new(chapters: Vec<ChapterCandidate>) -> Self {
        Self {
            chapters,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChapterResult {
    pub number: String,
    pub title: Option<String>,
    pub pages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportResult {
    pub title: Title,
    pub chapters: Vec<ChapterResult>,
}

/// Parameters of one import job.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub url: String,
    pub range: String,
    pub language: String,
    pub quality: Quality,
    /// Bypass URL-based adapter selection.
    pub source: Option<SourceKind>,
}

impl ImportRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            range: "all".to_string(),
            language: "en".to_string(),
            quality: Quality::Full,
            source: None,
        }
    }

    pub fn range(mut self, range: impl Into<String>) -> Self {
        self.range = range.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }
}
