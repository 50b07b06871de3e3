use super::markup::{
    absolutize, element_text, first_text, images_in, meta_content, page_title, regex_images, scan_author, selector,
};
use super::{finish_metadata, segments, series_base, SourceAdapter, SourceContext};
use crate::error::SourceError;
use crate::helpers::{collapse_whitespace, number_from_slug, split_chapter_label};
use crate::models::{Catalog, ChapterCandidate, SourceKind, SourceMetadata};
use crate::rate_limit::RequestKind;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;
use std::collections::HashSet;

const READER_SELECTORS: &[&str] = &["[data-reader] img", "main img", "#reader img", ".reader-area img"];

lazy_static! {
    static ref NEXT_DATA_RE: Regex =
        Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json"[^>]*>(.+?)</script>"#).unwrap();
}

#[derive(Deserialize)]
struct NextData {
    props: NextProps,
}

#[derive(Deserialize)]
struct NextProps {
    #[serde(rename = "pageProps", default)]
    page_props: PageProps,
}

#[derive(Deserialize, Default)]
struct PageProps {
    #[serde(default)]
    series: Option<SeriesData>,
    #[serde(default)]
    chapters: Option<Vec<ChapterData>>,
    #[serde(default)]
    chapter: Option<ReaderChapter>,
}

#[derive(Deserialize)]
struct SeriesData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    author: Option<Names>,
    #[serde(default)]
    artist: Option<Names>,
}

/// Sites disagree on whether creators are a string or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Names {
    One(String),
    Many(Vec<String>),
}

impl Names {
    fn into_vec(self) -> Vec<String> {
        match self {
            Names::One(s) => vec![s],
            Names::Many(v) => v,
        }
    }
}

/// A number that may arrive as a JSON string or number.
#[derive(Deserialize, Clone)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(f64),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Scalar::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ChapterData {
    chapter_id: Scalar,
    chapter: Scalar,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "page_count", alias = "pageCount")]
    pages: Option<u32>,
}

#[derive(Deserialize)]
struct ReaderChapter {
    #[serde(default)]
    images: Vec<ImageRef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImageRef {
    Url(String),
    Object {
        #[serde(alias = "src", alias = "image")]
        url: String,
    },
}

impl ImageRef {
    fn url(&self) -> &str {
        match self {
            ImageRef::Url(u) => u,
            ImageRef::Object { url } => url,
        }
    }
}

/// Chaptered reader sites built on Next.js: series at `/series/{id}`, chapters
/// at `/series/{id}/{chapter_id}`.
pub struct SeriesReaderSource;

impl SeriesReaderSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SeriesReaderSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for SeriesReaderSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SeriesReader
    }

    fn validate(&self, url: &Url) -> bool {
        matches!(segments(url).as_slice(), ["series", id] if !id.is_empty())
    }

    async fn extract_metadata(&self, ctx: &SourceContext) -> Result<SourceMetadata, SourceError> {
        let html = ctx.landing_page().await?;
        parse_metadata(html, &ctx.url, self.name())
    }

    async fn list_chapters(&self, ctx: &SourceContext) -> Result<Catalog, SourceError> {
        let html = ctx.landing_page().await?;
        let chapters = parse_chapters(html, &ctx.url);
        log::debug!("{}: {} chapters listed", self.name(), chapters.len());
        Ok(Catalog::new(chapters))
    }

    async fn resolve_pages(
        &self,
        ctx: &SourceContext,
        chapter: &ChapterCandidate,
    ) -> Result<Vec<String>, SourceError> {
        let html = ctx.fetcher().get_text(&chapter.id, RequestKind::Document).await?;
        let base = Url::parse(&chapter.id).unwrap_or_else(|_| ctx.url.clone());
        Ok(parse_reader(&html, &base))
    }
}

fn extract_next_data(html: &str) -> Option<NextData> {
    let json = NEXT_DATA_RE.captures(html)?.get(1)?.as_str();
    match serde_json::from_str::<NextData>(json) {
        Ok(data) => Some(data),
        Err(e) => {
            log::debug!("Ignoring malformed __NEXT_DATA__: {}", e);
            None
        }
    }
}

fn strip_tags(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    collapse_whitespace(&doc.root_element().text().collect::<Vec<_>>().join(" "))
}

fn parse_metadata(html: &str, base: &Url, source_name: &str) -> Result<SourceMetadata, SourceError> {
    let series = extract_next_data(html).and_then(|d| d.props.page_props.series);
    let doc = Html::parse_document(html);

    let (mut title, mut author, mut description, mut cover) = (None, None, None, None);
    if let Some(series) = series {
        title = series.title;
        description = series.description.map(|d| strip_tags(&d));
        cover = series.cover.and_then(|c| absolutize(base, &c));
        let mut creators: Vec<String> = Vec::new();
        for name in series
            .author
            .into_iter()
            .chain(series.artist)
            .flat_map(Names::into_vec)
        {
            let name = name.trim().to_string();
            if !name.is_empty() && !creators.contains(&name) {
                creators.push(name);
            }
        }
        if !creators.is_empty() {
            author = Some(creators.join(", "));
        }
    }

    let title = title
        .filter(|t| !t.trim().is_empty())
        .or_else(|| first_text(&doc, &["h1"]))
        .or_else(|| page_title(&doc));
    let author = author.or_else(|| scan_author(&doc));
    let description = description
        .filter(|d| !d.is_empty())
        .or_else(|| meta_content(&doc, &["og:description", "description"]));
    let cover = cover.or_else(|| meta_content(&doc, &["og:image"]).and_then(|c| absolutize(base, &c)));
    finish_metadata(source_name, title, author, description, cover)
}

fn parse_chapters(html: &str, series_url: &Url) -> Vec<ChapterCandidate> {
    let series_path = series_base(series_url);
    if let Some(chapters) = extract_next_data(html).and_then(|d| d.props.page_props.chapters) {
        if !chapters.is_empty() {
            return chapters
                .into_iter()
                .map(|ch| {
                    let url = format!("{}/{}", series_path, ch.chapter_id.as_text());
                    ChapterCandidate::new(url, &ch.chapter.as_text())
                        .with_title(ch.title.map(|t| collapse_whitespace(&t)))
                        .with_page_hint(ch.pages.unwrap_or(0))
                })
                .collect();
        }
    }

    // Client-rendered pages: fall back to links one level below the series
    let doc = Html::parse_document(html);
    let Some(a_sel) = selector("a[href]") else {
        return Vec::new();
    };
    let prefix = format!("{}/", series_path);
    let mut seen = HashSet::new();
    let mut chapters = Vec::new();
    for a in doc.select(&a_sel) {
        let Some(url) = a.value().attr("href").and_then(|h| absolutize(series_url, h)) else {
            continue;
        };
        let Some(tail) = url.strip_prefix(&prefix) else { continue };
        let tail = tail.trim_end_matches('/');
        if tail.is_empty() || tail.contains('/') || !seen.insert(url.clone()) {
            continue;
        }
        let (number, title) = split_chapter_label(&element_text(&a));
        let number = number
            .or_else(|| number_from_slug(tail))
            .unwrap_or_else(|| "0".to_string());
        chapters.push(ChapterCandidate::new(url, &number).with_title(title));
    }
    chapters
}

fn parse_reader(html: &str, base: &Url) -> Vec<String> {
    if let Some(chapter) = extract_next_data(html).and_then(|d| d.props.page_props.chapter) {
        let mut seen = HashSet::new();
        let urls: Vec<String> = chapter
            .images
            .iter()
            .filter_map(|img| absolutize(base, img.url()))
            .filter(|u| seen.insert(u.clone()))
            .collect();
        if !urls.is_empty() {
            return urls;
        }
    }
    let images = {
        let doc = Html::parse_document(html);
        images_in(&doc, READER_SELECTORS, base)
    };
    if images.is_empty() {
        regex_images(html)
    } else {
        images
    }
}
