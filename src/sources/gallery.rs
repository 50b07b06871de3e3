use super::markup::{
    absolutize, first_text, images_in, labeled_value, meta_content, next_page_link, page_title, scan_author, selector,
};
use super::{finish_metadata, segments, SourceAdapter, SourceContext};
use crate::error::SourceError;
use crate::models::{Catalog, ChapterCandidate, SourceKind, SourceMetadata};
use crate::rate_limit::RequestKind;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use std::collections::HashSet;

/// Galleries rarely span more than a handful of listing pages; stop following
/// "next" links after this many.
const MAX_GALLERY_PAGES: usize = 50;

const TITLE_SELECTORS: &[&str] = &["#info h1", "h1.title", ".gallery-title", "h1"];
const COVER_SELECTORS: &[&str] = &["#cover img", ".cover img", ".gallery-cover img"];
const TAG_CONTAINERS: &[&str] = &[".tag-container", ".field-name", ".tags li", "#info li"];
const CREATOR_LABELS: &[&str] = &["artists", "artist", "authors", "author", "groups", "circle"];

/// Links from a thumbnail to its full-size image, preferred over the thumbnails.
const FULL_IMAGE_LINKS: &str =
    ".gallery a[href$='.jpg'], .gallery a[href$='.jpeg'], .gallery a[href$='.png'], .gallery a[href$='.webp']";
const IMAGE_SELECTORS: &[&str] = &[
    "#gallery img",
    ".gallery img",
    "#thumbnail-container img",
    ".gallery-images img",
    ".thumbs img",
];

lazy_static! {
    static ref PAGE_COUNT_RE: Regex = Regex::new(r"(?i)\bpages?\s*:?\s*(\d{1,4})\b").unwrap();
}

/// Single-volume galleries addressed as `/g/{id}`, `/gallery/{id}` or
/// `/galleries/{id}`. Each gallery is imported as one chapter numbered 1.
pub struct GallerySource;

impl GallerySource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GallerySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for GallerySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gallery
    }

    fn validate(&self, url: &Url) -> bool {
        matches!(
            segments(url).as_slice(),
            ["g" | "gallery" | "galleries", id, ..] if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
        )
    }

    async fn extract_metadata(&self, ctx: &SourceContext) -> Result<SourceMetadata, SourceError> {
        let html = ctx.landing_page().await?;
        parse_metadata(html, &ctx.url, self.name())
    }

    async fn list_chapters(&self, ctx: &SourceContext) -> Result<Catalog, SourceError> {
        let html = ctx.landing_page().await?;
        let hint = page_count(html, &ctx.url);
        let chapter = ChapterCandidate::new(ctx.url.as_str(), "1").with_page_hint(hint);
        Ok(Catalog::new(vec![chapter]))
    }

    async fn resolve_pages(
        &self,
        ctx: &SourceContext,
        chapter: &ChapterCandidate,
    ) -> Result<Vec<String>, SourceError> {
        let mut images: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(chapter.id.clone());

        while let Some(page_url) = next.take() {
            if ctx.is_cancelled() || !visited.insert(page_url.clone()) || visited.len() > MAX_GALLERY_PAGES {
                break;
            }
            let html = if page_url == ctx.url.as_str() {
                ctx.landing_page().await?.to_string()
            } else {
                match ctx.fetcher().get_text(&page_url, RequestKind::Document).await {
                    Ok(html) => html,
                    Err(e) if images.is_empty() => return Err(e.into()),
                    Err(e) => {
                        log::warn!("Gallery page {} failed, keeping {} images: {}", page_url, images.len(), e);
                        break;
                    }
                }
            };
            let base = Url::parse(&page_url).unwrap_or_else(|_| ctx.url.clone());
            let (found, following) = parse_gallery_page(&html, &base);
            images.extend(found.into_iter().filter(|u| seen.insert(u.clone())));
            next = following;
        }
        Ok(images)
    }
}

fn parse_metadata(html: &str, base: &Url, source_name: &str) -> Result<SourceMetadata, SourceError> {
    let doc = Html::parse_document(html);
    let title = first_text(&doc, TITLE_SELECTORS).or_else(|| page_title(&doc));
    let author = labeled_value(&doc, TAG_CONTAINERS, CREATOR_LABELS).or_else(|| scan_author(&doc));
    let description = meta_content(&doc, &["og:description", "description"]);
    let cover = images_in(&doc, COVER_SELECTORS, base)
        .into_iter()
        .next()
        .or_else(|| meta_content(&doc, &["og:image"]).and_then(|c| absolutize(base, &c)));
    finish_metadata(source_name, title, author, description, cover)
}

/// Declared page count if the info block shows one, else the number of
/// thumbnails on the landing page.
fn page_count(html: &str, base: &Url) -> u32 {
    let doc = Html::parse_document(html);
    let declared = first_text(&doc, &["#info", ".gallery-info", ".info"])
        .and_then(|info| PAGE_COUNT_RE.captures(&info).and_then(|c| c[1].parse::<u32>().ok()));
    declared.unwrap_or_else(|| images_in(&doc, IMAGE_SELECTORS, base).len() as u32)
}

fn parse_gallery_page(html: &str, base: &Url) -> (Vec<String>, Option<String>) {
    let doc = Html::parse_document(html);
    let full: Vec<String> = selector(FULL_IMAGE_LINKS)
        .map(|sel| {
            doc.select(&sel)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| absolutize(base, href))
                .collect()
        })
        .unwrap_or_default();
    let images = if full.is_empty() {
        images_in(&doc, IMAGE_SELECTORS, base)
    } else {
        full
    };
    (images, next_page_link(&doc, base))
}
