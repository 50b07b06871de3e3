use super::markup::{
    absolutize, element_text, first_text, images_in, labeled_value, meta_content, next_page_link, page_title,
    regex_images, scan_author, selector,
};
use super::{finish_metadata, segments, series_base, SourceAdapter, SourceContext};
use crate::error::{ItemFetchError, SourceError};
use crate::helpers::{number_from_slug, split_chapter_label};
use crate::models::{Catalog, ChapterCandidate, SourceKind, SourceMetadata};
use crate::rate_limit::RequestKind;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use std::collections::HashSet;

/// Upper bound on catalog pages followed for one title.
const MAX_CATALOG_PAGES: usize = 100;

const TITLE_SELECTORS: &[&str] = &["div.post-title h1", ".post-title h3", "h1.entry-title", ".entry-title"];
const INFO_CONTAINERS: &[&str] = &[
    ".post-content_item",
    ".imptdt",
    ".infotable tr",
    ".tsinfo .imptdt",
    ".fmed",
];
const AUTHOR_LABELS: &[&str] = &["author", "artist"];
const DESCRIPTION_SELECTORS: &[&str] = &[
    ".summary__content",
    ".description-summary",
    ".entry-content[itemprop='description']",
    ".synp .entry-content",
    ".manga-excerpt",
];
const COVER_SELECTORS: &[&str] = &[".summary_image img", ".thumb img", ".thumbook img"];

// Madara first, then the MangaStream family of themes.
const CHAPTER_SELECTORS: &[&str] = &[
    "li.wp-manga-chapter a",
    "ul.main.version-chap li a",
    "div.listing-chapters_wrap a",
    "#chapterlist li a",
    ".eplister li a",
    "div.bxcl a",
    "ul.clstyle a",
    "div.chapter-list a",
];
const READER_SELECTORS: &[&str] = &[
    "div.reading-content img",
    ".page-break img",
    "#readerarea img",
    ".entry-content img",
];

// Anchor scan: URL fragments that mark a chapter link, and ones that never do.
const CHAPTER_URL_HINTS: &[&str] = &["/chapter", "-chapter-", "/read/", "/episode/", "/ch-", "/chap-"];
const NAVIGATION_HINTS: &[&str] = &["/page/", "/category/", "/tag/", "/author/", "/genre/", "?s=", "/search"];

lazy_static! {
    static ref SLUG_TAIL_RE: Regex = Regex::new(r"chapter[-/](\d+)").unwrap();
    static ref MANGA_ID_RE: Regex = Regex::new(r#"manga_id["']?\s*[:=]\s*["']?(\d+)"#).unwrap();
}

/// WordPress "manga" themes (Madara and MangaStream style) served at
/// `/manga/{slug}` or `/webtoon/{slug}`. Catalogs may be split across pages.
pub struct WpMangaSource;

impl WpMangaSource {
    pub fn new() -> Self {
        Self
    }

    /// Madara themes that load the list client-side: the admin-ajax action
    /// keyed by the manga post id, then the per-series endpoint.
    async fn chapters_from_ajax(&self, ctx: &SourceContext, html: &str) -> Vec<ChapterCandidate> {
        let holder = chapter_holder(html);
        let series = series_base(&ctx.url);
        let referer = format!("{}/", series);

        if let Some(id) = holder.manga_id.as_deref() {
            let endpoint = format!("{}/wp-admin/admin-ajax.php", ctx.origin());
            let form = [("action", "manga_get_chapters"), ("manga", id)];
            if let Some(found) = self.post_for_chapters(ctx, &endpoint, &form, &referer).await {
                return found;
            }
        }
        if holder.present && !ctx.is_cancelled() {
            let endpoint = format!("{}/ajax/chapters/", series);
            if let Some(found) = self.post_for_chapters(ctx, &endpoint, &[], &referer).await {
                return found;
            }
        }
        Vec::new()
    }

    async fn post_for_chapters(
        &self,
        ctx: &SourceContext,
        endpoint: &str,
        form: &[(&str, &str)],
        referer: &str,
    ) -> Option<Vec<ChapterCandidate>> {
        match ctx.fetcher().post_form(endpoint, form, Some(referer)).await {
            Ok(body) => {
                let base = Url::parse(referer).unwrap_or_else(|_| ctx.url.clone());
                let found = parse_ajax_chapters(&body, &base);
                log::debug!("{}: {} chapters from {}", self.name(), found.len(), endpoint);
                Some(found).filter(|f| !f.is_empty())
            }
            Err(e) => {
                log::warn!("{}: chapter list request to {} failed: {}", self.name(), endpoint, e);
                None
            }
        }
    }
}

impl Default for WpMangaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for WpMangaSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WpManga
    }

    fn validate(&self, url: &Url) -> bool {
        matches!(
            segments(url).as_slice(),
            ["manga" | "webtoon" | "manhwa" | "comic", slug, ..] if *slug != "page"
        )
    }

    async fn extract_metadata(&self, ctx: &SourceContext) -> Result<SourceMetadata, SourceError> {
        let html = ctx.landing_page().await?;
        parse_metadata(html, &ctx.url, self.name())
    }

    async fn list_chapters(&self, ctx: &SourceContext) -> Result<Catalog, SourceError> {
        let mut catalog = Catalog::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(ctx.url.to_string());

        while let Some(page_url) = next.take() {
            if !visited.insert(page_url.clone()) {
                break;
            }
            if ctx.is_cancelled() {
                log::info!("{}: catalog walk cancelled at {}", self.name(), page_url);
                break;
            }
            if visited.len() > MAX_CATALOG_PAGES {
                log::warn!("{}: stopping after {} catalog pages", self.name(), MAX_CATALOG_PAGES);
                break;
            }
            let html = if page_url == ctx.url.as_str() {
                ctx.landing_page().await?.to_string()
            } else {
                match ctx.fetcher().get_text(&page_url, RequestKind::Document).await {
                    Ok(html) => html,
                    Err(e) => {
                        log::warn!("{}: catalog page {} skipped: {}", self.name(), page_url, e);
                        catalog.failures.push(ItemFetchError::from(&e));
                        continue;
                    }
                }
            };
            let base = Url::parse(&page_url).unwrap_or_else(|_| ctx.url.clone());
            let (chapters, following) = parse_catalog_page(&html, &base);
            let before = catalog.chapters.len();
            catalog
                .chapters
                .extend(chapters.into_iter().filter(|c| seen.insert(c.id.clone())));
            log::debug!(
                "{}: {} chapters on {}",
                self.name(),
                catalog.chapters.len() - before,
                page_url
            );
            next = following;
        }

        if catalog.chapters.is_empty() && !ctx.is_cancelled() {
            let html = ctx.landing_page().await?;
            catalog.chapters = chapters_from_read_buttons(html, &ctx.url);
            if catalog.chapters.is_empty() {
                catalog.chapters = self.chapters_from_ajax(ctx, html).await;
            }
            if catalog.chapters.is_empty() && !ctx.is_cancelled() {
                catalog.chapters = chapters_from_anchor_scan(html, &ctx.url);
                log::debug!("{}: anchor scan found {} chapters", self.name(), catalog.chapters.len());
            }
            if catalog.chapters.is_empty() {
                log::warn!("{}: no chapters found for {} after all fallbacks", self.name(), ctx.url);
            }
        }
        Ok(catalog)
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

fn parse_metadata(html: &str, base: &Url, source_name: &str) -> Result<SourceMetadata, SourceError> {
    let doc = Html::parse_document(html);
    let title = first_text(&doc, TITLE_SELECTORS).or_else(|| page_title(&doc));
    let author = first_text(&doc, &[".author-content a", ".author-content"])
        .or_else(|| labeled_value(&doc, INFO_CONTAINERS, AUTHOR_LABELS))
        .or_else(|| scan_author(&doc));
    let description = first_text(&doc, DESCRIPTION_SELECTORS)
        .or_else(|| meta_content(&doc, &["og:description", "description"]));
    let cover = images_in(&doc, COVER_SELECTORS, base)
        .into_iter()
        .next()
        .or_else(|| meta_content(&doc, &["og:image"]).and_then(|c| absolutize(base, &c)));
    finish_metadata(source_name, title, author, description, cover)
}

/// Chapter links on one catalog page plus the link to the next page, if any.
fn parse_catalog_page(html: &str, base: &Url) -> (Vec<ChapterCandidate>, Option<String>) {
    let doc = Html::parse_document(html);
    let mut chapters = Vec::new();
    for css in CHAPTER_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        for a in doc.select(&sel) {
            let Some(href) = a.value().attr("href").or_else(|| a.value().attr("data-href")) else {
                continue;
            };
            let Some(url) = absolutize(base, href) else { continue };
            // MangaStream lists wrap number and date in separate spans
            let label = selector(".chapternum")
                .and_then(|s| a.select(&s).next().map(|el| element_text(&el)))
                .unwrap_or_else(|| element_text(&a));
            chapters.push(chapter_from_link(&label, url));
        }
        if !chapters.is_empty() {
            log::debug!("Found {} chapters using selector: {}", chapters.len(), css);
            break;
        }
    }
    (chapters, next_page_link(&doc, base))
}

fn chapter_from_link(label: &str, url: String) -> ChapterCandidate {
    let (number, title) = split_chapter_label(label);
    let number = number
        .or_else(|| number_from_slug(&url))
        .unwrap_or_else(|| "0".to_string());
    ChapterCandidate::new(url, &number).with_title(title)
}

/// Some themes only render "Read First" / "Read Last" buttons. Rebuild the
/// numbered chapter URLs between them.
fn chapters_from_read_buttons(html: &str, series_url: &Url) -> Vec<ChapterCandidate> {
    let doc = Html::parse_document(html);
    let Some(sel) = selector("a#btn-read-first, a#btn-read-last") else {
        return Vec::new();
    };
    let mut bounds: Vec<u32> = doc
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| SLUG_TAIL_RE.captures(&href.to_lowercase()).and_then(|c| c[1].parse().ok()))
        .collect();
    bounds.sort_unstable();
    let (Some(&first), Some(&last)) = (bounds.first(), bounds.last()) else {
        return Vec::new();
    };
    let series = series_base(series_url);
    (first..=last)
        .map(|n| ChapterCandidate::new(format!("{}/chapter-{}/", series, n), &n.to_string()))
        .collect()
}

struct ChapterHolder {
    /// `#manga-chapters-holder` is on the page.
    present: bool,
    manga_id: Option<String>,
}

fn chapter_holder(html: &str) -> ChapterHolder {
    let doc = Html::parse_document(html);
    let holder = selector("#manga-chapters-holder").and_then(|sel| {
        doc.select(&sel)
            .next()
            .map(|el| el.value().attr("data-id").map(|id| id.trim().to_string()))
    });
    let present = holder.is_some();
    let manga_id = holder
        .flatten()
        .filter(|id| !id.is_empty())
        .or_else(|| MANGA_ID_RE.captures(html).map(|c| c[1].to_string()));
    ChapterHolder { present, manga_id }
}

fn parse_ajax_chapters(body: &str, base: &Url) -> Vec<ChapterCandidate> {
    let (chapters, _) = parse_catalog_page(body, base);
    if chapters.is_empty() {
        chapters_from_anchor_scan(body, base)
    } else {
        chapters
    }
}

/// Last resort: every same-host link whose URL looks like a chapter and whose
/// text or slug carries a number.
fn chapters_from_anchor_scan(html: &str, base: &Url) -> Vec<ChapterCandidate> {
    let doc = Html::parse_document(html);
    let Some(a_sel) = selector("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut chapters = Vec::new();
    for a in doc.select(&a_sel) {
        let Some(url) = a.value().attr("href").and_then(|h| absolutize(base, h)) else {
            continue;
        };
        let lower = url.to_lowercase();
        if !CHAPTER_URL_HINTS.iter().any(|h| lower.contains(h)) || NAVIGATION_HINTS.iter().any(|h| lower.contains(h)) {
            continue;
        }
        let same_host = Url::parse(&url).map(|u| u.host_str() == base.host_str()).unwrap_or(false);
        let label = element_text(&a);
        if !same_host || (split_chapter_label(&label).0.is_none() && number_from_slug(&url).is_none()) {
            continue;
        }
        if seen.insert(url.clone()) {
            chapters.push(chapter_from_link(&label, url));
        }
    }
    chapters
}

fn parse_reader(html: &str, base: &Url) -> Vec<String> {
    let images = {
        let doc = Html::parse_document(html);
        images_in(&doc, READER_SELECTORS, base)
    };
    if !images.is_empty() {
        return images;
    }
    log::debug!("No reader images matched on {}, scanning raw markup", base);
    regex_images(html)
}
