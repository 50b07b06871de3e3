use super::{finish_metadata, segments, SourceAdapter, SourceContext};
use crate::config::MangaDexConfig;
use crate::error::{ItemFetchError, SourceError};
use crate::models::{Catalog, ChapterCandidate, Quality, SourceKind, SourceMetadata};
use crate::rate_limit::RequestKind;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

const SITE_HOST: &str = "mangadex.org";
const SITE_REFERER: &str = "https://mangadex.org/";

#[derive(Deserialize)]
struct MangaEnvelope {
    data: MangaData,
}

#[derive(Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(default, rename = "altTitles")]
    alt_titles: Vec<HashMap<String, String>>,
    #[serde(default)]
    description: HashMap<String, String>,
}

#[derive(Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct FeedPage {
    #[serde(default)]
    data: Vec<FeedChapter>,
    #[serde(default)]
    total: u32,
}

#[derive(Deserialize)]
struct FeedChapter {
    id: String,
    attributes: FeedAttributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedAttributes {
    chapter: Option<String>,
    title: Option<String>,
    #[serde(default)]
    pages: u32,
    external_url: Option<String>,
}

#[derive(Deserialize)]
struct AtHome {
    #[serde(rename = "baseUrl")]
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    #[serde(default)]
    data: Vec<String>,
    #[serde(default)]
    data_saver: Vec<String>,
}

/// Adapter for the public MangaDex REST API. Title URLs look like
/// `https://mangadex.org/title/{uuid}/{optional-slug}`.
pub struct MangaDexSource {
    config: MangaDexConfig,
}

impl MangaDexSource {
    pub fn new(config: MangaDexConfig) -> Self {
        Self { config }
    }

    fn manga_id(url: &Url) -> Option<String> {
        let host = url.host_str()?.to_lowercase();
        if host != SITE_HOST && !host.ends_with(".mangadex.org") {
            return None;
        }
        match segments(url).as_slice() {
            ["title", id, ..] => Uuid::parse_str(id).ok().map(|u| u.to_string()),
            _ => None,
        }
    }

    fn feed_url(&self, manga_id: &str, language: &str, offset: u32) -> String {
        format!(
            "{}/manga/{}/feed?translatedLanguage[]={}&limit={}&offset={}&order[chapter]=asc",
            self.config.api_base.trim_end_matches('/'),
            manga_id,
            urlencoding::encode(language),
            self.config.feed_page_size.max(1),
            offset
        )
    }
}

#[async_trait]
impl SourceAdapter for MangaDexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::MangaDex
    }

    fn validate(&self, url: &Url) -> bool {
        Self::manga_id(url).is_some()
    }

    async fn extract_metadata(&self, ctx: &SourceContext) -> Result<SourceMetadata, SourceError> {
        let id = Self::manga_id(&ctx.url)
            .ok_or_else(|| SourceError::UnsupportedUrl(ctx.url.to_string()))?;
        let api = format!(
            "{}/manga/{}?includes[]=author&includes[]=artist&includes[]=cover_art",
            self.config.api_base.trim_end_matches('/'),
            id
        );
        let text = ctx.fetcher().get_text(&api, RequestKind::Api).await?;
        parse_manga(&text, &ctx.language, &self.config.uploads_base, self.name())
    }

    async fn list_chapters(&self, ctx: &SourceContext) -> Result<Catalog, SourceError> {
        let id = Self::manga_id(&ctx.url)
            .ok_or_else(|| SourceError::UnsupportedUrl(ctx.url.to_string()))?;
        let mut catalog = Catalog::default();
        let mut offset = 0u32;
        while !ctx.is_cancelled() {
            let url = self.feed_url(&id, &ctx.language, offset);
            let page = match ctx.fetcher().get_text(&url, RequestKind::Api).await {
                Ok(text) => parse_feed(&text),
                Err(e) if offset == 0 => return Err(e.into()),
                Err(e) => {
                    log::warn!("MangaDex feed page at offset {} failed: {}", offset, e);
                    catalog.failures.push(ItemFetchError::from(&e));
                    break;
                }
            };
            let (chapters, total, received) = match page {
                Ok(page) => page,
                Err(e) if offset == 0 => return Err(e),
                Err(e) => {
                    catalog.failures.push(ItemFetchError::new(url, &e));
                    break;
                }
            };
            catalog.chapters.extend(chapters);
            offset += received;
            log::debug!("MangaDex feed: {}/{} entries read", offset, total);
            if received == 0 || offset >= total {
                break;
            }
        }
        log::info!(
            "MangaDex: {} downloadable chapters in language '{}'",
            catalog.chapters.len(),
            ctx.language
        );
        Ok(catalog)
    }

    async fn resolve_pages(
        &self,
        ctx: &SourceContext,
        chapter: &ChapterCandidate,
    ) -> Result<Vec<String>, SourceError> {
        let url = format!(
            "{}/at-home/server/{}",
            self.config.api_base.trim_end_matches('/'),
            chapter.id
        );
        let text = ctx.fetcher().get_text(&url, RequestKind::Api).await?;
        parse_at_home(&text, ctx.quality)
    }

    fn referer(&self, _ctx: &SourceContext) -> Option<String> {
        Some(SITE_REFERER.to_string())
    }
}

/// Pick the requested language, then English, then whatever comes first.
fn localized(map: &HashMap<String, String>, language: &str) -> Option<String> {
    map.get(language)
        .or_else(|| map.get("en"))
        .or_else(|| {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.first().and_then(|k| map.get(*k))
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_manga(
    json: &str,
    language: &str,
    uploads_base: &str,
    source_name: &str,
) -> Result<SourceMetadata, SourceError> {
    let envelope: MangaEnvelope = serde_json::from_str(json)?;
    let manga = envelope.data;
    let title = localized(&manga.attributes.title, language).or_else(|| {
        manga
            .attributes
            .alt_titles
            .iter()
            .find_map(|alt| alt.get(language).or_else(|| alt.get("en")).cloned())
    });

    let mut creators: Vec<String> = Vec::new();
    for rel in &manga.relationships {
        if rel.rel_type != "author" && rel.rel_type != "artist" {
            continue;
        }
        let name = rel
            .attributes
            .as_ref()
            .and_then(|a| a.get("name"))
            .and_then(|n| n.as_str())
            .map(str::trim);
        if let Some(name) = name {
            if !name.is_empty() && !creators.iter().any(|c| c == name) {
                creators.push(name.to_string());
            }
        }
    }
    let author = if creators.is_empty() { None } else { Some(creators.join(", ")) };

    let cover_url = manga
        .relationships
        .iter()
        .find(|r| r.rel_type == "cover_art")
        .and_then(|r| r.attributes.as_ref())
        .and_then(|a| a.get("fileName"))
        .and_then(|f| f.as_str())
        .map(|file| format!("{}/covers/{}/{}", uploads_base.trim_end_matches('/'), manga.id, file));

    finish_metadata(
        source_name,
        title,
        author,
        localized(&manga.attributes.description, language),
        cover_url,
    )
}

/// Returns the usable chapters, the server-declared total and how many raw
/// entries this page held (skipped ones included, so paging stays aligned).
fn parse_feed(json: &str) -> Result<(Vec<ChapterCandidate>, u32, u32), SourceError> {
    let page: FeedPage = serde_json::from_str(json)?;
    let received = page.data.len() as u32;
    let chapters = page
        .data
        .into_iter()
        .filter(|c| {
            let external = c.attributes.external_url.as_deref().is_some_and(|u| !u.is_empty());
            if external || c.attributes.pages == 0 {
                log::debug!("MangaDex: skipping chapter {} (external or no pages)", c.id);
                return false;
            }
            true
        })
        .map(|c| {
            let number = c.attributes.chapter.unwrap_or_else(|| "0".to_string());
            ChapterCandidate::new(c.id, &number)
                .with_title(c.attributes.title)
                .with_page_hint(c.attributes.pages)
        })
        .collect();
    Ok((chapters, page.total, received))
}

fn parse_at_home(json: &str, quality: Quality) -> Result<Vec<String>, SourceError> {
    let server: AtHome = serde_json::from_str(json)?;
    let files = match quality {
        Quality::Full => &server.chapter.data,
        Quality::DataSaver => &server.chapter.data_saver,
    };
    Ok(files
        .iter()
        .map(|file| {
            format!(
                "{}/{}/{}/{}",
                server.base_url.trim_end_matches('/'),
                quality.path_segment(),
                server.chapter.hash,
                file
            )
        })
        .collect())
}
