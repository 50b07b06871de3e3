//! Shared fixtures for the integration tests.
//!
//! [`StubFetcher`] answers from an in-memory map so no test ever touches the
//! network, and records every request so tests can assert on call order.

use async_trait::async_trait;
use rust_manga_importer::config::Config;
use rust_manga_importer::error::FetchError;
use rust_manga_importer::fetcher::Fetch;
use rust_manga_importer::rate_limit::RequestKind;
use rust_manga_importer::sources::SourceRegistry;
use rust_manga_importer::storage::PageStore;
use rust_manga_importer::Importer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[allow(dead_code)]
pub const SERIES_URL: &str = "https://reader.example/series/42";

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub url: String,
    pub referer: Option<String>,
    /// `key=value&...` body of a form POST.
    pub form: Option<String>,
}

#[derive(Default)]
pub struct StubFetcher {
    texts: HashMap<String, String>,
    posts: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    requests: Mutex<Vec<Recorded>>,
    images_served: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
    cancel_on: Option<(String, CancellationToken)>,
}

#[allow(dead_code)]
impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, url: &str, body: impl Into<String>) -> Self {
        self.texts.insert(url.to_string(), body.into());
        self
    }

    /// Answer a form POST to `url`.
    pub fn post(mut self, url: &str, body: impl Into<String>) -> Self {
        self.posts.insert(url.to_string(), body.into());
        self
    }

    pub fn image(mut self, url: &str, body: &[u8]) -> Self {
        self.bytes.insert(url.to_string(), body.to_vec());
        self
    }

    /// Answer `url` with an HTTP error status.
    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    /// Cancel `token` once `count` images have been served.
    pub fn cancel_after_images(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    /// Cancel `token` once the document at `url` has been served.
    pub fn cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.to_string(), token));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|r| r.url == url)
    }

    fn record(&self, url: &str, referer: Option<&str>, form: Option<String>) {
        self.requests.lock().unwrap().push(Recorded {
            url: url.to_string(),
            referer: referer.map(str::to_string),
            form,
        });
    }

    fn failure(&self, url: &str) -> FetchError {
        match self.statuses.get(url) {
            Some(&status) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            None => FetchError::Missing(url.to_string()),
        }
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn get_text(&self, url: &str, _kind: RequestKind) -> Result<String, FetchError> {
        self.record(url, None, None);
        let result = self.texts.get(url).cloned().ok_or_else(|| self.failure(url));
        if let (Ok(_), Some((target, token))) = (&result, &self.cancel_on) {
            if target == url {
                token.cancel();
            }
        }
        result
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)], referer: Option<&str>) -> Result<String, FetchError> {
        let body: Vec<String> = form.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.record(url, referer, Some(body.join("&")));
        self.posts.get(url).cloned().ok_or_else(|| self.failure(url))
    }

    async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, FetchError> {
        self.record(url, referer, None);
        let result = self.bytes.get(url).cloned().ok_or_else(|| self.failure(url));
        if result.is_ok() {
            let served = self.images_served.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.cancel_after {
                if served >= *limit {
                    token.cancel();
                }
            }
        }
        result
    }
}

/// An importer over `fetcher` writing into a fresh temporary directory.
#[allow(dead_code)]
pub fn importer_with(fetcher: Arc<StubFetcher>, config: Config) -> (Importer, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let registry = SourceRegistry::new(&config);
    let importer = Importer::new(registry, fetcher, PageStore::new(dir.path()), config);
    (importer, dir)
}

/// Series page of the chaptered-reader site. `chapters` are
/// `(chapter_id, number, page_count)` in listing order.
#[allow(dead_code)]
pub fn series_page(title: &str, cover: Option<&str>, chapters: &[(u32, &str, u32)]) -> String {
    let listed: Vec<String> = chapters
        .iter()
        .map(|(id, number, pages)| {
            format!(
                r#"{{"chapter_id":{},"series_id":42,"chapter":"{}","title":null,"pages":{}}}"#,
                id, number, pages
            )
        })
        .collect();
    let cover = cover
        .map(|c| format!(r#","cover":"{}""#, c))
        .unwrap_or_default();
    format!(
        r#"<html><head><title>{title} - Reader</title></head><body>
<script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{
"series":{{"series_id":42,"title":"{title}","description":"A test series.","author":["Test Author"]{cover}}},
"chapters":[{chapters}]}}}}}}</script></body></html>"#,
        title = title,
        cover = cover,
        chapters = listed.join(",")
    )
}

/// Reader page listing `images` through `__NEXT_DATA__`.
#[allow(dead_code)]
pub fn chapter_page(images: &[String]) -> String {
    let quoted: Vec<String> = images.iter().map(|u| format!("\"{}\"", u)).collect();
    format!(
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"chapter":{{"images":[{}]}}}}}}}}</script></body></html>"#,
        quoted.join(",")
    )
}

#[allow(dead_code)]
pub fn chapter_url(id: u32) -> String {
    format!("{}/{}", SERIES_URL, id)
}

#[allow(dead_code)]
pub fn image_urls(chapter_id: u32, count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| format!("https://cdn.example/{}/{:02}.jpg", chapter_id, n))
        .collect()
}

/// Register a reader chapter with `count` images, all of which download.
#[allow(dead_code)]
pub fn with_chapter(fetcher: StubFetcher, chapter_id: u32, count: usize) -> StubFetcher {
    let urls = image_urls(chapter_id, count);
    let mut fetcher = fetcher.text(&chapter_url(chapter_id), chapter_page(&urls));
    for url in &urls {
        fetcher = fetcher.image(url, format!("img-{}", url).as_bytes());
    }
    fetcher
}
