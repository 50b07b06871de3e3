//! HTML extraction helpers shared by the scraping adapters.
//!
//! Everything here is synchronous and works on an already parsed [`Html`]
//! document. `scraper::Html` is not `Send`, so adapters parse inside plain
//! functions and only hold owned strings across `.await` points.

use crate::helpers::{collapse_whitespace, strip_site_suffix};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Attributes that may carry an image URL, most authoritative first. Lazy
/// loaders leave a `data:` placeholder in `src` and the real URL in one of the
/// deferred attributes.
pub const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original", "data-cfsrc"];

const NEXT_PAGE_SELECTORS: &[&str] = &[
    "link[rel='next']",
    "a[rel='next']",
    "a.next.page-numbers",
    ".pagination a.next",
    ".nav-previous a",
    "a.next",
];

const EMPTY_VALUES: &[&str] = &["", "-", "n/a", "updating", "unknown", "none"];

lazy_static! {
    static ref IMAGE_URL_RE: Regex =
        Regex::new(r#"https?://[^"'\s<>]+?\.(?:jpg|jpeg|png|webp|gif)(?:\?[^"'\s<>]*)?"#).unwrap();
    static ref LABELED_RE: Regex =
        Regex::new(r"(?i)\b(?:author|artist)s?(?:\(s\))?\s*:\s*([^\n\r|<>]{1,80})").unwrap();
}

pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            log::error!("Invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

pub fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first element matched by the first selector that yields
/// something non-empty.
pub fn first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = selector(css)?;
        doc.select(&sel)
            .map(|el| element_text(&el))
            .find(|t| !t.is_empty())
    })
}

/// `content` of the first `<meta property=..>` or `<meta name=..>` among `keys`.
pub fn meta_content(doc: &Html, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let css = format!("meta[property='{0}'], meta[name='{0}']", key);
        let sel = selector(&css)?;
        doc.select(&sel)
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .find(|c| !c.is_empty())
    })
}

/// Image URL of an `<img>`, checking [`IMAGE_ATTRS`] in order and skipping
/// inline data URIs.
pub fn image_source(el: &ElementRef) -> Option<String> {
    IMAGE_ATTRS.iter().find_map(|attr| {
        el.value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.starts_with("data:"))
            .map(str::to_string)
    })
}

pub fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Generic page title from `<title>` or `og:title`, without the trailing
/// " | SiteName" those usually carry.
pub fn page_title(doc: &Html) -> Option<String> {
    first_text(doc, &["title"])
        .or_else(|| meta_content(doc, &["og:title"]))
        .map(|t| strip_site_suffix(&t))
        .filter(|t| !t.is_empty())
}

/// Ordered, de-duplicated image URLs from the first selector that matches any
/// usable `<img>`.
pub fn images_in(doc: &Html, selectors: &[&str], base: &Url) -> Vec<String> {
    for css in selectors {
        let Some(sel) = selector(css) else { continue };
        let mut seen = HashSet::new();
        let urls: Vec<String> = doc
            .select(&sel)
            .filter_map(|el| image_source(&el))
            .filter_map(|src| absolutize(base, &src))
            .filter(|u| seen.insert(u.clone()))
            .collect();
        if !urls.is_empty() {
            log::debug!("{} images matched '{}'", urls.len(), css);
            return urls;
        }
    }
    Vec::new()
}

/// Last resort: scrape direct image URLs out of the raw markup.
pub fn regex_images(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    IMAGE_URL_RE
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

pub fn next_page_link(doc: &Html, base: &Url) -> Option<String> {
    NEXT_PAGE_SELECTORS.iter().find_map(|css| {
        let sel = selector(css)?;
        doc.select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| absolutize(base, href))
    })
}

/// Author-style value next to a label such as "Author(s)" in an info block.
/// Linked values win over plain text after a colon.
pub fn labeled_value(doc: &Html, containers: &[&str], labels: &[&str]) -> Option<String> {
    let a_sel = selector("a")?;
    for css in containers {
        let Some(sel) = selector(css) else { continue };
        for el in doc.select(&sel) {
            let text = element_text(&el);
            let lower = text.to_lowercase();
            let Some(label) = labels.iter().find(|l| lower.starts_with(*l)) else {
                continue;
            };
            let linked: Vec<String> = el
                .select(&a_sel)
                .map(|a| element_text(&a))
                .filter(|t| !is_empty_value(t))
                .collect();
            if !linked.is_empty() {
                return Some(linked.join(", "));
            }
            let rest = text
                .get(label.len()..)
                .unwrap_or("")
                .trim_start_matches(|c: char| c.is_alphabetic() || c == '(' || c == ')')
                .trim_start_matches([':', ' '])
                .trim();
            if !is_empty_value(rest) {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// Scan the whole page text for "Author: ..." / "Artist: ...".
pub fn scan_author(doc: &Html) -> Option<String> {
    let text = doc.root_element().text().collect::<Vec<_>>().join("\n");
    LABELED_RE
        .captures_iter(&text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|v| !is_empty_value(v))
}

fn is_empty_value(v: &str) -> bool {
    EMPTY_VALUES.contains(&v.trim().to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://reader.example/manga/foo/").unwrap()
    }

    #[test]
    fn test_image_source_skips_data_uri() {
        let doc = Html::parse_fragment(
            r#"<img src="data:image/gif;base64,R0lGOD" data-src=" /img/01.jpg ">"#,
        );
        let sel = selector("img").unwrap();
        let img = doc.select(&sel).next().unwrap();
        assert_eq!(image_source(&img).as_deref(), Some("/img/01.jpg"));
    }

    #[test]
    fn test_images_in_resolves_and_dedupes() {
        let doc = Html::parse_document(
            r#"<div class="reading-content">
                <img src="https://cdn.example/1.jpg">
                <img data-lazy-src="2.png" src="data:image/png;base64,xx">
                <img src="https://cdn.example/1.jpg">
                <img>
            </div>"#,
        );
        let urls = images_in(&doc, &["div.missing img", "div.reading-content img"], &base());
        assert_eq!(
            urls,
            vec![
                "https://cdn.example/1.jpg".to_string(),
                "https://reader.example/manga/foo/2.png".to_string()
            ]
        );
    }

    #[test]
    fn test_regex_images() {
        let html = r#"var pages = ["https://cdn.x/a.jpg","https://cdn.x/b.webp?t=1","https://cdn.x/a.jpg"];"#;
        assert_eq!(
            regex_images(html),
            vec!["https://cdn.x/a.jpg".to_string(), "https://cdn.x/b.webp?t=1".to_string()]
        );
    }

    #[test]
    fn test_meta_and_first_text() {
        let doc = Html::parse_document(
            r#"<html><head><title> Foo | Site </title>
            <meta property="og:title" content="Foo OG">
            <meta name="description" content="Desc"></head><body><h1> </h1></body></html>"#,
        );
        assert_eq!(first_text(&doc, &["h1", "title"]).as_deref(), Some("Foo | Site"));
        assert_eq!(meta_content(&doc, &["og:title"]).as_deref(), Some("Foo OG"));
        assert_eq!(meta_content(&doc, &["og:description", "description"]).as_deref(), Some("Desc"));
    }

    #[test]
    fn test_page_title() {
        let doc = Html::parse_document(r#"<html><head><title> Foo  | Site </title></head></html>"#);
        assert_eq!(page_title(&doc).as_deref(), Some("Foo"));
        let doc = Html::parse_document(r#"<html><head><meta property="og:title" content="Bar » Site"></head></html>"#);
        assert_eq!(page_title(&doc).as_deref(), Some("Bar"));
        assert!(page_title(&Html::parse_document("<p>x</p>")).is_none());
    }

    #[test]
    fn test_next_page_link() {
        let doc = Html::parse_document(r#"<div class="pagination"><a class="next" href="?page=2">Next</a></div>"#);
        assert_eq!(
            next_page_link(&doc, &base()).as_deref(),
            Some("https://reader.example/manga/foo/?page=2")
        );
        let doc = Html::parse_document("<p>no more</p>");
        assert!(next_page_link(&doc, &base()).is_none());
    }

    #[test]
    fn test_labeled_value() {
        let doc = Html::parse_document(
            r#"<div class="post-content_item"><h5>Rating</h5><span>4.5</span></div>
               <div class="post-content_item"><h5>Author(s)</h5><a href="/a/1">Oda</a><a href="/a/2">Eiichiro</a></div>
               <li>Artist: Someone Else</li>"#,
        );
        assert_eq!(
            labeled_value(&doc, &[".post-content_item"], &["author"]).as_deref(),
            Some("Oda, Eiichiro")
        );
        assert_eq!(
            labeled_value(&doc, &["li"], &["artist"]).as_deref(),
            Some("Someone Else")
        );
    }

    #[test]
    fn test_scan_author() {
        let doc = Html::parse_document("<p>Genre: Action</p><p>Author: Jane Doe</p>");
        assert_eq!(scan_author(&doc).as_deref(), Some("Jane Doe"));
        let doc = Html::parse_document("<p>Author: -</p>");
        assert!(scan_author(&doc).is_none());
    }
}
