//! Helper functions shared by the source adapters
//!
//! This module provides the small text utilities every adapter needs:
//! - Chapter number extraction and parsing
//! - Chapter title extraction from free text
//! - Title and description cleanup
//! - File extension detection for downloaded images
//!
//! # Examples
//!
//! ```
//! use rust_manga_importer::helpers::{parse_chapter_number, split_chapter_label};
//!
//! assert_eq!(parse_chapter_number("10.5"), 10.5);
//! assert_eq!(parse_chapter_number("oops"), 0.0);
//!
//! let (number, title) = split_chapter_label("Chapter 12: The Storm");
//! assert_eq!(number.as_deref(), Some("12"));
//! assert_eq!(title.as_deref(), Some("The Storm"));
//! ```

use lazy_static::lazy_static;
use regex::Regex;

pub const DESCRIPTION_LIMIT: usize = 1000;
pub const DEFAULT_IMAGE_EXT: &str = "jpg";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp"];

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)").unwrap();
    static ref LABEL_RE: Regex = Regex::new(
        r"(?i)^\s*(?:chapter|chap\.?|ch\.?|cap[ií]tulo|cap\.?|episode|ep\.?)\s*#?\s*(\d+(?:[.,]\d+)?)\s*(.*)$"
    )
    .unwrap();
    static ref SLUG_NUMBER_RE: Regex =
        Regex::new(r"(?i)(?:chapter|chap|ch|cap|episode|ep)[-_/]?(\d+(?:[.-]\d+)?)").unwrap();
    static ref SITE_SUFFIX_RE: Regex = Regex::new(r"\s+[|–—»]\s+[^|–—»]+$").unwrap();
}

/// Parse a chapter number as a decimal. Unparseable input yields `0`.
pub fn parse_chapter_number(s: &str) -> f64 {
    let trimmed = s.trim().replace(',', ".");
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return n;
        }
    }
    extract_number(&trimmed)
        .and_then(|n| n.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Extract the first number from a chapter string
pub fn extract_number(s: &str) -> Option<String> {
    NUMBER_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Chapter number as shown to the user: "287.00" becomes "287", "10.50" stays
/// "10.50" only when the fraction is not all zeros.
pub fn display_number(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.split_once('.') {
        Some((whole, frac)) if !whole.is_empty() && frac.chars().all(|c| c == '0') => {
            whole.to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Split free chapter text such as "Chapter 12: The Storm" or "Cap. 5 - Início"
/// into its number and trailing title fragment. The title is only kept when a
/// ":" or "-" separator follows the number.
pub fn split_chapter_label(text: &str) -> (Option<String>, Option<String>) {
    let text = collapse_whitespace(text);
    if let Some(cap) = LABEL_RE.captures(&text) {
        let number = cap.get(1).map(|m| m.as_str().replace(',', "."));
        let rest = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        let title = rest
            .strip_prefix(':')
            .or_else(|| rest.strip_prefix('-'))
            .or_else(|| rest.strip_prefix('–'))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        return (number, title);
    }
    (extract_number(&text), None)
}

/// Look for a chapter number in a reader URL slug like `/chapter-12-5/`.
pub fn number_from_slug(url: &str) -> Option<String> {
    SLUG_NUMBER_RE
        .captures(&url.to_lowercase())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace('-', "."))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove trailing site-name noise: "One Piece | MangaSite" becomes "One Piece".
pub fn strip_site_suffix(title: &str) -> String {
    let cleaned = collapse_whitespace(title);
    let stripped = SITE_SUFFIX_RE.replace(&cleaned, "").trim().to_string();
    if stripped.is_empty() {
        cleaned
    } else {
        stripped
    }
}

/// Cap a description at [`DESCRIPTION_LIMIT`] characters, marking the cut with "...".
pub fn truncate_description(description: &str) -> String {
    let cleaned = description.trim();
    if cleaned.chars().count() <= DESCRIPTION_LIMIT {
        return cleaned.to_string();
    }
    let mut out: String = cleaned.chars().take(DESCRIPTION_LIMIT).collect();
    out.push_str("...");
    out
}

pub fn attribution(source_name: &str) -> String {
    format!("Imported from {}.", source_name)
}

/// Image extension taken from the last path segment of a URL, ignoring the
/// query string. Falls back to [`DEFAULT_IMAGE_EXT`].
pub fn image_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .map(|ext| if ext == "jpeg" { "jpg".to_string() } else { ext })
        .unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string())
}
