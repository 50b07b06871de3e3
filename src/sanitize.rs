//! Filesystem-safe names for title and chapter folders.

use crate::helpers::display_number;

pub const MAX_SEGMENT_LEN: usize = 50;
pub const FALLBACK_NAME: &str = "manga";

const PATH_INVALID: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Folder name for a title.
pub fn sanitize(raw: &str) -> String {
    sanitize_with(raw, false)
}

/// Folder name for a chapter; keeps dots so "Chapter 10.5" stays readable.
pub fn sanitize_chapter(raw: &str) -> String {
    sanitize_with(raw, true)
}

/// Folder for one chapter, e.g. `Chapter-10.5`. Zero fractions are dropped so
/// "287.00" and "287" share `Chapter-287`.
pub fn chapter_folder(reported_number: &str) -> String {
    sanitize_chapter(&format!("Chapter {}", display_number(reported_number)))
}

fn sanitize_with(raw: &str, keep_dots: bool) -> String {
    let replaced = raw.trim().replace(' ', "-");
    let filtered: String = replaced
        .chars()
        .filter(|c| !PATH_INVALID.contains(c) && !c.is_control())
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || (keep_dots && *c == '.'))
        .take(MAX_SEGMENT_LEN)
        .collect();
    let trimmed = filtered.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
