//! Collapse duplicate releases of the same chapter.
//!
//! Sources with several scanlation groups or languages list the same chapter
//! number more than once. The variant with the most pages wins; on a tie the one
//! listed first does.

use crate::models::ChapterCandidate;
use crate::range::NUMBER_TOLERANCE;

/// Group candidates by chapter number and keep one per group. Groups come back
/// in the order their first member appeared in the catalog.
pub fn dedupe(chapters: Vec<ChapterCandidate>) -> Vec<ChapterCandidate> {
    let mut kept: Vec<ChapterCandidate> = Vec::with_capacity(chapters.len());
    for candidate in chapters {
        match kept
            .iter_mut()
            .find(|k| (k.number - candidate.number).abs() < NUMBER_TOLERANCE)
        {
            Some(existing) => {
                if candidate.page_hint > existing.page_hint {
                    log::debug!(
                        "Chapter {}: preferring {} ({} pages) over {} ({} pages)",
                        candidate.reported_number,
                        candidate.id,
                        candidate.page_hint,
                        existing.id,
                        existing.page_hint
                    );
                    *existing = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }
    kept
}

/// Stable ascending sort by chapter number.
pub fn sort_ascending(chapters: &mut [ChapterCandidate]) {
    chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
}
