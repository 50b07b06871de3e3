//! Chapter selection expressions.
//!
//! An expression is a comma separated list of terms. A term is either a single
//! chapter number (`3`, `10.5`) or an inclusive interval (`4-8`). Intervals only
//! ever select whole chapters: `1.5-4.2` selects 2, 3 and 4. Fractional chapters
//! must be listed explicitly. The word `all` disables filtering.

use crate::models::ChapterCandidate;

/// Two chapter numbers closer than this are the same chapter.
pub const NUMBER_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub enum RangeSet {
    All,
    Selection {
        numbers: Vec<f64>,
        /// Inclusive integer bounds, already rounded inwards.
        intervals: Vec<(i64, i64)>,
    },
}

impl RangeSet {
    pub fn is_all(&self) -> bool {
        matches!(self, RangeSet::All)
    }

    /// `true` for a selection that matches nothing. `All` is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RangeSet::All => false,
            RangeSet::Selection { numbers, intervals } => {
                numbers.is_empty() && intervals.iter().all(|(lo, hi)| lo > hi)
            }
        }
    }

    pub fn contains(&self, number: f64) -> bool {
        match self {
            RangeSet::All => true,
            RangeSet::Selection { numbers, intervals } => {
                if numbers.iter().any(|n| (n - number).abs() < NUMBER_TOLERANCE) {
                    return true;
                }
                let nearest = number.round();
                if (nearest - number).abs() >= NUMBER_TOLERANCE {
                    return false;
                }
                let nearest = nearest as i64;
                intervals.iter().any(|&(lo, hi)| lo <= nearest && nearest <= hi)
            }
        }
    }

    /// Keep the candidates this set selects, in catalog order.
    pub fn filter(&self, chapters: &[ChapterCandidate]) -> Vec<ChapterCandidate> {
        chapters
            .iter()
            .filter(|c| self.contains(c.number))
            .cloned()
            .collect()
    }
}

/// Evaluate a selection expression. Malformed terms are skipped.
pub fn expand(expression: &str) -> RangeSet {
    if expression.trim().eq_ignore_ascii_case("all") {
        return RangeSet::All;
    }

    let mut numbers: Vec<f64> = Vec::new();
    let mut intervals: Vec<(i64, i64)> = Vec::new();

    for term in expression.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match term.split_once('-') {
            Some((start, end)) => {
                let (Some(start), Some(end)) = (parse_bound(start), parse_bound(end)) else {
                    log::debug!("Skipping malformed range term '{}'", term);
                    continue;
                };
                let lo = start.ceil() as i64;
                let hi = end.floor() as i64;
                if lo <= hi {
                    intervals.push((lo, hi));
                }
            }
            None => match parse_bound(term) {
                Some(n) => {
                    if !numbers.iter().any(|m| (m - n).abs() < NUMBER_TOLERANCE) {
                        numbers.push(n);
                    }
                }
                None => log::debug!("Skipping malformed chapter number '{}'", term),
            },
        }
    }

    RangeSet::Selection { numbers, intervals }
}

fn parse_bound(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every selected number in ascending order, intervals expanded.
    fn listed(expr: &str) -> Vec<f64> {
        let RangeSet::Selection { mut numbers, intervals } = expand(expr) else {
            panic!("'{}' selects everything", expr);
        };
        for (lo, hi) in intervals {
            numbers.extend((lo..=hi).map(|n| n as f64));
        }
        numbers.sort_by(|a, b| a.total_cmp(b));
        numbers.dedup_by(|a, b| (*a - *b).abs() < NUMBER_TOLERANCE);
        numbers
    }

    #[test]
    fn test_single_numbers_are_deduplicated() {
        assert_eq!(listed("3, 10.5,3"), vec![3.0, 10.5]);
        assert_eq!(listed("7"), vec![7.0]);
    }

    #[test]
    fn test_interval_rounds_inwards() {
        assert_eq!(listed("2-4"), vec![2.0, 3.0, 4.0]);
        assert_eq!(listed("1.5-4.2"), vec![2.0, 3.0, 4.0]);
        assert_eq!(listed("5-5"), vec![5.0]);
        assert!(listed("5.5-5.5").is_empty());
        assert!(listed("9-3").is_empty());
    }

    #[test]
    fn test_interval_skips_fractional_chapters() {
        let set = expand("1-3");
        assert!(set.contains(2.0));
        assert!(!set.contains(2.5));
        assert!(set.contains(3.004));
    }

    #[test]
    fn test_all_sentinel() {
        assert!(expand("all").is_all());
        assert!(expand("  ALL ").is_all());
        assert!(!expand("").is_all());
        assert!(expand("").is_empty());
    }

    #[test]
    fn test_malformed_terms_are_skipped() {
        assert_eq!(listed("x, 4, 1-b"), vec![4.0]);
        assert!(expand("abc, -").is_empty());
    }

    #[test]
    fn test_tolerance_match() {
        let set = expand("10.5");
        assert!(set.contains(10.505));
        assert!(!set.contains(10.52));
    }

    #[test]
    fn test_mixed_terms() {
        assert_eq!(listed("1-3, 2, 7.5"), vec![1.0, 2.0, 3.0, 7.5]);
    }
}
