//! Fuzzy owner-name resolution.
//!
//! Scores are in `0..=100` and combine three views of similarity:
//! - full ratio: `rapidfuzz` Indel ratio of the whole strings,
//! - partial ratio: best full ratio of the shorter string against every
//!   equally long window of the longer one (scaled down for very lopsided
//!   lengths so one-letter queries don't match everything),
//! - token-sort ratio: full ratio after sorting whitespace-separated words,
//!   weighted at 0.95.
//!
//! The best of the three wins.

use rapidfuzz::fuzz;
use serde::{Deserialize, Serialize};

/// Default acceptance threshold.
pub const DEFAULT_THRESHOLD: u8 = 80;

const TOKEN_SORT_WEIGHT: f64 = 0.95;
const LOPSIDED_PARTIAL_WEIGHT: f64 = 0.6;
const LOPSIDED_LENGTH_RATIO: usize = 8;

/// A candidate name that cleared the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMatch {
    pub name: String,
    pub score: u8,
}

/// Resolves free text against a list of owner names.
pub trait OwnerMatcher: Send + Sync {
    /// Matches at or above the threshold, best first. Empty when nothing is
    /// confident enough.
    fn resolve(&self, query: &str, candidates: &[&str]) -> Vec<OwnerMatch>;
}

/// Resolver using the weighted similarity score.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyOwnerResolver {
    threshold: u8,
}

impl Default for FuzzyOwnerResolver {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl FuzzyOwnerResolver {
    pub const fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub const fn threshold(&self) -> u8 {
        self.threshold
    }
}

impl OwnerMatcher for FuzzyOwnerResolver {
    fn resolve(&self, query: &str, candidates: &[&str]) -> Vec<OwnerMatch> {
        // Numeric queries are id lookups, handled before we get here.
        if is_integer_query(query) {
            return Vec::new();
        }

        let mut seen: Vec<&str> = Vec::with_capacity(candidates.len());
        for name in candidates {
            if !seen.contains(name) {
                seen.push(name);
            }
        }

        let mut matches: Vec<OwnerMatch> = seen
            .into_iter()
            .map(|name| OwnerMatch {
                name: name.to_string(),
                score: similarity(query, name),
            })
            .filter(|m| m.score >= self.threshold)
            .collect();
        // Stable sort keeps candidate order for equal scores.
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }
}

/// Weighted similarity between two strings, `0..=100`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut best = percent(fuzz::ratio(a.chars(), b.chars()));

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };
    if short.len() < long.len() {
        let partial = long
            .windows(short.len())
            .map(|window| fuzz::ratio(short.iter().copied(), window.iter().copied()))
            .fold(0.0, f64::max);
        let weight = if long.len() >= short.len() * LOPSIDED_LENGTH_RATIO {
            LOPSIDED_PARTIAL_WEIGHT
        } else {
            1.0
        };
        best = best.max(percent(partial) * weight);
    }

    let sorted = fuzz::ratio(token_sorted(&a).chars(), token_sorted(&b).chars());
    best = best.max(percent(sorted) * TOKEN_SORT_WEIGHT);

    best.round().clamp(0.0, 100.0) as u8
}

/// Whether `query` is an integer literal: optional sign, then digits only.
/// Size is not checked.
pub fn is_integer_query(query: &str) -> bool {
    let trimmed = query.trim();
    let digits = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// `rapidfuzz` ratios are `0.0..=1.0`.
fn percent(ratio: f64) -> f64 {
    ratio * 100.0
}

fn token_sorted(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNERS: &[&str] = &["GanjaRelease", "tropaz"];

    #[test]
    fn close_misspelling_resolves() {
        let matches = FuzzyOwnerResolver::default().resolve("Garja", OWNERS);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "GanjaRelease");
        assert!(matches[0].score >= 80, "score was {}", matches[0].score);
    }

    #[test]
    fn unrelated_query_returns_nothing() {
        assert!(FuzzyOwnerResolver::default().resolve("zzz", OWNERS).is_empty());
    }

    #[test]
    fn numeric_query_bypasses_matching() {
        assert!(FuzzyOwnerResolver::new(0).resolve("42", OWNERS).is_empty());
        assert!(
            FuzzyOwnerResolver::new(0)
                .resolve("99999999999999999999", OWNERS)
                .is_empty()
        );
    }

    #[test]
    fn integer_literals_of_any_size() {
        assert!(is_integer_query("42"));
        assert!(is_integer_query(" -7 "));
        assert!(is_integer_query("+5"));
        assert!(is_integer_query("99999999999999999999"));
        assert!(!is_integer_query(""));
        assert!(!is_integer_query("-"));
        assert!(!is_integer_query("4 2"));
        assert!(!is_integer_query("42a"));
        assert!(!is_integer_query("1.5"));
    }

    #[test]
    fn partial_window_scores_prefix_misspelling() {
        // "garja" against "ganja" inside "ganjarelease": 4 of 5 chars in common.
        assert_eq!(similarity("Garja", "GanjaRelease"), 80);
    }

    #[test]
    fn duplicates_collapse_to_one_result() {
        let candidates = ["tropaz", "GanjaRelease", "tropaz", "tropaz"];
        let matches = FuzzyOwnerResolver::default().resolve("tropaz", &candidates);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 100);
    }

    #[test]
    fn ordered_by_score_then_candidate_order() {
        let candidates = ["CorB3n", "corben", "CorBen"];
        let matches = FuzzyOwnerResolver::default().resolve("corben", &candidates);
        let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        // "corben" and "CorBen" both normalize to an exact match; original order breaks the tie.
        assert_eq!(names, vec!["corben", "CorBen", "CorB3n"]);
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        assert_eq!(similarity("FERTEQUE", "ferteque"), 100);
    }

    #[test]
    fn token_order_does_not_matter_much() {
        assert!(similarity("release ganja", "ganja release") >= 95);
    }

    #[test]
    fn single_letter_does_not_match_long_names() {
        assert!(similarity("g", "ganjareleasesouthwest") < DEFAULT_THRESHOLD);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(similarity("", "tropaz"), 0);
        assert_eq!(similarity("   ", "tropaz"), 0);
    }
}
