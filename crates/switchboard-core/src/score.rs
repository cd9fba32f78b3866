//! Fuzzy scoring for the switch listing's search box.
//!
//! [`score`] is a pure subsequence scorer: non-zero exactly when every
//! character of the query appears, in order, inside the text
//! (case-insensitive). Matches score higher when they start at a word
//! boundary, run consecutively, and sit inside a short overall span, so
//! `"beta"` ranks `beta_ui` well above `bracket_erasure_tail_archive`.
//! [`rank_switches`] applies the scorer across key, name, and description to
//! filter and order a listing.
//!
//! Scores are deterministic: identical `(text, query)` pairs always produce
//! identical values, with no shared state anywhere in this module.

use unicode_normalization::UnicodeNormalization;

use crate::types::Switch;

const BASE_CHAR_SCORE: f64 = 0.1;
const BOUNDARY_BONUS: f64 = 0.8;
const CONSECUTIVE_BONUS: f64 = 0.6;

/// NFC-normalized, lowercased characters. Both sides of a match go through
/// this so `"Beta UI"` and `"beta ui"` score identically.
fn canonicalize(s: &str) -> Vec<char> {
    s.nfc().flat_map(char::to_lowercase).collect()
}

/// Scores `query` against `text`, in `0.0..=1.0`.
///
/// An empty query scores `1.0` against anything (the listing shows
/// everything when the search box is blank). A query that is not a
/// case-insensitive subsequence of `text` scores `0.0`. Otherwise each
/// matched character earns a base score plus a bonus for word-boundary
/// starts and consecutive runs, and the total is divided by the span the
/// match stretches across, so tight matches beat scattered ones.
#[must_use]
pub fn score(text: &str, query: &str) -> f64 {
    let query_chars = canonicalize(query);
    if query_chars.is_empty() {
        return 1.0;
    }
    let text_chars = canonicalize(text);
    if text_chars.is_empty() {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut cursor = 0usize;
    let mut first_match: Option<usize> = None;
    let mut last_match: Option<usize> = None;

    for qc in &query_chars {
        let found = text_chars[cursor..]
            .iter()
            .position(|tc| tc == qc)
            .map(|offset| cursor + offset);
        let Some(at) = found else {
            return 0.0;
        };

        sum += BASE_CHAR_SCORE;
        if at == 0 || !text_chars[at - 1].is_alphanumeric() {
            sum += BOUNDARY_BONUS;
        }
        if at > 0 && last_match == Some(at - 1) {
            sum += CONSECUTIVE_BONUS;
        }

        first_match.get_or_insert(at);
        last_match = Some(at);
        cursor = at + 1;
    }

    // Both are set once the loop completes without an early return.
    let (Some(first), Some(last)) = (first_match, last_match) else {
        return 0.0;
    };
    let span = (last - first + 1) as f64;
    (sum / span).clamp(0.0, 1.0)
}

/// Summed score of a query across a switch's key, name, and description.
#[must_use]
pub fn switch_score(switch: &Switch, query: &str) -> f64 {
    score(&switch.key, query) + score(&switch.name, query) + score(&switch.description, query)
}

/// Whether a switch appears in the listing for a query: always for an empty
/// query, otherwise when the summed score is positive.
#[must_use]
pub fn matches_query(switch: &Switch, query: &str) -> bool {
    query.trim().is_empty() || switch_score(switch, query) > 0.0
}

/// Filters and orders switches for a listing query.
///
/// Non-matching switches are dropped; the rest are sorted by summed score
/// descending, ties broken by key ascending. A query that trims to nothing
/// keeps every switch, in key order.
#[must_use]
pub fn rank_switches(switches: Vec<Switch>, query: &str) -> Vec<Switch> {
    let query = query.trim();
    if query.is_empty() {
        let mut all = switches;
        all.sort_by(|a, b| a.key.cmp(&b.key));
        return all;
    }

    let mut scored: Vec<(f64, Switch)> = switches
        .into_iter()
        .map(|switch| (switch_score(&switch, query), switch))
        .filter(|(total, _)| *total > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.key.cmp(&b.1.key)));
    scored.into_iter().map(|(_, switch)| switch).collect()
}
