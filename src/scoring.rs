//! Similarity scoring between a source track and catalog candidates.
//!
//! Everything here is pure and free of shared state, so candidates can be
//! scored on any worker thread in any order.
//!
//! ## Scoring Formula
//! ```text
//! title  = 100 × levenshtein_ratio(sorted base title tokens) − version_penalty
//! artist = 100 × max over artist pairs of max(jaccard, levenshtein_ratio)
//! match  = 0.70 × title + 0.30 × artist
//! match  = min(match, 45)   when artist < 40
//! ```
//!
//! The artist floor keeps generic titles ("Intro", "Untitled") by unrelated
//! artists below every accept threshold.

use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use strsim::normalized_levenshtein;

use crate::models::{Candidate, NormalizedTrack, Query, RemixInfo, ScoredCandidate};
use crate::normalize::{is_generic_annotation, normalize_artist, normalize_text, split_artists, split_title};

// ============================================================================
// Weights and Floors
// ============================================================================

pub const TITLE_WEIGHT: f64 = 0.70;
pub const ARTIST_WEIGHT: f64 = 0.30;

/// Artist similarity below which the match score is capped
pub const ARTIST_FLOOR: f64 = 40.0;

/// Cap applied under the artist floor
pub const FLOOR_SCORE_CAP: f64 = 45.0;

/// Only generic qualifiers differ ("original mix" vs none)
pub const GENERIC_VERSION_PENALTY: f64 = 5.0;

/// A named remixer on one side only; scaled down when both name one
pub const REMIXER_PENALTY: f64 = 20.0;

// ============================================================================
// Title Similarity
// ============================================================================

/// Levenshtein ratio over token-sorted strings (0.0 to 1.0).
/// Word order does not matter: "mau5 strobe" == "strobe mau5".
pub fn token_sort_ratio(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut a_sorted: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut b_sorted: Vec<&str> = b.iter().map(String::as_str).collect();
    a_sorted.sort_unstable();
    b_sorted.sort_unstable();
    normalized_levenshtein(&a_sorted.join(" "), &b_sorted.join(" "))
}

/// Points removed from title similarity when the versions differ.
pub fn version_penalty(source: Option<&RemixInfo>, candidate: Option<&RemixInfo>) -> f64 {
    if let (Some(a), Some(b)) = (source, candidate) {
        if a.text == b.text {
            return 0.0;
        }
    }
    if source.is_none() && candidate.is_none() {
        return 0.0;
    }

    let source_remixer = source.and_then(|r| r.remixer.as_deref());
    let candidate_remixer = candidate.and_then(|r| r.remixer.as_deref());
    match (source_remixer, candidate_remixer) {
        (Some(a), Some(b)) => REMIXER_PENALTY * (1.0 - normalized_levenshtein(a, b)),
        (Some(_), None) | (None, Some(_)) => REMIXER_PENALTY,
        (None, None) => {
            let generic = |r: Option<&RemixInfo>| r.map_or(true, |r| is_generic_annotation(&r.text));
            if generic(source) && generic(candidate) {
                GENERIC_VERSION_PENALTY
            } else {
                // e.g. "live at wembley" against the studio cut
                REMIXER_PENALTY / 2.0
            }
        }
    }
}

/// Title similarity (0 to 100) between a source track and a raw candidate title.
pub fn title_similarity(source: &NormalizedTrack, candidate_title: &str) -> f64 {
    let candidate = split_title(candidate_title);
    let base = 100.0 * token_sort_ratio(&source.title_tokens, &candidate.tokens);
    if base == 0.0 {
        return 0.0;
    }
    let penalty = version_penalty(source.remix_info.as_ref(), candidate.remix.as_ref());
    (base - penalty).clamp(0.0, 100.0)
}

// ============================================================================
// Artist Similarity
// ============================================================================

/// Jaccard similarity on word tokens of two normalized artist names (0.0 to 1.0).
pub fn compute_artist_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let tokens_a: FxHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: FxHashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    intersection as f64 / union as f64
}

/// Pair score: the better of token overlap and spelling closeness.
/// Catches both "chemical brothers" vs "brothers chemical" and "deadmau5" vs "deadmaus".
pub fn artist_pair_similarity(a: &str, b: &str) -> f64 {
    let jaccard = compute_artist_similarity(a, b);
    if jaccard == 1.0 {
        return 1.0;
    }
    let a_tokens: Vec<String> = a.split_whitespace().map(str::to_string).collect();
    let b_tokens: Vec<String> = b.split_whitespace().map(str::to_string).collect();
    jaccard.max(token_sort_ratio(&a_tokens, &b_tokens))
}

/// Normalized names for a candidate's credits: each credit split on the usual
/// separators, plus every credit joined as one name.
fn candidate_artist_names(credits: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    for credit in credits {
        let (main, featured) = split_artists(credit);
        for name in main.into_iter().chain(featured) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    let joined = normalize_artist(&credits.join(" "));
    if !joined.is_empty() && !names.contains(&joined) {
        names.push(joined);
    }
    names
}

/// Best-of-set artist similarity (0 to 100): any source artist against any
/// candidate artist, taking the maximum.
pub fn artist_similarity(source: &NormalizedTrack, candidate_artists: &[String]) -> f64 {
    if source.artists.is_empty() {
        return 0.0;
    }
    let candidate_names = candidate_artist_names(candidate_artists);
    if candidate_names.is_empty() {
        return 0.0;
    }

    let mut source_names: Vec<String> = source.artists.clone();
    let joined = source.artists.join(" ");
    if !source_names.contains(&joined) {
        source_names.push(joined);
    }

    let mut best: f64 = 0.0;
    for source_name in &source_names {
        for candidate_name in &candidate_names {
            if source_name == candidate_name {
                return 100.0;
            }
            best = best.max(artist_pair_similarity(source_name, candidate_name));
        }
    }
    100.0 * best
}

// ============================================================================
// Combined Scoring
// ============================================================================

/// Weighted title/artist combination with the artist floor applied.
pub fn combine(title_similarity: f64, artist_similarity: f64) -> f64 {
    let score = TITLE_WEIGHT * title_similarity + ARTIST_WEIGHT * artist_similarity;
    let score = if artist_similarity < ARTIST_FLOOR {
        score.min(FLOOR_SCORE_CAP)
    } else {
        score
    };
    score.clamp(0.0, 100.0)
}

/// Score one candidate against a source track.
pub fn score(source: &NormalizedTrack, candidate: Candidate, query: &Query) -> ScoredCandidate {
    let title = title_similarity(source, &candidate.title);
    let artist = artist_similarity(source, &candidate.artists);
    ScoredCandidate {
        match_score: combine(title, artist),
        title_similarity: title,
        artist_similarity: artist,
        source_query: query.clone(),
        candidate,
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// Identity of a catalog entry across queries: its URL, or its normalized
/// title and credits when the provider gives no URL.
pub fn candidate_key(candidate: &Candidate) -> String {
    let url = candidate.url.trim();
    if !url.is_empty() {
        return url.to_string();
    }
    let artists: Vec<String> = candidate.artists.iter().map(|a| normalize_artist(a)).collect();
    format!("{}|{}", normalize_text(&candidate.title), artists.join(","))
}

fn cmp_opt_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Total ranking order, best first: match score, artist similarity, query
/// specificity, then candidate fields so equal scores never depend on
/// arrival order.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.match_score
        .total_cmp(&a.match_score)
        .then_with(|| b.artist_similarity.total_cmp(&a.artist_similarity))
        .then_with(|| b.source_query.specificity.cmp(&a.source_query.specificity))
        .then_with(|| a.candidate.url.cmp(&b.candidate.url))
        .then_with(|| a.candidate.title.cmp(&b.candidate.title))
        .then_with(|| a.candidate.artists.cmp(&b.candidate.artists))
        .then_with(|| a.source_query.text.cmp(&b.source_query.text))
        .then_with(|| cmp_opt_f64(a.candidate.bpm, b.candidate.bpm))
        .then_with(|| a.candidate.year.cmp(&b.candidate.year))
        .then_with(|| a.candidate.key.cmp(&b.candidate.key))
        .then_with(|| a.candidate.label.cmp(&b.candidate.label))
        .then_with(|| a.candidate.release_date.cmp(&b.candidate.release_date))
        .then_with(|| a.candidate.genres.cmp(&b.candidate.genres))
}
