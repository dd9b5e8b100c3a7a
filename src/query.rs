//! Search query generation.
//!
//! Produces an ordered, de-duplicated list of queries for one normalized
//! track, most specific first:
//!
//! 1. title + remix annotation + every credited artist
//! 2. title + every credited artist
//! 3. title + main artists, then title + primary artist
//! 4. title + remixer
//! 5. title alone
//! 6. title windows (3 then 2 words) + primary artist, for long titles
//! 7. title windows alone
//! 8. main artists alone
//!
//! The list is cut at `max_queries` after sorting, so the weakest variants
//! are the ones dropped.

use rustc_hash::FxHashSet;

use crate::config::QueryConfig;
use crate::models::{NormalizedTrack, Query, QueryKind};

/// Largest offset a variant may subtract from its kind's base specificity,
/// so variants never overtake the next kind up.
const MAX_VARIANT_OFFSET: u32 = 9;

/// Window sizes for title n-grams, larger first
const NGRAM_SIZES: [usize; 2] = [3, 2];

struct QueryBuilder {
    queries: Vec<Query>,
    seen: FxHashSet<String>,
}

impl QueryBuilder {
    fn new() -> Self {
        Self {
            queries: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    /// Add a query built from already-normalized parts; empty and duplicate
    /// texts are ignored.
    fn push(&mut self, kind: QueryKind, offset: u32, parts: &[&str]) {
        let text = parts
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() || !self.seen.insert(text.clone()) {
            return;
        }
        self.queries.push(Query {
            text,
            specificity: kind.base_specificity() - offset.min(MAX_VARIANT_OFFSET),
            kind,
        });
    }

    fn finish(mut self, max_queries: usize) -> Vec<Query> {
        // Stable: equal specificity keeps generation order
        self.queries.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        self.queries.truncate(max_queries);
        self.queries
    }
}

/// Sliding windows over the title tokens, larger windows first.
fn title_windows(tokens: &[String]) -> Vec<String> {
    let mut windows = Vec::new();
    for size in NGRAM_SIZES {
        if tokens.len() <= size {
            continue;
        }
        for window in tokens.windows(size) {
            windows.push(window.join(" "));
        }
    }
    windows
}

/// Generate search queries for a track, most specific first.
///
/// Never returns an empty list for a track with any title or artist text.
pub fn generate_queries(track: &NormalizedTrack, config: &QueryConfig) -> Vec<Query> {
    let mut builder = QueryBuilder::new();

    let title = track.title();
    let all_artists = track.artists.join(" ");
    let main_artists = track.main_artists().join(" ");
    let primary = track.primary_artist().unwrap_or("");
    let remix = track.remix_info.as_ref().filter(|_| config.include_remix_queries);

    if title.is_empty() {
        builder.push(QueryKind::ArtistOnly, 0, &[&main_artists]);
        builder.push(QueryKind::ArtistOnly, 1, &[&all_artists]);
        return builder.finish(config.max_queries);
    }

    if let Some(remix) = remix {
        builder.push(QueryKind::Full, 0, &[&title, &remix.text, &all_artists]);
    }
    if !all_artists.is_empty() {
        builder.push(QueryKind::AllArtists, 0, &[&title, &all_artists]);
        builder.push(QueryKind::MainArtists, 0, &[&title, &main_artists]);
        builder.push(QueryKind::MainArtists, 1, &[&title, primary]);
    }
    if let Some(remixer) = remix.and_then(|r| r.remixer.as_deref()) {
        builder.push(QueryKind::Remixer, 0, &[&title, remixer]);
    }
    builder.push(QueryKind::TitleOnly, 0, &[&title]);

    // Single-word title with a plain credit: the two queries above say it all
    let is_simple = track.title_tokens.len() <= 1
        && track.remix_info.is_none()
        && track.featured_artists.is_empty()
        && track.artists.len() <= 1;
    if is_simple {
        return builder.finish(config.max_queries);
    }

    if track.title_tokens.len() >= config.ngram_min_words {
        let windows = title_windows(&track.title_tokens);
        if config.cross_ngrams_with_artist && !primary.is_empty() {
            for (offset, window) in windows.iter().enumerate() {
                builder.push(QueryKind::NgramArtist, offset as u32, &[window, primary]);
            }
        }
        for (offset, window) in windows.iter().enumerate() {
            builder.push(QueryKind::Ngram, offset as u32, &[window]);
        }
    }

    builder.push(QueryKind::ArtistOnly, 0, &[&main_artists]);

    builder.finish(config.max_queries)
}
