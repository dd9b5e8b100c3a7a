//! Core data models for track resolution.
//!
//! This module contains the struct definitions and enums that flow through
//! the pipeline: source tracks, their normalized form, queries, provider
//! candidates, scored candidates, and the terminal per-track result.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

// ============================================================================
// Source Models
// ============================================================================

/// One playlist entry as exported by the library manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTrack {
    /// Position in the playlist (0-based)
    #[serde(default)]
    pub index: usize,
    pub title: String,
    pub artist: String,
}

impl SourceTrack {
    pub fn new(index: usize, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// Remix/edit annotation split off a title, e.g. "(Eric Prydz Remix)".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemixInfo {
    /// Original annotation text without brackets (display form)
    pub display: String,
    /// Normalized annotation, e.g. "eric prydz remix"
    pub text: String,
    /// Normalized remixer name when the annotation credits one
    pub remixer: Option<String>,
}

/// Canonical form of a source track used for querying and scoring.
///
/// A pure function of the source strings: identical input always yields an
/// identical value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedTrack {
    // Display names (trimmed originals)
    pub display_title: String,
    pub display_artist: String,

    /// Base title tokens with remix/feat annotations removed
    pub title_tokens: Vec<String>,
    /// Normalized artist names, primary artist first
    pub artists: Vec<String>,
    /// Tokens of every artist name, in order
    pub artist_tokens: Vec<String>,
    /// Artists credited via feat./ft. (artist field or title annotation)
    pub featured_artists: Vec<String>,
    pub remix_info: Option<RemixInfo>,
}

impl NormalizedTrack {
    /// Base title as a single space-joined string
    pub fn title(&self) -> String {
        self.title_tokens.join(" ")
    }

    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }

    /// Artists that are not featured, primary first
    pub fn main_artists(&self) -> Vec<&str> {
        self.artists
            .iter()
            .filter(|a| !self.featured_artists.contains(a))
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.title_tokens.is_empty() && self.artists.is_empty()
    }
}

// ============================================================================
// Query Models
// ============================================================================

/// How a query was derived from the track. Ordered most to least specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Title + remix annotation + every credited artist
    Full,
    /// Title + every credited artist
    AllArtists,
    /// Title + main artists (featured dropped), or title + primary artist
    MainArtists,
    /// Title + remixer name
    Remixer,
    TitleOnly,
    /// Title window + primary artist
    NgramArtist,
    /// Title window alone
    Ngram,
    ArtistOnly,
}

impl QueryKind {
    /// Base specificity; variants of one kind subtract a small offset from it.
    pub fn base_specificity(self) -> u32 {
        match self {
            QueryKind::Full => 100,
            QueryKind::AllArtists => 90,
            QueryKind::MainArtists => 80,
            QueryKind::Remixer => 70,
            QueryKind::TitleOnly => 60,
            QueryKind::NgramArtist => 50,
            QueryKind::Ngram => 30,
            QueryKind::ArtistOnly => 10,
        }
    }
}

/// Search query text with its specificity (higher is tried first).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Query {
    pub text: String,
    pub specificity: u32,
    pub kind: QueryKind,
}

// ============================================================================
// Candidate Models
// ============================================================================

/// Catalog entry returned by the search provider.
///
/// Numeric fields are parsed leniently: a number or numeric string is kept,
/// anything else becomes `None` so the candidate stays scorable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_artists")]
    pub artists: Vec<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_year", skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Provider-supplied relevance, informational only
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<f64>,
}

/// Plausible BPM range for catalog data
const BPM_RANGE: std::ops::RangeInclusive<f64> = 20.0..=400.0;

/// Plausible release year range for catalog data
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

impl Candidate {
    /// Drop implausible numeric values and blank optional strings.
    pub fn sanitized(mut self) -> Self {
        self.bpm = self.bpm.filter(|b| b.is_finite() && BPM_RANGE.contains(b));
        self.year = self.year.filter(|y| YEAR_RANGE.contains(y));
        self.raw_score = self.raw_score.filter(|s| s.is_finite());
        self.key = self.key.filter(|k| !k.trim().is_empty());
        self.label = self.label.filter(|l| !l.trim().is_empty());
        self.release_date = self.release_date.filter(|d| !d.trim().is_empty());
        self.artists.retain(|a| !a.trim().is_empty());
        self.genres.retain(|g| !g.trim().is_empty());
        self
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

/// Accepts 2009, "2009", or a date string like "2009-05-01".
fn lenient_year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().get(..4).and_then(|y| y.parse::<i32>().ok()),
        _ => None,
    }))
}

/// Accepts a list of names or a single credit string.
fn lenient_artists<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Candidate with similarity scores against one source track.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub match_score: f64,
    pub source_query: Query,
}

// ============================================================================
// Result Models
// ============================================================================

/// Coarse bucket derived from the best match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
    None,
}

/// Why the search phase for a track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// A confident match arrived after the minimum number of queries
    EarlyExit,
    /// The per-track time budget elapsed
    BudgetExhausted,
    /// Every generated query returned or failed terminally
    QueriesExhausted,
}

/// Terminal result for one source track. Created once, never mutated.
#[derive(Clone, Debug, Serialize)]
pub struct TrackResult {
    pub source_track: SourceTrack,
    pub matched: bool,
    pub best_candidate: Option<ScoredCandidate>,
    pub confidence: Confidence,
    /// Top-K candidates, best first (kept even when unmatched)
    pub candidates: Vec<ScoredCandidate>,
    pub queries_issued: usize,
    pub cache_hits: usize,
    pub failed_queries: usize,
    pub exit_reason: ExitReason,
    pub elapsed_ms: u64,
}

/// Per-track entry of a playlist run, in playlist order.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackOutcome {
    Resolved(TrackResult),
    Cancelled(SourceTrack),
}

impl TrackOutcome {
    pub fn source_track(&self) -> &SourceTrack {
        match self {
            TrackOutcome::Resolved(result) => &result.source_track,
            TrackOutcome::Cancelled(track) => track,
        }
    }

    pub fn result(&self) -> Option<&TrackResult> {
        match self {
            TrackOutcome::Resolved(result) => Some(result),
            TrackOutcome::Cancelled(_) => None,
        }
    }
}

/// Output of a playlist run: one outcome per input track plus batch status.
#[derive(Clone, Debug, Serialize)]
pub struct PlaylistReport {
    pub outcomes: Vec<TrackOutcome>,
    pub stats: ResolutionStats,
}

impl PlaylistReport {
    pub fn results(&self) -> impl Iterator<Item = &TrackResult> {
        self.outcomes.iter().filter_map(TrackOutcome::result)
    }

    pub fn is_complete(&self) -> bool {
        self.stats.cancelled == 0
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Batch status for a playlist run.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionStats {
    pub total_tracks: usize,
    pub resolved: usize,
    pub cancelled: usize,

    pub matched: usize,
    pub unmatched: usize,

    // Confidence tiers
    pub high: usize,
    pub medium: usize,
    pub low: usize,

    // Exit reasons
    pub early_exits: usize,
    pub budget_exhausted: usize,
    pub queries_exhausted: usize,

    // Query accounting
    pub queries_issued: usize,
    pub cache_hits: usize,
    pub failed_queries: usize,

    pub elapsed_seconds: f64,
}

impl ResolutionStats {
    pub fn from_outcomes(outcomes: &[TrackOutcome], elapsed: Duration) -> Self {
        let mut stats = ResolutionStats {
            total_tracks: outcomes.len(),
            elapsed_seconds: elapsed.as_secs_f64(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                TrackOutcome::Cancelled(_) => stats.cancelled += 1,
                TrackOutcome::Resolved(result) => stats.record(result),
            }
        }
        stats
    }

    fn record(&mut self, result: &TrackResult) {
        self.resolved += 1;
        if result.matched {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
        match result.confidence {
            Confidence::High => self.high += 1,
            Confidence::Medium => self.medium += 1,
            Confidence::Low => self.low += 1,
            Confidence::None => {}
        }
        match result.exit_reason {
            ExitReason::EarlyExit => self.early_exits += 1,
            ExitReason::BudgetExhausted => self.budget_exhausted += 1,
            ExitReason::QueriesExhausted => self.queries_exhausted += 1,
        }
        self.queries_issued += result.queries_issued;
        self.cache_hits += result.cache_hits;
        self.failed_queries += result.failed_queries;
    }

    /// Match rate over resolved tracks as a percentage
    pub fn match_rate(&self) -> f64 {
        if self.resolved == 0 {
            0.0
        } else {
            100.0 * self.matched as f64 / self.resolved as f64
        }
    }

    /// Log stats in JSON format
    pub fn log_summary(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            info!(phase, "resolution stats\n{}", json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_lenient_numeric_fields() {
        let json = r#"{"title":"Strobe","artists":"deadmau5","bpm":"128","year":"2009-09-22"}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.artists, vec!["deadmau5".to_string()]);
        assert_eq!(candidate.bpm, Some(128.0));
        assert_eq!(candidate.year, Some(2009));

        let json = r#"{"title":"Strobe","artists":["deadmau5"],"bpm":"fast","year":{"y":1}}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.bpm, None);
        assert_eq!(candidate.year, None);
        assert_eq!(candidate.title, "Strobe");
    }

    #[test]
    fn test_candidate_sanitized_drops_implausible_values() {
        let candidate = Candidate {
            title: "Ghosts 'n' Stuff".into(),
            artists: vec!["deadmau5".into(), " ".into()],
            bpm: Some(-5.0),
            year: Some(3021),
            key: Some("".into()),
            label: Some("mau5trap".into()),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(candidate.bpm, None);
        assert_eq!(candidate.year, None);
        assert_eq!(candidate.key, None);
        assert_eq!(candidate.label.as_deref(), Some("mau5trap"));
        assert_eq!(candidate.artists, vec!["deadmau5".to_string()]);
    }

    #[test]
    fn test_stats_from_outcomes() {
        let result = TrackResult {
            source_track: SourceTrack::new(0, "Strobe", "deadmau5"),
            matched: true,
            best_candidate: None,
            confidence: Confidence::High,
            candidates: Vec::new(),
            queries_issued: 2,
            cache_hits: 1,
            failed_queries: 0,
            exit_reason: ExitReason::EarlyExit,
            elapsed_ms: 5,
        };
        let outcomes = vec![
            TrackOutcome::Resolved(result),
            TrackOutcome::Cancelled(SourceTrack::new(1, "Raise Your Weapon", "deadmau5")),
        ];
        let stats = ResolutionStats::from_outcomes(&outcomes, Duration::from_secs(1));
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.early_exits, 1);
        assert_eq!(stats.queries_issued, 2);
        assert_eq!(stats.match_rate(), 100.0);
    }

    #[test]
    fn test_stats_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let stats = ResolutionStats {
            total_tracks: 3,
            matched: 2,
            ..Default::default()
        };
        stats.write_to_file(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["total_tracks"], 3);
        assert_eq!(value["matched"], 2);
    }
}
