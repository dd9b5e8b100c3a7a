//! Resolution engine.
//!
//! Per track:
//!
//! ```text
//! Searching ──▶ EarlyExit          best ≥ early_exit_threshold after ≥ N queries
//!           ──▶ BudgetExhausted    time budget elapsed
//!           ──▶ QueriesExhausted   every query returned or failed terminally
//!           ──▶ Resolved           confidence tier + top-K
//! ```
//!
//! Candidates are folded into a running top-K as batches are delivered, in
//! query order. The top-K is de-duplicated by catalog identity and ordered by
//! `rank_order`, a total order, so the final list does not depend on arrival
//! order.
//!
//! Playlists run on a dedicated rayon pool (`track_workers` threads); each
//! track then fans out to its own `query_workers`. All of them share one
//! request limiter.

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::ResolverConfig;
use crate::dispatch::{BatchOutcome, DispatchEvent, Dispatcher, QueryBatch};
use crate::error::{Cancelled, ConfigError};
use crate::models::{
    Confidence, ExitReason, PlaylistReport, ResolutionStats, ScoredCandidate, SourceTrack, TrackOutcome,
    TrackResult,
};
use crate::normalize::normalize;
use crate::provider::{Cache, NoopCache, SearchProvider};
use crate::query::generate_queries;
use crate::rate_limit::RequestLimiter;
use crate::scoring::{candidate_key, rank_order};

// ============================================================================
// Running Top-K
// ============================================================================

/// Best `k` distinct candidates seen so far, best first.
struct TopK {
    k: usize,
    entries: Vec<(String, ScoredCandidate)>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            entries: Vec::with_capacity(k + 1),
        }
    }

    fn offer(&mut self, candidate: ScoredCandidate) {
        let key = candidate_key(&candidate.candidate);
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(pos) => {
                if rank_order(&candidate, &self.entries[pos].1).is_lt() {
                    self.entries[pos].1 = candidate;
                } else {
                    return;
                }
            }
            None => self.entries.push((key, candidate)),
        }
        self.entries.sort_by(|a, b| rank_order(&a.1, &b.1));
        self.entries.truncate(self.k);
    }

    fn best_score(&self) -> Option<f64> {
        self.entries.first().map(|(_, c)| c.match_score)
    }

    fn into_sorted(self) -> Vec<ScoredCandidate> {
        self.entries.into_iter().map(|(_, c)| c).collect()
    }
}

/// Confidence tier for the best score; `None` below the accept score.
pub fn classify(best_score: Option<f64>, config: &ResolverConfig) -> Confidence {
    match best_score {
        Some(score) if score >= config.high_confidence => Confidence::High,
        Some(score) if score >= config.medium_confidence => Confidence::Medium,
        Some(score) if score >= config.min_accept_score => Confidence::Low,
        _ => Confidence::None,
    }
}

/// Per-track counters over delivered batches.
#[derive(Default)]
struct BatchTally {
    completed: usize,
    cache_hits: usize,
    failed_queries: usize,
}

impl BatchTally {
    fn absorb(&mut self, batch: QueryBatch, top: &mut TopK) {
        self.completed += 1;
        match batch.outcome {
            BatchOutcome::Cached => self.cache_hits += 1,
            BatchOutcome::Failed(_) => self.failed_queries += 1,
            BatchOutcome::Fresh => {}
        }
        for candidate in batch.candidates {
            top.offer(candidate);
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct Resolver {
    config: Arc<ResolverConfig>,
    dispatcher: Dispatcher,
    pool: rayon::ThreadPool,
}

impl Resolver {
    /// Validate the configuration and build both worker pools' shared state.
    pub fn new(config: ResolverConfig, provider: Arc<dyn SearchProvider>) -> Result<Self, ConfigError> {
        config.validate()?;
        let limiter = Arc::new(RequestLimiter::from_config(&config)?);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.track_workers)
            .thread_name(|i| format!("track-worker-{}", i))
            .build()?;
        let config = Arc::new(config);
        let dispatcher = Dispatcher::new(Arc::clone(&config), provider, Arc::new(NoopCache), limiter);
        Ok(Self {
            config,
            dispatcher,
            pool,
        })
    }

    /// Read-through cache consulted before every provider call.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.dispatcher = self.dispatcher.with_cache(cache);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve one track. Fails only when `cancel` fires before the track
    /// reaches a terminal state.
    pub fn resolve_track(&self, source: &SourceTrack, cancel: &CancelToken) -> Result<TrackResult, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let start = Instant::now();
        let deadline = start + self.config.time_budget();
        let track = Arc::new(normalize(&source.title, &source.artist));
        let queries = generate_queries(&track, &self.config.query);
        debug!(index = source.index, title = %source.title, queries = queries.len(), "resolving track");

        let track_cancel = cancel.child();
        let mut dispatch = self.dispatcher.start(track, queries, track_cancel);
        let mut top = TopK::new(self.config.top_k);
        let mut tally = BatchTally::default();

        let exit_reason = loop {
            match dispatch.next(deadline) {
                DispatchEvent::Batch(batch) => {
                    tally.absorb(batch, &mut top);
                    let confident = top
                        .best_score()
                        .is_some_and(|best| best >= self.config.early_exit_threshold);
                    if confident && tally.completed >= self.config.early_exit_min_queries {
                        break ExitReason::EarlyExit;
                    }
                }
                DispatchEvent::Exhausted => break ExitReason::QueriesExhausted,
                DispatchEvent::DeadlineReached => {
                    for batch in dispatch.take_arrived() {
                        tally.absorb(batch, &mut top);
                    }
                    break ExitReason::BudgetExhausted;
                }
                DispatchEvent::Cancelled => {
                    dispatch.stop();
                    debug!(index = source.index, "track cancelled");
                    return Err(Cancelled);
                }
            }
        };
        let queries_issued = dispatch.stop();

        let best_score = top.best_score();
        let confidence = classify(best_score, &self.config);
        let matched = confidence != Confidence::None;
        let candidates = top.into_sorted();
        let best_candidate = if matched { candidates.first().cloned() } else { None };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            index = source.index,
            title = %source.title,
            score = best_score.unwrap_or(0.0),
            ?confidence,
            ?exit_reason,
            queries_issued,
            elapsed_ms,
            "track resolved"
        );

        Ok(TrackResult {
            source_track: source.clone(),
            matched,
            best_candidate,
            confidence,
            candidates,
            queries_issued,
            cache_hits: tally.cache_hits,
            failed_queries: tally.failed_queries,
            exit_reason,
            elapsed_ms,
        })
    }

    /// Resolve a playlist on the track pool. Outcomes come back in input order.
    pub fn resolve_playlist(&self, tracks: &[SourceTrack], cancel: &CancelToken) -> PlaylistReport {
        self.resolve_playlist_with(tracks, cancel, |_| {})
    }

    /// Like `resolve_playlist`, calling `on_outcome` as each track finishes
    /// (in completion order, from worker threads).
    pub fn resolve_playlist_with<F>(&self, tracks: &[SourceTrack], cancel: &CancelToken, on_outcome: F) -> PlaylistReport
    where
        F: Fn(&TrackOutcome) + Sync,
    {
        let start = Instant::now();
        info!(
            tracks = tracks.len(),
            track_workers = self.config.track_workers,
            query_workers = self.config.query_workers,
            "resolving playlist"
        );

        let outcomes: Vec<TrackOutcome> = self.pool.install(|| {
            tracks
                .par_iter()
                .map(|track| {
                    let outcome = match self.resolve_track(track, cancel) {
                        Ok(result) => TrackOutcome::Resolved(result),
                        Err(Cancelled) => TrackOutcome::Cancelled(track.clone()),
                    };
                    on_outcome(&outcome);
                    outcome
                })
                .collect()
        });

        let stats = ResolutionStats::from_outcomes(&outcomes, start.elapsed());
        info!(
            resolved = stats.resolved,
            cancelled = stats.cancelled,
            matched = stats.matched,
            elapsed_s = stats.elapsed_seconds,
            "playlist finished"
        );
        PlaylistReport { outcomes, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::models::Candidate;
    use crate::provider::testing::{candidate, ScriptedProvider};
    use crate::provider::MemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn fast_config() -> ResolverConfig {
        ResolverConfig::default()
            .with_requests_per_second(1000)
            .with_rate_burst(1000)
            .with_retries(1, Duration::from_millis(1))
    }

    /// Early exit never fires: every query runs.
    fn exhaustive_config() -> ResolverConfig {
        fast_config().with_early_exit(90.0, 1_000)
    }

    fn resolver(config: ResolverConfig, provider: &Arc<ScriptedProvider>) -> Resolver {
        Resolver::new(config, provider.clone()).unwrap()
    }

    fn strobe_candidate() -> Candidate {
        Candidate {
            bpm: Some(128.0),
            ..candidate("Strobe", &["deadmau5"], "https://catalog.example/strobe")
        }
    }

    #[test]
    fn test_strobe_example() {
        let provider = Arc::new(ScriptedProvider::new().with_response("strobe deadmau5", vec![strobe_candidate()]));
        let resolver = resolver(fast_config(), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert!(result.matched);
        assert_eq!(result.confidence, Confidence::High);
        let best = result.best_candidate.unwrap();
        assert_eq!(best.title_similarity, 95.0);
        assert_eq!(best.artist_similarity, 100.0);
        assert_eq!(best.candidate.bpm, Some(128.0));
        assert_eq!(best.source_query.text, "strobe deadmau5");
        assert_eq!(result.source_track, track);
    }

    #[test]
    fn test_unmatched_keeps_top_k() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_response("midnight city m83", vec![candidate("Midnight Train", &["Gladys Knight"], "u1")])
                .with_response("midnight city", vec![candidate("City Lights", &["Midnight Oil"], "u2")]),
        );
        let resolver = resolver(fast_config(), &provider);
        let track = SourceTrack::new(0, "Midnight City", "M83");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert!(!result.matched);
        assert_eq!(result.confidence, Confidence::None);
        assert!(result.best_candidate.is_none());
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.exit_reason, ExitReason::QueriesExhausted);
        assert!(result.candidates[0].match_score >= result.candidates[1].match_score);
    }

    #[test]
    fn test_early_exit_stops_dispatch() {
        let mut provider = ScriptedProvider::new();
        for query in ["strobe original mix deadmau5", "strobe deadmau5", "strobe", "deadmau5"] {
            provider = provider.with_response(query, vec![strobe_candidate()]);
        }
        let provider = Arc::new(provider);
        let resolver = resolver(fast_config().with_query_workers(1), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert_eq!(result.exit_reason, ExitReason::EarlyExit);
        assert_eq!(result.queries_issued, 2);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(
            provider.calls(),
            vec!["strobe original mix deadmau5".to_string(), "strobe deadmau5".to_string()]
        );
    }

    #[test]
    fn test_early_exit_waits_for_min_queries() {
        let provider = Arc::new(ScriptedProvider::new().with_response("strobe original mix deadmau5", vec![strobe_candidate()]));
        let resolver = resolver(fast_config().with_query_workers(1).with_early_exit(90.0, 3), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert_eq!(result.exit_reason, ExitReason::EarlyExit);
        assert_eq!(provider.call_count(), 3);
    }

    #[test]
    fn test_budget_respected_with_slow_provider() {
        let provider = Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_secs(30)));
        let resolver = resolver(fast_config().with_time_budget(Duration::from_millis(100)), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let start = Instant::now();
        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(result.exit_reason, ExitReason::BudgetExhausted);
        assert!(!result.matched);
    }

    #[test]
    fn test_budget_keeps_arrived_candidates() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_default_delay(Duration::from_secs(30))
                .with_delay("strobe deadmau5", Duration::ZERO)
                .with_response("strobe deadmau5", vec![strobe_candidate()]),
        );
        let resolver = resolver(fast_config().with_time_budget(Duration::from_millis(200)), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert_eq!(result.exit_reason, ExitReason::BudgetExhausted);
        assert!(result.matched);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_response(
                    "sun and moon above beyond richard bedford",
                    vec![
                        candidate("Sun & Moon", &["Above & Beyond"], "u1"),
                        candidate("Sun & Moon (Club Mix)", &["Above & Beyond"], "u2"),
                    ],
                )
                .with_response(
                    "sun and moon",
                    vec![
                        candidate("Sun & Moon", &["Above & Beyond"], "u1"),
                        candidate("Sun and Moon", &["Richard Bedford"], "u3"),
                        candidate("Moon", &["Sun"], ""),
                    ],
                )
                .with_delay("sun and moon", Duration::from_millis(5)),
        );
        let resolver = resolver(exhaustive_config(), &provider);
        let track = SourceTrack::new(0, "Sun & Moon", "Above & Beyond feat. Richard Bedford");

        let first = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        for _ in 0..5 {
            let again = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
            assert_eq!(again.candidates, first.candidates);
            assert_eq!(again.best_candidate, first.best_candidate);
            assert_eq!(again.confidence, first.confidence);
        }
        assert_eq!(first.candidates.len(), 4);
    }

    /// Answers every query with one Strobe candidate whose url names the query,
    /// taking a different latency on each call.
    struct JitteryProvider {
        calls: AtomicUsize,
    }

    impl SearchProvider for JitteryProvider {
        fn search(&self, query: &str, cancel: &CancelToken) -> Result<Vec<Candidate>, SearchError> {
            const LATENCIES_MS: [u64; 8] = [0, 40, 15, 25, 5, 35, 30, 10];
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let latency = Duration::from_millis(LATENCIES_MS[call % LATENCIES_MS.len()]);
            if !cancel.sleep(latency) {
                return Err(SearchError::Cancelled);
            }
            let url = format!("https://catalog.example/{}", query.replace(' ', "-"));
            Ok(vec![candidate("Strobe", &["deadmau5"], &url)])
        }
    }

    #[test]
    fn test_early_exit_is_deterministic_under_varying_latency() {
        let provider = Arc::new(JitteryProvider {
            calls: AtomicUsize::new(0),
        });
        // Default early exit (90 after 2 queries) over 4 query workers
        let resolver = Resolver::new(fast_config(), provider).unwrap();
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let first = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert_eq!(first.exit_reason, ExitReason::EarlyExit);
        let urls: Vec<&str> = first.candidates.iter().map(|c| c.candidate.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://catalog.example/strobe-original-mix-deadmau5",
                "https://catalog.example/strobe-deadmau5"
            ]
        );

        for _ in 0..7 {
            let again = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
            assert_eq!(again.candidates, first.candidates);
            assert_eq!(again.best_candidate, first.best_candidate);
            assert_eq!(again.queries_issued, first.queries_issued);
        }
    }

    #[test]
    fn test_rate_limit_shared_across_tracks() {
        let provider = Arc::new(ScriptedProvider::new());
        let config = exhaustive_config()
            .with_track_workers(4)
            .with_query_workers(4)
            .with_requests_per_second(20)
            .with_rate_burst(1);
        let resolver = resolver(config, &provider);
        let tracks: Vec<SourceTrack> = (0..6)
            .map(|i| SourceTrack::new(i, format!("Night Drive {}", i), format!("Artist {}", i)))
            .collect();

        let start = Instant::now();
        let report = resolver.resolve_playlist(&tracks, &CancelToken::new());
        let elapsed = start.elapsed();

        assert!(report.is_complete());
        let calls = provider.call_count();
        assert!(calls > tracks.len());
        // One request every 50ms after the first, however many pools are asking
        let floor = Duration::from_millis(50 * (calls as u64 - 1));
        assert!(
            elapsed + Duration::from_millis(10) >= floor,
            "{} calls in {:?}",
            calls,
            elapsed
        );
    }

    #[test]
    fn test_duplicates_keep_most_specific_query() {
        let mut provider = ScriptedProvider::new();
        for query in ["strobe original mix deadmau5", "strobe deadmau5", "strobe", "deadmau5"] {
            provider = provider.with_response(query, vec![strobe_candidate()]);
        }
        let provider = Arc::new(provider);
        let resolver = resolver(exhaustive_config(), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].source_query.text, "strobe original mix deadmau5");
    }

    #[test]
    fn test_top_k_bound() {
        let many: Vec<Candidate> = (0..20)
            .map(|i| candidate(&format!("Strobe {}", i), &["deadmau5"], &format!("u{}", i)))
            .collect();
        let provider = Arc::new(ScriptedProvider::new().with_response("strobe deadmau5", many));
        let resolver = resolver(exhaustive_config().with_top_k(5), &provider);
        let track = SourceTrack::new(0, "Strobe", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert_eq!(result.candidates.len(), 5);
        assert!(result
            .candidates
            .windows(2)
            .all(|w| rank_order(&w[0], &w[1]).is_le()));
    }

    #[test]
    fn test_artist_floor_blocks_generic_title() {
        let provider = Arc::new(ScriptedProvider::new().with_response("intro", vec![candidate("Intro", &["Alt-J"], "u1")]));
        let resolver = resolver(fast_config(), &provider);
        let track = SourceTrack::new(0, "Intro", "The xx");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert!(!result.matched);
        assert_eq!(result.confidence, Confidence::None);
        assert_eq!(result.candidates[0].title_similarity, 100.0);
    }

    #[test]
    fn test_provider_errors_resolve_unmatched() {
        let provider = Arc::new(ScriptedProvider::failing(SearchError::Unavailable("down".into())));
        let resolver = resolver(fast_config(), &provider);
        let track = SourceTrack::new(0, "Strobe (Original Mix)", "deadmau5");

        let result = resolver.resolve_track(&track, &CancelToken::new()).unwrap();
        assert!(!result.matched);
        assert!(result.candidates.is_empty());
        assert_eq!(result.failed_queries, 4);
        assert_eq!(result.exit_reason, ExitReason::QueriesExhausted);
    }

    #[test]
    fn test_empty_track_resolves_unmatched() {
        let provider = Arc::new(ScriptedProvider::new());
        let resolver = resolver(fast_config(), &provider);
        let result = resolver
            .resolve_track(&SourceTrack::new(0, "", ""), &CancelToken::new())
            .unwrap();
        assert!(!result.matched);
        assert_eq!(result.queries_issued, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let provider = Arc::new(ScriptedProvider::new());
        let resolver = resolver(fast_config(), &provider);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = resolver
            .resolve_track(&SourceTrack::new(0, "Strobe", "deadmau5"), &cancel)
            .unwrap_err();
        assert_eq!(err, Cancelled);
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_cancelled_mid_search() {
        let provider = Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_secs(30)));
        let resolver = resolver(fast_config(), &provider);
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let start = Instant::now();
        let result = resolver.resolve_track(&SourceTrack::new(0, "Strobe", "deadmau5"), &cancel);
        assert_eq!(result.unwrap_err(), Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_playlist_preserves_input_order() {
        let mut provider = ScriptedProvider::new();
        let mut tracks = Vec::new();
        for i in 0..8 {
            let title = format!("Track {}", i);
            let query = format!("track {} artist", i);
            provider = provider
                .with_response(&query, vec![candidate(&title, &["Artist"], &format!("u{}", i))])
                // Earlier tracks finish last
                .with_delay(&query, Duration::from_millis(10 * (8 - i) as u64));
            tracks.push(SourceTrack::new(i as usize, title, "Artist"));
        }
        let provider = Arc::new(provider);
        let resolver = resolver(fast_config().with_track_workers(4), &provider);

        let seen = AtomicUsize::new(0);
        let report = resolver.resolve_playlist_with(&tracks, &CancelToken::new(), |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 8);
        assert_eq!(report.outcomes.len(), 8);
        assert!(report.is_complete());
        for (i, outcome) in report.outcomes.iter().enumerate() {
            assert_eq!(outcome.source_track().index, i);
            let result = outcome.result().unwrap();
            assert!(result.matched);
            assert_eq!(result.best_candidate.as_ref().unwrap().candidate.url, format!("u{}", i));
        }
        assert_eq!(report.stats.matched, 8);
    }

    #[test]
    fn test_playlist_global_cancel() {
        let provider = Arc::new(ScriptedProvider::new());
        let resolver = resolver(fast_config(), &provider);
        let tracks: Vec<SourceTrack> = (0..3).map(|i| SourceTrack::new(i, "Strobe", "deadmau5")).collect();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = resolver.resolve_playlist(&tracks, &cancel);
        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.is_complete());
        assert_eq!(report.stats.cancelled, 3);
        assert!(report
            .outcomes
            .iter()
            .all(|o| matches!(o, TrackOutcome::Cancelled(_))));
    }

    #[test]
    fn test_cache_shared_across_tracks() {
        let provider = Arc::new(ScriptedProvider::new().with_response("strobe deadmau5", vec![strobe_candidate()]));
        let cache = Arc::new(MemoryCache::new());
        let resolver = Resolver::new(exhaustive_config().with_track_workers(1), provider.clone())
            .unwrap()
            .with_cache(cache.clone());
        let tracks = vec![
            SourceTrack::new(0, "Strobe", "deadmau5"),
            SourceTrack::new(1, "Strobe", "deadmau5"),
        ];

        let report = resolver.resolve_playlist(&tracks, &CancelToken::new());
        let second = report.outcomes[1].result().unwrap();
        assert_eq!(second.cache_hits, second.queries_issued);
        assert_eq!(provider.call_count(), report.outcomes[0].result().unwrap().queries_issued);
        assert!(second.matched);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let provider: Arc<dyn SearchProvider> = Arc::new(ScriptedProvider::new());
        assert!(matches!(
            Resolver::new(ResolverConfig::default().with_query_workers(0), provider.clone()),
            Err(ConfigError::Zero { field: "query_workers" })
        ));
        assert!(Resolver::new(ResolverConfig::default().with_requests_per_second(0), provider).is_err());
    }

    #[test]
    fn test_classify_tiers() {
        let config = ResolverConfig::default();
        assert_eq!(classify(Some(96.5), &config), Confidence::High);
        assert_eq!(classify(Some(80.0), &config), Confidence::Medium);
        assert_eq!(classify(Some(70.0), &config), Confidence::Low);
        assert_eq!(classify(Some(40.0), &config), Confidence::None);
        assert_eq!(classify(None, &config), Confidence::None);
    }
}
