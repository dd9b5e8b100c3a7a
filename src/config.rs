//! Engine configuration.
//!
//! One immutable struct, validated before any work starts. Every field has a
//! default so partial JSON files and CLI overrides compose:
//!
//! ```ignore
//! let config = ResolverConfig::default()
//!     .with_query_workers(8)
//!     .with_time_budget(Duration::from_secs(5));
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Upper bound for both worker pools
pub const MAX_WORKERS: usize = 64;

// ============================================================================
// Query Generation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum number of queries generated per track
    pub max_queries: usize,
    /// Pair title n-grams with the primary artist
    pub cross_ngrams_with_artist: bool,
    /// Let remix/edit annotations contribute their own queries
    pub include_remix_queries: bool,
    /// Minimum title length in words before n-gram variants are generated
    pub ngram_min_words: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_queries: 8,
            cross_ngrams_with_artist: true,
            include_remix_queries: true,
            ngram_min_words: 4,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub query: QueryConfig,

    /// Concurrent queries per track (inner pool)
    pub query_workers: usize,
    /// Concurrent tracks (outer pool)
    pub track_workers: usize,

    /// Aggregate request ceiling to the search provider, across all tracks
    pub requests_per_second: u32,
    /// Requests allowed back-to-back before the rate applies
    pub rate_burst: u32,

    /// Wall-clock budget per track (milliseconds)
    pub time_budget_ms: u64,

    /// Best score that stops searching once enough queries ran
    pub early_exit_threshold: f64,
    /// Queries that must complete before an early exit is allowed
    pub early_exit_min_queries: usize,

    /// Below this no candidate is accepted as a match
    pub min_accept_score: f64,
    pub medium_confidence: f64,
    pub high_confidence: f64,

    /// Candidates retained per track for review
    pub top_k: usize,

    /// Retries per query after a transient failure
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig::default(),
            query_workers: 4,
            track_workers: 4,
            requests_per_second: 5,
            rate_burst: 5,
            time_budget_ms: 10_000,
            early_exit_threshold: 90.0,
            early_exit_min_queries: 2,
            min_accept_score: 65.0,
            medium_confidence: 75.0,
            high_confidence: 85.0,
            top_k: 10,
            max_retries: 2,
            retry_base_delay_ms: 250,
        }
    }
}

impl ResolverConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ResolverConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Backoff before retry number `attempt` (0-based): base × 2^attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay()
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn with_query_workers(mut self, workers: usize) -> Self {
        self.query_workers = workers;
        self
    }

    pub fn with_track_workers(mut self, workers: usize) -> Self {
        self.track_workers = workers;
        self
    }

    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    pub fn with_rate_burst(mut self, burst: u32) -> Self {
        self.rate_burst = burst;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = budget.as_millis() as u64;
        self
    }

    pub fn with_max_queries(mut self, max: usize) -> Self {
        self.query.max_queries = max;
        self
    }

    pub fn with_early_exit(mut self, threshold: f64, min_queries: usize) -> Self {
        self.early_exit_threshold = threshold;
        self.early_exit_min_queries = min_queries;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay.as_millis() as u64;
        self
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("query.max_queries", self.query.max_queries),
            ("query_workers", self.query_workers),
            ("track_workers", self.track_workers),
            ("requests_per_second", self.requests_per_second as usize),
            ("rate_burst", self.rate_burst as usize),
            ("time_budget_ms", self.time_budget_ms as usize),
            ("early_exit_min_queries", self.early_exit_min_queries),
            ("top_k", self.top_k),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        for (field, value) in [("query_workers", self.query_workers), ("track_workers", self.track_workers)] {
            if value > MAX_WORKERS {
                return Err(ConfigError::TooLarge {
                    field,
                    value,
                    max: MAX_WORKERS,
                });
            }
        }

        let scores = [
            ("early_exit_threshold", self.early_exit_threshold),
            ("min_accept_score", self.min_accept_score),
            ("medium_confidence", self.medium_confidence),
            ("high_confidence", self.high_confidence),
        ];
        for (field, value) in scores {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ScoreOutOfRange { field, value });
            }
        }

        if self.min_accept_score > self.medium_confidence || self.medium_confidence > self.high_confidence {
            return Err(ConfigError::ThresholdOrder(format!(
                "expected min_accept_score ({}) <= medium_confidence ({}) <= high_confidence ({})",
                self.min_accept_score, self.medium_confidence, self.high_confidence
            )));
        }
        if self.early_exit_threshold < self.min_accept_score {
            return Err(ConfigError::ThresholdOrder(format!(
                "early_exit_threshold ({}) is below min_accept_score ({})",
                self.early_exit_threshold, self.min_accept_score
            )));
        }

        Ok(())
    }
}
