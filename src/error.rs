//! Error types for the resolution engine.
//!
//! Only configuration problems and caller cancellation ever surface from the
//! engine. Provider and cache failures are absorbed per query: a track that
//! never sees a usable candidate resolves as unmatched, not as an error.

use std::time::Duration;
use thiserror::Error;

/// Invalid engine configuration. Raised at construction, never mid-run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: usize,
        max: usize,
    },

    #[error("{field} must be within 0..=100, got {value}")]
    ScoreOutOfRange { field: &'static str, value: f64 },

    #[error("threshold ordering violated: {0}")]
    ThresholdOrder(String),

    #[error("failed to build track worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a single search call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("search timed out after {0:?}")]
    Timeout(Duration),

    #[error("search provider unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by search provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("query rejected: {0}")]
    Rejected(String),

    #[error("search cancelled")]
    Cancelled,
}

impl SearchError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout(_) | SearchError::Unavailable(_) | SearchError::RateLimited { .. }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache write failed: {0}")]
    Write(String),
}

/// Resolution aborted by the caller. Distinct from a track that simply did
/// not match.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("track resolution cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SearchError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(SearchError::Unavailable("503".into()).is_transient());
        assert!(SearchError::RateLimited { retry_after: None }.is_transient());
        assert!(!SearchError::Rejected("bad query".into()).is_transient());
        assert!(!SearchError::Cancelled.is_transient());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::Zero { field: "query_workers" };
        assert_eq!(err.to_string(), "query_workers must be greater than zero");

        let err = ConfigError::ScoreOutOfRange {
            field: "min_accept_score",
            value: 120.0,
        };
        assert!(err.to_string().contains("0..=100"));
    }
}
