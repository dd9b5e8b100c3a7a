//! Search provider and cache seams.
//!
//! The engine only sees these traits. Implementations must be safe to call
//! from many threads at once; the engine never holds a lock across calls.

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{CacheError, SearchError};
use crate::models::Candidate;
use crate::normalize::normalize_text;

/// Free-text search against a music catalog.
pub trait SearchProvider: Send + Sync {
    /// Run one query. Long calls should check `cancel` and return
    /// `SearchError::Cancelled` once it fires.
    fn search(&self, query: &str, cancel: &CancelToken) -> Result<Vec<Candidate>, SearchError>;
}

/// Query-result cache consulted before the provider.
pub trait Cache: Send + Sync {
    fn get(&self, query: &str) -> Option<Vec<Candidate>>;
    fn put(&self, query: &str, candidates: &[Candidate]) -> Result<(), CacheError>;
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _query: &str) -> Option<Vec<Candidate>> {
        None
    }

    fn put(&self, _query: &str, _candidates: &[Candidate]) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Process-lifetime cache keyed by query text.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<FxHashMap<String, Vec<Candidate>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, query: &str) -> Option<Vec<Candidate>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(query)
            .cloned()
    }

    fn put(&self, query: &str, candidates: &[Candidate]) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query.to_string(), candidates.to_vec());
        Ok(())
    }
}

// ============================================================================
// Replay Provider
// ============================================================================

/// Provider answering from recorded responses: a JSON object mapping query
/// text to a candidate list. Unknown queries return no candidates.
///
/// ```json
/// { "strobe deadmau5": [{ "title": "Strobe", "artists": ["deadmau5"], "url": "..." }] }
/// ```
pub struct ReplayProvider {
    responses: FxHashMap<String, Vec<Candidate>>,
    latency: Duration,
}

impl ReplayProvider {
    pub fn new(responses: impl IntoIterator<Item = (String, Vec<Candidate>)>) -> Self {
        // Keys go through the same normalization as generated queries
        let responses = responses
            .into_iter()
            .map(|(query, candidates)| (normalize_text(&query), candidates))
            .collect();
        Self {
            responses,
            latency: Duration::ZERO,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let responses: FxHashMap<String, Vec<Candidate>> =
            serde_json::from_str(raw).context("Failed to parse recorded responses")?;
        Ok(Self::new(responses))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read responses file {:?}", path))?;
        Self::from_json_str(&raw)
    }

    /// Simulated per-call latency, interrupted by cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl SearchProvider for ReplayProvider {
    fn search(&self, query: &str, cancel: &CancelToken) -> Result<Vec<Candidate>, SearchError> {
        if !self.latency.is_zero() && !cancel.sleep(self.latency) {
            return Err(SearchError::Cancelled);
        }
        Ok(self.responses.get(query).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Scripted Provider (tests)
// ============================================================================
