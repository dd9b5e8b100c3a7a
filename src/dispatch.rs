//! Candidate search dispatcher.
//!
//! Runs one track's queries on a small pool of query workers:
//!
//! ```text
//!   engine ──next()──▶ Dispatch ──work──▶ worker × N ──▶ cache / limiter / provider
//!      ▲                                      │
//!      └──────────── QueryBatch ◀─────────────┘   (scored candidates)
//! ```
//!
//! Queries are fed lazily. A new query is handed to the pool only when the
//! engine asks for the next batch, so once the engine stops asking (early
//! exit, budget) nothing else is dispatched. Batches reach the engine in query
//! order: a batch that finishes early is held until every query before it has
//! been delivered, so what the engine has seen never depends on latency. Stopping the dispatch cancels
//! the track token and joins every worker; an in-flight provider call is the
//! only thing that can delay the join.

use crossbeam_channel::{after, select, unbounded, Receiver, Sender};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::ResolverConfig;
use crate::error::SearchError;
use crate::models::{Candidate, NormalizedTrack, Query, ScoredCandidate};
use crate::provider::{Cache, SearchProvider};
use crate::rate_limit::RequestLimiter;
use crate::scoring::score;

/// How a query's candidates were obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Fetched from the provider
    Fresh,
    /// Served by the cache without touching the provider or limiter
    Cached,
    /// Failed terminally; contributes no candidates
    Failed(SearchError),
}

/// Scored candidates for one query.
#[derive(Debug, Clone)]
pub struct QueryBatch {
    /// Index of the query in the generated list
    pub position: usize,
    pub query: Query,
    pub outcome: BatchOutcome,
    /// Provider calls made, retries included (0 for cache hits)
    pub attempts: u32,
    pub candidates: Vec<ScoredCandidate>,
}

/// What the engine sees on each `Dispatch::next` call.
#[derive(Debug)]
pub enum DispatchEvent {
    Batch(QueryBatch),
    /// Every query has produced a batch
    Exhausted,
    DeadlineReached,
    /// The track token was cancelled from outside
    Cancelled,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Shared, per-engine half of the dispatcher: collaborators and limits.
pub struct Dispatcher {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<dyn Cache>,
    limiter: Arc<RequestLimiter>,
    config: Arc<ResolverConfig>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ResolverConfig>,
        provider: Arc<dyn SearchProvider>,
        cache: Arc<dyn Cache>,
        limiter: Arc<RequestLimiter>,
    ) -> Self {
        Self {
            provider,
            cache,
            limiter,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    /// Start query workers for one track. Nothing is sent to the provider
    /// until the first `next()` call.
    pub fn start(&self, track: Arc<NormalizedTrack>, queries: Vec<Query>, cancel: CancelToken) -> Dispatch {
        let width = self.config.query_workers.min(queries.len());
        let (work_tx, work_rx) = unbounded::<(usize, Query)>();
        let (batch_tx, batch_rx) = unbounded::<QueryBatch>();

        let worker = Arc::new(QueryWorker {
            track,
            provider: Arc::clone(&self.provider),
            cache: Arc::clone(&self.cache),
            limiter: Arc::clone(&self.limiter),
            config: Arc::clone(&self.config),
        });

        let handles = (0..width)
            .map(|_| {
                let worker = Arc::clone(&worker);
                let work_rx = work_rx.clone();
                let batch_tx = batch_tx.clone();
                let cancel = cancel.clone();
                thread::spawn(move || worker.run(work_rx, batch_tx, cancel))
            })
            .collect();

        Dispatch {
            pending: queries.into_iter().enumerate().collect(),
            work_tx: Some(work_tx),
            batch_rx,
            width,
            outstanding: 0,
            next_position: 0,
            arrived: BTreeMap::new(),
            issued: 0,
            cancel,
            handles,
        }
    }
}

// ============================================================================
// Per-track Dispatch
// ============================================================================

/// Handle to one track's running query workers.
pub struct Dispatch {
    pending: VecDeque<(usize, Query)>,
    work_tx: Option<Sender<(usize, Query)>>,
    batch_rx: Receiver<QueryBatch>,
    width: usize,
    /// Issued but not yet delivered, held arrivals included
    outstanding: usize,
    /// Position of the next batch the engine receives
    next_position: usize,
    arrived: BTreeMap<usize, QueryBatch>,
    issued: usize,
    cancel: CancelToken,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatch {
    fn top_up(&mut self) {
        let Some(work_tx) = &self.work_tx else {
            return;
        };
        while self.outstanding < self.width {
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            if work_tx.send(job).is_err() {
                break;
            }
            self.outstanding += 1;
            self.issued += 1;
        }
    }

    /// Feed the pool, then wait for the batch of the next query in order, the
    /// deadline, or cancellation, whichever comes first.
    pub fn next(&mut self, deadline: Instant) -> DispatchEvent {
        if self.cancel.is_cancelled() {
            return DispatchEvent::Cancelled;
        }
        self.top_up();
        if self.outstanding == 0 {
            return DispatchEvent::Exhausted;
        }

        let timeout = after(deadline.saturating_duration_since(Instant::now()));
        loop {
            if let Some(batch) = self.arrived.remove(&self.next_position) {
                self.next_position += 1;
                self.outstanding -= 1;
                return DispatchEvent::Batch(batch);
            }
            select! {
                recv(self.batch_rx) -> msg => match msg {
                    Ok(batch) => {
                        self.arrived.insert(batch.position, batch);
                    }
                    // Every worker is gone
                    Err(_) => return DispatchEvent::Exhausted,
                },
                recv(self.cancel.signal()) -> _ => return DispatchEvent::Cancelled,
                recv(timeout) -> _ => return DispatchEvent::DeadlineReached,
            }
        }
    }

    /// Batches that completed but are still held behind a slower query, in
    /// query order. Used once the deadline has passed.
    pub fn take_arrived(&mut self) -> Vec<QueryBatch> {
        for batch in self.batch_rx.try_iter() {
            self.arrived.insert(batch.position, batch);
        }
        let batches: Vec<QueryBatch> = std::mem::take(&mut self.arrived).into_values().collect();
        self.outstanding -= batches.len();
        batches
    }

    /// Cancel outstanding work and join the workers. Returns the number of
    /// queries issued.
    pub fn stop(mut self) -> usize {
        self.shutdown();
        self.issued
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        self.work_tx = None;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("query worker panicked");
            }
        }
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Query Worker
// ============================================================================

struct QueryWorker {
    track: Arc<NormalizedTrack>,
    provider: Arc<dyn SearchProvider>,
    cache: Arc<dyn Cache>,
    limiter: Arc<RequestLimiter>,
    config: Arc<ResolverConfig>,
}

impl QueryWorker {
    fn run(&self, work_rx: Receiver<(usize, Query)>, batch_tx: Sender<QueryBatch>, cancel: CancelToken) {
        loop {
            select! {
                recv(work_rx) -> msg => {
                    let Ok((position, query)) = msg else {
                        return;
                    };
                    let Some(batch) = self.execute(position, query, &cancel) else {
                        return;
                    };
                    if batch_tx.send(batch).is_err() {
                        return;
                    }
                }
                recv(cancel.signal()) -> _ => return,
            }
        }
    }

    fn scored(&self, candidates: Vec<Candidate>, query: &Query) -> Vec<ScoredCandidate> {
        candidates
            .into_iter()
            .map(|c| score(&self.track, c, query))
            .collect()
    }

    /// Run one query through cache, limiter and provider with retries.
    /// `None` means the track was cancelled mid-query.
    fn execute(&self, position: usize, query: Query, cancel: &CancelToken) -> Option<QueryBatch> {
        if cancel.is_cancelled() {
            return None;
        }

        if let Some(cached) = self.cache.get(&query.text) {
            debug!(query = %query.text, candidates = cached.len(), "cache hit");
            let cached: Vec<Candidate> = cached.into_iter().map(Candidate::sanitized).collect();
            let candidates = self.scored(cached, &query);
            return Some(QueryBatch {
                position,
                query,
                outcome: BatchOutcome::Cached,
                attempts: 0,
                candidates,
            });
        }

        let mut attempts: u32 = 0;
        loop {
            self.limiter.acquire(cancel).ok()?;
            attempts += 1;

            match self.provider.search(&query.text, cancel) {
                Ok(found) => {
                    let found: Vec<Candidate> = found.into_iter().map(Candidate::sanitized).collect();
                    let candidates = self.scored(found.clone(), &query);
                    if let Err(e) = self.cache.put(&query.text, &found) {
                        warn!(query = %query.text, error = %e, "cache write failed");
                    }
                    debug!(query = %query.text, candidates = candidates.len(), attempts, "query returned");
                    return Some(QueryBatch {
                        position,
                        query,
                        outcome: BatchOutcome::Fresh,
                        attempts,
                        candidates,
                    });
                }
                Err(SearchError::Cancelled) if cancel.is_cancelled() => return None,
                Err(e) if e.is_transient() && attempts <= self.config.max_retries => {
                    let delay = retry_delay(&e, self.config.backoff(attempts - 1));
                    debug!(query = %query.text, error = %e, attempt = attempts, delay_ms = delay.as_millis() as u64, "retrying query");
                    if !cancel.sleep(delay) {
                        return None;
                    }
                }
                Err(e) => {
                    warn!(query = %query.text, error = %e, attempts, "query failed");
                    return Some(QueryBatch {
                        position,
                        query,
                        outcome: BatchOutcome::Failed(e),
                        attempts,
                        candidates: Vec::new(),
                    });
                }
            }
        }
    }
}

/// Backoff delay, stretched to the provider's Retry-After when it sent one.
fn retry_delay(error: &SearchError, backoff: Duration) -> Duration {
    match error {
        SearchError::RateLimited {
            retry_after: Some(retry_after),
        } => backoff.max(*retry_after),
        _ => backoff,
    }
}
