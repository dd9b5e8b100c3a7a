//! Track resolution library - playlist entries to catalog matches.
//!
//! `Resolver` is the entry point; everything else is its building blocks,
//! exported for the binaries and for callers with their own providers.

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod provider;
pub mod query;
pub mod rate_limit;
pub mod safety;
pub mod scoring;

pub use cancel::CancelToken;
pub use config::{QueryConfig, ResolverConfig};
pub use engine::Resolver;
pub use error::{CacheError, Cancelled, ConfigError, SearchError};
pub use models::{
    Candidate, Confidence, ExitReason, PlaylistReport, ResolutionStats, ScoredCandidate, SourceTrack, TrackOutcome,
    TrackResult,
};
pub use provider::{Cache, MemoryCache, NoopCache, ReplayProvider, SearchProvider};
