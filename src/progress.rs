//! Progress bar and logging utilities.
//!
//! Provides the playlist progress bar, with support for log-only mode where
//! the bar is hidden and progress is logged at intervals instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::TrackOutcome;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Set log-only mode globally
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

/// Check if log-only mode is enabled
pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// `track_resolver=info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("track_resolver=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Create a progress bar with consistent styling.
/// In log-only mode, the progress bar is hidden.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log progress periodically for tail-friendly output.
/// Only logs when in log-only mode and at specified intervals.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if is_log_only() && should_log(current, total, interval) {
        let pct = 100.0 * current as f64 / total as f64;
        info!(phase, "{}/{} ({:.1}%)", current, total, pct);
    }
}

fn should_log(current: u64, total: u64, interval: u64) -> bool {
    total > 0 && (current == total || (interval > 0 && current % interval == 0))
}

/// Playlist progress fed from `Resolver::resolve_playlist_with`.
/// Safe to call from every track worker.
pub struct PlaylistProgress {
    bar: ProgressBar,
    total: u64,
    interval: u64,
    done: AtomicU64,
    matched: AtomicU64,
}

impl PlaylistProgress {
    pub fn new(total: usize) -> Self {
        let total = total as u64;
        Self {
            bar: create_progress_bar(total, "Resolving tracks"),
            total,
            interval: (total / 20).max(1),
            done: AtomicU64::new(0),
            matched: AtomicU64::new(0),
        }
    }

    pub fn record(&self, outcome: &TrackOutcome) {
        let matched = if outcome.result().is_some_and(|r| r.matched) {
            self.matched.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.matched.load(Ordering::Relaxed)
        };
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;

        self.bar.inc(1);
        self.bar.set_message(format!("Resolving tracks ({} matched)", matched));
        log_progress("RESOLVE", done, self.total, self.interval);
    }

    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish_with_message(format!(
            "Resolved {} tracks ({} matched)",
            self.done.load(Ordering::Relaxed),
            self.matched()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTrack;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_should_log() {
        assert!(should_log(10, 100, 10));
        assert!(!should_log(11, 100, 10));
        assert!(should_log(100, 100, 30));
        assert!(!should_log(0, 0, 10));
    }

    #[test]
    fn test_playlist_progress_counts() {
        let progress = PlaylistProgress::new(2);
        progress.record(&TrackOutcome::Cancelled(SourceTrack::new(0, "Strobe", "deadmau5")));
        progress.record(&TrackOutcome::Cancelled(SourceTrack::new(1, "Ghosts n Stuff", "deadmau5")));
        progress.finish();
        assert_eq!(progress.matched(), 0);
        assert_eq!(progress.done.load(Ordering::Relaxed), 2);
    }
}
