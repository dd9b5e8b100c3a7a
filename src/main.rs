use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use track_resolver::models::{PlaylistReport, SourceTrack, TrackOutcome};
use track_resolver::progress::{format_duration, init_tracing, set_log_only, PlaylistProgress};
use track_resolver::safety::validate_output_path;
use track_resolver::{CancelToken, MemoryCache, ReplayProvider, Resolver, ResolverConfig};

#[derive(Parser)]
#[command(name = "track-resolver")]
#[command(about = "Resolve playlist tracks against recorded catalog search responses")]
struct Args {
    /// Playlist JSON: [{"title": ..., "artist": ...}, ...]
    playlist: PathBuf,

    /// Recorded responses JSON: {"query text": [candidate, ...], ...}
    responses: PathBuf,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Engine configuration JSON (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    track_workers: Option<usize>,

    #[arg(long)]
    query_workers: Option<usize>,

    /// Aggregate provider requests per second
    #[arg(long)]
    rps: Option<u32>,

    /// Per-track time budget in milliseconds
    #[arg(long)]
    budget_ms: Option<u64>,

    #[arg(long)]
    max_queries: Option<usize>,

    /// Simulated latency per replayed search call
    #[arg(long, default_value = "0")]
    latency_ms: u64,

    /// Write resolution stats JSON here
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,
}

fn load_config(args: &Args) -> Result<ResolverConfig> {
    let mut config = match &args.config {
        Some(path) => ResolverConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => ResolverConfig::default(),
    };
    if let Some(workers) = args.track_workers {
        config = config.with_track_workers(workers);
    }
    if let Some(workers) = args.query_workers {
        config = config.with_query_workers(workers);
    }
    if let Some(rps) = args.rps {
        config = config.with_requests_per_second(rps);
    }
    if let Some(budget) = args.budget_ms {
        config = config.with_time_budget(Duration::from_millis(budget));
    }
    if let Some(max) = args.max_queries {
        config = config.with_max_queries(max);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Read the playlist; positions are taken from array order.
fn load_playlist(path: &Path) -> Result<Vec<SourceTrack>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read playlist {:?}", path))?;
    let mut tracks: Vec<SourceTrack> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse playlist {:?}", path))?;
    for (index, track) in tracks.iter_mut().enumerate() {
        track.index = index;
    }
    Ok(tracks)
}

fn write_report(report: &PlaylistReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_summary(report: &PlaylistReport, elapsed: Duration) {
    let stats = &report.stats;
    eprintln!("\n{:=<60}", "");
    eprintln!("Resolution complete!");
    eprintln!("  Tracks:    {}", stats.total_tracks);
    eprintln!(
        "  Matched:   {} ({:.1}%) [high {}, medium {}, low {}]",
        stats.matched,
        stats.match_rate(),
        stats.high,
        stats.medium,
        stats.low
    );
    eprintln!("  Unmatched: {}", stats.unmatched);
    if stats.cancelled > 0 {
        eprintln!("  Cancelled: {}", stats.cancelled);
    }
    eprintln!(
        "  Queries:   {} issued, {} cached, {} failed",
        stats.queries_issued, stats.cache_hits, stats.failed_queries
    );
    eprintln!("  Elapsed:   {}", format_duration(elapsed));
    eprintln!("{:=<60}", "");

    for outcome in &report.outcomes {
        if let TrackOutcome::Resolved(result) = outcome {
            if !result.matched {
                eprintln!(
                    "  [unmatched] #{} {} - {}",
                    result.source_track.index, result.source_track.artist, result.source_track.title
                );
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    set_log_only(args.log_only);

    let inputs = [args.playlist.as_path(), args.responses.as_path()];
    for output in [&args.output, &args.stats].into_iter().flatten() {
        validate_output_path(output, "json", &inputs)?;
    }

    let start = Instant::now();
    let config = load_config(&args)?;
    let tracks = load_playlist(&args.playlist)?;
    let provider = ReplayProvider::from_json_file(&args.responses)?.with_latency(Duration::from_millis(args.latency_ms));
    info!(
        tracks = tracks.len(),
        recorded_queries = provider.len(),
        "loaded inputs"
    );

    let resolver = Resolver::new(config, Arc::new(provider))
        .context("Failed to build resolver")?
        .with_cache(Arc::new(MemoryCache::new()));

    let progress = PlaylistProgress::new(tracks.len());
    let report = resolver.resolve_playlist_with(&tracks, &CancelToken::new(), |outcome| progress.record(outcome));
    progress.finish();

    write_report(&report, args.output.as_deref())?;

    report.stats.log_summary("RESOLVE");
    if let Some(path) = &args.stats {
        report.stats.write_to_file(path)?;
    }

    print_summary(&report, start.elapsed());
    Ok(())
}
