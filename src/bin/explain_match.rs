//! Show how a track is normalized, queried and scored.
//! Usage: explain-match "<title>" "<artist>" [--candidate-title T --candidate-artist A]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use track_resolver::engine::classify;
use track_resolver::models::{Candidate, Query, QueryKind};
use track_resolver::normalize::{normalize, split_title};
use track_resolver::progress::init_tracing;
use track_resolver::query::generate_queries;
use track_resolver::scoring::{score, version_penalty, ARTIST_FLOOR};
use track_resolver::ResolverConfig;

#[derive(Parser)]
#[command(name = "explain-match")]
#[command(about = "Explain normalization, query generation and scoring for one track")]
struct Args {
    title: String,

    artist: String,

    #[arg(long)]
    candidate_title: Option<String>,

    /// Candidate credits; repeat for several artists
    #[arg(long)]
    candidate_artist: Vec<String>,

    /// Engine configuration JSON for thresholds and query limits
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = match &args.config {
        Some(path) => ResolverConfig::from_json_file(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => ResolverConfig::default(),
    };

    let track = normalize(&args.title, &args.artist);
    println!("Source: {} - {}", track.display_artist, track.display_title);
    println!("{:-<60}", "");
    println!("  title tokens:  {:?}", track.title_tokens);
    println!("  artists:       {:?}", track.artists);
    println!("  featured:      {:?}", track.featured_artists);
    match &track.remix_info {
        Some(remix) => println!(
            "  version:       {} (remixer: {})",
            remix.text,
            remix.remixer.as_deref().unwrap_or("-")
        ),
        None => println!("  version:       -"),
    }

    let queries = generate_queries(&track, &config.query);
    println!("\nQueries ({}):", queries.len());
    for query in &queries {
        println!("  [{:>3}] {:<13} {}", query.specificity, format!("{:?}", query.kind), query.text);
    }

    let Some(candidate_title) = args.candidate_title else {
        return Ok(());
    };

    let candidate = Candidate {
        title: candidate_title,
        artists: args.candidate_artist,
        ..Default::default()
    };
    let candidate_parts = split_title(&candidate.title);
    let penalty = version_penalty(track.remix_info.as_ref(), candidate_parts.remix.as_ref());
    let query = queries.first().cloned().unwrap_or(Query {
        text: String::new(),
        specificity: 0,
        kind: QueryKind::TitleOnly,
    });
    let scored = score(&track, candidate, &query);

    println!("\nCandidate: {} - {}", scored.candidate.artists.join(", "), scored.candidate.title);
    println!("{:-<60}", "");
    println!("  title similarity:  {:>6.1} (version penalty {:.1})", scored.title_similarity, penalty);
    println!("  artist similarity: {:>6.1}", scored.artist_similarity);
    if scored.artist_similarity < ARTIST_FLOOR {
        println!("  artist below floor ({:.0}): score capped", ARTIST_FLOOR);
    }
    println!("  match score:       {:>6.1}", scored.match_score);
    println!("  confidence:        {:?}", classify(Some(scored.match_score), &config));

    Ok(())
}
