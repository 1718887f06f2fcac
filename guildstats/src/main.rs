//! guildstats - aggregate a chat export into per-user statistics
//!
//! Streams the export's message array through the aggregator and writes the
//! four output artifacts (profiles, stats, social, rankings) to the data
//! directory.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Artifacts: $XDG_DATA_HOME/guildstats/ (~/.local/share/guildstats/)
//! - Logs: $XDG_STATE_HOME/guildstats/guildstats.log
//! - Config: $XDG_CONFIG_HOME/guildstats/config.toml

use anyhow::{Context, Result};
use clap::Parser;
use guildstats_core::ingest::{run_export, PipelineOptions};
use guildstats_core::{store, Config};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "guildstats")]
#[command(about = "Aggregate a chat export into per-user statistics and rankings")]
#[command(version)]
struct Args {
    /// Path to the export document (JSON with a `messages` array)
    input: PathBuf,

    /// Output directory for the artifacts (default: XDG data dir, or
    /// `ingest.data_dir` from config.toml)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Checkpoint the in-progress maps every N records (0 disables;
    /// default from config.toml)
    #[arg(long)]
    checkpoint_every: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = guildstats_core::logging::init(&config.logging).ok();

    tracing::info!("guildstats ingest starting");

    let out_dir = args.out_dir.unwrap_or_else(|| config.data_dir());
    let checkpoint_every = args
        .checkpoint_every
        .unwrap_or(config.ingest.checkpoint_every);

    let options = PipelineOptions {
        checkpoint_every,
        checkpoint_path: (checkpoint_every > 0)
            .then(|| out_dir.join(store::CHECKPOINT_FILE)),
    };

    println!("Input:  {}", args.input.display());
    println!("Output: {}", out_dir.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .context("invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let snapshot = run_export(&args.input, &options, |processed| {
        let rate = processed as f64 / started.elapsed().as_secs_f64().max(0.001);
        pb.set_message(format!("{} messages | {:.0} msg/s", processed, rate));
    })
    .context("aggregation pass failed")?;

    pb.finish_and_clear();

    store::write_artifacts(&out_dir, &snapshot).context("failed to write artifacts")?;

    println!(
        "Processed {} messages ({} skipped) in {:.1}s",
        snapshot.processed,
        snapshot.skipped,
        started.elapsed().as_secs_f64()
    );
    println!(
        "{} users, {} ranked",
        snapshot.profiles.len(),
        snapshot.rankings.message_count.len()
    );

    Ok(())
}
