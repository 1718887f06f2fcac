//! guildstats-query - query the persisted artifacts from the command line
//!
//! Thin driver over the ranking query service: single-user summaries,
//! leaderboard pages and rank context windows, printed as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guildstats_core::query::DEFAULT_WINDOW;
use guildstats_core::types::RankMetric;
use guildstats_core::{Config, RankingService};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "guildstats-query")]
#[command(about = "Query user summaries and leaderboards from the artifacts")]
#[command(version)]
struct Args {
    /// Artifact directory (default: XDG data dir, or `ingest.data_dir`
    /// from config.toml)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full summary for one user
    Summary {
        /// User id to look up
        user_id: String,
    },
    /// One page of a metric's leaderboard
    Leaderboard {
        /// Ranking metric (message_count, active_days, avg_message_length)
        #[arg(long, default_value = "message_count")]
        metric: String,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Entries per page
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Rank context windows ("who's near me") for one user
    Context {
        /// User id to look up
        user_id: String,
        /// Context window size
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = guildstats_core::logging::init(&config.logging).ok();

    let mut service = RankingService::from_config(&config);
    if let Some(data_dir) = args.data_dir {
        service = RankingService::new(
            data_dir,
            std::time::Duration::from_secs(config.query.cache_ttl_secs),
        );
    }

    let output = match args.command {
        Command::Summary { user_id } => match service
            .user_summary(&user_id)
            .context("failed to load user summary")?
        {
            Some(summary) => serde_json::to_value(summary)?,
            None => json!({ "error": "user not found", "user_id": user_id }),
        },
        Command::Leaderboard { metric, page, limit } => {
            let metric: RankMetric = metric.parse()?;
            let page = service
                .leaderboard_page(metric, page, limit)
                .context("failed to load leaderboard page")?;
            serde_json::to_value(page)?
        }
        Command::Context { user_id, window } => {
            let rankings = service
                .user_rankings_with_context(&user_id, window)
                .context("failed to load rank context")?;
            serde_json::to_value(rankings)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
