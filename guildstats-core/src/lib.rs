//! # guildstats-core
//!
//! Core library for guildstats - per-user statistics and rankings over a
//! chat export.
//!
//! This library provides:
//! - A streaming decoder for large export documents
//! - The per-user aggregation fold (profiles, stats, social metrics)
//! - Finalization into sorted ranking lists
//! - JSON artifact persistence
//! - The ranking/percentile query service
//!
//! ## Architecture
//!
//! Data flows one way through the pipeline:
//!
//! ```text
//! export.json ──► decoder ──► aggregator ──► finalizer ──► artifacts
//!                                                              │
//!                            presentation layer ◄── query ◄────┘
//! ```
//!
//! The aggregation pass is a single sequential fold in bounded memory; the
//! query service treats the persisted artifacts as immutable snapshots and
//! may be called concurrently.
//!
//! ## Example
//!
//! ```rust,no_run
//! use guildstats_core::ingest::{run_export, PipelineOptions};
//! use guildstats_core::{store, Config, RankingService};
//! use std::path::Path;
//!
//! let config = Config::load().expect("failed to load config");
//! let snapshot = run_export(Path::new("export.json"), &PipelineOptions::default(), |_| {})
//!     .expect("aggregation failed");
//! store::write_artifacts(&config.data_dir(), &snapshot).expect("persist failed");
//!
//! let service = RankingService::from_config(&config);
//! let _page = service
//!     .leaderboard_page("message_count".parse().unwrap(), 1, 10)
//!     .expect("query failed");
//! ```

// Re-export commonly used items at the crate root
pub use aggregate::{Aggregator, FinalizedSnapshot};
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::ExportReader;
pub use query::RankingService;
pub use types::*;

// Public modules
pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod store;
pub mod types;
