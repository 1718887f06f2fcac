//! Error types for guildstats-core

use thiserror::Error;

/// Main error type for the guildstats-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export decode error (fatal, aborts the aggregation pass)
    #[error("decode error in {path}: {message}")]
    Decode { path: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or unreadable output artifact
    #[error("artifact error: {path}: {message}")]
    Artifact { path: String, message: String },

    /// Unknown ranking metric name
    #[error("unknown ranking metric: {0}")]
    UnknownMetric(String),
}

/// Result type alias for guildstats-core
pub type Result<T> = std::result::Result<T, Error>;
