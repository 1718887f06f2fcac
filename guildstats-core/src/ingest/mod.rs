//! Ingestion layer: export file -> finalized snapshot
//!
//! Wires the streaming decoder to the aggregator and runs the fold to
//! completion. The pass is strictly sequential: one producer (the decoder),
//! one consumer (the aggregator), no buffering of the stream.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ export.json │ ──► │  run_export  │ ──► │ FinalizedSnapshot │
//! └─────────────┘     └──────────────┘     └───────────────────┘
//!                            │
//!                            ├── progress callback (every 10k records)
//!                            └── optional checkpoint file (every N records)
//! ```
//!
//! A decode failure aborts the whole pass; the only thing a crash leaves
//! behind is the last completed checkpoint, if checkpointing was enabled.

pub mod decoder;

pub use decoder::ExportReader;

use crate::aggregate::{Aggregator, FinalizedSnapshot};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// How often the progress callback fires, in records.
pub const PROGRESS_INTERVAL: u64 = 10_000;

/// Options for an aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Write a checkpoint every N records; 0 disables checkpointing.
    pub checkpoint_every: u64,
    /// Where the checkpoint document goes. Required when checkpointing.
    pub checkpoint_path: Option<PathBuf>,
}

/// Run the full aggregation pass over an export file.
///
/// `progress` is called with the running record count every
/// [`PROGRESS_INTERVAL`] records and once more at the end of the stream.
/// It is observability only; correctness does not depend on it.
pub fn run_export<F>(
    path: &Path,
    options: &PipelineOptions,
    mut progress: F,
) -> Result<FinalizedSnapshot>
where
    F: FnMut(u64),
{
    tracing::info!(path = %path.display(), "Starting aggregation pass");

    let reader = ExportReader::new(path);
    let mut aggregator = Aggregator::new();

    reader.for_each(|record| {
        aggregator.accumulate(&record);

        let seen = aggregator.processed();
        if seen % PROGRESS_INTERVAL == 0 {
            progress(seen);
        }
        if options.checkpoint_every > 0 && seen % options.checkpoint_every == 0 {
            if let Some(checkpoint_path) = &options.checkpoint_path {
                aggregator.write_checkpoint(checkpoint_path)?;
            }
        }
        Ok(())
    })?;

    progress(aggregator.processed());
    tracing::info!(
        processed = aggregator.processed(),
        skipped = aggregator.skipped(),
        users = aggregator.user_count(),
        "Aggregation pass complete"
    );

    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_export(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_run_export_end_to_end() {
        let file = write_export(
            r#"{"messages": [
                {"author": {"id": "u1", "name": "alice"},
                 "timestamp": "2024-01-01T10:00:00Z", "content": "hello"},
                {"author": {"id": "u2", "name": "bob"},
                 "timestamp": "2024-01-01T11:00:00Z", "content": "hi"},
                {"timestamp": "2024-01-01T12:00:00Z"}
            ]}"#,
        );

        let snapshot =
            run_export(file.path(), &PipelineOptions::default(), |_| {}).unwrap();

        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.profiles.len(), 2);
        assert_eq!(snapshot.stats["u1"].total, 1);
    }

    #[test]
    fn test_progress_fires_at_end_of_stream() {
        let file = write_export(
            r#"{"messages": [
                {"author": {"id": "u1"}, "timestamp": "2024-01-01T10:00:00Z"}
            ]}"#,
        );
        let mut calls = Vec::new();
        run_export(file.path(), &PipelineOptions::default(), |n| calls.push(n)).unwrap();
        assert_eq!(calls, vec![1]);
    }

    #[test]
    fn test_checkpoint_written_during_pass() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("snapshot.json");
        let file = write_export(
            r#"{"messages": [
                {"author": {"id": "u1"}, "timestamp": "2024-01-01T10:00:00Z"},
                {"author": {"id": "u1"}, "timestamp": "2024-01-02T10:00:00Z"}
            ]}"#,
        );

        let options = PipelineOptions {
            checkpoint_every: 1,
            checkpoint_path: Some(checkpoint_path.clone()),
        };
        run_export(file.path(), &options, |_| {}).unwrap();

        assert!(checkpoint_path.exists());
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&checkpoint_path).unwrap()).unwrap();
        assert_eq!(value["processed"], 2);
    }

    #[test]
    fn test_decode_failure_aborts_pass() {
        let file = write_export(r#"{"messages": [{"timestamp": 42}]}"#);
        let result = run_export(file.path(), &PipelineOptions::default(), |_| {});
        assert!(result.is_err());
    }
}
