//! Streaming per-user aggregation
//!
//! The [`Aggregator`] is the single consumer of the decoded message stream.
//! It owns the three per-user maps (profiles, stats, social) and updates
//! them one record at a time; memory grows with the number of distinct
//! users and tokens, never with the number of messages.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌─────────────────────┐
//! │ ExportReader │ ──► │  Aggregator  │ ──► │  FinalizedSnapshot  │
//! │  (streaming) │     │ accumulate() │     │  (finish, one-time) │
//! └──────────────┘     └──────────────┘     └─────────────────────┘
//! ```
//!
//! All state is private to the aggregator; the only way out is
//! [`Aggregator::finish`], which consumes it and hands back an immutable
//! snapshot, or [`Aggregator::write_checkpoint`], which serializes the
//! in-progress maps for crash salvage.

pub mod finalize;
pub mod text;

pub use finalize::FinalizedSnapshot;

use crate::error::Result;
use crate::store;
use crate::types::{MessageAuthor, MessageRecord, Profile, UserSocial};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Weekday names used as histogram and combo keys, Monday first.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Per-user statistics while the stream is still being consumed.
///
/// Differs from the finalized [`crate::types::UserStats`] in exactly one
/// field: the set of active day keys, which finalization collapses into a
/// count. The two are deliberately distinct types so a set never leaks into
/// the persisted artifacts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunningStats {
    pub total: u64,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    /// Distinct UTC `YYYY-MM-DD` keys seen so far
    pub active_day_set: BTreeSet<String>,
    pub hours: [u64; 24],
    pub days: [u64; 7],
    pub months: BTreeMap<String, u64>,
    pub combos: BTreeMap<String, u64>,
    pub len_sum: u64,
    pub max_len: u64,
    pub min_len: Option<u64>,
    pub word_sum: u64,
    pub question: u64,
    pub words: BTreeMap<String, u64>,
    pub emojis: BTreeMap<String, u64>,
}

/// The streaming fold over message records.
#[derive(Debug, Default)]
pub struct Aggregator {
    profiles: BTreeMap<String, Profile>,
    stats: BTreeMap<String, RunningStats>,
    social: BTreeMap<String, UserSocial>,
    processed: u64,
    skipped: u64,
}

/// Shape of the periodic checkpoint document.
///
/// This is an explicitly partial format: `active_day_set` is still a set of
/// day keys and no rankings exist yet. It is written to its own file and
/// never mixed with the finalized artifacts.
#[derive(Serialize)]
struct CheckpointDocument<'a> {
    processed: u64,
    skipped: u64,
    profiles: &'a BTreeMap<String, Profile>,
    stats: &'a BTreeMap<String, RunningStats>,
    social: &'a BTreeMap<String, UserSocial>,
}

impl Aggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records seen so far, skipped ones included.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Records skipped for lack of an author id.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Distinct users observed so far (authors and mention targets).
    pub fn user_count(&self) -> usize {
        self.profiles.len()
    }

    /// Fold one record into the per-user maps.
    ///
    /// Records without an author id are counted and ignored; everything else
    /// updates the author's stats unconditionally and the content-derived
    /// fields only when the record carries non-empty text.
    pub fn accumulate(&mut self, record: &MessageRecord) {
        self.processed += 1;

        let author_id = match record.author_id() {
            Some(id) => id.to_string(),
            None => {
                self.skipped += 1;
                tracing::debug!(record_id = ?record.id, "Skipping record without author id");
                return;
            }
        };

        self.ensure_user(&author_id, record.author.as_ref());

        let stats = self
            .stats
            .get_mut(&author_id)
            .expect("stats entry created by ensure_user");
        let social = self
            .social
            .get_mut(&author_id)
            .expect("social entry created by ensure_user");

        // Every message, content or not
        stats.total += 1;

        let ts = record.timestamp;
        if stats.first.map_or(true, |first| ts < first) {
            stats.first = Some(ts);
        }
        if stats.last.map_or(true, |last| ts > last) {
            stats.last = Some(ts);
        }

        stats.active_day_set.insert(ts.format("%Y-%m-%d").to_string());

        let hour = ts.hour() as usize;
        let weekday = ts.weekday().num_days_from_monday() as usize;
        stats.hours[hour] += 1;
        stats.days[weekday] += 1;
        *stats
            .months
            .entry(ts.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        *stats
            .combos
            .entry(format!("{}-{}", WEEKDAYS[weekday], hour))
            .or_insert(0) += 1;

        // Content-derived fields
        if let Some(content) = record.text() {
            let len = content.chars().count() as u64;
            stats.len_sum += len;
            stats.max_len = stats.max_len.max(len);
            stats.min_len = Some(stats.min_len.map_or(len, |min| min.min(len)));
            if content.contains('?') {
                stats.question += 1;
            }

            let tokens = text::tokenize(content);
            stats.word_sum += tokens.len() as u64;
            for token in tokens {
                if token.chars().count() >= text::MIN_WORD_LEN {
                    *stats.words.entry(token).or_insert(0) += 1;
                }
            }

            for symbol in text::inline_emojis(content) {
                *stats.emojis.entry(symbol.to_string()).or_insert(0) += 1;
                *social.inline_emojis.entry(symbol.to_string()).or_insert(0) += 1;
            }
        }

        for attachment in &record.attachments {
            if let Some(url) = &attachment.url {
                social.attachments.push(url.clone());
            }
        }

        if record.is_pinned {
            if let Some(message_id) = &record.id {
                social.pinned.push(message_id.clone());
            }
        }

        for reaction in &record.reactions {
            if let Some(name) = reaction.emoji.as_ref().and_then(|e| e.name.as_deref()) {
                *social.reactions_given.entry(name.to_string()).or_insert(0) += reaction.count;
            }
        }

        // Mentions touch other users' records, so the author borrows end here.
        let targets: Vec<String> = record
            .mentions
            .iter()
            .filter_map(|m| m.id.clone())
            .collect();

        for target in targets {
            if let Some(author_social) = self.social.get_mut(&author_id) {
                *author_social
                    .mentions_given
                    .entry(target.clone())
                    .or_insert(0) += 1;
            }
            self.ensure_user(&target, None);
            if let Some(target_social) = self.social.get_mut(&target) {
                target_social.mentioned_by += 1;
            }
        }
    }

    /// Create the profile/stats/social triple for an id, if absent.
    ///
    /// The first observation wins: a user first seen as a mention target
    /// keeps the placeholder identity even if they author messages later.
    fn ensure_user(&mut self, id: &str, author: Option<&MessageAuthor>) {
        if self.profiles.contains_key(id) {
            return;
        }
        self.profiles
            .insert(id.to_string(), Profile::from_author(id, author));
        self.stats.insert(id.to_string(), RunningStats::default());
        self.social.insert(id.to_string(), UserSocial::default());
    }

    /// Serialize the in-progress maps to `path`, atomically.
    ///
    /// A crash mid-stream leaves the last completed checkpoint intact; a
    /// torn half-written file is never observable because the write goes
    /// through a temp file and rename.
    pub fn write_checkpoint(&self, path: &Path) -> Result<()> {
        let document = CheckpointDocument {
            processed: self.processed,
            skipped: self.skipped,
            profiles: &self.profiles,
            stats: &self.stats,
            social: &self.social,
        };
        store::write_json_atomic(path, &document)?;
        tracing::debug!(
            processed = self.processed,
            users = self.profiles.len(),
            path = %path.display(),
            "Wrote aggregation checkpoint"
        );
        Ok(())
    }

    /// Consume the aggregator and produce the finalized snapshot with
    /// ranking lists. One-way and one-time.
    pub fn finish(self) -> FinalizedSnapshot {
        finalize::finalize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PLACEHOLDER_USERNAME;

    fn record(json: &str) -> MessageRecord {
        serde_json::from_str(json).unwrap()
    }

    fn message(author_id: &str, timestamp: &str, content: &str) -> MessageRecord {
        record(&format!(
            r#"{{"author": {{"id": "{author_id}", "name": "{author_id}"}},
                "timestamp": "{timestamp}", "content": "{content}"}}"#
        ))
    }

    #[test]
    fn test_three_message_scenario() {
        let mut agg = Aggregator::new();
        agg.accumulate(&message("u1", "2024-01-01T10:00:00Z", "hello world"));
        agg.accumulate(&message("u1", "2024-01-02T15:30:00Z", "is this real?"));
        agg.accumulate(&message("u1", "2024-01-02T16:00:00Z", ""));

        let snapshot = agg.finish();
        let stats = &snapshot.stats["u1"];

        assert_eq!(stats.total, 3);
        assert_eq!(stats.active_days, 2);
        assert_eq!(stats.question, 1);
        // "hello world" = 11 chars, "is this real?" = 13; the empty message
        // contributes nothing and is excluded from min/max
        assert_eq!(stats.len_sum, 24);
        assert_eq!(stats.min_len, Some(11));
        assert_eq!(stats.max_len, 13);
        // "is" is dropped from the frequency map for length < 3
        assert_eq!(stats.word_sum, 5);
        let expected: Vec<(&str, u64)> =
            vec![("hello", 1), ("real", 1), ("this", 1), ("world", 1)];
        let got: Vec<(&str, u64)> = stats
            .words
            .iter()
            .map(|(w, c)| (w.as_str(), *c))
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_histograms_count_empty_messages_too() {
        let mut agg = Aggregator::new();
        // 2024-01-01 is a Monday
        agg.accumulate(&message("u1", "2024-01-01T10:00:00Z", ""));
        let snapshot = agg.finish();
        let stats = &snapshot.stats["u1"];

        assert_eq!(stats.total, 1);
        assert_eq!(stats.hours[10], 1);
        assert_eq!(stats.days[0], 1);
        assert_eq!(stats.months["2024-01"], 1);
        assert_eq!(stats.combos["Monday-10"], 1);
        assert_eq!(stats.len_sum, 0);
        assert_eq!(stats.min_len, None);
        assert_eq!(stats.max_len, 0);
    }

    #[test]
    fn test_first_last_track_out_of_order_timestamps() {
        let mut agg = Aggregator::new();
        agg.accumulate(&message("u1", "2024-03-05T12:00:00Z", "b"));
        agg.accumulate(&message("u1", "2024-01-01T08:00:00Z", "a"));
        agg.accumulate(&message("u1", "2024-02-01T09:00:00Z", "c"));
        let snapshot = agg.finish();
        let stats = &snapshot.stats["u1"];

        assert_eq!(
            stats.first.unwrap().to_rfc3339(),
            "2024-01-01T08:00:00+00:00"
        );
        assert_eq!(
            stats.last.unwrap().to_rfc3339(),
            "2024-03-05T12:00:00+00:00"
        );
    }

    #[test]
    fn test_mention_creates_placeholder_target() {
        let mut agg = Aggregator::new();
        agg.accumulate(&record(
            r#"{"author": {"id": "u1", "name": "alice"},
                "timestamp": "2024-01-01T10:00:00Z",
                "content": "hi",
                "mentions": [{"id": "u2"}]}"#,
        ));
        let snapshot = agg.finish();

        assert_eq!(snapshot.social["u1"].mentions_given["u2"], 1);
        assert_eq!(snapshot.social["u2"].mentioned_by, 1);
        assert_eq!(snapshot.profiles["u2"].username, PLACEHOLDER_USERNAME);
        assert_eq!(snapshot.stats["u2"].total, 0);
    }

    #[test]
    fn test_placeholder_identity_is_not_upgraded() {
        let mut agg = Aggregator::new();
        agg.accumulate(&record(
            r#"{"author": {"id": "u1", "name": "alice"},
                "timestamp": "2024-01-01T10:00:00Z",
                "mentions": [{"id": "u2"}]}"#,
        ));
        agg.accumulate(&message("u2", "2024-01-01T11:00:00Z", "here now"));
        let snapshot = agg.finish();

        // First observation wins; u2 was created as a mention target
        assert_eq!(snapshot.profiles["u2"].username, PLACEHOLDER_USERNAME);
        assert_eq!(snapshot.stats["u2"].total, 1);
    }

    #[test]
    fn test_record_without_author_is_skipped() {
        let mut agg = Aggregator::new();
        agg.accumulate(&record(r#"{"timestamp": "2024-01-01T10:00:00Z"}"#));
        assert_eq!(agg.processed(), 1);
        assert_eq!(agg.skipped(), 1);
        assert_eq!(agg.user_count(), 0);
    }

    #[test]
    fn test_reactions_attachments_and_pins() {
        let mut agg = Aggregator::new();
        agg.accumulate(&record(
            r#"{"id": "m1",
                "author": {"id": "u1", "name": "alice"},
                "timestamp": "2024-01-01T10:00:00Z",
                "isPinned": true,
                "attachments": [{"url": "http://files/a.png"}, {}],
                "reactions": [
                    {"emoji": {"name": "👍"}, "count": 2},
                    {"emoji": {"name": "👍"}, "count": 3},
                    {"count": 9}
                ]}"#,
        ));
        let snapshot = agg.finish();
        let social = &snapshot.social["u1"];

        assert_eq!(social.pinned, vec!["m1"]);
        assert_eq!(social.attachments, vec!["http://files/a.png"]);
        assert_eq!(social.reactions_given["👍"], 5);
        // The nameless reaction is dropped entirely
        assert_eq!(social.reactions_given.len(), 1);
    }

    #[test]
    fn test_inline_emojis_feed_both_views() {
        let mut agg = Aggregator::new();
        agg.accumulate(&message("u1", "2024-01-01T10:00:00Z", "gg 🔥🔥"));
        let snapshot = agg.finish();

        assert_eq!(snapshot.stats["u1"].emojis["🔥"], 2);
        assert_eq!(snapshot.social["u1"].inline_emojis["🔥"], 2);
    }

    #[test]
    fn test_checkpoint_write_is_partial_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut agg = Aggregator::new();
        agg.accumulate(&message("u1", "2024-01-01T10:00:00Z", "hello"));
        agg.write_checkpoint(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["processed"], 1);
        // Still a set of day keys, not a count
        assert_eq!(
            value["stats"]["u1"]["active_day_set"],
            serde_json::json!(["2024-01-01"])
        );
    }
}
