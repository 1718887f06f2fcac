//! Finalization: running accumulators -> immutable snapshot + rankings
//!
//! Runs exactly once, after the stream is fully drained. Collapses each
//! user's active-day-key set into a count and builds the three sorted
//! ranking lists. The transform is one-way; nothing here mutates the
//! aggregator's view of the stream.

use super::{Aggregator, RunningStats};
use crate::types::{Profile, RankMetric, RankingEntry, RankingSet, UserSocial, UserStats};
use std::collections::BTreeMap;

/// Immutable result of an aggregation pass.
///
/// This is what gets persisted as the four output artifacts and what the
/// query layer reads back.
#[derive(Debug, Clone)]
pub struct FinalizedSnapshot {
    pub profiles: BTreeMap<String, Profile>,
    pub stats: BTreeMap<String, UserStats>,
    pub social: BTreeMap<String, UserSocial>,
    pub rankings: RankingSet,
    /// Records seen during the pass, skipped ones included
    pub processed: u64,
    /// Records skipped for lack of an author id
    pub skipped: u64,
}

impl RunningStats {
    /// Collapse the active-day-key set into its cardinality.
    fn into_final(self) -> UserStats {
        UserStats {
            total: self.total,
            first: self.first,
            last: self.last,
            active_days: self.active_day_set.len() as u64,
            hours: self.hours,
            days: self.days,
            months: self.months,
            combos: self.combos,
            len_sum: self.len_sum,
            max_len: self.max_len,
            min_len: self.min_len,
            word_sum: self.word_sum,
            question: self.question,
            words: self.words,
            emojis: self.emojis,
        }
    }
}

/// Sort a ranking list: descending by value, ascending user id on ties.
///
/// The secondary key makes re-runs on identical input byte-identical.
fn sort_ranking(entries: &mut [RankingEntry]) {
    entries.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

/// Consume the aggregator and produce the finalized snapshot.
pub(super) fn finalize(aggregator: Aggregator) -> FinalizedSnapshot {
    let Aggregator {
        profiles,
        stats,
        social,
        processed,
        skipped,
    } = aggregator;

    let stats: BTreeMap<String, UserStats> = stats
        .into_iter()
        .map(|(id, running)| (id, running.into_final()))
        .collect();

    let mut rankings = RankingSet::default();
    for (id, user_stats) in &stats {
        rankings.message_count.push(RankingEntry {
            user_id: id.clone(),
            value: user_stats.total as f64,
        });
        rankings.active_days.push(RankingEntry {
            user_id: id.clone(),
            value: user_stats.active_days as f64,
        });
        rankings.avg_message_length.push(RankingEntry {
            user_id: id.clone(),
            value: user_stats.avg_message_length(),
        });
    }
    for metric in RankMetric::all() {
        sort_ranking(rankings.list_mut(metric));
    }

    tracing::info!(
        users = profiles.len(),
        processed,
        skipped,
        "Finalized aggregation snapshot"
    );

    FinalizedSnapshot {
        profiles,
        stats,
        social,
        rankings,
        processed,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRecord;

    fn message(author_id: &str, timestamp: &str, content: &str) -> MessageRecord {
        serde_json::from_str(&format!(
            r#"{{"author": {{"id": "{author_id}", "name": "{author_id}"}},
                "timestamp": "{timestamp}", "content": "{content}"}}"#
        ))
        .unwrap()
    }

    fn sample_snapshot() -> FinalizedSnapshot {
        let mut agg = Aggregator::new();
        // u1: 3 messages on 2 days; u2: 2 messages on 2 days; u3: 1 message
        agg.accumulate(&message("u1", "2024-01-01T10:00:00Z", "aaaa"));
        agg.accumulate(&message("u1", "2024-01-01T11:00:00Z", "bb"));
        agg.accumulate(&message("u1", "2024-01-02T10:00:00Z", "cc"));
        agg.accumulate(&message("u2", "2024-01-01T10:00:00Z", "dddddddd"));
        agg.accumulate(&message("u2", "2024-01-03T10:00:00Z", "ee"));
        agg.accumulate(&message("u3", "2024-01-01T10:00:00Z", "ff"));
        agg.finish()
    }

    #[test]
    fn test_rankings_sorted_descending() {
        let snapshot = sample_snapshot();
        for metric in RankMetric::all() {
            let list = snapshot.rankings.list(metric);
            assert_eq!(list.len(), 3);
            for pair in list.windows(2) {
                assert!(pair[0].value >= pair[1].value, "{metric} not sorted");
            }
        }
    }

    #[test]
    fn test_message_count_ranking_values() {
        let snapshot = sample_snapshot();
        let list = &snapshot.rankings.message_count;
        assert_eq!(list[0].user_id, "u1");
        assert_eq!(list[0].value, 3.0);
        assert_eq!(list[1].user_id, "u2");
        assert_eq!(list[2].user_id, "u3");
    }

    #[test]
    fn test_ties_break_by_ascending_user_id() {
        let snapshot = sample_snapshot();
        // u1 and u2 both have 2 active days, u3 has 1
        let list = &snapshot.rankings.active_days;
        assert_eq!(list[0].user_id, "u1");
        assert_eq!(list[1].user_id, "u2");
        assert_eq!(list[2].user_id, "u3");
    }

    #[test]
    fn test_avg_length_uses_total_divisor() {
        let snapshot = sample_snapshot();
        // u2: (8 + 2) / 2 = 5.0
        let entry = snapshot
            .rankings
            .avg_message_length
            .iter()
            .find(|e| e.user_id == "u2")
            .unwrap();
        assert_eq!(entry.value, 5.0);
    }

    #[test]
    fn test_mention_only_user_ranks_with_zeroes() {
        let mut agg = Aggregator::new();
        agg.accumulate(
            &serde_json::from_str::<MessageRecord>(
                r#"{"author": {"id": "u1", "name": "alice"},
                    "timestamp": "2024-01-01T10:00:00Z",
                    "mentions": [{"id": "ghost"}]}"#,
            )
            .unwrap(),
        );
        let snapshot = agg.finish();

        let entry = snapshot
            .rankings
            .message_count
            .iter()
            .find(|e| e.user_id == "ghost")
            .unwrap();
        assert_eq!(entry.value, 0.0);
        // avg length guards against division by zero via max(total, 1)
        let avg = snapshot
            .rankings
            .avg_message_length
            .iter()
            .find(|e| e.user_id == "ghost")
            .unwrap();
        assert_eq!(avg.value, 0.0);
    }

    #[test]
    fn test_determinism_across_runs() {
        let a = sample_snapshot();
        let b = sample_snapshot();
        assert_eq!(
            serde_json::to_string(&a.rankings).unwrap(),
            serde_json::to_string(&b.rankings).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a.stats).unwrap(),
            serde_json::to_string(&b.stats).unwrap()
        );
    }
}
