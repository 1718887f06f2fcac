//! Core domain types for guildstats
//!
//! These types cover both sides of the pipeline:
//!
//! - the **input schema**: one [`MessageRecord`] per element of the export's
//!   `messages` array, decoded once with explicit required/optional fields
//!   instead of per-access optional chaining
//! - the **output model**: one [`Profile`] / [`UserStats`] / [`UserSocial`]
//!   triple per distinct user id, plus the three sorted ranking lists
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Author** | The user a message is attributed to |
//! | **Active day** | A UTC calendar date on which a user sent at least one message |
//! | **Combo** | A (day-of-week, hour-of-day) pair used as a joint activity key |
//! | **Ranking** | A list of (user, value) entries sorted descending by value |
//! | **Deleted placeholder** | An account whose username is the reserved deletion sentinel |
//!
//! The accumulating counterpart of [`UserStats`] lives in the aggregate
//! module ([`crate::aggregate::RunningStats`]); it carries the set of active
//! day keys, which finalization collapses into the `active_days` count here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Input schema (export document)
// ============================================

/// A single element of the export's `messages` array.
///
/// Required: `timestamp`. Everything else is optional with the documented
/// defaults; a record without an author id is skipped by the aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Message id (needed only to record pinned messages)
    #[serde(default)]
    pub id: Option<String>,
    /// Author block; absent or id-less authors cause the record to be skipped
    #[serde(default)]
    pub author: Option<MessageAuthor>,
    /// Send time; any RFC 3339 offset, normalized to UTC
    pub timestamp: DateTime<Utc>,
    /// Message text; `None` and `""` both count as content-free
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl MessageRecord {
    /// Author id, if the record carries one.
    pub fn author_id(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.id.as_deref())
    }

    /// Message text, only when non-empty.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}

/// Author block of a message record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageAuthor {
    pub id: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_bot: bool,
}

/// An attachment reference; only the URL is kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub url: Option<String>,
}

/// A reaction with its emoji and aggregate count.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Reaction {
    pub emoji: Option<ReactionEmoji>,
    pub count: u64,
}

/// Emoji block of a reaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReactionEmoji {
    pub name: Option<String>,
}

/// A mention target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Mention {
    pub id: Option<String>,
}

// ============================================
// Profiles
// ============================================

/// Username sentinel values marking deleted placeholder accounts.
pub const DELETED_USERNAMES: [&str; 2] = ["Deleted User", "deleted"];

/// Placeholder username for users first observed as mention targets.
pub const PLACEHOLDER_USERNAME: &str = "unknown";

/// Identity of a user, created on first observation (as author or mention
/// target) and never rewritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_bot: bool,
}

impl Profile {
    /// Build a profile from an author block, falling back to the placeholder
    /// identity for missing fields.
    pub fn from_author(id: &str, author: Option<&MessageAuthor>) -> Self {
        Self {
            id: id.to_string(),
            username: author
                .and_then(|a| a.name.clone())
                .unwrap_or_else(|| PLACEHOLDER_USERNAME.to_string()),
            avatar_url: author.and_then(|a| a.avatar_url.clone()),
            is_bot: author.map(|a| a.is_bot).unwrap_or(false),
        }
    }

    /// Whether this profile is a deleted placeholder account.
    pub fn is_deleted(&self) -> bool {
        DELETED_USERNAMES.contains(&self.username.as_str())
    }
}

// ============================================
// Finalized statistics
// ============================================

/// Per-user activity statistics after finalization.
///
/// `active_days` is the cardinality of the active-day-key set the aggregator
/// maintains during the streaming pass; histograms count every message,
/// content-derived fields only messages with non-empty text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    /// Messages attributed to the user, with or without content
    pub total: u64,
    /// Earliest message timestamp seen
    pub first: Option<DateTime<Utc>>,
    /// Latest message timestamp seen
    pub last: Option<DateTime<Utc>>,
    /// Number of distinct UTC calendar days with at least one message
    pub active_days: u64,
    /// Messages per UTC hour of day
    pub hours: [u64; 24],
    /// Messages per weekday, Monday first
    pub days: [u64; 7],
    /// Messages per `YYYY-MM` key
    pub months: BTreeMap<String, u64>,
    /// Messages per `Weekday-hour` key (e.g. `Monday-14`)
    pub combos: BTreeMap<String, u64>,
    /// Sum of content lengths in characters
    pub len_sum: u64,
    /// Longest content length (0 when no content message was seen)
    pub max_len: u64,
    /// Shortest content length (`None` until the first content message)
    pub min_len: Option<u64>,
    /// Tokens produced by the tokenizer, short tokens included
    pub word_sum: u64,
    /// Messages whose content contains a question mark
    pub question: u64,
    /// Token frequencies, tokens of length >= 3 only
    pub words: BTreeMap<String, u64>,
    /// Inline pictographic symbol frequencies
    pub emojis: BTreeMap<String, u64>,
}

impl UserStats {
    /// Average message length: `len_sum / max(total, 1)`.
    pub fn avg_message_length(&self) -> f64 {
        self.len_sum as f64 / self.total.max(1) as f64
    }
}

// ============================================
// Social metrics
// ============================================

/// Per-user social metrics, identical during accumulation and after
/// finalization.
///
/// `inline_emojis` intentionally duplicates [`UserStats::emojis`]; the social
/// document is consumed on its own by the presentation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserSocial {
    /// Ids of the user's pinned messages
    pub pinned: Vec<String>,
    /// Attachment URLs across all of the user's messages
    pub attachments: Vec<String>,
    /// Reaction emoji name -> cumulative count on the user's messages
    pub reactions_given: BTreeMap<String, u64>,
    /// Mention target id -> times this user mentioned them
    pub mentions_given: BTreeMap<String, u64>,
    /// Times this user was mentioned by anyone
    pub mentioned_by: u64,
    /// Inline pictographic symbol frequencies (duplicate of the stats view)
    pub inline_emojis: BTreeMap<String, u64>,
}

// ============================================
// Rankings
// ============================================

/// The three ranking metrics the system maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    MessageCount,
    ActiveDays,
    AvgMessageLength,
}

impl RankMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankMetric::MessageCount => "message_count",
            RankMetric::ActiveDays => "active_days",
            RankMetric::AvgMessageLength => "avg_message_length",
        }
    }

    /// All metrics, in the order the rankings document lists them.
    pub fn all() -> [RankMetric; 3] {
        [
            RankMetric::MessageCount,
            RankMetric::ActiveDays,
            RankMetric::AvgMessageLength,
        ]
    }
}

impl std::str::FromStr for RankMetric {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "message_count" => Ok(RankMetric::MessageCount),
            "active_days" => Ok(RankMetric::ActiveDays),
            "avg_message_length" => Ok(RankMetric::AvgMessageLength),
            other => Err(crate::error::Error::UnknownMetric(other.to_string())),
        }
    }
}

impl std::fmt::Display for RankMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a ranking list.
///
/// `value` is a float so one entry type serves all three metrics; the two
/// count metrics carry exact integral values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingEntry {
    pub user_id: String,
    pub value: f64,
}

/// The three ranking lists, each sorted descending by value with ascending
/// user id as the tie-break.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankingSet {
    pub message_count: Vec<RankingEntry>,
    pub active_days: Vec<RankingEntry>,
    pub avg_message_length: Vec<RankingEntry>,
}

impl RankingSet {
    /// The list for a given metric.
    pub fn list(&self, metric: RankMetric) -> &[RankingEntry] {
        match metric {
            RankMetric::MessageCount => &self.message_count,
            RankMetric::ActiveDays => &self.active_days,
            RankMetric::AvgMessageLength => &self.avg_message_length,
        }
    }

    /// Mutable list for a given metric.
    pub fn list_mut(&mut self, metric: RankMetric) -> &mut Vec<RankingEntry> {
        match metric {
            RankMetric::MessageCount => &mut self.message_count,
            RankMetric::ActiveDays => &mut self.active_days,
            RankMetric::AvgMessageLength => &mut self.avg_message_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_record() {
        let json = r#"{
            "id": "m1",
            "author": {"id": "u1", "name": "alice", "avatarUrl": "http://a/1.png", "isBot": false},
            "timestamp": "2024-01-01T10:00:00+00:00",
            "content": "hello",
            "attachments": [{"url": "http://files/x.png"}],
            "isPinned": true,
            "reactions": [{"emoji": {"name": "👍"}, "count": 3}],
            "mentions": [{"id": "u2"}]
        }"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.author_id(), Some("u1"));
        assert_eq!(record.text(), Some("hello"));
        assert!(record.is_pinned);
        assert_eq!(record.reactions[0].count, 3);
        assert_eq!(record.mentions[0].id.as_deref(), Some("u2"));
    }

    #[test]
    fn test_decode_minimal_record() {
        let json = r#"{"timestamp": "2024-01-01T10:00:00Z"}"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.author_id(), None);
        assert_eq!(record.text(), None);
        assert!(record.attachments.is_empty());
        assert!(!record.is_pinned);
    }

    #[test]
    fn test_missing_timestamp_is_an_error() {
        let json = r#"{"author": {"id": "u1"}}"#;
        assert!(serde_json::from_str::<MessageRecord>(json).is_err());
    }

    #[test]
    fn test_empty_content_is_not_text() {
        let json = r#"{"timestamp": "2024-01-01T10:00:00Z", "content": ""}"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.text(), None);
    }

    #[test]
    fn test_profile_from_author() {
        let author = MessageAuthor {
            id: Some("u1".to_string()),
            name: Some("alice".to_string()),
            avatar_url: None,
            is_bot: true,
        };
        let profile = Profile::from_author("u1", Some(&author));
        assert_eq!(profile.username, "alice");
        assert!(profile.is_bot);

        let placeholder = Profile::from_author("u2", None);
        assert_eq!(placeholder.username, PLACEHOLDER_USERNAME);
        assert!(placeholder.avatar_url.is_none());
        assert!(!placeholder.is_bot);
    }

    #[test]
    fn test_deleted_profile_detection() {
        for name in DELETED_USERNAMES {
            let profile = Profile {
                id: "x".to_string(),
                username: name.to_string(),
                avatar_url: None,
                is_bot: false,
            };
            assert!(profile.is_deleted());
        }
    }

    #[test]
    fn test_metric_round_trip() {
        for metric in RankMetric::all() {
            assert_eq!(metric.as_str().parse::<RankMetric>().unwrap(), metric);
        }
        assert!("no_such_metric".parse::<RankMetric>().is_err());
    }
}
