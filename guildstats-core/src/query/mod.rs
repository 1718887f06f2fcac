//! Ranking query service
//!
//! Read side of the pipeline: serves leaderboards, percentile summaries and
//! rank context windows from the persisted artifacts.
//!
//! ## Snapshot cache
//!
//! Artifacts are loaded into an immutable [`Arc`] snapshot that stays fresh
//! for a configurable TTL. Expiry triggers a reload under a dedicated
//! rebuild lock; readers either see the previous snapshot or the fully
//! rebuilt one, never a partially loaded state. Two threads racing on an
//! expired snapshot can at worst both rebuild it; they can never tear it.
//!
//! Deleted placeholder accounts (see [`Profile::is_deleted`]) are filtered
//! out of every ranking view at snapshot build time.

use crate::error::Result;
use crate::store::{self, Artifacts};
use crate::types::{Profile, RankMetric, RankingEntry, RankingSet, UserSocial, UserStats};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Default context window size for "who's near me" views.
pub const DEFAULT_WINDOW: usize = 5;

/// Largest allowed leaderboard page size.
pub const MAX_PAGE_SIZE: usize = 100;

// ============================================
// Query result types
// ============================================

/// A user's identity as presented by the query layer: profile fields plus
/// the resolved display name (override, or username as fallback).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_bot: bool,
}

/// One entry of a rank context window.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    /// 1-based position in the full filtered ranking
    pub rank: usize,
    pub user_id: String,
    pub value: f64,
    pub display_name: String,
    /// Whether this entry is the queried user
    pub is_self: bool,
}

/// A user's standing in one metric: rank, value, and the surrounding slice
/// of the leaderboard.
#[derive(Debug, Clone, Serialize)]
pub struct MetricStanding {
    /// 1-based rank; 0 when the user is absent from the ranking
    pub user_rank: usize,
    pub user_value: f64,
    pub context: Vec<ContextEntry>,
}

/// Per-metric standings for one user.
#[derive(Debug, Clone, Serialize)]
pub struct RankingsWithContext {
    pub message_count: MetricStanding,
    pub active_days: MetricStanding,
    pub avg_message_length: MetricStanding,
}

/// Rank and percentile for one metric.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricPercentile {
    /// 1 + number of users with a strictly greater value
    pub rank: usize,
    /// Share of ranked users this user outperforms or ties, 0-100
    pub percentile: u8,
}

/// Rank/percentile across all three metrics.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileSummary {
    pub message_count: MetricPercentile,
    pub active_days: MetricPercentile,
    pub avg_message_length: MetricPercentile,
}

/// Everything the presentation layer needs for a single-user page.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user: ProfileView,
    pub stats: UserStats,
    pub social: UserSocial,
    pub rankings: PercentileSummary,
    pub leaderboard: RankingsWithContext,
}

/// One row of a leaderboard page.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub user_id: String,
    pub value: f64,
    pub user: ProfileView,
}

/// Paging information for a leaderboard page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

/// An offset/limit slice of one metric's ranking.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub items: Vec<LeaderboardRow>,
    pub pagination: Pagination,
}

// ============================================
// Snapshot
// ============================================

/// Immutable view of the artifacts, with deleted accounts already filtered
/// out of the ranking lists.
struct QuerySnapshot {
    loaded_at: Instant,
    artifacts: Artifacts,
    filtered: RankingSet,
}

impl QuerySnapshot {
    fn build(data_dir: &Path) -> Result<Self> {
        let artifacts = store::load_artifacts(data_dir)?;

        let keep = |entry: &RankingEntry| {
            artifacts
                .profiles
                .get(&entry.user_id)
                .map_or(false, |profile| !profile.is_deleted())
        };
        let mut filtered = artifacts.rankings.clone();
        for metric in RankMetric::all() {
            filtered.list_mut(metric).retain(keep);
        }

        tracing::debug!(
            users = artifacts.profiles.len(),
            ranked = filtered.message_count.len(),
            "Built query snapshot"
        );

        Ok(Self {
            loaded_at: Instant::now(),
            artifacts,
            filtered,
        })
    }

    fn profile(&self, user_id: &str) -> Option<&Profile> {
        self.artifacts.profiles.get(user_id)
    }

    /// Display name for an id: override first, then username, then the id
    /// itself for users with no profile at all.
    fn display_name(&self, user_id: &str) -> String {
        if let Some(name) = self.artifacts.display_names.get(user_id) {
            return name.clone();
        }
        self.profile(user_id)
            .map(|p| p.username.clone())
            .unwrap_or_else(|| user_id.to_string())
    }

    fn profile_view(&self, user_id: &str) -> ProfileView {
        let display_name = self.display_name(user_id);
        match self.profile(user_id) {
            Some(profile) => ProfileView {
                id: profile.id.clone(),
                username: profile.username.clone(),
                display_name,
                avatar_url: profile.avatar_url.clone(),
                is_bot: profile.is_bot,
            },
            None => ProfileView {
                id: user_id.to_string(),
                username: display_name.clone(),
                display_name,
                avatar_url: None,
                is_bot: false,
            },
        }
    }

    /// Standing of `user_id` in one metric's filtered list, with a context
    /// window of up to `window` entries centered on the user and clamped at
    /// both list boundaries.
    fn standing(&self, metric: RankMetric, user_id: &str, window: usize) -> MetricStanding {
        let list = self.filtered.list(metric);
        let index = match list.iter().position(|e| e.user_id == user_id) {
            Some(index) => index,
            None => {
                return MetricStanding {
                    user_rank: 0,
                    user_value: 0.0,
                    context: Vec::new(),
                }
            }
        };

        let mut start = index.saturating_sub(window / 2);
        if start + window > list.len() {
            start = list.len().saturating_sub(window);
        }
        let end = (start + window).min(list.len());

        let context = list[start..end]
            .iter()
            .enumerate()
            .map(|(offset, entry)| ContextEntry {
                rank: start + offset + 1,
                user_id: entry.user_id.clone(),
                value: entry.value,
                display_name: self.display_name(&entry.user_id),
                is_self: entry.user_id == user_id,
            })
            .collect();

        MetricStanding {
            user_rank: index + 1,
            user_value: list[index].value,
            context,
        }
    }

    fn rankings_with_context(&self, user_id: &str, window: usize) -> RankingsWithContext {
        RankingsWithContext {
            message_count: self.standing(RankMetric::MessageCount, user_id, window),
            active_days: self.standing(RankMetric::ActiveDays, user_id, window),
            avg_message_length: self.standing(RankMetric::AvgMessageLength, user_id, window),
        }
    }

    /// Rank and percentile of `user_id` in one metric.
    ///
    /// `rank = 1 + |{others with strictly greater value}|`, so ties share
    /// the best rank. The percentile of a sole ranked user is 100; an empty
    /// ranking yields rank 0 and percentile 0 (never a division by zero).
    fn percentile(&self, metric: RankMetric, user_id: &str) -> MetricPercentile {
        let list = self.filtered.list(metric);
        let total = list.len();
        let user_value = match list.iter().find(|e| e.user_id == user_id) {
            Some(entry) => entry.value,
            None => {
                return MetricPercentile {
                    rank: 0,
                    percentile: 0,
                }
            }
        };
        if total == 0 {
            return MetricPercentile {
                rank: 0,
                percentile: 0,
            };
        }

        let rank = 1 + list.iter().filter(|e| e.value > user_value).count();
        let percentile =
            (((total - rank + 1) as f64 / total as f64) * 100.0).round() as u8;

        MetricPercentile { rank, percentile }
    }
}

// ============================================
// Service
// ============================================

/// Read-mostly query service over the persisted artifacts.
///
/// Safe to share across threads; all operations take `&self`.
pub struct RankingService {
    data_dir: PathBuf,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<QuerySnapshot>>>,
    rebuild: Mutex<()>,
}

impl RankingService {
    /// Create a service reading artifacts from `data_dir`, caching each
    /// loaded snapshot for `ttl`.
    pub fn new(data_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            data_dir: data_dir.into(),
            ttl,
            snapshot: RwLock::new(None),
            rebuild: Mutex::new(()),
        }
    }

    /// Create a service from the loaded configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.data_dir(),
            Duration::from_secs(config.query.cache_ttl_secs),
        )
    }

    /// Drop the cached snapshot; the next query reloads from disk.
    pub fn invalidate(&self) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Current snapshot, reloading from disk if the cached one expired.
    fn snapshot(&self) -> Result<Arc<QuerySnapshot>> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        // Serialize rebuilds; losers of the race reuse the winner's work.
        let _rebuilding = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        tracing::debug!(dir = %self.data_dir.display(), "Reloading query snapshot");
        let rebuilt = Arc::new(QuerySnapshot::build(&self.data_dir)?);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&rebuilt));
        Ok(rebuilt)
    }

    fn fresh_snapshot(&self) -> Option<Arc<QuerySnapshot>> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|s| s.loaded_at.elapsed() < self.ttl)
            .map(Arc::clone)
    }

    /// The three ranking lists with deleted accounts filtered out.
    pub fn all_rankings(&self) -> Result<RankingSet> {
        Ok(self.snapshot()?.filtered.clone())
    }

    /// All non-deleted users as presentation-ready profile views, keyed by
    /// id. Companion to the ranking lists for callers that render them.
    pub fn leaderboard_users(&self) -> Result<BTreeMap<String, ProfileView>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .artifacts
            .profiles
            .values()
            .filter(|profile| !profile.is_deleted())
            .map(|profile| (profile.id.clone(), snapshot.profile_view(&profile.id)))
            .collect())
    }

    /// Per-metric rank, value and context window for a user. Users absent
    /// from a ranking get rank 0 and an empty context for that metric.
    pub fn user_rankings_with_context(
        &self,
        user_id: &str,
        window: usize,
    ) -> Result<RankingsWithContext> {
        Ok(self.snapshot()?.rankings_with_context(user_id, window))
    }

    /// Full summary for a single user, or `None` when the user is unknown
    /// or a deleted placeholder.
    pub fn user_summary(&self, user_id: &str) -> Result<Option<UserSummary>> {
        let snapshot = self.snapshot()?;

        match snapshot.profile(user_id) {
            Some(profile) if !profile.is_deleted() => {}
            _ => return Ok(None),
        }

        let stats = match snapshot.artifacts.stats.get(user_id) {
            Some(stats) => stats.clone(),
            None => return Ok(None),
        };
        let social = snapshot
            .artifacts
            .social
            .get(user_id)
            .cloned()
            .unwrap_or_default();

        Ok(Some(UserSummary {
            user: snapshot.profile_view(user_id),
            stats,
            social,
            rankings: PercentileSummary {
                message_count: snapshot.percentile(RankMetric::MessageCount, user_id),
                active_days: snapshot.percentile(RankMetric::ActiveDays, user_id),
                avg_message_length: snapshot.percentile(RankMetric::AvgMessageLength, user_id),
            },
            leaderboard: snapshot.rankings_with_context(user_id, DEFAULT_WINDOW),
        }))
    }

    /// One page of a metric's leaderboard. `page` is clamped to at least 1,
    /// `page_size` to `1..=MAX_PAGE_SIZE`.
    pub fn leaderboard_page(
        &self,
        metric: RankMetric,
        page: usize,
        page_size: usize,
    ) -> Result<LeaderboardPage> {
        let snapshot = self.snapshot()?;
        let list = snapshot.filtered.list(metric);

        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let total_items = list.len();
        let total_pages = (total_items + page_size - 1) / page_size;
        let start = (page - 1) * page_size;
        let end = (start + page_size).min(total_items);

        let items = if start < total_items {
            list[start..end]
                .iter()
                .enumerate()
                .map(|(offset, entry)| LeaderboardRow {
                    rank: start + offset + 1,
                    user_id: entry.user_id.clone(),
                    value: entry.value,
                    user: snapshot.profile_view(&entry.user_id),
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(LeaderboardPage {
            items,
            pagination: Pagination {
                current_page: page,
                page_size,
                total_items,
                total_pages,
                has_more: end < total_items,
            },
        })
    }
}
