//! Artifact persistence
//!
//! The finalized snapshot is persisted as four JSON documents in the data
//! directory, the exact set the query layer reads back:
//!
//! | File | Contents |
//! |------|----------|
//! | `users.json` | id -> [`Profile`] |
//! | `user_stats.json` | id -> finalized [`UserStats`] |
//! | `user_social.json` | id -> [`UserSocial`] |
//! | `rankings.json` | the three sorted [`RankingSet`] lists |
//!
//! A fifth, optional `display_names.json` may be dropped in the same
//! directory by an external directory-sync tool; it is an array of entries
//! carrying display-name overrides and is never written by this crate.
//!
//! Every write goes through a temp file in the same directory followed by a
//! rename, so readers only ever observe complete documents.

use crate::aggregate::FinalizedSnapshot;
use crate::error::{Error, Result};
use crate::types::{Profile, RankingSet, UserSocial, UserStats};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Profiles document file name.
pub const USERS_FILE: &str = "users.json";
/// Finalized stats document file name.
pub const STATS_FILE: &str = "user_stats.json";
/// Social document file name.
pub const SOCIAL_FILE: &str = "user_social.json";
/// Rankings document file name.
pub const RANKINGS_FILE: &str = "rankings.json";
/// Optional display-name override document (written by an external tool).
pub const DISPLAY_NAMES_FILE: &str = "display_names.json";
/// In-progress checkpoint file name.
pub const CHECKPOINT_FILE: &str = "snapshot.json";

/// One entry of the external display-name document.
///
/// Only `id` and `displayName` matter here; the document may carry more
/// fields (avatar, search keys) for other consumers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// The four persisted documents, loaded back for querying, plus the
/// display-name override map (empty when the optional document is absent).
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub profiles: BTreeMap<String, Profile>,
    pub stats: BTreeMap<String, UserStats>,
    pub social: BTreeMap<String, UserSocial>,
    pub rankings: RankingSet,
    pub display_names: HashMap<String, String>,
}

/// Serialize `value` to `path` atomically (temp file + rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let payload = serde_json::to_vec(value)?;
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| Error::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| Error::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Persist a finalized snapshot as the four output documents.
pub fn write_artifacts(dir: &Path, snapshot: &FinalizedSnapshot) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_json_atomic(&dir.join(USERS_FILE), &snapshot.profiles)?;
    write_json_atomic(&dir.join(STATS_FILE), &snapshot.stats)?;
    write_json_atomic(&dir.join(SOCIAL_FILE), &snapshot.social)?;
    write_json_atomic(&dir.join(RANKINGS_FILE), &snapshot.rankings)?;
    tracing::info!(
        dir = %dir.display(),
        users = snapshot.profiles.len(),
        "Wrote output artifacts"
    );
    Ok(())
}

/// Load the four documents (and the optional display-name overrides) back
/// from the data directory.
pub fn load_artifacts(dir: &Path) -> Result<Artifacts> {
    let profiles = load_json(&dir.join(USERS_FILE))?;
    let stats = load_json(&dir.join(STATS_FILE))?;
    let social = load_json(&dir.join(SOCIAL_FILE))?;
    let rankings = load_json(&dir.join(RANKINGS_FILE))?;
    let display_names = load_display_names(dir)?;

    Ok(Artifacts {
        profiles,
        stats,
        social,
        rankings,
        display_names,
    })
}

/// Load display-name overrides; a missing document is simply empty.
fn load_display_names(dir: &Path) -> Result<HashMap<String, String>> {
    let path = dir.join(DISPLAY_NAMES_FILE);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let entries: Vec<DirectoryEntry> = load_json(&path)?;
    Ok(entries
        .into_iter()
        .filter_map(|e| e.display_name.map(|name| (e.id, name)))
        .collect())
}
