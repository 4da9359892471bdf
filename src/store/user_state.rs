//! Per-user session state persisted as JSON.
//!
//! Every update loads the state from disk and writes it back after each
//! change, so any replica can serve any callback.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::StoreError;
use crate::config::StageCode;

/// Free-form input the bot is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingInput {
    ProjectName,
    Todo,
    Notes,
    Percent,
    Photo,
}

impl PendingInput {
    /// Whether the input is a photo rather than a text message.
    #[must_use]
    pub const fn expects_photo(self) -> bool {
        matches!(self, Self::Photo)
    }

    /// Label shown in the "waiting for" banner.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProjectName => "Nazwa inwestycji",
            Self::Todo => "Do dokończenia",
            Self::Notes => "Notatki",
            Self::Percent => "% ukończenia",
            Self::Photo => "Zdjęcie",
        }
    }
}

/// Navigation state of a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Informational date (`dd.mm.YYYY`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Selected project name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Selected stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_code: Option<StageCode>,

    /// Input the bot is waiting for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingInput>,

    /// Message id of the panel message that gets edited in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky_id: Option<i64>,

    /// Project order of the last rendered archive list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archive_names: Vec<String>,
}

impl UserState {
    /// Resets everything, including the panel message id.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Directory of `<uid>.json` session files.
#[derive(Debug, Clone)]
pub struct UserStateStore {
    dir: PathBuf,
}

impl UserStateStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, uid: i64) -> PathBuf {
        self.dir.join(format!("{uid}.json"))
    }

    /// Loads the state for a user. Missing or unreadable files yield the default.
    #[must_use]
    pub fn load(&self, uid: i64) -> UserState {
        std::fs::read_to_string(self.path_for(uid))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Saves the state atomically.
    pub fn try_save(&self, uid: i64, state: &UserState) -> Result<(), StoreError> {
        let json = serde_json::to_vec(state)?;
        atomic_write(&self.dir, &self.path_for(uid), &json)
    }

    /// Saves the state, logging failures instead of returning them.
    pub fn save(&self, uid: i64, state: &UserState) {
        if let Err(e) = self.try_save(uid, state) {
            warn!("Failed to save session state for user {}: {}", uid, e);
        }
    }
}

/// Writes `bytes` to a temporary file in `dir` and renames it over `target`.
pub(crate) fn atomic_write(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = tempfile::Builder::new().suffix(".tmp").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
