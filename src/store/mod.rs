//! Persistent storage for projects and user sessions.
//!
//! Project data lives in an Excel workbook shared by every replica and
//! serialised through a lock file. Session state lives in small JSON
//! files, one per user.

mod lock;
mod user_state;
mod workbook;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{LOCK_FILE, STATE_DIR, StageCode, WORKBOOK_FILE};

pub use lock::{FileLock, LockGuard};
pub use user_state::{PendingInput, UserState, UserStateStore};
pub use workbook::{
    Editor, FieldValue, MAX_PHOTOS, PROJECTS_SHEET, Project, ProjectBook, STAGE_HEADERS, StageField,
    StageRecord, progress_line, sheet_title,
};

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook error: {0}")]
    Xlsx(String),

    #[error("Timed out after {waited:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Unsupported field: {0}")]
    UnsupportedField(String),

    #[error("Sheet not found: {0}")]
    MissingSheet(String),

    #[error("Column not found: {0}")]
    MissingColumn(&'static str),

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Async facade over [`ProjectBook`]. Blocking workbook I/O runs on the
/// blocking thread pool.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    book: Arc<ProjectBook>,
}

impl ProjectStore {
    /// Opens the store rooted at `data_dir`, creating the directory.
    pub fn open(data_dir: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let lock = FileLock::new(data_dir.join(LOCK_FILE), lock_timeout);
        let book = ProjectBook::new(data_dir.join(WORKBOOK_FILE), lock);
        Ok(Self {
            book: Arc::new(book),
        })
    }

    /// The synchronous workbook handle.
    #[must_use]
    pub fn book(&self) -> &ProjectBook {
        &self.book
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ProjectBook) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let book = Arc::clone(&self.book);
        tokio::task::spawn_blocking(move || f(&book)).await?
    }

    pub async fn list_projects(&self, active_only: bool) -> Result<Vec<Project>, StoreError> {
        self.run(move |b| b.list_projects(active_only)).await
    }

    pub async fn add_project(&self, name: &str) -> Result<bool, StoreError> {
        let name = name.to_owned();
        self.run(move |b| b.add_project(&name)).await
    }

    pub async fn set_project_active(&self, name: &str, active: bool) -> Result<(), StoreError> {
        let name = name.to_owned();
        self.run(move |b| b.set_project_active(&name, active)).await
    }

    pub async fn set_project_finished(&self, name: &str, finished: bool) -> Result<(), StoreError> {
        let name = name.to_owned();
        self.run(move |b| b.set_project_finished(&name, finished)).await
    }

    pub async fn read_stage(&self, project: &str, stage: StageCode) -> Result<StageRecord, StoreError> {
        let project = project.to_owned();
        self.run(move |b| b.read_stage(&project, stage)).await
    }

    pub async fn read_stages(&self, project: &str) -> Result<Vec<(StageCode, StageRecord)>, StoreError> {
        let project = project.to_owned();
        self.run(move |b| b.read_stages(&project)).await
    }

    pub async fn update_stage(
        &self,
        project: &str,
        stage: StageCode,
        updates: Vec<(StageField, FieldValue)>,
        editor: Editor,
    ) -> Result<(), StoreError> {
        let project = project.to_owned();
        self.run(move |b| b.update_stage(&project, stage, &updates, &editor))
            .await
    }

    pub async fn append_photo(
        &self,
        project: &str,
        stage: StageCode,
        file_id: &str,
        editor: Editor,
    ) -> Result<(), StoreError> {
        let project = project.to_owned();
        let file_id = file_id.to_owned();
        self.run(move |b| b.append_photo(&project, stage, &file_id, &editor))
            .await
    }
}

/// Opens both stores under one data directory.
pub fn open_stores(
    data_dir: impl AsRef<Path>,
    lock_timeout: Duration,
) -> Result<(ProjectStore, UserStateStore), StoreError> {
    let data_dir = data_dir.as_ref();
    let projects = ProjectStore::open(data_dir, lock_timeout)?;
    let sessions = UserStateStore::open(data_dir.join(STATE_DIR))?;
    Ok((projects, sessions))
}
