//! Configuration module for the project-stage bot.
//!
//! Handles loading of runtime settings from the environment and
//! holds the fixed stage catalogue shared by storage and views.

mod settings;
mod stages;

pub use settings::{BotSettings, ConfigError};
pub use stages::{StageCode, UnknownStage};

/// Port the webhook listener binds to when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Workbook file name inside the data directory.
pub const WORKBOOK_FILE: &str = "projects.xlsx";

/// Lock file guarding workbook writes across replicas.
pub const LOCK_FILE: &str = "projects.lock";

/// Directory (inside the data directory) holding per-user session files.
pub const STATE_DIR: &str = "state";
