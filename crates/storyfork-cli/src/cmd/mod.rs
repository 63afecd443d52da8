pub mod branches;
pub mod contribute;
pub mod init;
pub mod like;
pub mod story;
pub mod verify;

use crate::author;
use crate::output::{CodedError, OutputMode};
use anyhow::{Context as _, Result};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use storyfork_core::SqliteStore;
use storyfork_core::config::{self, EffectiveConfig};
use storyfork_core::error::ErrorCode;
use storyfork_core::model::Identity;

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub project_root: PathBuf,
    pub db_path: PathBuf,
    pub output: OutputMode,
    pub config: EffectiveConfig,
    pub author_flag: Option<String>,
}

impl Context {
    pub fn new(
        project_root: &Path,
        db_override: Option<PathBuf>,
        config: EffectiveConfig,
        author_flag: Option<String>,
    ) -> Self {
        let output = OutputMode::from_resolved(&config.resolved_output);
        Self {
            project_root: project_root.to_path_buf(),
            db_path: db_override.unwrap_or_else(|| config::db_path(project_root)),
            output,
            config,
            author_flag,
        }
    }

    /// Open the story database, refusing to create one outside `sf init`.
    pub fn open_store(&self) -> Result<SqliteStore> {
        if !self.db_path.exists() {
            return Err(CodedError::new(
                ErrorCode::NotInitialized,
                format!("no story database at {}", self.db_path.display()),
            )
            .into());
        }
        SqliteStore::open_with(&self.db_path, self.config.project.store_options())
            .with_context(|| format!("open {}", self.db_path.display()))
    }

    pub fn author(&self) -> Identity {
        author::resolve_author(
            self.author_flag.as_deref(),
            self.config.user.author.as_deref(),
        )
    }
}

pub fn micros_to_local_datetime(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us)
        .map(|ts| {
            ts.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| us.to_string())
}

/// First line of `text`, cut to `max` characters for list views.
pub fn excerpt(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
