use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::canon::{PROMOTION_THRESHOLD, PromotionPolicy};
use crate::db::StoreOptions;
use crate::store::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};

/// Per-project state directory.
pub const PROJECT_DIR: &str = ".storyfork";

/// Database file inside [`PROJECT_DIR`].
pub const DB_FILE: &str = "storyfork.db";

const PROJECT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub canon: CanonConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonConfig {
    #[serde(default = "default_threshold")]
    pub promotion_threshold: u64,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            promotion_threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl ProjectConfig {
    #[must_use]
    pub const fn promotion_policy(&self) -> PromotionPolicy {
        PromotionPolicy {
            threshold: self.canon.promotion_threshold,
        }
    }

    #[must_use]
    pub const fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.store.busy_timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.store.max_attempts,
                backoff: Duration::from_millis(self.store.retry_backoff_ms),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.canon.promotion_threshold == 0 {
            bail!("canon.promotion_threshold must be at least 1");
        }
        if self.store.max_attempts == 0 {
            bail!("store.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    /// Display name used for `--author` when nothing else is set.
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// `<root>/.storyfork`
#[must_use]
pub fn project_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR)
}

/// `<root>/.storyfork/storyfork.db`
#[must_use]
pub fn db_path(project_root: &Path) -> PathBuf {
    project_dir(project_root).join(DB_FILE)
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed, or holds
/// out-of-range values. A missing file yields defaults.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_dir(project_root).join(PROJECT_CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(config)
}

/// Write the default project config, leaving an existing file alone.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_default_project_config(project_root: &Path) -> Result<PathBuf> {
    let dir = project_dir(project_root);
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(PROJECT_CONFIG_FILE);
    if !path.exists() {
        let body = toml::to_string_pretty(&ProjectConfig::default())
            .context("Failed to serialize default config")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(path)
}

/// # Errors
///
/// Returns an error if the user config exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("storyfork/config.toml"))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load both config layers and settle the output mode.
///
/// `cli_format` is the `--format`/`--json` choice, if the user made one.
///
/// # Errors
///
/// Returns an error if either config file is malformed.
pub fn resolve_config(project_root: &Path, cli_format: Option<&str>) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_format, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(
    cli_format: Option<&str>,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    let picked = cli_format
        .and_then(normalize_output_mode)
        .or_else(|| env_format.as_deref().and_then(normalize_output_mode))
        .or_else(|| user_output.as_deref().and_then(normalize_output_mode));

    if let Some(mode) = picked {
        return mode.to_string();
    }
    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_threshold() -> u64 {
    PROMOTION_THRESHOLD
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_retry_backoff_ms() -> u64 {
    10
}
