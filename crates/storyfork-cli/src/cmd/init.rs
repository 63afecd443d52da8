use super::Context;
use crate::output::{pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use storyfork_core::SqliteStore;
use storyfork_core::config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-run initialization even if `.storyfork/` already exists.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "storyfork.db\nstoryfork.db-wal\nstoryfork.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    project_dir: String,
    config: String,
    database: String,
    schema_version: u32,
}

/// Execute `sf init`. Creates the project skeleton:
///
/// ```text
/// .storyfork/
///   config.toml     (default project config, kept if present)
///   storyfork.db    (story database, migrated to the latest schema)
///   .gitignore
/// ```
///
/// Re-running with `--force` is safe: migrations are idempotent and stories
/// are kept.
///
/// # Errors
///
/// Returns an error if `.storyfork/` already exists without `--force`, or if
/// any filesystem or database step fails.
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    let report = init_project(&ctx.project_root, &ctx.db_path, args.force)?;
    render_mode(
        ctx.output,
        &report,
        |r, w| writeln!(w, "{}\t{}", r.project_dir, r.schema_version),
        |r, w| {
            writeln!(w, "✓ Initialized storyfork project.")?;
            writeln!(w)?;
            pretty_kv(w, "Config", &r.config)?;
            pretty_kv(w, "Database", &r.database)?;
            pretty_kv(w, "Schema", r.schema_version.to_string())?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  sf story create --title \"My story\" --content \"It began...\"")
        },
    )
}

fn init_project(project_root: &Path, db_path: &Path, force: bool) -> Result<InitReport> {
    let dir = config::project_dir(project_root);
    if dir.exists() && !force {
        anyhow::bail!(".storyfork/ already exists. Use `sf init --force` to reinitialize.");
    }

    let config_path = config::write_default_project_config(project_root)?;
    let project = config::load_project_config(project_root)?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;

    let store = SqliteStore::open_with(db_path, project.store_options())?;
    let schema_version = store.schema_version()?;
    let database = store
        .path()
        .map_or_else(|| db_path.display().to_string(), |p| p.display().to_string());

    tracing::info!(path = %dir.display(), schema_version, "project initialized");
    Ok(InitReport {
        project_dir: dir.display().to_string(),
        config: config_path.display().to_string(),
        database,
        schema_version,
    })
}
