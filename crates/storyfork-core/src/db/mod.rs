//! `SQLite` story database.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` so competing writers queue instead of failing fast
//! - `foreign_keys = ON` so contributions cannot point at missing parents

pub mod migrations;
pub mod schema;
mod store;

pub use store::{SqliteStore, StoreOptions};

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used for story DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the story database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_database(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create story db directory {}", parent.display()))?;
        }
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open story database {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply story migrations")?;

    Ok(conn)
}

/// Open a private in-memory database with the full schema.
///
/// # Errors
///
/// Returns an error if configuring or migrating the database fails.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory story database")?;
    configure_connection(&conn, DEFAULT_BUSY_TIMEOUT).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply story migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // Set first so the remaining pragmas wait on a busy database.
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}
