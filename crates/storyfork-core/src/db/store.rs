//! [`StoryStore`] backed by a `SQLite` connection.
//!
//! Read-write transactions begin with `BEGIN IMMEDIATE`, taking the database
//! write lock before the first read. Writers are therefore serialized across
//! connections and processes, which gives the promotion path a stable view of
//! the whole sibling set. Read-only closures ([`StoryStore::run_read`]) use a
//! deferred transaction and proceed alongside a writer under WAL. Lock waits beyond the busy timeout surface as
//! [`StoreError::TransientConflict`] and are retried per [`RetryPolicy`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params, types::Type};

use super::DEFAULT_BUSY_TIMEOUT;
use crate::error::StoreError;
use crate::model::{
    Contribution, ContributionPatch, ContributionTags, DocId, Identity, Story, StoryStatus,
};
use crate::store::{RetryPolicy, StoreTx, StoryStore};

const STORY_COLUMNS: &str = "story_id, title, author_id, author_name, status, cover_image_url, \
     synopsis, first_contribution_id, created_at_us";

const CONTRIBUTION_COLUMNS: &str = "story_id, contribution_id, content, author_id, author_name, \
     parent_contribution_id, likes_count, is_canonical, tags_json, created_at_us";

/// Connection tuning for [`SqliteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// `SQLite`-backed story store. One connection per instance; open one
/// instance per thread or process for parallel writers.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        let conn = super::open_database(path, options.busy_timeout)?;
        tracing::debug!(path = %path.display(), "opened sqlite story store");
        Ok(Self {
            conn: Mutex::new(conn),
            retry: options.retry,
            path: Some(path.to_path_buf()),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(super::open_in_memory()?),
            retry: RetryPolicy::default(),
            path: None,
        })
    }

    /// Database file, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Schema version recorded in the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the pragma cannot be read.
    pub fn schema_version(&self) -> Result<u32, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::unavailable("sqlite connection lock poisoned"))?;
        Ok(super::migrations::current_schema_version(&conn)?)
    }
}

impl SqliteStore {
    fn run_with<T, F>(&self, behavior: TransactionBehavior, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::unavailable("sqlite connection lock poisoned"))?;

        self.retry.run(|_attempt| {
            let tx = conn.transaction_with_behavior(behavior)?;
            let mut handle = SqliteTx { conn: &tx };
            let value = f(&mut handle as &mut dyn StoreTx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

impl StoryStore for SqliteStore {
    fn run_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        self.run_with(TransactionBehavior::Immediate, f)
    }

    /// Deferred: under WAL the snapshot is taken at the first read and never
    /// waits on a writer holding the lock.
    fn run_read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        self.run_with(TransactionBehavior::Deferred, f)
    }
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

fn conversion_error(
    column: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(err))
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    let status: String = row.get(4)?;
    let status = status
        .parse::<StoryStatus>()
        .map_err(|err| conversion_error(4, Type::Text, err))?;
    Ok(Story {
        id: DocId::new_unchecked(row.get::<_, String>(0)?),
        title: row.get(1)?,
        author: Identity {
            uid: row.get(2)?,
            display_name: row.get(3)?,
        },
        status,
        cover_image_url: row.get(5)?,
        synopsis: row.get(6)?,
        first_contribution_id: row.get::<_, Option<String>>(7)?.map(DocId::new_unchecked),
        created_at_us: row.get(8)?,
    })
}

fn contribution_from_row(row: &Row<'_>) -> rusqlite::Result<Contribution> {
    let likes: i64 = row.get(6)?;
    let likes_count =
        u64::try_from(likes).map_err(|err| conversion_error(6, Type::Integer, err))?;
    let tags = row
        .get::<_, Option<String>>(8)?
        .map(|raw| serde_json::from_str::<ContributionTags>(&raw))
        .transpose()
        .map_err(|err| conversion_error(8, Type::Text, err))?;
    Ok(Contribution {
        story_id: DocId::new_unchecked(row.get::<_, String>(0)?),
        id: DocId::new_unchecked(row.get::<_, String>(1)?),
        content: row.get(2)?,
        author: Identity {
            uid: row.get(3)?,
            display_name: row.get(4)?,
        },
        parent_contribution_id: row.get::<_, Option<String>>(5)?.map(DocId::new_unchecked),
        likes_count,
        is_canonical: row.get(7)?,
        tags,
        created_at_us: row.get(9)?,
    })
}

/// Constraint failures on write are caller errors (duplicate id, dangling
/// parent, second canonical sibling); everything else is a store failure.
fn write_error(err: rusqlite::Error, what: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::InvalidInput(format!(
                "{what} rejected by constraint: {}",
                message.as_deref().unwrap_or("constraint violation")
            ))
        }
        other => StoreError::from(other),
    }
}

fn likes_to_sql(likes: u64) -> Result<i64, StoreError> {
    i64::try_from(likes).map_err(|_| StoreError::InvalidInput(format!("likes count {likes} overflows")))
}

impl StoreTx for SqliteTx<'_> {
    fn get_story(&mut self, story_id: &str) -> Result<Option<Story>, StoreError> {
        let sql = format!("SELECT {STORY_COLUMNS} FROM stories WHERE story_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![story_id], story_from_row)
            .optional()?)
    }

    fn list_stories(&mut self) -> Result<Vec<Story>, StoreError> {
        let sql = format!(
            "SELECT {STORY_COLUMNS} FROM stories ORDER BY created_at_us DESC, story_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], story_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_contribution(
        &mut self,
        story_id: &str,
        contribution_id: &str,
    ) -> Result<Option<Contribution>, StoreError> {
        let sql = format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contributions \
             WHERE story_id = ?1 AND contribution_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![story_id, contribution_id], contribution_from_row)
            .optional()?)
    }

    fn query_children(
        &mut self,
        story_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Contribution>, StoreError> {
        let sql = format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contributions \
             WHERE story_id = ?1 AND parent_contribution_id IS ?2 \
             ORDER BY created_at_us ASC, contribution_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![story_id, parent_id], contribution_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_contributions(&mut self, story_id: &str) -> Result<Vec<Contribution>, StoreError> {
        let sql = format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contributions \
             WHERE story_id = ?1 \
             ORDER BY created_at_us ASC, contribution_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![story_id], contribution_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_story(&mut self, story: &Story) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO stories (
                    story_id, title, author_id, author_name, status,
                    cover_image_url, synopsis, first_contribution_id, created_at_us
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    story.id.as_str(),
                    story.title,
                    story.author.uid,
                    story.author.display_name,
                    story.status.as_str(),
                    story.cover_image_url,
                    story.synopsis,
                    story.first_contribution_id.as_deref(),
                    story.created_at_us,
                ],
            )
            .map_err(|err| write_error(err, "story insert"))?;
        Ok(())
    }

    fn insert_contribution(&mut self, contribution: &Contribution) -> Result<(), StoreError> {
        let tags_json = contribution
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StoreError::unavailable)?;
        self.conn
            .execute(
                "INSERT INTO contributions (
                    story_id, contribution_id, content, author_id, author_name,
                    parent_contribution_id, likes_count, is_canonical, tags_json, created_at_us
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    contribution.story_id.as_str(),
                    contribution.id.as_str(),
                    contribution.content,
                    contribution.author.uid,
                    contribution.author.display_name,
                    contribution.parent_contribution_id.as_deref(),
                    likes_to_sql(contribution.likes_count)?,
                    contribution.is_canonical,
                    tags_json,
                    contribution.created_at_us,
                ],
            )
            .map_err(|err| write_error(err, "contribution insert"))?;
        Ok(())
    }

    fn update_contribution(
        &mut self,
        story_id: &str,
        contribution_id: &str,
        patch: &ContributionPatch,
    ) -> Result<(), StoreError> {
        let likes = patch.likes_count.map(likes_to_sql).transpose()?;
        let changed = self
            .conn
            .execute(
                "UPDATE contributions
                 SET likes_count = COALESCE(?3, likes_count),
                     is_canonical = COALESCE(?4, is_canonical)
                 WHERE story_id = ?1 AND contribution_id = ?2",
                params![story_id, contribution_id, likes, patch.is_canonical],
            )
            .map_err(|err| write_error(err, "contribution update"))?;
        if changed == 0 {
            return Err(StoreError::contribution_not_found(contribution_id));
        }
        Ok(())
    }

    fn update_story_status(
        &mut self,
        story_id: &str,
        status: StoryStatus,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE stories SET status = ?2 WHERE story_id = ?1",
            params![story_id, status.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::story_not_found(story_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SqliteStore, StoreOptions};
    use crate::error::StoreError;
    use crate::model::{
        Contribution, ContributionPatch, ContributionTags, DocId, Identity, Story, StoryStatus,
    };
    use crate::store::{RetryPolicy, StoryStore};
    use std::time::Duration;

    fn story(id: &str) -> Story {
        Story {
            id: DocId::new_unchecked(id),
            title: "Tide".into(),
            author: Identity::new("u1", "Ada").expect("identity"),
            created_at_us: 10,
            status: StoryStatus::Ongoing,
            cover_image_url: Some("https://example.test/c.png".into()),
            synopsis: "Once".into(),
            first_contribution_id: Some(DocId::new_unchecked("r")),
        }
    }

    fn contribution(id: &str, parent: Option<&str>, ts: i64) -> Contribution {
        Contribution {
            id: DocId::new_unchecked(id),
            story_id: DocId::new_unchecked("s1"),
            content: format!("text {id}"),
            author: Identity::anonymous(),
            created_at_us: ts,
            parent_contribution_id: parent.map(DocId::new_unchecked),
            likes_count: 0,
            is_canonical: parent.is_none(),
            tags: None,
        }
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().expect("open store");
        seed(&store);
        store
    }

    fn seed(store: &SqliteStore) {
        store
            .run_transaction(|tx| {
                tx.insert_story(&story("s1"))?;
                tx.insert_contribution(&contribution("r", None, 10))?;
                let mut tagged = contribution("a", Some("r"), 20);
                tagged.tags = Some(ContributionTags {
                    characters: vec!["Mira".into()],
                    timeline: None,
                    location: Some("harbor".into()),
                });
                tx.insert_contribution(&tagged)?;
                tx.insert_contribution(&contribution("b", Some("r"), 30))
            })
            .expect("seed");
    }

    #[test]
    fn rows_round_trip_through_sqlite() {
        let store = seeded();
        assert!(store.path().is_none());
        let loaded = store
            .run_transaction(|tx| tx.get_story("s1"))
            .expect("read story")
            .expect("story exists");
        assert_eq!(loaded, story("s1"));

        let a = store.get_contribution("s1", "a").expect("read").expect("exists");
        assert_eq!(a.parent_contribution_id.as_deref(), Some("r"));
        assert_eq!(
            a.tags.as_ref().and_then(|t| t.location.as_deref()),
            Some("harbor")
        );
    }

    #[test]
    fn null_parent_query_selects_root() {
        let store = seeded();
        let roots = store.query_children("s1", None).expect("roots");
        assert_eq!(roots.len(), 1);
        assert!(roots[0].is_canonical);

        let kids = store.query_children("s1", Some("r")).expect("children");
        let ids: Vec<_> = kids.iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let store = seeded();
        store
            .run_transaction(|tx| tx.update_contribution("s1", "a", &ContributionPatch::likes(3)))
            .expect("patch likes");
        let a = store.get_contribution("s1", "a").expect("read").expect("exists");
        assert_eq!(a.likes_count, 3);
        assert!(!a.is_canonical);

        let err = store
            .run_transaction(|tx| tx.update_contribution("s1", "nope", &ContributionPatch::likes(1)))
            .expect_err("missing row");
        assert!(err.is_not_found());
    }

    #[test]
    fn error_rolls_back_whole_transaction() {
        let store = seeded();
        let err = store
            .run_transaction(|tx| -> Result<(), StoreError> {
                tx.update_contribution("s1", "a", &ContributionPatch::likes(8))?;
                tx.update_contribution("s1", "missing", &ContributionPatch::likes(1))
            })
            .expect_err("second write fails");
        assert!(err.is_not_found());

        let a = store.get_contribution("s1", "a").expect("read").expect("exists");
        assert_eq!(a.likes_count, 0);
    }

    #[test]
    fn constraint_failures_are_invalid_input() {
        let store = seeded();
        let err = store
            .run_transaction(|tx| tx.insert_contribution(&contribution("a", Some("r"), 40)))
            .expect_err("duplicate id");
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = store
            .run_transaction(|tx| {
                tx.update_contribution("s1", "a", &ContributionPatch::canonical(true))?;
                tx.update_contribution("s1", "b", &ContributionPatch::canonical(true))
            })
            .expect_err("two canonical siblings");
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn status_update_and_missing_story() {
        let store = seeded();
        store
            .run_transaction(|tx| tx.update_story_status("s1", StoryStatus::Completed))
            .expect("update status");
        let s = store
            .run_transaction(|tx| tx.get_story("s1"))
            .expect("read")
            .expect("exists");
        assert_eq!(s.status, StoryStatus::Completed);

        let err = store
            .run_transaction(|tx| tx.update_story_status("ghost", StoryStatus::Completed))
            .expect_err("missing story");
        assert!(err.is_not_found());
    }

    #[test]
    fn reads_proceed_while_another_connection_holds_the_write_lock() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("stories.db");
        let options = StoreOptions {
            busy_timeout: Duration::from_millis(50),
            retry: RetryPolicy {
                max_attempts: 2,
                backoff: Duration::ZERO,
            },
        };
        let store = SqliteStore::open_with(&path, options).expect("open store");
        assert_eq!(store.path(), Some(path.as_path()));
        seed(&store);

        let writer = rusqlite::Connection::open(&path).expect("second connection");
        writer
            .execute_batch("BEGIN IMMEDIATE")
            .expect("take write lock");

        let kids = store.query_children("s1", Some("r")).expect("children");
        assert_eq!(kids.len(), 2);
        assert!(store.get_contribution("s1", "a").expect("read").is_some());
        let loaded = store.run_read(|tx| tx.get_story("s1")).expect("story");
        assert!(loaded.is_some());

        let err = store
            .run_transaction(|tx| tx.update_contribution("s1", "a", &ContributionPatch::likes(1)))
            .expect_err("write lock is held elsewhere");
        assert!(matches!(err, StoreError::TransientConflict { attempts: 2 }));

        writer.execute_batch("ROLLBACK").expect("release write lock");
        store
            .run_transaction(|tx| tx.update_contribution("s1", "a", &ContributionPatch::likes(1)))
            .expect("write after release");
    }
}
