//! `SQLite` schema for the story store.
//!
//! - `stories` holds one row per story aggregate
//! - `contributions` holds the branch tree, keyed by `(story_id, contribution_id)`
//!   with a composite self-reference for the parent link
//!
//! The schema version lives in `PRAGMA user_version`.

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS stories (
    story_id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    author_id TEXT NOT NULL,
    author_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'ongoing' CHECK (status IN ('ongoing', 'completed')),
    cover_image_url TEXT,
    synopsis TEXT NOT NULL DEFAULT '',
    first_contribution_id TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS contributions (
    story_id TEXT NOT NULL REFERENCES stories(story_id) ON DELETE CASCADE,
    contribution_id TEXT NOT NULL,
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    author_id TEXT NOT NULL,
    author_name TEXT NOT NULL,
    parent_contribution_id TEXT,
    likes_count INTEGER NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
    is_canonical INTEGER NOT NULL DEFAULT 0 CHECK (is_canonical IN (0, 1)),
    tags_json TEXT,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (story_id, contribution_id),
    FOREIGN KEY (story_id, parent_contribution_id)
        REFERENCES contributions(story_id, contribution_id),
    CHECK (parent_contribution_id IS NOT NULL OR is_canonical = 1)
);
";

/// Migration v2: read-path indexes and the one-canonical-per-sibling-set
/// guard.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_contributions_parent_created
    ON contributions(story_id, parent_contribution_id, created_at_us, contribution_id);

CREATE INDEX IF NOT EXISTS idx_contributions_story_created
    ON contributions(story_id, created_at_us, contribution_id);

CREATE INDEX IF NOT EXISTS idx_stories_created
    ON stories(created_at_us DESC, story_id);

CREATE UNIQUE INDEX IF NOT EXISTS uq_contributions_one_canonical_sibling
    ON contributions(story_id, parent_contribution_id)
    WHERE is_canonical = 1 AND parent_contribution_id IS NOT NULL;

CREATE UNIQUE INDEX IF NOT EXISTS uq_contributions_one_root
    ON contributions(story_id)
    WHERE parent_contribution_id IS NULL;
";

/// Indexes expected by the read and promotion paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_contributions_parent_created",
    "idx_contributions_story_created",
    "idx_stories_created",
    "uq_contributions_one_canonical_sibling",
    "uq_contributions_one_root",
];
