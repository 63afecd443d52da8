//! In-process store with optimistic concurrency control.
//!
//! Each attempt clones the current collections under the lock, runs the
//! closure against that clone while recording what it read (document
//! versions and child-query membership) and buffering what it wrote, then
//! re-takes the lock to validate the read-set. Any difference means another
//! transaction committed in between; the attempt is discarded and retried
//! against a fresh snapshot.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{RetryPolicy, StoreTx, StoryStore};
use crate::error::StoreError;
use crate::model::{Contribution, ContributionPatch, Story, StoryStatus};

type ContributionKey = (String, String);

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    doc: T,
}

#[derive(Debug, Clone, Default)]
struct Collections {
    stories: BTreeMap<String, Versioned<Story>>,
    contributions: BTreeMap<ContributionKey, Versioned<Contribution>>,
}

impl Collections {
    fn story_version(&self, id: &str) -> Option<u64> {
        self.stories.get(id).map(|v| v.version)
    }

    fn contribution_version(&self, key: &ContributionKey) -> Option<u64> {
        self.contributions.get(key).map(|v| v.version)
    }

    fn stories_newest_first(&self) -> Vec<&Versioned<Story>> {
        let mut stories: Vec<_> = self.stories.values().collect();
        stories.sort_by(|a, b| {
            b.doc
                .created_at_us
                .cmp(&a.doc.created_at_us)
                .then_with(|| a.doc.id.cmp(&b.doc.id))
        });
        stories
    }

    fn contributions_where<'a>(
        &'a self,
        story_id: &str,
        mut keep: impl FnMut(&Contribution) -> bool,
    ) -> Vec<&'a Versioned<Contribution>> {
        let mut rows: Vec<_> = self
            .contributions
            .range((story_id.to_string(), String::new())..)
            .take_while(|((sid, _), _)| sid == story_id)
            .map(|(_, v)| v)
            .filter(|v| keep(&v.doc))
            .collect();
        rows.sort_by(|a, b| {
            a.doc
                .created_at_us
                .cmp(&b.doc.created_at_us)
                .then_with(|| a.doc.id.cmp(&b.doc.id))
        });
        rows
    }

    fn children(&self, story_id: &str, parent_id: Option<&str>) -> Vec<&Versioned<Contribution>> {
        self.contributions_where(story_id, |c| {
            c.parent_contribution_id.as_deref() == parent_id
        })
    }
}

fn membership<T>(rows: &[&Versioned<T>], id_of: impl Fn(&T) -> String) -> Vec<(String, u64)> {
    rows.iter().map(|v| (id_of(&v.doc), v.version)).collect()
}

/// What a transaction observed, re-checked at commit.
#[derive(Debug)]
enum Read {
    Story {
        id: String,
        version: Option<u64>,
    },
    Contribution {
        key: ContributionKey,
        version: Option<u64>,
    },
    Children {
        story_id: String,
        parent_id: Option<String>,
        members: Vec<(String, u64)>,
    },
    StoryContributions {
        story_id: String,
        members: Vec<(String, u64)>,
    },
    AllStories {
        members: Vec<(String, u64)>,
    },
}

impl Read {
    fn still_holds(&self, current: &Collections) -> bool {
        match self {
            Self::Story { id, version } => current.story_version(id) == *version,
            Self::Contribution { key, version } => current.contribution_version(key) == *version,
            Self::Children {
                story_id,
                parent_id,
                members,
            } => {
                let rows = current.children(story_id, parent_id.as_deref());
                membership(&rows, |c| c.id.to_string()) == *members
            }
            Self::StoryContributions { story_id, members } => {
                let rows = current.contributions_where(story_id, |_| true);
                membership(&rows, |c| c.id.to_string()) == *members
            }
            Self::AllStories { members } => {
                let rows = current.stories_newest_first();
                membership(&rows, |s| s.id.to_string()) == *members
            }
        }
    }
}

#[derive(Debug)]
enum Write {
    InsertStory(Story),
    InsertContribution(Contribution),
    PatchContribution {
        key: ContributionKey,
        patch: ContributionPatch,
    },
    StoryStatus {
        id: String,
        status: StoryStatus,
    },
}

struct MemoryTx {
    snapshot: Collections,
    reads: Vec<Read>,
    writes: Vec<Write>,
}

impl MemoryTx {
    const fn new(snapshot: Collections) -> Self {
        Self {
            snapshot,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn pending_contribution(&self, key: &ContributionKey) -> bool {
        self.writes.iter().any(|w| {
            matches!(w, Write::InsertContribution(c) if c.story_id == key.0.as_str() && c.id == key.1.as_str())
        })
    }

    fn pending_story(&self, id: &str) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, Write::InsertStory(s) if s.id == id))
    }
}

fn key(story_id: &str, contribution_id: &str) -> ContributionKey {
    (story_id.to_string(), contribution_id.to_string())
}

impl StoreTx for MemoryTx {
    fn get_story(&mut self, story_id: &str) -> Result<Option<Story>, StoreError> {
        let found = self.snapshot.stories.get(story_id);
        self.reads.push(Read::Story {
            id: story_id.to_string(),
            version: found.map(|v| v.version),
        });
        Ok(found.map(|v| v.doc.clone()))
    }

    fn list_stories(&mut self) -> Result<Vec<Story>, StoreError> {
        let rows = self.snapshot.stories_newest_first();
        let members = membership(&rows, |s| s.id.to_string());
        let stories = rows.into_iter().map(|v| v.doc.clone()).collect();
        self.reads.push(Read::AllStories { members });
        Ok(stories)
    }

    fn get_contribution(
        &mut self,
        story_id: &str,
        contribution_id: &str,
    ) -> Result<Option<Contribution>, StoreError> {
        let key = key(story_id, contribution_id);
        let found = self.snapshot.contributions.get(&key);
        let version = found.map(|v| v.version);
        let doc = found.map(|v| v.doc.clone());
        self.reads.push(Read::Contribution { key, version });
        Ok(doc)
    }

    fn query_children(
        &mut self,
        story_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Contribution>, StoreError> {
        let rows = self.snapshot.children(story_id, parent_id);
        let members = membership(&rows, |c| c.id.to_string());
        let children = rows.into_iter().map(|v| v.doc.clone()).collect();
        self.reads.push(Read::Children {
            story_id: story_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            members,
        });
        Ok(children)
    }

    fn list_contributions(&mut self, story_id: &str) -> Result<Vec<Contribution>, StoreError> {
        let rows = self.snapshot.contributions_where(story_id, |_| true);
        let members = membership(&rows, |c| c.id.to_string());
        let all = rows.into_iter().map(|v| v.doc.clone()).collect();
        self.reads.push(Read::StoryContributions {
            story_id: story_id.to_string(),
            members,
        });
        Ok(all)
    }

    fn insert_story(&mut self, story: &Story) -> Result<(), StoreError> {
        let version = self.snapshot.story_version(&story.id);
        if version.is_some() || self.pending_story(&story.id) {
            return Err(StoreError::InvalidInput(format!(
                "story id already exists: {}",
                story.id
            )));
        }
        self.reads.push(Read::Story {
            id: story.id.to_string(),
            version,
        });
        self.writes.push(Write::InsertStory(story.clone()));
        Ok(())
    }

    fn insert_contribution(&mut self, contribution: &Contribution) -> Result<(), StoreError> {
        let key = key(&contribution.story_id, &contribution.id);
        let version = self.snapshot.contribution_version(&key);
        if version.is_some() || self.pending_contribution(&key) {
            return Err(StoreError::InvalidInput(format!(
                "contribution id already exists: {}",
                contribution.id
            )));
        }
        self.reads.push(Read::Contribution { key, version });
        self.writes
            .push(Write::InsertContribution(contribution.clone()));
        Ok(())
    }

    fn update_contribution(
        &mut self,
        story_id: &str,
        contribution_id: &str,
        patch: &ContributionPatch,
    ) -> Result<(), StoreError> {
        let key = key(story_id, contribution_id);
        match self.snapshot.contribution_version(&key) {
            Some(version) => self.reads.push(Read::Contribution {
                key: key.clone(),
                version: Some(version),
            }),
            None if self.pending_contribution(&key) => {}
            None => return Err(StoreError::contribution_not_found(contribution_id)),
        }
        self.writes.push(Write::PatchContribution { key, patch: *patch });
        Ok(())
    }

    fn update_story_status(
        &mut self,
        story_id: &str,
        status: StoryStatus,
    ) -> Result<(), StoreError> {
        match self.snapshot.story_version(story_id) {
            Some(version) => self.reads.push(Read::Story {
                id: story_id.to_string(),
                version: Some(version),
            }),
            None if self.pending_story(story_id) => {}
            None => return Err(StoreError::story_not_found(story_id)),
        }
        self.writes.push(Write::StoryStatus {
            id: story_id.to_string(),
            status,
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    data: Collections,
    clock: u64,
}

/// In-process [`StoryStore`]. Cheap to construct; intended for tests,
/// simulations, and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    retry: RetryPolicy,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            state: Mutex::default(),
            retry,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn commit(&self, tx: MemoryTx) -> Result<(), StoreError> {
        if tx.writes.is_empty() {
            return Ok(());
        }

        let mut state = self.lock()?;
        if let Some(stale) = tx.reads.iter().find(|r| !r.still_holds(&state.data)) {
            tracing::debug!(read = ?stale, "read-set invalidated by concurrent commit");
            return Err(StoreError::TransientConflict { attempts: 1 });
        }

        let version = state.clock + 1;
        let mut next = state.data.clone();
        for write in tx.writes {
            apply(&mut next, write, version)?;
        }
        state.data = next;
        state.clock = version;
        Ok(())
    }
}

fn apply(data: &mut Collections, write: Write, version: u64) -> Result<(), StoreError> {
    match write {
        Write::InsertStory(story) => {
            data.stories
                .insert(story.id.to_string(), Versioned { version, doc: story });
        }
        Write::InsertContribution(contribution) => {
            let key = key(&contribution.story_id, &contribution.id);
            data.contributions.insert(
                key,
                Versioned {
                    version,
                    doc: contribution,
                },
            );
        }
        Write::PatchContribution { key, patch } => {
            let row = data
                .contributions
                .get_mut(&key)
                .ok_or_else(|| StoreError::contribution_not_found(key.1.clone()))?;
            patch.apply(&mut row.doc);
            row.version = version;
        }
        Write::StoryStatus { id, status } => {
            let row = data
                .stories
                .get_mut(&id)
                .ok_or_else(|| StoreError::story_not_found(id.clone()))?;
            row.doc.status = status;
            row.version = version;
        }
    }
    Ok(())
}

impl StoryStore for MemoryStore {
    fn run_transaction<T, F>(&self, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        self.retry.run(|_attempt| {
            let snapshot = self.lock()?.data.clone();
            let mut tx = MemoryTx::new(snapshot);
            let value = f(&mut tx as &mut dyn StoreTx)?;
            self.commit(tx)?;
            Ok(value)
        })
    }
}
