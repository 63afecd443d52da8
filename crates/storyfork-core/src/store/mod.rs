//! Transactional document store contract.
//!
//! A store holds two collections, stories and their contributions, and runs
//! closures atomically through [`StoryStore::run_transaction`]. Implementations
//! must give the closure a consistent snapshot covering every document and
//! child query it reads, and must re-run the closure from the start when a
//! concurrent commit invalidates those reads.
//!
//! - [`memory::MemoryStore`]: optimistic, version-checked, in-process
//! - [`crate::db::SqliteStore`]: `BEGIN IMMEDIATE` transactions over `SQLite`

pub mod memory;

use std::time::Duration;

use crate::error::StoreError;
use crate::model::{Contribution, ContributionPatch, Story, StoryStatus};

pub use memory::MemoryStore;

/// Default number of attempts before a conflict is surfaced to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between attempts (multiplied by the attempt number).
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Read and write handles available inside a transaction.
///
/// Reads observe the snapshot the transaction started from. Whether they also
/// observe the transaction's own earlier writes is store-specific, so callers
/// should finish reading before they write.
pub trait StoreTx {
    /// # Errors
    ///
    /// Propagates store failures.
    fn get_story(&mut self, story_id: &str) -> Result<Option<Story>, StoreError>;

    /// All stories, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn list_stories(&mut self) -> Result<Vec<Story>, StoreError>;

    /// # Errors
    ///
    /// Propagates store failures.
    fn get_contribution(
        &mut self,
        story_id: &str,
        contribution_id: &str,
    ) -> Result<Option<Contribution>, StoreError>;

    /// Contributions of `story_id` whose parent is `parent_id`, in creation
    /// order. `None` selects the story's root.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn query_children(
        &mut self,
        story_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Contribution>, StoreError>;

    /// Every contribution of a story in creation order.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn list_contributions(&mut self, story_id: &str) -> Result<Vec<Contribution>, StoreError>;

    /// # Errors
    ///
    /// Fails with [`StoreError::InvalidInput`] if the id is taken.
    fn insert_story(&mut self, story: &Story) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Fails with [`StoreError::InvalidInput`] if the id is taken.
    fn insert_contribution(&mut self, contribution: &Contribution) -> Result<(), StoreError>;

    /// Partial field write.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::NotFound`] if the contribution does not exist.
    fn update_contribution(
        &mut self,
        story_id: &str,
        contribution_id: &str,
        patch: &ContributionPatch,
    ) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Fails with [`StoreError::NotFound`] if the story does not exist.
    fn update_story_status(&mut self, story_id: &str, status: StoryStatus)
    -> Result<(), StoreError>;
}

/// A store that can run closures as serializable transactions.
pub trait StoryStore: Send + Sync {
    /// Run `f` atomically. The closure may be invoked more than once when a
    /// concurrent commit conflicts with it, so it must not have side effects
    /// outside the transaction handle.
    ///
    /// # Errors
    ///
    /// Returns the closure's error (after rolling back), or
    /// [`StoreError::TransientConflict`] once the retry budget is spent.
    fn run_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T, StoreError>;

    /// Run a closure that only reads. It sees the same consistent snapshot as
    /// [`Self::run_transaction`], but a store may serve it without taking its
    /// write lock. Closures passed here must not call the write methods.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run_transaction`].
    fn run_read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<T, StoreError>,
    {
        self.run_transaction(f)
    }

    /// Read one contribution outside of any caller transaction.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn get_contribution(
        &self,
        story_id: &str,
        contribution_id: &str,
    ) -> Result<Option<Contribution>, StoreError> {
        self.run_read(|tx| tx.get_contribution(story_id, contribution_id))
    }

    /// Read the children of `parent_id` outside of any caller transaction.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn query_children(
        &self,
        story_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<Contribution>, StoreError> {
        self.run_read(|tx| tx.query_children(story_id, parent_id))
    }
}

/// How many times a conflicting transaction is re-run, and how long to wait
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` until it succeeds, fails with a non-conflict error, or
    /// the attempt budget is spent. The attempt number (1-based) is passed in.
    ///
    /// # Errors
    ///
    /// Returns the first non-conflict error, or
    /// [`StoreError::TransientConflict`] carrying the number of attempts made.
    pub fn run<T>(
        &self,
        mut attempt: impl FnMut(u32) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 0;
        loop {
            n += 1;
            match attempt(n) {
                Err(StoreError::TransientConflict { .. }) if n < max_attempts => {
                    tracing::debug!(attempt = n, max_attempts, "transaction conflict, retrying");
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff * n);
                    }
                }
                Err(StoreError::TransientConflict { .. }) => {
                    tracing::warn!(attempts = n, "transaction conflict, retries exhausted");
                    return Err(StoreError::TransientConflict { attempts: n });
                }
                other => return other,
            }
        }
    }
}
