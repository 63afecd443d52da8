//! Appending branches and reading the branch tree.

use chrono::Utc;

use crate::error::StoreError;
use crate::model::{Contribution, DocId, Identity, NewContribution};
use crate::store::StoryStore;

/// Append a new branch under an existing contribution.
///
/// New branches are never canonical and start with zero likes; only
/// [`crate::canon::record_like`] can promote them.
///
/// # Errors
///
/// [`StoreError::InvalidInput`] for blank/oversized content or tags,
/// [`StoreError::NotFound`] if the story or parent is missing.
pub fn add_contribution<S: StoryStore>(
    store: &S,
    author: &Identity,
    story_id: &str,
    input: &NewContribution,
) -> Result<Contribution, StoreError> {
    let valid = input.validate()?;
    let contribution = Contribution {
        id: DocId::generate(),
        story_id: DocId::new_unchecked(story_id),
        content: valid.content,
        author: author.clone(),
        created_at_us: Utc::now().timestamp_micros(),
        parent_contribution_id: Some(valid.parent_contribution_id),
        likes_count: 0,
        is_canonical: false,
        tags: valid.tags,
    };

    store.run_transaction(|tx| {
        if tx.get_story(story_id)?.is_none() {
            return Err(StoreError::story_not_found(story_id));
        }
        let parent = &input.parent_contribution_id;
        if tx.get_contribution(story_id, parent)?.is_none() {
            return Err(StoreError::contribution_not_found(parent.as_str()));
        }
        tx.insert_contribution(&contribution)
    })?;

    tracing::info!(
        story_id,
        contribution_id = %contribution.id,
        parent = %input.parent_contribution_id,
        "contribution added"
    );
    Ok(contribution)
}

/// Every contribution of a story in creation order.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the story does not exist.
pub fn contributions<S: StoryStore>(
    store: &S,
    story_id: &str,
) -> Result<Vec<Contribution>, StoreError> {
    store.run_read(|tx| {
        if tx.get_story(story_id)?.is_none() {
            return Err(StoreError::story_not_found(story_id));
        }
        tx.list_contributions(story_id)
    })
}

/// The competing branches directly under `parent_id`.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the parent contribution does not exist.
pub fn branches_of<S: StoryStore>(
    store: &S,
    story_id: &str,
    parent_id: &str,
) -> Result<Vec<Contribution>, StoreError> {
    store.run_read(|tx| {
        if tx.get_contribution(story_id, parent_id)?.is_none() {
            return Err(StoreError::contribution_not_found(parent_id));
        }
        tx.query_children(story_id, Some(parent_id))
    })
}

/// The main storyline: the root followed by the canonical child at each
/// level, ending where no child is canonical.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the story does not exist.
pub fn canonical_line<S: StoryStore>(
    store: &S,
    story_id: &str,
) -> Result<Vec<Contribution>, StoreError> {
    let all = contributions(store, story_id)?;
    let mut line: Vec<Contribution> = Vec::new();
    let mut cursor = all.iter().find(|c| c.is_root());
    while let Some(node) = cursor {
        line.push(node.clone());
        // A cycle cannot occur through parent links, but cap the walk anyway.
        if line.len() > all.len() {
            break;
        }
        cursor = all.iter().find(|c| {
            c.is_canonical && c.parent_contribution_id.as_ref() == Some(&node.id)
        });
    }
    Ok(line)
}
