//! Story lifecycle: creation with an opening contribution, reads, and status
//! changes.

use chrono::Utc;

use crate::error::StoreError;
use crate::model::{Contribution, DocId, Identity, NewStory, Story, StoryStatus};
use crate::store::StoryStore;

/// Create a story and its root contribution in one transaction.
///
/// The root is canonical from birth and starts with zero likes.
///
/// # Errors
///
/// [`StoreError::InvalidInput`] for a blank/oversized title or content; store
/// errors otherwise.
pub fn create_story<S: StoryStore>(
    store: &S,
    author: &Identity,
    input: &NewStory,
) -> Result<Story, StoreError> {
    let valid = input.validate()?;
    let now = Utc::now().timestamp_micros();
    let story_id = DocId::generate();
    let root_id = DocId::generate();

    let story = Story {
        id: story_id.clone(),
        title: valid.title,
        author: author.clone(),
        created_at_us: now,
        status: StoryStatus::Ongoing,
        cover_image_url: Some(valid.cover_image_url),
        synopsis: valid.synopsis,
        first_contribution_id: Some(root_id.clone()),
    };
    let root = Contribution {
        id: root_id,
        story_id,
        content: valid.content,
        author: author.clone(),
        created_at_us: now,
        parent_contribution_id: None,
        likes_count: 0,
        is_canonical: true,
        tags: None,
    };

    store.run_transaction(|tx| {
        tx.insert_story(&story)?;
        tx.insert_contribution(&root)
    })?;

    tracing::info!(story_id = %story.id, author = %author.uid, "story created");
    Ok(story)
}

/// # Errors
///
/// [`StoreError::NotFound`] if the story does not exist.
pub fn get_story<S: StoryStore>(store: &S, story_id: &str) -> Result<Story, StoreError> {
    store
        .run_read(|tx| tx.get_story(story_id))?
        .ok_or_else(|| StoreError::story_not_found(story_id))
}

/// All stories, newest first.
///
/// # Errors
///
/// Propagates store failures.
pub fn list_stories<S: StoryStore>(store: &S) -> Result<Vec<Story>, StoreError> {
    store.run_read(|tx| tx.list_stories())
}

/// Change a story's lifecycle status and return the updated story.
///
/// # Errors
///
/// [`StoreError::NotFound`] if the story does not exist.
pub fn set_status<S: StoryStore>(
    store: &S,
    story_id: &str,
    status: StoryStatus,
) -> Result<Story, StoreError> {
    let story = store.run_transaction(|tx| {
        let mut story = tx
            .get_story(story_id)?
            .ok_or_else(|| StoreError::story_not_found(story_id))?;
        if story.status != status {
            tx.update_story_status(story_id, status)?;
            story.status = status;
        }
        Ok(story)
    })?;
    tracing::info!(story_id, %status, "story status set");
    Ok(story)
}

#[cfg(test)]
mod tests {
    use super::{create_story, get_story, list_stories, set_status};
    use crate::model::{Identity, NewStory, StoryStatus, placeholder_cover_url};
    use crate::store::{MemoryStore, StoryStore};

    fn new_story(title: &str) -> NewStory {
        NewStory {
            title: title.into(),
            content: "The lamp went out at midnight.".into(),
            cover_image_url: None,
        }
    }

    #[test]
    fn create_story_writes_canonical_root() {
        let store = MemoryStore::new();
        let author = Identity::new("u1", "Ada").expect("identity");
        let story = create_story(&store, &author, &new_story("Lamp")).expect("create");

        assert_eq!(story.status, StoryStatus::Ongoing);
        assert_eq!(story.synopsis, "The lamp went out at midnight.");
        assert_eq!(
            story.cover_image_url.as_deref(),
            Some(placeholder_cover_url("The lamp went out at midnight.").as_str())
        );
        let root_id = story.first_contribution_id.clone().expect("root id");
        let root = store
            .get_contribution(&story.id, &root_id)
            .expect("read root")
            .expect("root exists");
        assert!(root.is_root());
        assert!(root.is_canonical);
        assert_eq!(root.likes_count, 0);
        assert_eq!(root.author, author);
    }

    #[test]
    fn invalid_story_is_rejected_without_writes() {
        let store = MemoryStore::new();
        let err = create_story(&store, &Identity::anonymous(), &new_story("  "))
            .expect_err("blank title");
        assert!(err.to_string().contains("title"));
        assert!(list_stories(&store).expect("list").is_empty());
    }

    #[test]
    fn status_round_trip_and_missing_story() {
        let store = MemoryStore::new();
        let story = create_story(&store, &Identity::anonymous(), &new_story("Lamp")).expect("create");
        let done = set_status(&store, &story.id, StoryStatus::Completed).expect("complete");
        assert_eq!(done.status, StoryStatus::Completed);
        assert_eq!(
            get_story(&store, &story.id).expect("get").status,
            StoryStatus::Completed
        );

        let err = get_story(&store, "missing").expect_err("no such story");
        assert!(err.is_not_found());
    }
}
