//! Shared fixtures for storyfork-core integration tests.

#![allow(dead_code)]

use storyfork_core::branches::add_contribution;
use storyfork_core::model::{Contribution, DocId, Identity, NewContribution, NewStory};
use storyfork_core::stories::create_story;
use storyfork_core::store::StoryStore;

/// A story with a root and some branches directly under it.
pub struct Fixture {
    pub story_id: DocId,
    pub root: DocId,
    pub branches: Vec<DocId>,
}

pub fn seed<S: StoryStore>(store: &S, branch_count: usize) -> Fixture {
    let who = Identity::new("tester", "Tester").expect("identity");
    let story = create_story(
        store,
        &who,
        &NewStory {
            title: "Lighthouse".into(),
            content: "The keeper counted ships.".into(),
            cover_image_url: None,
        },
    )
    .expect("create story");
    let root = story.first_contribution_id.clone().expect("root id");
    let branches = (0..branch_count)
        .map(|i| add_branch(store, &story.id, &root, &format!("branch {i}")))
        .collect();
    Fixture {
        story_id: story.id,
        root,
        branches,
    }
}

pub fn add_branch<S: StoryStore>(store: &S, story_id: &str, parent: &DocId, text: &str) -> DocId {
    add_contribution(
        store,
        &Identity::anonymous(),
        story_id,
        &NewContribution {
            content: text.into(),
            parent_contribution_id: parent.clone(),
            tags: None,
        },
    )
    .expect("add branch")
    .id
}

pub fn fetch<S: StoryStore>(store: &S, story_id: &str, id: &str) -> Contribution {
    store
        .get_contribution(story_id, id)
        .expect("read contribution")
        .expect("contribution exists")
}

/// Once any sibling reaches the threshold, some sibling is canonical and
/// holds the maximum like count.
pub fn assert_canonical_leads(siblings: &[Contribution], threshold: u64) {
    let max = siblings.iter().map(|c| c.likes_count).max().unwrap_or(0);
    let canonical: Vec<&Contribution> = siblings.iter().filter(|c| c.is_canonical).collect();
    assert!(canonical.len() <= 1, "more than one canonical sibling");
    if max >= threshold {
        let champion = canonical.first().expect("a canonical sibling at threshold");
        assert_eq!(champion.likes_count, max, "canonical sibling is not the leader");
    } else {
        assert!(canonical.is_empty(), "promotion below threshold");
    }
}
