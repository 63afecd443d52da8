use serde::{Deserialize, Serialize};

use super::{DocId, Identity, MAX_CONTENT_CHARS, ValidationError, clean_text};

/// Maximum characters for a single character tag.
pub const MAX_TAG_CHARS: usize = 32;

/// Free-form metadata attached to a contribution. Ignored by promotion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributionTags {
    pub characters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ContributionTags {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.timeline.is_none() && self.location.is_none()
    }

    /// Trim every tag and drop duplicate character names.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for blank or oversized tags.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let mut characters: Vec<String> = Vec::with_capacity(self.characters.len());
        for name in &self.characters {
            let name = clean_text("character tag", name, MAX_TAG_CHARS)?;
            if !characters.contains(&name) {
                characters.push(name);
            }
        }
        let timeline = self
            .timeline
            .as_deref()
            .map(|t| clean_text("timeline tag", t, MAX_CONTENT_CHARS))
            .transpose()?;
        let location = self
            .location
            .as_deref()
            .map(|l| clean_text("location tag", l, MAX_CONTENT_CHARS))
            .transpose()?;
        Ok(Self {
            characters,
            timeline,
            location,
        })
    }
}

/// A node in a story's branch tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: DocId,
    pub story_id: DocId,
    pub content: String,
    pub author: Identity,
    pub created_at_us: i64,
    pub parent_contribution_id: Option<DocId>,
    pub likes_count: u64,
    pub is_canonical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<ContributionTags>,
}

impl Contribution {
    /// The story's opening contribution has no parent.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_contribution_id.is_none()
    }
}

/// Caller input for appending a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    pub content: String,
    pub parent_contribution_id: DocId,
    pub tags: Option<ContributionTags>,
}

impl NewContribution {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for blank or oversized content or tags.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let content = clean_text("content", &self.content, MAX_CONTENT_CHARS)?;
        let tags = match &self.tags {
            Some(tags) => Some(tags.validate()?).filter(|t| !t.is_empty()),
            None => None,
        };
        Ok(Self {
            content,
            parent_contribution_id: self.parent_contribution_id.clone(),
            tags,
        })
    }
}

/// Partial field write applied to one contribution inside a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContributionPatch {
    pub likes_count: Option<u64>,
    pub is_canonical: Option<bool>,
}

impl ContributionPatch {
    #[must_use]
    pub const fn likes(count: u64) -> Self {
        Self {
            likes_count: Some(count),
            is_canonical: None,
        }
    }

    #[must_use]
    pub const fn canonical(flag: bool) -> Self {
        Self {
            likes_count: None,
            is_canonical: Some(flag),
        }
    }

    /// Apply the patch to an in-memory copy.
    pub fn apply(&self, target: &mut Contribution) {
        if let Some(likes) = self.likes_count {
            target.likes_count = likes;
        }
        if let Some(flag) = self.is_canonical {
            target.is_canonical = flag;
        }
    }
}
