//! Story and contribution documents plus the validation applied before they
//! reach a store.

pub mod contribution;
pub mod id;
pub mod identity;
pub mod story;

pub use contribution::{Contribution, ContributionPatch, ContributionTags, NewContribution};
pub use id::DocId;
pub use identity::Identity;
pub use story::{NewStory, Story, StoryStatus, placeholder_cover_url};

use crate::error::{ErrorCode, StoreError};

/// Maximum characters accepted for story openings and contributions.
pub const MAX_CONTENT_CHARS: usize = 8_192;

/// Maximum characters accepted for a story title.
pub const MAX_TITLE_CHARS: usize = 120;

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        if self.field == "status" {
            ErrorCode::InvalidEnumValue
        } else {
            ErrorCode::InvalidInput
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Trim `raw` and check it is non-empty and at most `max_chars` long.
pub(crate) fn clean_text(
    field: &'static str,
    raw: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(ValidationError::new(
            field,
            format!("must be <= {max_chars} characters (got {len})"),
        ));
    }
    Ok(trimmed.to_string())
}
