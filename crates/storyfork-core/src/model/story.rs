use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{DocId, Identity, MAX_CONTENT_CHARS, MAX_TITLE_CHARS, ValidationError, clean_text};

/// Characters of the opening contribution copied into the synopsis.
pub const SYNOPSIS_CHARS: usize = 160;

/// Characters of the opening contribution printed on a placeholder cover.
pub const COVER_TEXT_CHARS: usize = 60;

const COVER_PLACEHOLDER_BASE: &str = "https://placehold.co/960x540/0f172a/ffffff.png?text=";
const COVER_PLACEHOLDER_TEXT: &str = "Story Cover";

/// Placeholder cover for a story created without one: the opening text,
/// truncated and URL-encoded into a placehold.co image.
#[must_use]
pub fn placeholder_cover_url(content: &str) -> String {
    let text: String = content.chars().take(COVER_TEXT_CHARS).collect();
    let text = if text.is_empty() {
        COVER_PLACEHOLDER_TEXT
    } else {
        text.as_str()
    };
    format!("{COVER_PLACEHOLDER_BASE}{}", urlencoding::encode(text))
}

/// Story lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    #[default]
    Ongoing,
    Completed,
}

impl StoryStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ongoing" => Ok(Self::Ongoing),
            "completed" => Ok(Self::Completed),
            other => Err(ValidationError::new(
                "status",
                format!("must be ongoing or completed (got '{other}')"),
            )),
        }
    }
}

/// Root aggregate: one story and a pointer to its opening contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: DocId,
    pub title: String,
    pub author: Identity,
    pub created_at_us: i64,
    pub status: StoryStatus,
    pub cover_image_url: Option<String>,
    pub synopsis: String,
    pub first_contribution_id: Option<DocId>,
}

/// Caller input for creating a story.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStory {
    pub title: String,
    pub content: String,
    pub cover_image_url: Option<String>,
}

/// [`NewStory`] after trimming and bounds checks. A missing cover is
/// replaced by [`placeholder_cover_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidStory {
    pub title: String,
    pub content: String,
    pub cover_image_url: String,
    pub synopsis: String,
}

impl NewStory {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank or oversized title or
    /// content.
    pub fn validate(&self) -> Result<ValidStory, ValidationError> {
        let title = clean_text("title", &self.title, MAX_TITLE_CHARS)?;
        let content = clean_text("content", &self.content, MAX_CONTENT_CHARS)?;
        let cover_image_url = self
            .cover_image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map_or_else(|| placeholder_cover_url(&content), str::to_string);
        let synopsis = content.chars().take(SYNOPSIS_CHARS).collect();
        Ok(ValidStory {
            title,
            content,
            cover_image_url,
            synopsis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{NewStory, SYNOPSIS_CHARS, StoryStatus, placeholder_cover_url};

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Ongoing".parse::<StoryStatus>(), Ok(StoryStatus::Ongoing));
        assert_eq!(" completed ".parse::<StoryStatus>(), Ok(StoryStatus::Completed));
        let err = "paused".parse::<StoryStatus>().expect_err("unknown status");
        assert_eq!(err.field, "status");
    }

    #[test]
    fn validate_derives_synopsis_from_content() {
        let story = NewStory {
            title: "  The Lighthouse ".into(),
            content: "x".repeat(500),
            cover_image_url: Some("   ".into()),
        };
        let valid = story.validate().expect("valid story");
        assert_eq!(valid.title, "The Lighthouse");
        assert_eq!(valid.synopsis.chars().count(), SYNOPSIS_CHARS);
        assert_eq!(valid.cover_image_url, placeholder_cover_url(&"x".repeat(500)));
    }

    #[test]
    fn placeholder_cover_encodes_truncated_opening() {
        assert_eq!(
            placeholder_cover_url("Fog rolled in & stayed"),
            "https://placehold.co/960x540/0f172a/ffffff.png?text=Fog%20rolled%20in%20%26%20stayed"
        );
        let long = placeholder_cover_url(&"a".repeat(200));
        assert!(long.ends_with(&format!("text={}", "a".repeat(60))));
        assert!(placeholder_cover_url("").ends_with("text=Story%20Cover"));
    }

    #[test]
    fn given_cover_is_kept() {
        let story = NewStory {
            title: "Harbor".into(),
            content: "Fog rolled in.".into(),
            cover_image_url: Some(" https://example.test/c.png ".into()),
        };
        let valid = story.validate().expect("valid story");
        assert_eq!(valid.cover_image_url, "https://example.test/c.png");
    }

    #[test]
    fn validate_rejects_blank_title() {
        let story = NewStory {
            title: " ".into(),
            content: "Once".into(),
            cover_image_url: None,
        };
        assert_eq!(story.validate().expect_err("blank title").field, "title");
    }
}
