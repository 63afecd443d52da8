use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref, str::FromStr};

use super::ValidationError;

/// Length of generated document ids.
pub const GENERATED_ID_LEN: usize = 20;

/// Upper bound for caller-supplied ids.
pub const MAX_ID_LEN: usize = 64;

/// Identifier of a story or contribution document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Generate a fresh random id (20 ASCII alphanumerics).
    #[must_use]
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Validate a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the id is empty, too long, or has
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::new("id", "must not be empty"));
        }
        if raw.len() > MAX_ID_LEN {
            return Err(ValidationError::new(
                "id",
                format!("must be <= {MAX_ID_LEN} characters"),
            ));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ValidationError::new(
                "id",
                format!("contains invalid character {bad:?}"),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// Wrap an id that is already known to be well-formed (e.g. read back
    /// from a store).
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for DocId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for DocId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DocId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
