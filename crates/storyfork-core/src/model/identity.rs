use serde::{Deserialize, Serialize};

use super::ValidationError;

pub const ANONYMOUS_UID: &str = "anonymous";
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// The author of a story or contribution.
///
/// Token verification happens upstream; by the time an identity reaches the
/// core it is trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: String,
}

impl Identity {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if either field is blank.
    pub fn new(uid: &str, display_name: &str) -> Result<Self, ValidationError> {
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(ValidationError::new("author", "uid must not be empty"));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ValidationError::new("author", "display name must not be empty"));
        }
        Ok(Self {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
        })
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            uid: ANONYMOUS_UID.to_string(),
            display_name: ANONYMOUS_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.uid == ANONYMOUS_UID
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}
