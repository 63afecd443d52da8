use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    StoryNotFound,
    ContributionNotFound,
    InvalidInput,
    InvalidEnumValue,
    TransientConflict,
    StoreUnavailable,
    InvariantViolated,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::StoryNotFound => "E2001",
            Self::ContributionNotFound => "E2002",
            Self::InvalidInput => "E2003",
            Self::InvalidEnumValue => "E2004",
            Self::TransientConflict => "E5001",
            Self::StoreUnavailable => "E5002",
            Self::InvariantViolated => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::StoryNotFound => "Story not found",
            Self::ContributionNotFound => "Contribution not found",
            Self::InvalidInput => "Invalid input",
            Self::InvalidEnumValue => "Invalid status value",
            Self::TransientConflict => "Transaction conflict",
            Self::StoreUnavailable => "Store unavailable",
            Self::InvariantViolated => "Canon invariant violated",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sf init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .storyfork/config.toml and retry."),
            Self::StoryNotFound | Self::ContributionNotFound => None,
            Self::InvalidInput => Some("Check that text fields are non-empty and within limits."),
            Self::InvalidEnumValue => Some("Use one of: ongoing, completed."),
            Self::TransientConflict => Some("Another writer touched the same branch; retry."),
            Self::StoreUnavailable => Some("Check disk space, permissions, and the database path."),
            Self::InvariantViolated => Some("Report a bug with `sf verify --json` output."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Kind of document a [`StoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Story,
    Contribution,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Story => f.write_str("story"),
            Self::Contribution => f.write_str("contribution"),
        }
    }
}

/// Errors surfaced by story stores and the operations built on them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A concurrent writer invalidated the transaction's reads.
    ///
    /// Inside a store this signals a single failed attempt; once it escapes
    /// `run_transaction` the retry budget is spent.
    #[error("transaction conflict after {attempts} attempt(s)")]
    TransientConflict { attempts: u32 },

    /// Underlying I/O or database failure.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Caller-supplied data failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn story_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Story,
            id: id.into(),
        }
    }

    pub fn contribution_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Contribution,
            id: id.into(),
        }
    }

    pub fn unavailable(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Unavailable(err.into())
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound {
                kind: EntityKind::Story,
                ..
            } => ErrorCode::StoryNotFound,
            Self::NotFound {
                kind: EntityKind::Contribution,
                ..
            } => ErrorCode::ContributionNotFound,
            Self::TransientConflict { .. } => ErrorCode::TransientConflict,
            Self::Unavailable(_) => ErrorCode::StoreUnavailable,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether the caller may retry the whole operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientConflict { .. })
    }

    /// Whether this is a "no such document" failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::TransientConflict { attempts: 1 }
            }
            other => Self::unavailable(other),
        }
    }
}
