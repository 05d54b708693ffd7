use std::{fmt, time::Duration};

use shared::error::ErrorCode;
use thiserror::Error;

/// Failure reported by a [`crate::DocumentStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("{message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("invalid payload from backend: {0}")]
    InvalidPayload(String),
    #[error("subscription stream ended")]
    StreamEnded,
}

impl StoreError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

/// Input rejected locally, before any backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter an album name!")]
    MissingAlbumName,
    #[error("Album name cannot be empty!")]
    EmptyAlbumName,
    #[error("Please enter all fields: name, email, and password")]
    MissingUserFields,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

/// A mutation that was issued but did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("{source}")]
    Backend {
        kind: MutationKind,
        #[source]
        source: StoreError,
    },
    #[error("{kind} timed out after {}ms", timeout.as_millis())]
    TimedOut { kind: MutationKind, timeout: Duration },
    #[error("{kind} was cancelled before completing")]
    Cancelled { kind: MutationKind },
}

impl OperationError {
    pub fn kind(&self) -> MutationKind {
        match self {
            OperationError::Backend { kind, .. }
            | OperationError::TimedOut { kind, .. }
            | OperationError::Cancelled { kind } => *kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("no form is open")]
    ModalClosed,
    /// Screens that show loading while mutating refuse new submits until the
    /// pending ones settle.
    #[error("still saving, try again once pending changes finish")]
    Busy,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
