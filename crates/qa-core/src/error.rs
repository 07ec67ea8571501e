//! Store error handling
//!
//! Lookups report a missing entity as `None`. Operations that mutate an
//! entity addressed by id report a missing target, a rejected input or a
//! refused permission through [`StoreError`] so callers can branch on it.

use thiserror::Error;

use crate::table::TableError;

/// Errors that can occur during store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Input was rejected
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The addressed entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The acting user may not perform this operation
    #[error("Permission denied: {0}")]
    Permission(String),

    /// A user with this name (compared case-insensitively) already exists
    #[error("User name '{0}' is already taken")]
    UsernameTaken(String),

    /// Table bookkeeping was violated, such as a registration landing on
    /// an occupied or unrepresentable id
    #[error("Integrity violation: {0}")]
    Integrity(#[from] TableError),
}

impl StoreError {
    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        StoreError::NotFound(what.to_string())
    }

    /// Check if the caller can fix this by changing its input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::Validation { .. } | StoreError::UsernameTaken(_)
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::Validation { .. } => Some("Correct the highlighted value and try again."),
            StoreError::UsernameTaken(_) => Some("Pick a different user name."),
            StoreError::Permission(_) => {
                Some("Only the owner or a moderator may change this content.")
            }
            _ => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
