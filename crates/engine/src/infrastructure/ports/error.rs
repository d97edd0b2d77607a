//! Error types for port operations.

use saga_domain::ProgressionError;

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Entity not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Storage operation failed - includes operation name for tracing.
    #[error("Storage error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl RepoError {
    /// Create a NotFound error with entity type and ID context.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create a Storage error with operation context.
    pub fn storage(operation: &'static str, message: impl ToString) -> Self {
        Self::Storage {
            operation,
            message: message.to_string(),
        }
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Why a character record refused a delta.
///
/// `Rejected` is the store saying no to this particular delta (stale base
/// version, entries that do not fit the record). `Repo` is the store itself
/// failing.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error(transparent)]
    Rejected(#[from] ProgressionError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_domain::StateVersion;

    #[test]
    fn not_found_names_entity() {
        let err = RepoError::not_found("Character", "abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Character not found: abc");
    }

    #[test]
    fn rejected_commit_shows_domain_message() {
        let err = CommitError::from(ProgressionError::ConcurrentModification {
            expected: StateVersion::new(1),
            actual: StateVersion::new(2),
        });
        assert_eq!(
            err.to_string(),
            "Concurrent modification: expected version 1, found 2"
        );
    }
}
