//! Progression operation errors.

use crate::infrastructure::ports::{CommitError, RepoError};
use saga_domain::{CharacterId, ProgressionError};

/// Errors that can occur during progression operations.
#[derive(Debug, thiserror::Error)]
pub enum ProgressionUseCaseError {
    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    #[error("Progression error: {0}")]
    Progression(#[from] ProgressionError),

    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl ProgressionUseCaseError {
    /// The domain error, when there is one.
    pub fn progression(&self) -> Option<&ProgressionError> {
        match self {
            Self::Progression(err) => Some(err),
            _ => None,
        }
    }

    /// Whether re-reading the character and trying again can succeed.
    pub fn is_retryable(&self) -> bool {
        self.progression().is_some_and(ProgressionError::is_retryable)
    }
}

impl From<CommitError> for ProgressionUseCaseError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::Rejected(err) => Self::Progression(err),
            CommitError::Repo(err) => Self::Repo(err),
        }
    }
}
