//! Error taxonomy for progression operations.
//!
//! `Validation` and `IncompleteIntent` are expected, user-facing outcomes and
//! carry structured data the caller can render. `UnknownIdentifier` and
//! `UnknownTypeTag` point at defective reference data and are never replaced
//! by a default. `ConcurrentModification` means the caller must re-read the
//! character and try again.

use thiserror::Error;

use crate::progression::{MissingSelection, StateVersion};
use crate::requirements::ValidationReport;
use crate::value_objects::BonusType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressionError {
    /// One or more requirement clauses are unmet.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// A required choice slot was left unfilled.
    #[error("Incomplete intent: {}", describe_missing(.0))]
    IncompleteIntent(Vec<MissingSelection>),

    /// A catalog lookup found no exact match.
    #[error("Unknown {kind} identifier: {id}")]
    UnknownIdentifier { kind: &'static str, id: String },

    /// A modifier carries a bonus type absent from the stacking table.
    #[error("Unknown bonus type: {0}")]
    UnknownTypeTag(BonusType),

    /// The character changed since the snapshot the delta was resolved from.
    #[error("Concurrent modification: expected version {expected}, found {actual}")]
    ConcurrentModification {
        expected: StateVersion,
        actual: StateVersion,
    },

    /// A delta entry cannot be applied to the snapshot it targets.
    #[error("Invalid delta: {0}")]
    InvalidDelta(String),
}

impl ProgressionError {
    pub fn unknown(kind: &'static str, id: impl ToString) -> Self {
        Self::UnknownIdentifier {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_delta(message: impl Into<String>) -> Self {
        Self::InvalidDelta(message.into())
    }

    /// Whether retrying from a fresh snapshot can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Whether this is an expected, player-facing outcome rather than a defect.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::IncompleteIntent(_))
    }
}

fn describe_missing(missing: &[MissingSelection]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
