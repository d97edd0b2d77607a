//! Requirement expressions and the prerequisite validator.

mod expression;
mod pending;
mod validator;

pub use expression::{ClauseId, FailedClause, RequirementExpression, ValidationReport};
pub use pending::PendingSelections;
pub use validator::PrerequisiteValidator;
