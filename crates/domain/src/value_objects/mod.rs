//! Value objects - immutable values with no identity of their own.

mod ability;
mod condition;
mod modifier;

pub use ability::{ability_modifier, Ability, AbilityScores};
pub use condition::ConditionStep;
pub use modifier::{BonusType, Modifier, ModifierGrant, ModifierSource, Statistic};
