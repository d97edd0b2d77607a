//! Saga progression domain: reference data, ruleset, derived statistics,
//! prerequisite validation, and progression resolution.
//!
//! Everything in this crate is synchronous and side-effect free. State only
//! changes when the engine commits a [`Delta`].

pub mod catalog;
pub mod entities;
pub mod error;
pub mod ids;
pub mod progression;
pub mod requirements;
pub mod ruleset;
pub mod stats;
pub mod value_objects;

pub use catalog::{CatalogDocument, InMemoryCatalog, ReferenceCatalog};
pub use entities::{
    BabProgression, ClassDefinition, DefenseBonuses, FeatDefinition, LevelGrant, SkillDefinition,
    TalentDefinition, TalentTree,
};
pub use error::ProgressionError;
pub use ids::{CharacterId, ClassId, FeatId, ItemId, SkillId, TalentId, TalentTreeId};
pub use progression::{
    CharacterSnapshot, ChoiceSlot, ClassLevelEntry, Collection, Delta, DeltaBuilder, Field,
    LevelChoices, LevelPlan, MissingSelection, ProgressionIntent, ProgressionResolver,
    StateVersion, TalentOption,
};
pub use requirements::{
    ClauseId, FailedClause, PendingSelections, PrerequisiteValidator, RequirementExpression,
    ValidationReport,
};
pub use ruleset::Ruleset;
pub use stats::{
    base_attack_for, Breakdown, DerivedStatCalculator, DerivedStats, Stacking, StackingTable,
};
pub use value_objects::{
    ability_modifier, Ability, AbilityScores, BonusType, ConditionStep, Modifier, ModifierGrant,
    ModifierSource, Statistic,
};
