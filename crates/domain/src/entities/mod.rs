//! Reference-data entities supplied by the catalog.

mod class;
mod feat;
mod skill;
mod talent;

pub use class::{BabProgression, ClassDefinition, DefenseBonuses, LevelGrant};
pub use feat::FeatDefinition;
pub use skill::SkillDefinition;
pub use talent::{TalentDefinition, TalentTree};
