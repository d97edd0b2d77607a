//! Skill reference data.

use serde::{Deserialize, Serialize};

use crate::ids::SkillId;
use crate::value_objects::Ability;

/// A skill and the ability it keys off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkillDefinition {
    pub id: SkillId,
    pub name: String,
    pub ability: Ability,
}

impl SkillDefinition {
    pub fn new(id: impl Into<SkillId>, name: impl Into<String>, ability: Ability) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ability,
        }
    }
}
