//! Ruleset configuration - the constants progression and derivation read.
//!
//! `Ruleset::default()` is the core Saga Edition rules. Hosts may override
//! any field from a JSON document; omitted fields keep their defaults.

use serde::{Deserialize, Serialize};

use crate::stats::StackingTable;
use crate::value_objects::ConditionStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ruleset {
    /// Bonus-type stacking rules
    pub stacking: StackingTable,
    /// Character levels at which ability increases are taken
    pub ability_increase_levels: Vec<u8>,
    /// Number of distinct abilities raised by one point at each of those levels
    pub ability_increases_per_level: u8,
    /// A general feat is gained at level 1 and every Nth level
    pub general_feat_interval: u8,
    pub max_character_level: u8,
    /// Flat bonus for a trained skill
    pub trained_skill_bonus: i32,
    /// Base of every defense before level and ability modifiers
    pub defense_base: i32,
    /// First character level grants this many times the hit die
    pub first_level_hit_die_multiplier: i32,
    /// Minimum trained skills at first level regardless of INT
    pub minimum_first_level_skills: i32,
    /// Penalty per condition-track step, top to bottom
    pub condition_penalties: [i32; 6],
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            stacking: StackingTable::saga_default(),
            ability_increase_levels: vec![4, 8, 12, 16, 20],
            ability_increases_per_level: 2,
            general_feat_interval: 3,
            max_character_level: 20,
            trained_skill_bonus: 5,
            defense_base: 10,
            first_level_hit_die_multiplier: 3,
            minimum_first_level_skills: 1,
            condition_penalties: [0, -1, -2, -5, -10, -10],
        }
    }
}

impl Ruleset {
    /// Number of ability increases owed on reaching `character_level`.
    pub fn ability_increases_at(&self, character_level: u8) -> u8 {
        if self.ability_increase_levels.contains(&character_level) {
            self.ability_increases_per_level
        } else {
            0
        }
    }

    /// Number of general feats owed on reaching `character_level`.
    pub fn general_feats_at(&self, character_level: u8) -> u8 {
        let interval = self.general_feat_interval.max(1);
        u8::from(character_level == 1 || character_level % interval == 0)
    }

    pub fn condition_penalty(&self, step: ConditionStep) -> i32 {
        self.condition_penalties[step.index()]
    }
}
