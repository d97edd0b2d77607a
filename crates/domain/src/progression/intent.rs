//! Progression intents and choice slots.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ClassId, FeatId, SkillId, TalentId};
use crate::value_objects::Ability;

/// A requested advancement: one level in `class_id`, with every decision
/// the level requires already made.
///
/// Selections are evaluated in a fixed order (ability increases, trained
/// skills, multiclass feat, general feats, bonus feats, talents), each one
/// against the character plus the selections before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionIntent {
    pub class_id: ClassId,
    /// The character level being reached (current level + 1)
    pub target_level: u8,
    #[serde(default)]
    pub ability_increases: Vec<Ability>,
    #[serde(default)]
    pub trained_skills: Vec<SkillId>,
    #[serde(default)]
    pub multiclass_feat: Option<FeatId>,
    #[serde(default)]
    pub general_feats: Vec<FeatId>,
    #[serde(default)]
    pub bonus_feats: Vec<FeatId>,
    #[serde(default)]
    pub talents: Vec<TalentId>,
}

impl ProgressionIntent {
    pub fn new(class_id: impl Into<ClassId>, target_level: u8) -> Self {
        Self {
            class_id: class_id.into(),
            target_level,
            ability_increases: Vec::new(),
            trained_skills: Vec::new(),
            multiclass_feat: None,
            general_feats: Vec::new(),
            bonus_feats: Vec::new(),
            talents: Vec::new(),
        }
    }

    pub fn with_ability_increase(mut self, ability: Ability) -> Self {
        self.ability_increases.push(ability);
        self
    }

    pub fn with_trained_skill(mut self, skill: impl Into<SkillId>) -> Self {
        self.trained_skills.push(skill.into());
        self
    }

    pub fn with_multiclass_feat(mut self, feat: impl Into<FeatId>) -> Self {
        self.multiclass_feat = Some(feat.into());
        self
    }

    pub fn with_general_feat(mut self, feat: impl Into<FeatId>) -> Self {
        self.general_feats.push(feat.into());
        self
    }

    pub fn with_bonus_feat(mut self, feat: impl Into<FeatId>) -> Self {
        self.bonus_feats.push(feat.into());
        self
    }

    pub fn with_talent(mut self, talent: impl Into<TalentId>) -> Self {
        self.talents.push(talent.into());
        self
    }

    /// Number of selections supplied for `slot`.
    pub fn supplied(&self, slot: ChoiceSlot) -> usize {
        match slot {
            ChoiceSlot::AbilityIncrease => self.ability_increases.len(),
            ChoiceSlot::TrainedSkill => self.trained_skills.len(),
            ChoiceSlot::MulticlassFeat => usize::from(self.multiclass_feat.is_some()),
            ChoiceSlot::GeneralFeat => self.general_feats.len(),
            ChoiceSlot::BonusFeat => self.bonus_feats.len(),
            ChoiceSlot::Talent => self.talents.len(),
        }
    }
}

/// A decision point opened by a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSlot {
    AbilityIncrease,
    TrainedSkill,
    MulticlassFeat,
    GeneralFeat,
    BonusFeat,
    Talent,
}

impl ChoiceSlot {
    /// Evaluation order of selections within one level.
    pub const ORDER: [ChoiceSlot; 6] = [
        Self::AbilityIncrease,
        Self::TrainedSkill,
        Self::MulticlassFeat,
        Self::GeneralFeat,
        Self::BonusFeat,
        Self::Talent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbilityIncrease => "ability increase",
            Self::TrainedSkill => "trained skill",
            Self::MulticlassFeat => "multiclass feat",
            Self::GeneralFeat => "general feat",
            Self::BonusFeat => "bonus feat",
            Self::Talent => "talent",
        }
    }

    /// Stable key used to scope clause ids of a slot's selections.
    pub fn key(&self) -> &'static str {
        match self {
            Self::AbilityIncrease => "ability_increase",
            Self::TrainedSkill => "trained_skill",
            Self::MulticlassFeat => "multiclass_feat",
            Self::GeneralFeat => "general_feat",
            Self::BonusFeat => "bonus_feat",
            Self::Talent => "talent",
        }
    }
}

impl fmt::Display for ChoiceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slot the intent left (partly) unfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingSelection {
    pub slot: ChoiceSlot,
    pub required: usize,
    pub supplied: usize,
}

impl MissingSelection {
    pub fn new(slot: ChoiceSlot, required: usize, supplied: usize) -> Self {
        Self {
            slot,
            required,
            supplied,
        }
    }
}

impl fmt::Display for MissingSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requires {} selection(s), {} supplied",
            self.slot, self.required, self.supplied
        )
    }
}
