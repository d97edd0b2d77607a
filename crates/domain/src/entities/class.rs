//! Class reference data.
//!
//! Describes what each class level grants: base attack progression, defense
//! bonuses, hit die, and the talent/bonus-feat slots opened at each class
//! level. The resolver turns these into pending choice slots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::{ClassId, FeatId, SkillId, TalentTreeId};

/// How base attack bonus grows with class level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BabProgression {
    /// +1 per level
    Full,
    /// floor(3 × level / 4)
    ThreeQuarter,
    /// floor(level / 2)
    Half,
}

impl BabProgression {
    pub fn at(self, class_level: u8) -> i32 {
        let level = i32::from(class_level);
        match self {
            Self::Full => level,
            Self::ThreeQuarter => level * 3 / 4,
            Self::Half => level / 2,
        }
    }
}

/// Class bonus to each defense. Only the best bonus among a character's
/// classes applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseBonuses {
    pub reflex: i32,
    pub fortitude: i32,
    pub will: i32,
}

impl DefenseBonuses {
    pub fn new(reflex: i32, fortitude: i32, will: i32) -> Self {
        Self {
            reflex,
            fortitude,
            will,
        }
    }
}

/// Choice slots opened at one class level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelGrant {
    pub class_level: u8,
    #[serde(default)]
    pub talents: u8,
    #[serde(default)]
    pub bonus_feats: u8,
}

impl LevelGrant {
    pub fn new(class_level: u8, talents: u8, bonus_feats: u8) -> Self {
        Self {
            class_level,
            talents,
            bonus_feats,
        }
    }
}

/// A class as described by the reference catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    pub id: ClassId,
    pub name: String,
    /// Prestige classes are gated by `prestige_requirements` in the catalog
    #[serde(default)]
    pub prestige: bool,
    pub hit_die: u8,
    pub base_attack: BabProgression,
    #[serde(default)]
    pub defense_bonuses: DefenseBonuses,
    #[serde(default)]
    pub class_skills: BTreeSet<SkillId>,
    /// Trained skills chosen at first character level (before INT modifier)
    #[serde(default)]
    pub trained_skills_at_first_level: u8,
    /// Granted outright at first character level; one is chosen when multiclassing
    #[serde(default)]
    pub starting_feats: Vec<FeatId>,
    /// Feats eligible for this class's bonus-feat slots
    #[serde(default)]
    pub bonus_feats: Vec<FeatId>,
    #[serde(default)]
    pub talent_trees: Vec<TalentTreeId>,
    #[serde(default)]
    pub level_grants: Vec<LevelGrant>,
}

impl ClassDefinition {
    pub fn new(
        id: impl Into<ClassId>,
        name: impl Into<String>,
        hit_die: u8,
        base_attack: BabProgression,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prestige: false,
            hit_die,
            base_attack,
            defense_bonuses: DefenseBonuses::default(),
            class_skills: BTreeSet::new(),
            trained_skills_at_first_level: 0,
            starting_feats: Vec::new(),
            bonus_feats: Vec::new(),
            talent_trees: Vec::new(),
            level_grants: Vec::new(),
        }
    }

    pub fn prestige(mut self) -> Self {
        self.prestige = true;
        self
    }

    pub fn with_defenses(mut self, bonuses: DefenseBonuses) -> Self {
        self.defense_bonuses = bonuses;
        self
    }

    pub fn with_class_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SkillId>,
    {
        self.class_skills.extend(skills.into_iter().map(Into::into));
        self
    }

    pub fn with_trained_skills(mut self, count: u8) -> Self {
        self.trained_skills_at_first_level = count;
        self
    }

    pub fn with_starting_feat(mut self, feat: impl Into<FeatId>) -> Self {
        self.starting_feats.push(feat.into());
        self
    }

    pub fn with_bonus_feat(mut self, feat: impl Into<FeatId>) -> Self {
        self.bonus_feats.push(feat.into());
        self
    }

    pub fn with_talent_tree(mut self, tree: impl Into<TalentTreeId>) -> Self {
        self.talent_trees.push(tree.into());
        self
    }

    pub fn with_grant(mut self, grant: LevelGrant) -> Self {
        self.level_grants.push(grant);
        self
    }

    /// Slots opened at `class_level`. Multiple entries for the same level add up.
    pub fn grant_at(&self, class_level: u8) -> LevelGrant {
        self.level_grants
            .iter()
            .filter(|g| g.class_level == class_level)
            .fold(LevelGrant::new(class_level, 0, 0), |acc, g| {
                LevelGrant::new(
                    class_level,
                    acc.talents + g.talents,
                    acc.bonus_feats + g.bonus_feats,
                )
            })
    }

    pub fn grants_tree(&self, tree: &TalentTreeId) -> bool {
        self.talent_trees.contains(tree)
    }

    pub fn is_class_skill(&self, skill: &SkillId) -> bool {
        self.class_skills.contains(skill)
    }
}
