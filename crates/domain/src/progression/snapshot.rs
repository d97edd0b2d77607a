//! CharacterSnapshot - immutable, versioned view of a character
//!
//! # Rustic DDD Design
//!
//! - **Private fields**: readers go through accessors
//! - **Builders for hydration**: hosts rebuild snapshots from storage with
//!   the `with_*` methods, which always produce a consistent value
//! - **Single change path**: the only way to derive a changed snapshot from
//!   an existing one is [`Delta::apply_to`](super::Delta::apply_to)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ProgressionError;
use crate::ids::{CharacterId, ClassId, FeatId, ItemId, SkillId, TalentId};
use crate::value_objects::{Ability, AbilityScores, ConditionStep};

/// Monotonically increasing state version of a character record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateVersion(u64);

impl StateVersion {
    pub fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for StateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selections recorded for one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChoices {
    #[serde(default)]
    pub ability_increases: Vec<Ability>,
    /// Every feat gained at this level, chosen or granted
    #[serde(default)]
    pub feats: Vec<FeatId>,
    #[serde(default)]
    pub talents: Vec<TalentId>,
    #[serde(default)]
    pub trained_skills: Vec<SkillId>,
}

/// One entry of class-level history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassLevelEntry {
    pub class_id: ClassId,
    pub class_level: u8,
    pub character_level: u8,
    #[serde(default)]
    pub choices: LevelChoices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSnapshot {
    id: CharacterId,
    version: StateVersion,
    abilities: AbilityScores,
    level: u8,
    class_levels: BTreeMap<ClassId, u8>,
    class_history: Vec<ClassLevelEntry>,
    feats: BTreeSet<FeatId>,
    talents: BTreeSet<TalentId>,
    trained_skills: BTreeSet<SkillId>,
    equipped: BTreeSet<ItemId>,
    condition: ConditionStep,
}

impl CharacterSnapshot {
    // =========================================================================
    // Hydration
    // =========================================================================

    /// A level-0 character with the given ability scores at version 0.
    pub fn new(id: CharacterId, abilities: AbilityScores) -> Self {
        Self {
            id,
            version: StateVersion::default(),
            abilities,
            level: 0,
            class_levels: BTreeMap::new(),
            class_history: Vec::new(),
            feats: BTreeSet::new(),
            talents: BTreeSet::new(),
            trained_skills: BTreeSet::new(),
            equipped: BTreeSet::new(),
            condition: ConditionStep::Normal,
        }
    }

    pub fn with_version(mut self, version: StateVersion) -> Self {
        self.version = version;
        self
    }

    /// Replay one level in `class_id`: records `choices`, adds the chosen
    /// feats, talents and trained skills, and raises the increased abilities.
    ///
    /// For building characters level by level. Stored records are restored
    /// through serde instead, since their ability scores already include
    /// past increases.
    pub fn with_class_level(mut self, class_id: impl Into<ClassId>, choices: LevelChoices) -> Self {
        let class_id = class_id.into();
        let class_level = self.class_level(&class_id) + 1;
        self.level += 1;
        self.class_levels.insert(class_id.clone(), class_level);
        self.feats.extend(choices.feats.iter().cloned());
        self.talents.extend(choices.talents.iter().cloned());
        self.trained_skills
            .extend(choices.trained_skills.iter().cloned());
        for ability in &choices.ability_increases {
            let score = self.abilities.score(*ability);
            self.abilities.set(*ability, score + 1);
        }
        self.class_history.push(ClassLevelEntry {
            class_id,
            class_level,
            character_level: self.level,
            choices,
        });
        self
    }

    pub fn with_feat(mut self, feat: impl Into<FeatId>) -> Self {
        self.feats.insert(feat.into());
        self
    }

    pub fn with_talent(mut self, talent: impl Into<TalentId>) -> Self {
        self.talents.insert(talent.into());
        self
    }

    pub fn with_trained_skill(mut self, skill: impl Into<SkillId>) -> Self {
        self.trained_skills.insert(skill.into());
        self
    }

    pub fn with_equipped(mut self, item: impl Into<ItemId>) -> Self {
        self.equipped.insert(item.into());
        self
    }

    pub fn with_condition(mut self, condition: ConditionStep) -> Self {
        self.condition = condition;
        self
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> CharacterId {
        self.id
    }

    #[inline]
    pub fn version(&self) -> StateVersion {
        self.version
    }

    pub fn abilities(&self) -> &AbilityScores {
        &self.abilities
    }

    /// Total character (heroic) level.
    #[inline]
    pub fn character_level(&self) -> u8 {
        self.level
    }

    pub fn class_level(&self, class_id: &ClassId) -> u8 {
        self.class_levels.get(class_id).copied().unwrap_or(0)
    }

    pub fn class_levels(&self) -> &BTreeMap<ClassId, u8> {
        &self.class_levels
    }

    pub fn class_history(&self) -> &[ClassLevelEntry] {
        &self.class_history
    }

    pub fn feats(&self) -> &BTreeSet<FeatId> {
        &self.feats
    }

    pub fn talents(&self) -> &BTreeSet<TalentId> {
        &self.talents
    }

    pub fn trained_skills(&self) -> &BTreeSet<SkillId> {
        &self.trained_skills
    }

    pub fn equipped(&self) -> &BTreeSet<ItemId> {
        &self.equipped
    }

    pub fn condition(&self) -> ConditionStep {
        self.condition
    }

    pub fn owns_feat(&self, feat: &FeatId) -> bool {
        self.feats.contains(feat)
    }

    pub fn owns_talent(&self, talent: &TalentId) -> bool {
        self.talents.contains(talent)
    }

    pub fn is_trained(&self, skill: &SkillId) -> bool {
        self.trained_skills.contains(skill)
    }

    // =========================================================================
    // Delta application (crate-internal)
    // =========================================================================

    pub(crate) fn abilities_mut(&mut self) -> &mut AbilityScores {
        &mut self.abilities
    }

    pub(crate) fn set_level(&mut self, level: u8) {
        self.level = level;
    }

    pub(crate) fn set_class_level(&mut self, class_id: ClassId, level: u8) {
        self.class_levels.insert(class_id, level);
    }

    pub(crate) fn feats_mut(&mut self) -> &mut BTreeSet<FeatId> {
        &mut self.feats
    }

    pub(crate) fn talents_mut(&mut self) -> &mut BTreeSet<TalentId> {
        &mut self.talents
    }

    pub(crate) fn trained_skills_mut(&mut self) -> &mut BTreeSet<SkillId> {
        &mut self.trained_skills
    }

    pub(crate) fn push_history(&mut self, entry: ClassLevelEntry) {
        self.class_history.push(entry);
    }

    pub(crate) fn set_version(&mut self, version: StateVersion) {
        self.version = version;
    }

    /// Level and per-class levels must agree with the history.
    pub(crate) fn check_consistency(&self) -> Result<(), ProgressionError> {
        if usize::from(self.level) != self.class_history.len() {
            return Err(ProgressionError::invalid_delta(format!(
                "level {} does not match {} history entries",
                self.level,
                self.class_history.len()
            )));
        }
        let mut counted: BTreeMap<&ClassId, u8> = BTreeMap::new();
        for (index, entry) in self.class_history.iter().enumerate() {
            let count = counted.entry(&entry.class_id).or_default();
            *count += 1;
            if entry.class_level != *count || usize::from(entry.character_level) != index + 1 {
                return Err(ProgressionError::invalid_delta(format!(
                    "history entry {} for {} is out of sequence",
                    index + 1,
                    entry.class_id
                )));
            }
        }
        let recorded: BTreeMap<&ClassId, u8> =
            self.class_levels.iter().filter(|(_, l)| **l > 0).map(|(c, l)| (c, *l)).collect();
        if recorded != counted {
            return Err(ProgressionError::invalid_delta(
                "class levels do not match class history",
            ));
        }
        Ok(())
    }
}
