//! Selections made earlier in the same progression attempt.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{ClassId, FeatId, SkillId, TalentId};
use crate::progression::CharacterSnapshot;
use crate::value_objects::{Ability, ConditionStep};

/// Choices already made during the level being resolved.
///
/// Prerequisites are checked against the snapshot with these layered on top,
/// so a feat may depend on an ability increase or another feat chosen in the
/// same level-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSelections {
    advancing: Option<ClassId>,
    ability_increases: Vec<Ability>,
    feats: BTreeSet<FeatId>,
    talents: BTreeSet<TalentId>,
    trained_skills: BTreeSet<SkillId>,
}

impl PendingSelections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selections for a level gained in `class_id`. The new level counts
    /// toward level and base-attack prerequisites.
    pub fn advancing(class_id: impl Into<ClassId>) -> Self {
        Self {
            advancing: Some(class_id.into()),
            ..Self::default()
        }
    }

    pub fn add_ability_increase(&mut self, ability: Ability) {
        self.ability_increases.push(ability);
    }

    pub fn add_feat(&mut self, feat: FeatId) {
        self.feats.insert(feat);
    }

    pub fn add_talent(&mut self, talent: TalentId) {
        self.talents.insert(talent);
    }

    pub fn add_trained_skill(&mut self, skill: SkillId) {
        self.trained_skills.insert(skill);
    }

    pub fn advancing_class(&self) -> Option<&ClassId> {
        self.advancing.as_ref()
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

    pub fn ability_increases(&self) -> &[Ability] {
        &self.ability_increases
    }
}

/// A snapshot seen through pending selections.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProjectedCharacter<'a> {
    snapshot: &'a CharacterSnapshot,
    pending: Option<&'a PendingSelections>,
}

impl<'a> ProjectedCharacter<'a> {
    pub(crate) fn new(snapshot: &'a CharacterSnapshot, pending: Option<&'a PendingSelections>) -> Self {
        Self { snapshot, pending }
    }

    pub(crate) fn ability_score(&self, ability: Ability) -> i32 {
        let raised = self
            .pending
            .map(|p| p.ability_increases.iter().filter(|a| **a == ability).count())
            .unwrap_or(0);
        self.snapshot.abilities().score(ability) + i32::try_from(raised).unwrap_or(i32::MAX)
    }

    pub(crate) fn character_level(&self) -> u8 {
        let gained = self.advancing().map(|_| 1).unwrap_or(0);
        self.snapshot.character_level().saturating_add(gained)
    }

    pub(crate) fn class_level(&self, class_id: &ClassId) -> u8 {
        let gained = u8::from(self.advancing() == Some(class_id));
        self.snapshot.class_level(class_id).saturating_add(gained)
    }

    /// Per-class levels including the level being gained.
    pub(crate) fn class_levels(&self) -> BTreeMap<ClassId, u8> {
        let mut levels = self.snapshot.class_levels().clone();
        if let Some(class) = self.advancing() {
            *levels.entry(class.clone()).or_default() += 1;
        }
        levels
    }

    pub(crate) fn owns_feat(&self, feat: &FeatId) -> bool {
        self.snapshot.owns_feat(feat) || self.pending.is_some_and(|p| p.feats.contains(feat))
    }

    pub(crate) fn owns_talent(&self, talent: &TalentId) -> bool {
        self.snapshot.owns_talent(talent) || self.pending.is_some_and(|p| p.talents.contains(talent))
    }

    pub(crate) fn is_trained(&self, skill: &SkillId) -> bool {
        self.snapshot.is_trained(skill)
            || self.pending.is_some_and(|p| p.trained_skills.contains(skill))
    }

    pub(crate) fn feats(&self) -> impl Iterator<Item = &'a FeatId> {
        let pending = self.pending.into_iter().flat_map(|p| p.feats.iter());
        self.snapshot.feats().iter().chain(pending)
    }

    pub(crate) fn talents(&self) -> impl Iterator<Item = &'a TalentId> {
        let pending = self.pending.into_iter().flat_map(|p| p.talents.iter());
        self.snapshot.talents().iter().chain(pending)
    }

    pub(crate) fn condition(&self) -> ConditionStep {
        self.snapshot.condition()
    }

    fn advancing(&self) -> Option<&'a ClassId> {
        self.pending.and_then(|p| p.advancing.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CharacterId;
    use crate::progression::LevelChoices;
    use crate::value_objects::AbilityScores;

    #[test]
    fn pending_layers_over_snapshot() {
        let snapshot = CharacterSnapshot::new(
            CharacterId::new(),
            AbilityScores::new().with(Ability::Dex, 12),
        )
        .with_class_level("scout", LevelChoices::default());

        let mut pending = PendingSelections::advancing("scout");
        pending.add_ability_increase(Ability::Dex);
        pending.add_feat(FeatId::new("dodge"));

        let view = ProjectedCharacter::new(&snapshot, Some(&pending));
        assert_eq!(view.ability_score(Ability::Dex), 13);
        assert_eq!(view.character_level(), 2);
        assert_eq!(view.class_level(&ClassId::new("scout")), 2);
        assert!(view.owns_feat(&FeatId::new("dodge")));
        assert!(!snapshot.owns_feat(&FeatId::new("dodge")));
    }

    #[test]
    fn without_pending_reads_snapshot_only() {
        let snapshot = CharacterSnapshot::new(CharacterId::new(), AbilityScores::new());
        let view = ProjectedCharacter::new(&snapshot, None);
        assert_eq!(view.character_level(), 0);
        assert_eq!(view.ability_score(Ability::Str), 10);
        assert!(view.class_levels().is_empty());
    }
}
