//! ProgressionResolver - turns a fully specified intent into a [`Delta`].
//!
//! Resolution is a pure function of (snapshot, modifiers, intent). It never
//! touches the snapshot it is given: every check reads it, and the projected
//! post-level state comes from [`Delta::apply_to`] on a copy. Preview and
//! commit go through the same path.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::ReferenceCatalog;
use crate::entities::{ClassDefinition, FeatDefinition};
use crate::error::ProgressionError;
use crate::ids::{ClassId, FeatId, TalentId, TalentTreeId};
use crate::requirements::{
    ClauseId, FailedClause, PendingSelections, PrerequisiteValidator, ValidationReport,
};
use crate::ruleset::Ruleset;
use crate::stats::DerivedStatCalculator;
use crate::value_objects::{ability_modifier, Ability, Modifier};

use super::delta::{Collection, Delta, DeltaBuilder, Field};
use super::intent::{ChoiceSlot, MissingSelection, ProgressionIntent};
use super::snapshot::{CharacterSnapshot, ClassLevelEntry, LevelChoices};

/// The choice slots opened by gaining one level in a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPlan {
    pub class_id: ClassId,
    pub character_level: u8,
    pub class_level: u8,
    /// Required selections per slot
    pub slots: BTreeMap<ChoiceSlot, usize>,
    /// Feats granted without a choice (starting feats at first level)
    pub granted_feats: Vec<FeatId>,
}

impl LevelPlan {
    pub fn required(&self, slot: ChoiceSlot) -> usize {
        self.slots.get(&slot).copied().unwrap_or(0)
    }
}

/// A talent a class can offer, with whether the character may take it now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentOption {
    pub talent_id: TalentId,
    pub name: String,
    pub tree: TalentTreeId,
    pub report: ValidationReport,
}

#[derive(Clone, Copy)]
pub struct ProgressionResolver<'a> {
    catalog: &'a dyn ReferenceCatalog,
    rules: &'a Ruleset,
}

impl<'a> ProgressionResolver<'a> {
    pub fn new(catalog: &'a dyn ReferenceCatalog, rules: &'a Ruleset) -> Self {
        Self { catalog, rules }
    }

    /// Resolve `intent` against `snapshot` into the delta that applies it.
    ///
    /// `modifiers` are the externally owned modifiers active on the
    /// character. They feed base attack gates and the `computed` section.
    pub fn resolve(
        &self,
        snapshot: &CharacterSnapshot,
        modifiers: &[Modifier],
        intent: &ProgressionIntent,
    ) -> Result<Delta, ProgressionError> {
        let class = self.check_entry(snapshot, modifiers, intent)?;
        let plan = self.plan(snapshot, &intent.class_id, &intent.ability_increases)?;
        check_slot_counts(&plan, intent)?;

        let choices = self.validate_selections(snapshot, modifiers, class, &plan, intent)?;
        let builder = self.build_delta(snapshot, &plan, choices)?;

        let projected = builder.clone().build().apply_to(snapshot)?;
        let derived = DerivedStatCalculator::new(self.catalog, self.rules).derive(&projected, modifiers)?;
        Ok(builder.computed(derived.to_map()).build())
    }

    /// Same as [`resolve`](Self::resolve). Previews are real resolutions
    /// whose delta is simply not committed.
    pub fn preview(
        &self,
        snapshot: &CharacterSnapshot,
        modifiers: &[Modifier],
        intent: &ProgressionIntent,
    ) -> Result<Delta, ProgressionError> {
        self.resolve(snapshot, modifiers, intent)
    }

    /// Slots the next level in `class_id` opens. `ability_increases` are the
    /// increases taken at that level; an INT increase can open a trained
    /// skill slot.
    pub fn plan(
        &self,
        snapshot: &CharacterSnapshot,
        class_id: &ClassId,
        ability_increases: &[Ability],
    ) -> Result<LevelPlan, ProgressionError> {
        let class = self.catalog.require_class(class_id)?;
        let character_level = snapshot.character_level().saturating_add(1);
        let class_level = snapshot.class_level(class_id).saturating_add(1);
        let grant = class.grant_at(class_level);

        let int_before = snapshot.abilities().score(Ability::Int);
        let int_raised = ability_increases.iter().filter(|a| **a == Ability::Int).count();
        let int_after = int_before + i32::try_from(int_raised).unwrap_or(0);
        let trained_skills = if character_level == 1 {
            (i32::from(class.trained_skills_at_first_level) + ability_modifier(int_after))
                .max(self.rules.minimum_first_level_skills)
        } else {
            (ability_modifier(int_after) - ability_modifier(int_before)).max(0)
        };

        let multiclass = character_level > 1
            && class_level == 1
            && class.starting_feats.iter().any(|f| !snapshot.owns_feat(f));

        let granted_feats = if character_level == 1 {
            class
                .starting_feats
                .iter()
                .filter(|f| !snapshot.owns_feat(f))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let slots = BTreeMap::from([
            (
                ChoiceSlot::AbilityIncrease,
                usize::from(self.rules.ability_increases_at(character_level)),
            ),
            (ChoiceSlot::TrainedSkill, usize::try_from(trained_skills).unwrap_or(0)),
            (ChoiceSlot::MulticlassFeat, usize::from(multiclass)),
            (
                ChoiceSlot::GeneralFeat,
                usize::from(self.rules.general_feats_at(character_level)),
            ),
            (ChoiceSlot::BonusFeat, usize::from(grant.bonus_feats)),
            (ChoiceSlot::Talent, usize::from(grant.talents)),
        ]);

        Ok(LevelPlan {
            class_id: class_id.clone(),
            character_level,
            class_level,
            slots,
            granted_feats,
        })
    }

    /// Every talent of `class_id`'s trees with its validation report.
    pub fn available_talents(
        &self,
        snapshot: &CharacterSnapshot,
        modifiers: &[Modifier],
        class_id: &ClassId,
        pending: Option<&PendingSelections>,
    ) -> Result<Vec<TalentOption>, ProgressionError> {
        let class = self.catalog.require_class(class_id)?;
        let validator = PrerequisiteValidator::new(self.catalog, self.rules).with_modifiers(modifiers);

        let mut options = Vec::new();
        for tree in &class.talent_trees {
            self.catalog.require_talent_tree(tree)?;
            for talent in self.catalog.talents_in_tree(tree) {
                let owned = snapshot.owns_talent(&talent.id)
                    || pending.is_some_and(|p| p.talents().contains(&talent.id));
                let report = if owned {
                    ValidationReport::single(
                        ClauseId::named("owned"),
                        format!("{} is already owned", talent.name),
                    )
                } else {
                    validator.validate_optional(talent.prerequisites.as_ref(), snapshot, pending)?
                };
                options.push(TalentOption {
                    talent_id: talent.id.clone(),
                    name: talent.name.clone(),
                    tree: talent.tree.clone(),
                    report,
                });
            }
        }
        Ok(options)
    }

    // =========================================================================
    // Resolution steps
    // =========================================================================

    /// Target level and class entry checks.
    fn check_entry(
        &self,
        snapshot: &CharacterSnapshot,
        modifiers: &[Modifier],
        intent: &ProgressionIntent,
    ) -> Result<&'a ClassDefinition, ProgressionError> {
        let expected = u16::from(snapshot.character_level()) + 1;
        if u16::from(intent.target_level) != expected {
            return Err(ProgressionError::Validation(ValidationReport::single(
                ClauseId::named("target_level"),
                format!(
                    "target level {} must be the next level ({expected})",
                    intent.target_level
                ),
            )));
        }
        if intent.target_level > self.rules.max_character_level {
            return Err(ProgressionError::Validation(ValidationReport::single(
                ClauseId::named("target_level"),
                format!(
                    "character level is capped at {}",
                    self.rules.max_character_level
                ),
            )));
        }

        let class = self.catalog.require_class(&intent.class_id)?;
        if class.prestige && snapshot.class_level(&class.id) == 0 {
            if let Some(requirements) = self.catalog.prestige_requirements(&class.id) {
                let report = PrerequisiteValidator::new(self.catalog, self.rules)
                    .with_modifiers(modifiers)
                    .validate(requirements, snapshot, None)?;
                if !report.valid {
                    return Err(ProgressionError::Validation(report.scoped("prestige")));
                }
            }
        }
        Ok(class)
    }

    /// Check each selection in order against the snapshot plus the
    /// selections before it. Returns the choices recorded for the level.
    fn validate_selections(
        &self,
        snapshot: &CharacterSnapshot,
        modifiers: &[Modifier],
        class: &ClassDefinition,
        plan: &LevelPlan,
        intent: &ProgressionIntent,
    ) -> Result<LevelChoices, ProgressionError> {
        let validator = PrerequisiteValidator::new(self.catalog, self.rules).with_modifiers(modifiers);
        let mut pending = PendingSelections::advancing(class.id.clone());
        let mut choices = LevelChoices::default();
        let mut failures = Vec::new();

        for feat_id in &plan.granted_feats {
            self.catalog.require_feat(feat_id)?;
            pending.add_feat(feat_id.clone());
            choices.feats.push(feat_id.clone());
        }

        for (index, ability) in intent.ability_increases.iter().enumerate() {
            if intent.ability_increases[..index].contains(ability) {
                failures.push(FailedClause::new(
                    slot_clause(ChoiceSlot::AbilityIncrease, index, ability.as_str()),
                    format!("{} is already increased this level", ability.as_str()),
                ));
            }
            pending.add_ability_increase(*ability);
            choices.ability_increases.push(*ability);
        }

        for (index, skill_id) in intent.trained_skills.iter().enumerate() {
            let skill = self.catalog.require_skill(skill_id)?;
            let clause = slot_clause(ChoiceSlot::TrainedSkill, index, skill_id.as_str());
            if !class.is_class_skill(skill_id) {
                failures.push(FailedClause::new(
                    clause,
                    format!("{} is not a {} class skill", skill.name, class.name),
                ));
            } else if snapshot.is_trained(skill_id) || pending.trained_skills().contains(skill_id) {
                failures.push(FailedClause::new(
                    clause,
                    format!("{} is already trained", skill.name),
                ));
            }
            pending.add_trained_skill(skill_id.clone());
            choices.trained_skills.push(skill_id.clone());
        }

        if let Some(feat_id) = &intent.multiclass_feat {
            let feat = self.catalog.require_feat(feat_id)?;
            if !class.starting_feats.contains(feat_id) {
                failures.push(FailedClause::new(
                    slot_clause(ChoiceSlot::MulticlassFeat, 0, feat_id.as_str()),
                    format!("{} is not a {} starting feat", feat.name, class.name),
                ));
            }
            failures.extend(self.check_feat(
                &validator,
                snapshot,
                &pending,
                feat,
                ChoiceSlot::MulticlassFeat,
                0,
            )?);
            pending.add_feat(feat_id.clone());
            choices.feats.push(feat_id.clone());
        }

        for (index, feat_id) in intent.general_feats.iter().enumerate() {
            let feat = self.catalog.require_feat(feat_id)?;
            failures.extend(self.check_feat(
                &validator,
                snapshot,
                &pending,
                feat,
                ChoiceSlot::GeneralFeat,
                index,
            )?);
            pending.add_feat(feat_id.clone());
            choices.feats.push(feat_id.clone());
        }

        for (index, feat_id) in intent.bonus_feats.iter().enumerate() {
            let feat = self.catalog.require_feat(feat_id)?;
            if !class.bonus_feats.contains(feat_id) {
                failures.push(FailedClause::new(
                    slot_clause(ChoiceSlot::BonusFeat, index, feat_id.as_str()),
                    format!("{} is not a {} bonus feat", feat.name, class.name),
                ));
            }
            failures.extend(self.check_feat(
                &validator,
                snapshot,
                &pending,
                feat,
                ChoiceSlot::BonusFeat,
                index,
            )?);
            pending.add_feat(feat_id.clone());
            choices.feats.push(feat_id.clone());
        }

        for (index, talent_id) in intent.talents.iter().enumerate() {
            let talent = self.catalog.require_talent(talent_id)?;
            let scope = slot_scope(ChoiceSlot::Talent, index, talent_id.as_str());
            if !class.grants_tree(&talent.tree) {
                failures.push(FailedClause::new(
                    ClauseId::named(scope.clone()),
                    format!("{} is not in a {} talent tree", talent.name, class.name),
                ));
            }
            if snapshot.owns_talent(talent_id) || pending.talents().contains(talent_id) {
                failures.push(FailedClause::new(
                    ClauseId::named(scope.clone()),
                    format!("{} is already owned", talent.name),
                ));
            }
            let report = validator.validate_optional(
                talent.prerequisites.as_ref(),
                snapshot,
                Some(&pending),
            )?;
            failures.extend(report.scoped(&scope).failed_clauses);
            pending.add_talent(talent_id.clone());
            choices.talents.push(talent_id.clone());
        }

        if failures.is_empty() {
            Ok(choices)
        } else {
            Err(ProgressionError::Validation(ValidationReport::failed(failures)))
        }
    }

    fn check_feat(
        &self,
        validator: &PrerequisiteValidator<'_>,
        snapshot: &CharacterSnapshot,
        pending: &PendingSelections,
        feat: &FeatDefinition,
        slot: ChoiceSlot,
        index: usize,
    ) -> Result<Vec<FailedClause>, ProgressionError> {
        let scope = slot_scope(slot, index, feat.id.as_str());
        let mut failures = Vec::new();
        if !feat.repeatable && (snapshot.owns_feat(&feat.id) || pending.feats().contains(&feat.id)) {
            failures.push(FailedClause::new(
                ClauseId::named(scope.clone()),
                format!("{} is already owned", feat.name),
            ));
        }
        let report =
            validator.validate_optional(feat.prerequisites.as_ref(), snapshot, Some(pending))?;
        failures.extend(report.scoped(&scope).failed_clauses);
        Ok(failures)
    }

    fn build_delta(
        &self,
        snapshot: &CharacterSnapshot,
        plan: &LevelPlan,
        choices: LevelChoices,
    ) -> Result<DeltaBuilder, ProgressionError> {
        let mut builder = Delta::builder(snapshot.id(), snapshot.version())
            .set(Field::Level, i32::from(plan.character_level))
            .set(
                Field::ClassLevel(plan.class_id.clone()),
                i32::from(plan.class_level),
            );

        for ability in &choices.ability_increases {
            builder = builder.set(
                Field::Ability(*ability),
                snapshot.abilities().score(*ability) + 1,
            );
        }

        let mut added_feats = BTreeSet::new();
        let mut removed_feats = BTreeSet::new();
        for feat_id in &choices.feats {
            if !snapshot.owns_feat(feat_id) && added_feats.insert(feat_id) {
                builder = builder.add(Collection::Feats, feat_id.as_str());
            }
            for old in &self.catalog.require_feat(feat_id)?.supersedes {
                if snapshot.owns_feat(old) && removed_feats.insert(old) {
                    builder = builder.remove(Collection::Feats, old.as_str());
                }
            }
        }

        let mut removed_talents = BTreeSet::new();
        for talent_id in &choices.talents {
            builder = builder.add(Collection::Talents, talent_id.as_str());
            for old in &self.catalog.require_talent(talent_id)?.supersedes {
                if snapshot.owns_talent(old) && removed_talents.insert(old) {
                    builder = builder.remove(Collection::Talents, old.as_str());
                }
            }
        }

        for skill_id in &choices.trained_skills {
            builder = builder.add(Collection::TrainedSkills, skill_id.as_str());
        }

        Ok(builder.append(ClassLevelEntry {
            class_id: plan.class_id.clone(),
            class_level: plan.class_level,
            character_level: plan.character_level,
            choices,
        }))
    }
}

/// Short slots become [`ProgressionError::IncompleteIntent`]; only when every
/// slot is filled are overfilled slots reported as a validation failure.
fn check_slot_counts(plan: &LevelPlan, intent: &ProgressionIntent) -> Result<(), ProgressionError> {
    let mut missing = Vec::new();
    let mut overfilled = Vec::new();
    for slot in ChoiceSlot::ORDER {
        let required = plan.required(slot);
        let supplied = intent.supplied(slot);
        if supplied < required {
            missing.push(MissingSelection::new(slot, required, supplied));
        } else if supplied > required {
            overfilled.push(FailedClause::new(
                ClauseId::named(format!("slot/{}", slot.key())),
                format!("{supplied} {slot} selection(s) supplied, {required} allowed"),
            ));
        }
    }

    if !missing.is_empty() {
        return Err(ProgressionError::IncompleteIntent(missing));
    }
    if !overfilled.is_empty() {
        return Err(ProgressionError::Validation(ValidationReport::failed(
            overfilled,
        )));
    }
    Ok(())
}

fn slot_scope(slot: ChoiceSlot, index: usize, id: &str) -> String {
    format!("{}[{index}]:{id}", slot.key())
}

fn slot_clause(slot: ChoiceSlot, index: usize, id: &str) -> ClauseId {
    ClauseId::named(slot_scope(slot, index, id))
}
