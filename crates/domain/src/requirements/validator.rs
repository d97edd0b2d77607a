//! Prerequisite evaluation.
//!
//! Evaluation runs in two passes. The first walks the whole expression and
//! resolves every identifier it mentions against the catalog, so a typo in
//! reference data surfaces as [`ProgressionError::UnknownIdentifier`] even
//! when short-circuiting would never reach the clause. The second evaluates
//! the tree against the character.

use crate::catalog::ReferenceCatalog;
use crate::error::ProgressionError;
use crate::progression::CharacterSnapshot;
use crate::ruleset::Ruleset;
use crate::stats::DerivedStatCalculator;
use crate::value_objects::Modifier;

use super::expression::{ClauseId, FailedClause, RequirementExpression, ValidationReport};
use super::pending::{PendingSelections, ProjectedCharacter};

type Outcome = Result<Vec<FailedClause>, ProgressionError>;

/// Evaluates requirement expressions against a character.
///
/// Base attack gates read the same value [`DerivedStatCalculator`] derives,
/// so external modifiers given through [`with_modifiers`](Self::with_modifiers)
/// count toward them.
#[derive(Clone, Copy)]
pub struct PrerequisiteValidator<'a> {
    catalog: &'a dyn ReferenceCatalog,
    stats: DerivedStatCalculator<'a>,
    external: &'a [Modifier],
}

impl<'a> PrerequisiteValidator<'a> {
    pub fn new(catalog: &'a dyn ReferenceCatalog, rules: &'a Ruleset) -> Self {
        Self {
            catalog,
            stats: DerivedStatCalculator::new(catalog, rules),
            external: &[],
        }
    }

    /// Externally owned modifiers active on the character.
    pub fn with_modifiers(mut self, external: &'a [Modifier]) -> Self {
        self.external = external;
        self
    }

    /// Evaluate `expression` against `snapshot`, with `pending` selections
    /// from the same progression attempt layered on top.
    ///
    /// Unmet clauses come back in the report; only catalog misses are errors.
    pub fn validate(
        &self,
        expression: &RequirementExpression,
        snapshot: &CharacterSnapshot,
        pending: Option<&PendingSelections>,
    ) -> Result<ValidationReport, ProgressionError> {
        self.resolve_identifiers(expression)?;

        let character = ProjectedCharacter::new(snapshot, pending);
        let failed = self.evaluate(expression, &ClauseId::root(), &character)?;
        Ok(if failed.is_empty() {
            ValidationReport::passed()
        } else {
            ValidationReport::failed(failed)
        })
    }

    /// Validate an optional prerequisite; no prerequisites always passes.
    pub fn validate_optional(
        &self,
        expression: Option<&RequirementExpression>,
        snapshot: &CharacterSnapshot,
        pending: Option<&PendingSelections>,
    ) -> Result<ValidationReport, ProgressionError> {
        match expression {
            Some(expression) => self.validate(expression, snapshot, pending),
            None => Ok(ValidationReport::passed()),
        }
    }

    fn resolve_identifiers(&self, expression: &RequirementExpression) -> Result<(), ProgressionError> {
        use RequirementExpression as E;

        match expression {
            E::ClassLevelAtLeast { class_id, .. } => {
                self.catalog.require_class(class_id)?;
            }
            E::Trained { skill_id } => {
                self.catalog.require_skill(skill_id)?;
            }
            E::OwnsFeat { feat_id } => {
                self.catalog.require_feat(feat_id)?;
            }
            E::OwnsTalent { talent_id } => {
                self.catalog.require_talent(talent_id)?;
            }
            E::TalentsFromTree { tree_id, .. } => {
                self.catalog.require_talent_tree(tree_id)?;
            }
            E::All { clauses } | E::Any { clauses } => {
                for clause in clauses {
                    self.resolve_identifiers(clause)?;
                }
            }
            E::Not { clause } => self.resolve_identifiers(clause)?,
            E::AbilityAtLeast { .. }
            | E::CharacterLevelAtLeast { .. }
            | E::BaseAttackAtLeast { .. }
            | E::ForceSensitive => {}
        }
        Ok(())
    }

    fn evaluate(
        &self,
        expression: &RequirementExpression,
        clause: &ClauseId,
        character: &ProjectedCharacter<'_>,
    ) -> Outcome {
        use RequirementExpression as E;

        match expression {
            E::All { clauses } => {
                for (index, child) in clauses.iter().enumerate() {
                    let failed = self.evaluate(child, &clause.child(index), character)?;
                    if !failed.is_empty() {
                        return Ok(failed);
                    }
                }
                Ok(Vec::new())
            }
            E::Any { clauses } => {
                if clauses.is_empty() {
                    return Ok(vec![FailedClause::new(
                        clause.clone(),
                        "requires one of no alternatives",
                    )]);
                }
                let mut failed = Vec::new();
                for (index, child) in clauses.iter().enumerate() {
                    let child_failed = self.evaluate(child, &clause.child(index), character)?;
                    if child_failed.is_empty() {
                        return Ok(Vec::new());
                    }
                    failed.extend(child_failed);
                }
                Ok(failed)
            }
            E::Not { clause: inner } => {
                let inner_failed = self.evaluate(inner, &clause.child(0), character)?;
                if inner_failed.is_empty() {
                    Ok(vec![FailedClause::new(
                        clause.clone(),
                        format!("must not meet: {}", self.describe(inner)?),
                    )])
                } else {
                    Ok(Vec::new())
                }
            }
            leaf => self.evaluate_leaf(leaf, clause, character),
        }
    }

    fn evaluate_leaf(
        &self,
        leaf: &RequirementExpression,
        clause: &ClauseId,
        character: &ProjectedCharacter<'_>,
    ) -> Outcome {
        use RequirementExpression as E;

        let shortfall = match leaf {
            E::AbilityAtLeast { ability, score } => {
                let has = character.ability_score(*ability);
                (has < *score).then(|| format!("has {has}"))
            }
            E::CharacterLevelAtLeast { level } => {
                let has = character.character_level();
                (has < *level).then(|| format!("has {has}"))
            }
            E::ClassLevelAtLeast { class_id, level } => {
                let has = character.class_level(class_id);
                (has < *level).then(|| format!("has {has}"))
            }
            E::BaseAttackAtLeast { bonus } => {
                let modifiers = self.stats.modifiers_for(
                    character.feats(),
                    character.talents(),
                    character.condition(),
                    self.external,
                )?;
                let has = self.stats.base_attack(&character.class_levels(), &modifiers)?;
                (has < *bonus).then(|| format!("has {has:+}"))
            }
            E::Trained { skill_id } => (!character.is_trained(skill_id)).then(String::new),
            E::OwnsFeat { feat_id } => (!character.owns_feat(feat_id)).then(String::new),
            E::OwnsTalent { talent_id } => (!character.owns_talent(talent_id)).then(String::new),
            E::TalentsFromTree { tree_id, count } => {
                let mut has = 0usize;
                for talent in character.talents() {
                    if self.catalog.require_talent(talent)?.tree == *tree_id {
                        has += 1;
                    }
                }
                (has < usize::from(*count)).then(|| format!("has {has}"))
            }
            E::ForceSensitive => {
                let mut sensitive = false;
                for feat in character.feats() {
                    if self.catalog.require_feat(feat)?.grants_force_sensitivity {
                        sensitive = true;
                        break;
                    }
                }
                (!sensitive).then(String::new)
            }
            E::All { .. } | E::Any { .. } | E::Not { .. } => None,
        };

        Ok(match shortfall {
            None => Vec::new(),
            Some(detail) => {
                let mut reason = format!("requires {}", self.describe(leaf)?);
                if !detail.is_empty() {
                    reason.push_str(&format!(" ({detail})"));
                }
                vec![FailedClause::new(clause.clone(), reason)]
            }
        })
    }

    /// Human-readable description of a clause, using display names.
    pub fn describe(&self, expression: &RequirementExpression) -> Result<String, ProgressionError> {
        use RequirementExpression as E;

        Ok(match expression {
            E::AbilityAtLeast { ability, score } => format!("{} {score}", ability.as_str()),
            E::CharacterLevelAtLeast { level } => format!("character level {level}"),
            E::ClassLevelAtLeast { class_id, level } => {
                format!("{} level {level}", self.catalog.require_class(class_id)?.name)
            }
            E::BaseAttackAtLeast { bonus } => format!("base attack bonus {bonus:+}"),
            E::Trained { skill_id } => {
                format!("{} trained", self.catalog.require_skill(skill_id)?.name)
            }
            E::OwnsFeat { feat_id } => {
                format!("feat {}", self.catalog.require_feat(feat_id)?.name)
            }
            E::OwnsTalent { talent_id } => {
                format!("talent {}", self.catalog.require_talent(talent_id)?.name)
            }
            E::TalentsFromTree { tree_id, count } => format!(
                "{count} talent(s) from {}",
                self.catalog.require_talent_tree(tree_id)?.name
            ),
            E::ForceSensitive => "Force sensitivity".to_owned(),
            E::All { clauses } => format!("all of ({})", self.describe_each(clauses)?),
            E::Any { clauses } => format!("one of ({})", self.describe_each(clauses)?),
            E::Not { clause } => format!("not {}", self.describe(clause)?),
        })
    }

    fn describe_each(&self, clauses: &[RequirementExpression]) -> Result<String, ProgressionError> {
        let parts = clauses
            .iter()
            .map(|c| self.describe(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::entities::{
        BabProgression, ClassDefinition, FeatDefinition, SkillDefinition, TalentDefinition,
        TalentTree,
    };
    use crate::ids::{CharacterId, FeatId};
    use crate::progression::LevelChoices;
    use crate::value_objects::{
        Ability, AbilityScores, BonusType, ModifierGrant, ModifierSource, Statistic,
    };

    type R = RequirementExpression;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_class(ClassDefinition::new("scout", "Scout", 8, BabProgression::ThreeQuarter))
            .with_class(ClassDefinition::new("soldier", "Soldier", 10, BabProgression::Full))
            .with_feat(FeatDefinition::new("dodge", "Dodge"))
            .with_feat(FeatDefinition::new("force_sensitivity", "Force Sensitivity").force_sensitivity())
            .with_skill(SkillDefinition::new("stealth", "Stealth", Ability::Dex))
            .with_talent_tree(TalentTree::new("awareness", "Awareness"))
            .with_talent(TalentDefinition::new("acute_senses", "Acute Senses", "awareness"))
            .with_talent(TalentDefinition::new("expert_tracker", "Expert Tracker", "awareness"))
    }

    fn scout(levels: usize) -> CharacterSnapshot {
        (0..levels).fold(
            CharacterSnapshot::new(
                CharacterId::new(),
                AbilityScores::new().with(Ability::Dex, 13),
            ),
            |s, _| s.with_class_level("scout", LevelChoices::default()),
        )
    }

    #[test]
    fn leaf_predicates() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let snapshot = scout(1).with_feat("dodge").with_trained_skill("stealth");

        for expr in [
            R::ability(Ability::Dex, 13),
            R::character_level(1),
            R::class_level("scout", 1),
            R::base_attack(0),
            R::trained("stealth"),
            R::feat("dodge"),
        ] {
            let report = validator.validate(&expr, &snapshot, None).unwrap();
            assert!(report.valid, "{expr:?}: {report}");
        }

        let report = validator
            .validate(&R::base_attack(1), &snapshot, None)
            .unwrap();
        assert_eq!(report.failed_clauses[0].reason, "requires base attack bonus +1 (has +0)");
    }

    #[test]
    fn base_attack_gate_counts_modifiers_like_derived_stats() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let snapshot = scout(1);
        let inspired = [Modifier::new(
            ModifierSource::Effect("inspired".to_string()),
            Statistic::BaseAttack,
            1,
            BonusType::untyped(),
        )];

        let derived = DerivedStatCalculator::new(&catalog, &rules)
            .derive(&snapshot, &inspired)
            .unwrap();
        let report = PrerequisiteValidator::new(&catalog, &rules)
            .with_modifiers(&inspired)
            .validate(&R::base_attack(1), &snapshot, None)
            .unwrap();

        assert_eq!(derived.base_attack, 1);
        assert!(report.valid, "{report}");

        let unmodified = PrerequisiteValidator::new(&catalog, &rules)
            .validate(&R::base_attack(1), &snapshot, None)
            .unwrap();
        assert!(!unmodified.valid);
    }

    #[test]
    fn base_attack_gate_counts_pending_feat_grants() {
        let catalog = catalog().with_feat(
            FeatDefinition::new("battle_drill", "Battle Drill")
                .with_modifier(ModifierGrant::new(Statistic::BaseAttack, 1, BonusType::untyped())),
        );
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let mut pending = PendingSelections::new();
        pending.add_feat(FeatId::new("battle_drill"));

        let report = validator
            .validate(&R::base_attack(1), &scout(1), Some(&pending))
            .unwrap();
        assert!(report.valid, "{report}");
    }

    #[test]
    fn and_reports_first_failing_child() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let expr = R::all([
            R::ability(Ability::Dex, 13),
            R::ability(Ability::Str, 15),
            R::feat("dodge"),
        ]);

        let report = validator.validate(&expr, &scout(1), None).unwrap();
        assert!(!report.valid);
        assert_eq!(report.failed_clauses.len(), 1);
        assert_eq!(report.failed_clauses[0].clause.as_str(), "0.1");
        assert_eq!(report.failed_clauses[0].reason, "requires STR 15 (has 10)");
    }

    #[test]
    fn or_reports_every_failed_alternative() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let expr = R::any([R::feat("dodge"), R::trained("stealth")]);

        let report = validator.validate(&expr, &scout(1), None).unwrap();
        let clauses: Vec<&str> = report.failed_clauses.iter().map(|f| f.clause.as_str()).collect();
        assert_eq!(clauses, vec!["0.0", "0.1"]);
        assert_eq!(report.failed_clauses[0].reason, "requires feat Dodge");
        assert_eq!(report.failed_clauses[1].reason, "requires Stealth trained");

        let passing = validator
            .validate(&expr, &scout(1).with_trained_skill("stealth"), None)
            .unwrap();
        assert!(passing.valid);
    }

    #[test]
    fn not_reports_itself() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let expr = R::negate(R::class_level("soldier", 1));

        assert!(validator.validate(&expr, &scout(1), None).unwrap().valid);

        let soldier = scout(1).with_class_level("soldier", LevelChoices::default());
        let report = validator.validate(&expr, &soldier, None).unwrap();
        assert_eq!(report.failed_clauses[0].clause.as_str(), "0");
        assert_eq!(report.failed_clauses[0].reason, "must not meet: Soldier level 1");
    }

    #[test]
    fn unknown_identifier_behind_short_circuit_still_fails() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        // The first alternative passes, so evaluation alone would never
        // reach the misspelled feat.
        let expr = R::any([R::character_level(1), R::feat("dodg")]);

        assert_eq!(
            validator.validate(&expr, &scout(1), None),
            Err(ProgressionError::UnknownIdentifier {
                kind: "feat",
                id: "dodg".to_string()
            })
        );
    }

    #[test]
    fn similar_names_never_match() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let result = validator.validate(&R::feat("Dodge"), &scout(1).with_feat("dodge"), None);
        assert!(matches!(result, Err(ProgressionError::UnknownIdentifier { .. })));
    }

    #[test]
    fn pending_selections_count() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let snapshot = scout(1);
        let expr = R::all([R::ability(Ability::Dex, 14), R::base_attack(1), R::feat("dodge")]);

        assert!(!validator.validate(&expr, &snapshot, None).unwrap().valid);

        let mut pending = PendingSelections::advancing("scout");
        pending.add_ability_increase(Ability::Dex);
        pending.add_feat(FeatId::new("dodge"));
        assert!(validator.validate(&expr, &snapshot, Some(&pending)).unwrap().valid);
    }

    #[test]
    fn tree_count_and_force_sensitivity() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let validator = PrerequisiteValidator::new(&catalog, &rules);
        let snapshot = scout(2).with_talent("acute_senses");

        let report = validator
            .validate(&R::talents_from_tree("awareness", 2), &snapshot, None)
            .unwrap();
        assert_eq!(report.failed_clauses[0].reason, "requires 2 talent(s) from Awareness (has 1)");

        let expr = RequirementExpression::ForceSensitive;
        assert!(!validator.validate(&expr, &snapshot, None).unwrap().valid);
        let sensitive = snapshot.with_feat("force_sensitivity");
        assert!(validator.validate(&expr, &sensitive, None).unwrap().valid);
    }
}
