//! Derived statistics - a pure function of a snapshot and its modifiers.
//!
//! Every value is recomputed from scratch on each call. Nothing here caches
//! or writes back; the snapshot and modifier slices are only read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::ReferenceCatalog;
use crate::error::ProgressionError;
use crate::ids::{ClassId, FeatId, SkillId, TalentId};
use crate::progression::CharacterSnapshot;
use crate::ruleset::Ruleset;
use crate::value_objects::{
    ability_modifier, Ability, BonusType, ConditionStep, Modifier, ModifierSource, Statistic,
};

/// Combat and skill statistics computed for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub character_level: u8,
    /// Effective scores, base plus ability modifiers from all sources
    pub ability_scores: BTreeMap<Ability, i32>,
    pub ability_modifiers: BTreeMap<Ability, i32>,
    pub base_attack: i32,
    pub melee_attack: i32,
    pub ranged_attack: i32,
    pub reflex: i32,
    pub fortitude: i32,
    pub will: i32,
    pub hit_points: i32,
    pub damage_threshold: i32,
    pub skills: BTreeMap<SkillId, i32>,
    /// Feat slots granted by the class history
    pub feat_budget: i32,
    /// Talent slots granted by the class history
    pub talent_budget: i32,
}

impl DerivedStats {
    pub fn get(&self, statistic: &Statistic) -> Option<i32> {
        match statistic {
            Statistic::Ability(ability) => self.ability_scores.get(ability).copied(),
            Statistic::Skill(skill) => self.skills.get(skill).copied(),
            Statistic::BaseAttack => Some(self.base_attack),
            Statistic::MeleeAttack => Some(self.melee_attack),
            Statistic::RangedAttack => Some(self.ranged_attack),
            Statistic::Reflex => Some(self.reflex),
            Statistic::Fortitude => Some(self.fortitude),
            Statistic::Will => Some(self.will),
            Statistic::HitPoints => Some(self.hit_points),
            Statistic::DamageThreshold => Some(self.damage_threshold),
            Statistic::FeatBudget => Some(self.feat_budget),
            Statistic::TalentBudget => Some(self.talent_budget),
        }
    }

    /// Flatten into one value per statistic.
    pub fn to_map(&self) -> BTreeMap<Statistic, i32> {
        let mut map: BTreeMap<Statistic, i32> = self
            .ability_scores
            .iter()
            .map(|(ability, score)| (Statistic::Ability(*ability), *score))
            .collect();
        map.extend([
            (Statistic::BaseAttack, self.base_attack),
            (Statistic::MeleeAttack, self.melee_attack),
            (Statistic::RangedAttack, self.ranged_attack),
            (Statistic::Reflex, self.reflex),
            (Statistic::Fortitude, self.fortitude),
            (Statistic::Will, self.will),
            (Statistic::HitPoints, self.hit_points),
            (Statistic::DamageThreshold, self.damage_threshold),
            (Statistic::FeatBudget, self.feat_budget),
            (Statistic::TalentBudget, self.talent_budget),
        ]);
        map.extend(
            self.skills
                .iter()
                .map(|(skill, total)| (Statistic::Skill(skill.clone()), *total)),
        );
        map
    }
}

/// Sum of base attack progressions over a character's class levels.
pub fn base_attack_for(
    catalog: &dyn ReferenceCatalog,
    class_levels: &BTreeMap<ClassId, u8>,
) -> Result<i32, ProgressionError> {
    class_levels.iter().try_fold(0, |total, (class_id, level)| {
        Ok(total + catalog.require_class(class_id)?.base_attack.at(*level))
    })
}

/// Computes [`DerivedStats`] from ruleset formulas plus aggregated modifiers.
#[derive(Clone, Copy)]
pub struct DerivedStatCalculator<'a> {
    catalog: &'a dyn ReferenceCatalog,
    rules: &'a Ruleset,
}

impl<'a> DerivedStatCalculator<'a> {
    pub fn new(catalog: &'a dyn ReferenceCatalog, rules: &'a Ruleset) -> Self {
        Self { catalog, rules }
    }

    /// Every modifier acting on the character: the external ones (equipment,
    /// temporary effects) followed by grants of owned feats and talents and
    /// the condition-track penalty.
    pub fn collect_modifiers(
        &self,
        snapshot: &CharacterSnapshot,
        external: &[Modifier],
    ) -> Result<Vec<Modifier>, ProgressionError> {
        self.modifiers_for(
            snapshot.feats().iter(),
            snapshot.talents().iter(),
            snapshot.condition(),
            external,
        )
    }

    pub(crate) fn modifiers_for<'f>(
        &self,
        feats: impl Iterator<Item = &'f FeatId>,
        talents: impl Iterator<Item = &'f TalentId>,
        condition: ConditionStep,
        external: &[Modifier],
    ) -> Result<Vec<Modifier>, ProgressionError> {
        let mut modifiers = external.to_vec();

        for feat_id in feats {
            let feat = self.catalog.require_feat(feat_id)?;
            modifiers.extend(
                feat.modifiers
                    .iter()
                    .map(|grant| grant.attach(ModifierSource::Feat(feat_id.clone()))),
            );
        }
        for talent_id in talents {
            let talent = self.catalog.require_talent(talent_id)?;
            modifiers.extend(
                talent
                    .modifiers
                    .iter()
                    .map(|grant| grant.attach(ModifierSource::Talent(talent_id.clone()))),
            );
        }

        let penalty = self.rules.condition_penalty(condition);
        if penalty != 0 {
            let skills = self.catalog.skills();
            let targets = Statistic::CONDITION_AFFECTED
                .into_iter()
                .chain(skills.iter().map(|s| Statistic::Skill(s.id.clone())));
            modifiers.extend(targets.map(|target| {
                Modifier::new(ModifierSource::ConditionTrack, target, penalty, BonusType::condition())
            }));
        }

        Ok(modifiers)
    }

    /// Base attack bonus: class progressions plus aggregated `BaseAttack`
    /// modifiers. `modifiers` is the full set from
    /// [`collect_modifiers`](Self::collect_modifiers).
    pub fn base_attack(
        &self,
        class_levels: &BTreeMap<ClassId, u8>,
        modifiers: &[Modifier],
    ) -> Result<i32, ProgressionError> {
        Ok(base_attack_for(self.catalog, class_levels)?
            + self.rules.stacking.aggregate(&Statistic::BaseAttack, modifiers)?)
    }

    /// Compute every derived statistic for `snapshot`.
    pub fn derive(
        &self,
        snapshot: &CharacterSnapshot,
        external: &[Modifier],
    ) -> Result<DerivedStats, ProgressionError> {
        let modifiers = self.collect_modifiers(snapshot, external)?;
        let stacking = &self.rules.stacking;
        stacking.check(&modifiers)?;
        let bonus = |statistic: &Statistic| stacking.aggregate(statistic, &modifiers);

        for skill in snapshot.trained_skills() {
            self.catalog.require_skill(skill)?;
        }

        // ===== Abilities =====
        let mut ability_scores = BTreeMap::new();
        let mut ability_modifiers = BTreeMap::new();
        for ability in Ability::ALL {
            let score = snapshot.abilities().score(ability) + bonus(&Statistic::Ability(ability))?;
            ability_scores.insert(ability, score);
            ability_modifiers.insert(ability, ability_modifier(score));
        }
        let modifier_of = |ability: Ability| ability_modifiers.get(&ability).copied().unwrap_or(0);

        // ===== Attacks =====
        let level = snapshot.character_level();
        let base_attack = self.base_attack(snapshot.class_levels(), &modifiers)?;
        let melee_attack = base_attack + modifier_of(Ability::Str) + bonus(&Statistic::MeleeAttack)?;
        let ranged_attack =
            base_attack + modifier_of(Ability::Dex) + bonus(&Statistic::RangedAttack)?;

        // ===== Defenses =====
        let defense_base = self.rules.defense_base + i32::from(level);
        let mut class_reflex = 0;
        let mut class_fortitude = 0;
        let mut class_will = 0;
        for (class_id, class_level) in snapshot.class_levels() {
            if *class_level == 0 {
                continue;
            }
            let defenses = self.catalog.require_class(class_id)?.defense_bonuses;
            class_reflex = class_reflex.max(defenses.reflex);
            class_fortitude = class_fortitude.max(defenses.fortitude);
            class_will = class_will.max(defenses.will);
        }
        let reflex =
            defense_base + class_reflex + modifier_of(Ability::Dex) + bonus(&Statistic::Reflex)?;
        let fortitude = defense_base
            + class_fortitude
            + modifier_of(Ability::Con)
            + bonus(&Statistic::Fortitude)?;
        let will = defense_base + class_will + modifier_of(Ability::Wis) + bonus(&Statistic::Will)?;

        // ===== Durability =====
        let hit_points = self.base_hit_points(snapshot, modifier_of(Ability::Con))?
            + bonus(&Statistic::HitPoints)?;
        let damage_threshold = fortitude + bonus(&Statistic::DamageThreshold)?;

        // ===== Skills =====
        let half_level = i32::from(level / 2);
        let mut skills = BTreeMap::new();
        for skill in self.catalog.skills() {
            let trained = if snapshot.is_trained(&skill.id) {
                self.rules.trained_skill_bonus
            } else {
                0
            };
            let total = half_level
                + modifier_of(skill.ability)
                + trained
                + bonus(&Statistic::Skill(skill.id.clone()))?;
            skills.insert(skill.id.clone(), total);
        }

        // ===== Budgets =====
        let (feat_slots, talent_slots) = self.granted_slots(snapshot)?;
        let feat_budget = feat_slots + bonus(&Statistic::FeatBudget)?;
        let talent_budget = talent_slots + bonus(&Statistic::TalentBudget)?;

        Ok(DerivedStats {
            character_level: level,
            ability_scores,
            ability_modifiers,
            base_attack,
            melee_attack,
            ranged_attack,
            reflex,
            fortitude,
            will,
            hit_points,
            damage_threshold,
            skills,
            feat_budget,
            talent_budget,
        })
    }

    /// Hit points from the class history: the first character level grants a
    /// multiple of its hit die, later levels half the die plus one, and each
    /// level adds the CON modifier with a floor of 1 per level.
    fn base_hit_points(
        &self,
        snapshot: &CharacterSnapshot,
        con_modifier: i32,
    ) -> Result<i32, ProgressionError> {
        let mut total = 0;
        for entry in snapshot.class_history() {
            let hit_die = i32::from(self.catalog.require_class(&entry.class_id)?.hit_die);
            let rolled = if entry.character_level == 1 {
                hit_die * self.rules.first_level_hit_die_multiplier
            } else {
                hit_die / 2 + 1
            };
            total += (rolled + con_modifier).max(1);
        }
        Ok(total)
    }

    /// Feat and talent slots opened by every level in the history.
    fn granted_slots(&self, snapshot: &CharacterSnapshot) -> Result<(i32, i32), ProgressionError> {
        let mut feats = 0;
        let mut talents = 0;
        for entry in snapshot.class_history() {
            let class = self.catalog.require_class(&entry.class_id)?;
            let grant = class.grant_at(entry.class_level);

            feats += i32::from(self.rules.general_feats_at(entry.character_level));
            feats += i32::from(grant.bonus_feats);
            talents += i32::from(grant.talents);

            if entry.character_level == 1 {
                feats += i32::try_from(class.starting_feats.len()).unwrap_or(i32::MAX);
            } else if entry.class_level == 1
                && class
                    .starting_feats
                    .iter()
                    .any(|f| entry.choices.feats.contains(f))
            {
                feats += 1;
            }
        }
        Ok((feats, talents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::entities::{
        BabProgression, ClassDefinition, DefenseBonuses, FeatDefinition, LevelGrant,
        SkillDefinition, TalentDefinition,
    };
    use crate::ids::{CharacterId, ItemId};
    use crate::progression::LevelChoices;
    use crate::value_objects::{AbilityScores, ConditionStep, ModifierGrant};

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_class(
                ClassDefinition::new("scout", "Scout", 8, BabProgression::ThreeQuarter)
                    .with_defenses(DefenseBonuses::new(2, 1, 0))
                    .with_starting_feat("shake_it_off")
                    .with_grant(LevelGrant::new(2, 1, 0)),
            )
            .with_class(
                ClassDefinition::new("soldier", "Soldier", 10, BabProgression::Full)
                    .with_defenses(DefenseBonuses::new(1, 2, 0))
                    .with_starting_feat("armor_proficiency"),
            )
            .with_feat(FeatDefinition::new("shake_it_off", "Shake It Off"))
            .with_feat(FeatDefinition::new("armor_proficiency", "Armor Proficiency"))
            .with_feat(
                FeatDefinition::new("lightning_reflexes", "Lightning Reflexes")
                    .with_modifier(ModifierGrant::new(Statistic::Reflex, 2, "untyped")),
            )
            .with_skill(SkillDefinition::new("stealth", "Stealth", Ability::Dex))
            .with_skill(SkillDefinition::new("perception", "Perception", Ability::Wis))
            .with_talent(
                TalentDefinition::new("acute_senses", "Acute Senses", "awareness")
                    .with_modifier(ModifierGrant::new(Statistic::skill("perception"), 5, "talent")),
            )
    }

    fn scout_one() -> CharacterSnapshot {
        CharacterSnapshot::new(
            CharacterId::new(),
            AbilityScores::new()
                .with(Ability::Str, 12)
                .with(Ability::Dex, 14)
                .with(Ability::Con, 13),
        )
        .with_class_level(
            "scout",
            LevelChoices {
                feats: vec!["shake_it_off".into()],
                ..LevelChoices::default()
            },
        )
        .with_trained_skill("stealth")
    }

    #[test]
    fn first_level_scout() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let stats = DerivedStatCalculator::new(&catalog, &rules)
            .derive(&scout_one(), &[])
            .unwrap();

        assert_eq!(stats.base_attack, 0);
        assert_eq!(stats.melee_attack, 1);
        assert_eq!(stats.ranged_attack, 2);
        // 10 + level 1 + class 2 + DEX 2
        assert_eq!(stats.reflex, 15);
        assert_eq!(stats.fortitude, 13);
        assert_eq!(stats.will, 11);
        // 3 × 8 + CON 1
        assert_eq!(stats.hit_points, 25);
        assert_eq!(stats.damage_threshold, 13);
        assert_eq!(stats.skills[&SkillId::new("stealth")], 7);
        assert_eq!(stats.skills[&SkillId::new("perception")], 0);
        // general feat + one starting feat
        assert_eq!(stats.feat_budget, 2);
        assert_eq!(stats.talent_budget, 0);
    }

    #[test]
    fn multiclass_uses_best_defense_and_sums_attack() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let snapshot = scout_one()
            .with_class_level("scout", LevelChoices::default())
            .with_class_level(
                "soldier",
                LevelChoices {
                    feats: vec!["armor_proficiency".into()],
                    ..LevelChoices::default()
                },
            );
        let stats = DerivedStatCalculator::new(&catalog, &rules)
            .derive(&snapshot, &[])
            .unwrap();

        // Scout 2 (+1) and Soldier 1 (+1)
        assert_eq!(stats.base_attack, 2);
        assert_eq!(stats.reflex, 10 + 3 + 2 + 2);
        assert_eq!(stats.fortitude, 10 + 3 + 2 + 1);
        // 25 + (8 / 2 + 1 + 1) + (10 / 2 + 1 + 1)
        assert_eq!(stats.hit_points, 38);
        // level 1: general + starting, level 3: general + multiclass
        assert_eq!(stats.feat_budget, 4);
        assert_eq!(stats.talent_budget, 1);
    }

    #[test]
    fn owned_grants_and_external_modifiers_aggregate() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let snapshot = scout_one()
            .with_feat("lightning_reflexes")
            .with_talent("acute_senses")
            .with_equipped("blast_helmet");
        let external = [
            Modifier::new(
                ModifierSource::Item(ItemId::new("blast_helmet")),
                Statistic::Reflex,
                2,
                "equipment",
            ),
            Modifier::new(
                ModifierSource::Item(ItemId::new("combat_jumpsuit")),
                Statistic::Reflex,
                5,
                "equipment",
            ),
        ];
        let stats = DerivedStatCalculator::new(&catalog, &rules)
            .derive(&snapshot, &external)
            .unwrap();

        assert_eq!(stats.reflex, 15 + 5 + 2);
        assert_eq!(stats.skills[&SkillId::new("perception")], 5);
    }

    #[test]
    fn condition_track_penalizes_defenses_attacks_and_skills() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let snapshot = scout_one().with_condition(ConditionStep::MinusTwo);
        let stats = DerivedStatCalculator::new(&catalog, &rules)
            .derive(&snapshot, &[])
            .unwrap();

        assert_eq!(stats.reflex, 13);
        assert_eq!(stats.melee_attack, -1);
        assert_eq!(stats.skills[&SkillId::new("stealth")], 5);
        assert_eq!(stats.base_attack, 0);
        assert_eq!(stats.hit_points, 25);
    }

    #[test]
    fn derive_is_deterministic() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let calculator = DerivedStatCalculator::new(&catalog, &rules);
        let snapshot = scout_one().with_talent("acute_senses");

        let first = calculator.derive(&snapshot, &[]).unwrap();
        let second = calculator.derive(&snapshot, &[]).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.to_map().get(&Statistic::BaseAttack), Some(&0));
    }

    #[test]
    fn unknown_owned_feat_and_unknown_tag_fail() {
        let catalog = catalog();
        let rules = Ruleset::default();
        let calculator = DerivedStatCalculator::new(&catalog, &rules);

        assert!(matches!(
            calculator.derive(&scout_one().with_feat("toughnes"), &[]),
            Err(ProgressionError::UnknownIdentifier { kind: "feat", .. })
        ));

        let odd = [Modifier::new(
            ModifierSource::Effect("rally".into()),
            Statistic::Will,
            1,
            "luck",
        )];
        assert_eq!(
            calculator.derive(&scout_one(), &odd),
            Err(ProgressionError::UnknownTypeTag(BonusType::new("luck")))
        );
    }
}
