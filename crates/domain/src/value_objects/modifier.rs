//! Modifier, Statistic, and BonusType - typed contributions to statistics
//!
//! A [`Modifier`] is produced by whoever owns it (an equipped item, an owned
//! feat or talent, the condition track, a temporary effect) and is only ever
//! read by the aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{FeatId, ItemId, SkillId, TalentId};
use crate::value_objects::Ability;

/// A statistic that modifiers can target and that derivation computes.
///
/// Serialized as a flat string (`"reflex"`, `"skill:stealth"`,
/// `"ability:STR"`) so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Statistic {
    Ability(Ability),
    BaseAttack,
    MeleeAttack,
    RangedAttack,
    Reflex,
    Fortitude,
    Will,
    HitPoints,
    DamageThreshold,
    Skill(SkillId),
    FeatBudget,
    TalentBudget,
}

impl Statistic {
    /// Statistics the condition track penalizes (every skill is added by the caller).
    pub const CONDITION_AFFECTED: [Statistic; 5] = [
        Self::MeleeAttack,
        Self::RangedAttack,
        Self::Reflex,
        Self::Fortitude,
        Self::Will,
    ];

    pub fn skill(id: impl Into<SkillId>) -> Self {
        Self::Skill(id.into())
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ability(a) => write!(f, "ability:{}", a.as_str()),
            Self::BaseAttack => f.write_str("base_attack"),
            Self::MeleeAttack => f.write_str("melee_attack"),
            Self::RangedAttack => f.write_str("ranged_attack"),
            Self::Reflex => f.write_str("reflex"),
            Self::Fortitude => f.write_str("fortitude"),
            Self::Will => f.write_str("will"),
            Self::HitPoints => f.write_str("hit_points"),
            Self::DamageThreshold => f.write_str("damage_threshold"),
            Self::Skill(id) => write!(f, "skill:{id}"),
            Self::FeatBudget => f.write_str("feat_budget"),
            Self::TalentBudget => f.write_str("talent_budget"),
        }
    }
}

impl From<Statistic> for String {
    fn from(value: Statistic) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Statistic {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(skill) = value.strip_prefix("skill:") {
            return Ok(Self::Skill(SkillId::new(skill)));
        }
        if let Some(code) = value.strip_prefix("ability:") {
            return Ability::ALL
                .into_iter()
                .find(|a| a.as_str() == code)
                .map(Self::Ability)
                .ok_or_else(|| format!("unknown ability code: {code}"));
        }
        match value.as_str() {
            "base_attack" => Ok(Self::BaseAttack),
            "melee_attack" => Ok(Self::MeleeAttack),
            "ranged_attack" => Ok(Self::RangedAttack),
            "reflex" => Ok(Self::Reflex),
            "fortitude" => Ok(Self::Fortitude),
            "will" => Ok(Self::Will),
            "hit_points" => Ok(Self::HitPoints),
            "damage_threshold" => Ok(Self::DamageThreshold),
            "feat_budget" => Ok(Self::FeatBudget),
            "talent_budget" => Ok(Self::TalentBudget),
            other => Err(format!("unknown statistic: {other}")),
        }
    }
}

/// Bonus type tag (e.g. `dodge`, `equipment`, `circumstance`).
///
/// Whether a tag stacks is decided solely by the
/// [`StackingTable`](crate::stats::StackingTable).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BonusType(String);

impl BonusType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag used for condition-track penalties.
    pub fn condition() -> Self {
        Self::new("condition")
    }

    pub fn untyped() -> Self {
        Self::new("untyped")
    }
}

impl fmt::Display for BonusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BonusType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where a modifier came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ModifierSource {
    Item(ItemId),
    Feat(FeatId),
    Talent(TalentId),
    ConditionTrack,
    /// A temporary effect, named by its owner.
    Effect(String),
}

impl fmt::Display for ModifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "item {id}"),
            Self::Feat(id) => write!(f, "feat {id}"),
            Self::Talent(id) => write!(f, "talent {id}"),
            Self::ConditionTrack => f.write_str("condition track"),
            Self::Effect(name) => write!(f, "effect {name}"),
        }
    }
}

/// A typed numeric contribution to one statistic from one source.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier {
    source: ModifierSource,
    target: Statistic,
    value: i32,
    bonus_type: BonusType,
}

impl Modifier {
    pub fn new(
        source: ModifierSource,
        target: Statistic,
        value: i32,
        bonus_type: impl Into<BonusType>,
    ) -> Self {
        Self {
            source,
            target,
            value,
            bonus_type: bonus_type.into(),
        }
    }

    pub fn source(&self) -> &ModifierSource {
        &self.source
    }

    pub fn target(&self) -> &Statistic {
        &self.target
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn bonus_type(&self) -> &BonusType {
        &self.bonus_type
    }
}

/// A modifier template carried by catalog entries (feats, talents).
///
/// Becomes a [`Modifier`] once attached to the owning source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierGrant {
    pub target: Statistic,
    pub value: i32,
    pub bonus_type: BonusType,
}

impl ModifierGrant {
    pub fn new(target: Statistic, value: i32, bonus_type: impl Into<BonusType>) -> Self {
        Self {
            target,
            value,
            bonus_type: bonus_type.into(),
        }
    }

    pub fn attach(&self, source: ModifierSource) -> Modifier {
        Modifier::new(source, self.target.clone(), self.value, self.bonus_type.clone())
    }
}
