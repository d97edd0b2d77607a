//! Bonus aggregation under the ruleset's stacking semantics.
//!
//! The [`StackingTable`] is the single authority on whether a bonus type
//! stacks. Every statistic is reduced through [`StackingTable::aggregate`];
//! no call site sums modifiers on its own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProgressionError;
use crate::value_objects::{BonusType, Modifier, Statistic};

/// How instances of one bonus type combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stacking {
    /// All instances sum.
    Stacks,
    /// Only one instance applies: the best bonus, or the most severe
    /// penalty when no non-negative instance exists.
    BestOnly,
}

/// Per-type contributions to one statistic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Breakdown(BTreeMap<BonusType, i32>);

impl Breakdown {
    pub fn total(&self) -> i32 {
        self.0.values().sum()
    }

    pub fn get(&self, bonus_type: &BonusType) -> i32 {
        self.0.get(bonus_type).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BonusType, i32)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

/// Authoritative bonus-type → stacking rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackingTable(BTreeMap<BonusType, Stacking>);

impl Default for StackingTable {
    fn default() -> Self {
        Self::saga_default()
    }
}

impl StackingTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Core-rules table: typed bonuses keep their best instance; circumstance,
    /// condition, dodge, and untyped bonuses sum.
    pub fn saga_default() -> Self {
        let best_only = [
            "ability",
            "armor",
            "class",
            "competence",
            "equipment",
            "force",
            "insight",
            "morale",
            "racial",
            "size",
            "species",
            "talent",
        ];
        let stacks = ["circumstance", "condition", "dodge", "untyped"];

        best_only
            .into_iter()
            .map(|t| (t, Stacking::BestOnly))
            .chain(stacks.into_iter().map(|t| (t, Stacking::Stacks)))
            .fold(Self::empty(), |table, (tag, rule)| table.with(tag, rule))
    }

    pub fn with(mut self, bonus_type: impl Into<BonusType>, stacking: Stacking) -> Self {
        self.0.insert(bonus_type.into(), stacking);
        self
    }

    pub fn stacking_of(&self, bonus_type: &BonusType) -> Option<Stacking> {
        self.0.get(bonus_type).copied()
    }

    /// Fails on the first modifier whose bonus type is not in the table.
    pub fn check(&self, modifiers: &[Modifier]) -> Result<(), ProgressionError> {
        match modifiers
            .iter()
            .find(|m| !self.0.contains_key(m.bonus_type()))
        {
            Some(m) => Err(ProgressionError::UnknownTypeTag(m.bonus_type().clone())),
            None => Ok(()),
        }
    }

    /// Per-type contributions of the modifiers targeting `statistic`.
    pub fn breakdown(
        &self,
        statistic: &Statistic,
        modifiers: &[Modifier],
    ) -> Result<Breakdown, ProgressionError> {
        self.check(modifiers)?;

        let mut grouped: BTreeMap<&BonusType, Vec<i32>> = BTreeMap::new();
        for modifier in modifiers.iter().filter(|m| m.target() == statistic) {
            grouped
                .entry(modifier.bonus_type())
                .or_default()
                .push(modifier.value());
        }

        let mut contributions = BTreeMap::new();
        for (bonus_type, values) in grouped {
            let value = match self.stacking_of(bonus_type) {
                Some(Stacking::Stacks) => values.iter().sum(),
                Some(Stacking::BestOnly) => best_instance(&values),
                None => return Err(ProgressionError::UnknownTypeTag(bonus_type.clone())),
            };
            contributions.insert(bonus_type.clone(), value);
        }
        Ok(Breakdown(contributions))
    }

    /// Reduce the modifiers targeting `statistic` to a single number.
    pub fn aggregate(
        &self,
        statistic: &Statistic,
        modifiers: &[Modifier],
    ) -> Result<i32, ProgressionError> {
        Ok(self.breakdown(statistic, modifiers)?.total())
    }
}

fn best_instance(values: &[i32]) -> i32 {
    let best_bonus = values.iter().copied().filter(|v| *v >= 0).max();
    match best_bonus {
        Some(bonus) => bonus,
        None => values.iter().copied().min().unwrap_or(0),
    }
}
