//! Ability value objects - the six ability scores and their modifiers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the six ability scores.
///
/// Serialized as the three-letter code (`"STR"`, `"DEX"`, ...). Unlike
/// display text, the codes are the canonical form and no other spelling
/// is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Self::Str,
        Self::Dex,
        Self::Con,
        Self::Int,
        Self::Wis,
        Self::Cha,
    ];

    /// Returns the short uppercase code (e.g., "STR", "DEX").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "STR",
            Self::Dex => "DEX",
            Self::Con => "CON",
            Self::Int => "INT",
            Self::Wis => "WIS",
            Self::Cha => "CHA",
        }
    }

    /// Returns the full name (e.g., "Strength"). Presentation only.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Str => "Strength",
            Self::Dex => "Dexterity",
            Self::Con => "Constitution",
            Self::Int => "Intelligence",
            Self::Wis => "Wisdom",
            Self::Cha => "Charisma",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modifier for an ability score: `floor((score - 10) / 2)`.
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// The six base ability scores of a character.
///
/// Scores missing from the map read as 10 (modifier +0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityScores(BTreeMap<Ability, i32>);

impl AbilityScores {
    pub const BASELINE: i32 = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ability: Ability, score: i32) -> Self {
        self.0.insert(ability, score);
        self
    }

    pub fn score(&self, ability: Ability) -> i32 {
        self.0.get(&ability).copied().unwrap_or(Self::BASELINE)
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.score(ability))
    }

    pub(crate) fn set(&mut self, ability: Ability, score: i32) {
        self.0.insert(ability, score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_rounds_down() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(11), 0);
        assert_eq!(ability_modifier(12), 1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(7), -2);
        assert_eq!(ability_modifier(18), 4);
    }

    #[test]
    fn missing_scores_read_as_baseline() {
        let scores = AbilityScores::new().with(Ability::Str, 14);
        assert_eq!(scores.score(Ability::Str), 14);
        assert_eq!(scores.score(Ability::Wis), 10);
        assert_eq!(scores.modifier(Ability::Str), 2);
    }

    #[test]
    fn abilities_serialize_as_codes() {
        let json = serde_json::to_string(&Ability::Cha).unwrap();
        assert_eq!(json, "\"CHA\"");
        assert!(serde_json::from_str::<Ability>("\"Charisma\"").is_err());
    }
}
