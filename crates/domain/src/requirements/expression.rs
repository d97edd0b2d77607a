//! Requirement expressions and validation reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ClassId, FeatId, SkillId, TalentId, TalentTreeId};
use crate::value_objects::Ability;

/// A boolean tree of prerequisite clauses gating a selectable choice.
///
/// Leaves reference catalog identifiers only. Display names never appear
/// here; they are looked up when a failure reason is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementExpression {
    AbilityAtLeast { ability: Ability, score: i32 },
    CharacterLevelAtLeast { level: u8 },
    ClassLevelAtLeast { class_id: ClassId, level: u8 },
    BaseAttackAtLeast { bonus: i32 },
    Trained { skill_id: SkillId },
    OwnsFeat { feat_id: FeatId },
    OwnsTalent { talent_id: TalentId },
    /// At least `count` talents owned from one tree.
    TalentsFromTree { tree_id: TalentTreeId, count: u8 },
    /// Owns a feat that confers Force sensitivity.
    ForceSensitive,
    All { clauses: Vec<RequirementExpression> },
    Any { clauses: Vec<RequirementExpression> },
    Not { clause: Box<RequirementExpression> },
}

impl RequirementExpression {
    pub fn ability(ability: Ability, score: i32) -> Self {
        Self::AbilityAtLeast { ability, score }
    }

    pub fn character_level(level: u8) -> Self {
        Self::CharacterLevelAtLeast { level }
    }

    pub fn class_level(class_id: impl Into<ClassId>, level: u8) -> Self {
        Self::ClassLevelAtLeast {
            class_id: class_id.into(),
            level,
        }
    }

    pub fn base_attack(bonus: i32) -> Self {
        Self::BaseAttackAtLeast { bonus }
    }

    pub fn trained(skill_id: impl Into<SkillId>) -> Self {
        Self::Trained {
            skill_id: skill_id.into(),
        }
    }

    pub fn feat(feat_id: impl Into<FeatId>) -> Self {
        Self::OwnsFeat {
            feat_id: feat_id.into(),
        }
    }

    pub fn talent(talent_id: impl Into<TalentId>) -> Self {
        Self::OwnsTalent {
            talent_id: talent_id.into(),
        }
    }

    pub fn talents_from_tree(tree_id: impl Into<TalentTreeId>, count: u8) -> Self {
        Self::TalentsFromTree {
            tree_id: tree_id.into(),
            count,
        }
    }

    pub fn all(clauses: impl IntoIterator<Item = RequirementExpression>) -> Self {
        Self::All {
            clauses: clauses.into_iter().collect(),
        }
    }

    pub fn any(clauses: impl IntoIterator<Item = RequirementExpression>) -> Self {
        Self::Any {
            clauses: clauses.into_iter().collect(),
        }
    }

    pub fn negate(clause: RequirementExpression) -> Self {
        Self::Not {
            clause: Box::new(clause),
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::All { .. } | Self::Any { .. } | Self::Not { .. })
    }
}

/// Position of a clause in its expression: the dotted child-index path
/// from the root (`"0"` is the root, `"0.2"` its third child).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClauseId(String);

impl ClauseId {
    pub fn root() -> Self {
        Self("0".to_owned())
    }

    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}.{index}", self.0))
    }

    /// A clause outside any expression tree (slot rules, class-tree membership).
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClauseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An unmet clause and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedClause {
    pub clause: ClauseId,
    pub reason: String,
}

impl FailedClause {
    pub fn new(clause: ClauseId, reason: impl Into<String>) -> Self {
        Self {
            clause,
            reason: reason.into(),
        }
    }
}

/// Result of evaluating a requirement expression.
///
/// Callers branch on `valid`; `failed_clauses` lists every unmet leaf on
/// the evaluated path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub failed_clauses: Vec<FailedClause>,
}

impl ValidationReport {
    pub fn passed() -> Self {
        Self {
            valid: true,
            failed_clauses: Vec::new(),
        }
    }

    pub fn failed(failed_clauses: Vec<FailedClause>) -> Self {
        Self {
            valid: false,
            failed_clauses,
        }
    }

    pub fn single(clause: ClauseId, reason: impl Into<String>) -> Self {
        Self::failed(vec![FailedClause::new(clause, reason)])
    }

    /// Prefixes every clause id, so reports from a selection's own
    /// prerequisites stay distinguishable once merged.
    pub fn scoped(self, scope: &str) -> Self {
        Self {
            valid: self.valid,
            failed_clauses: self
                .failed_clauses
                .into_iter()
                .map(|f| FailedClause::new(ClauseId(format!("{scope}/{}", f.clause)), f.reason))
                .collect(),
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return f.write_str("all requirements met");
        }
        let reasons: Vec<String> = self
            .failed_clauses
            .iter()
            .map(|c| format!("[{}] {}", c.clause, c.reason))
            .collect();
        f.write_str(&reasons.join("; "))
    }
}
