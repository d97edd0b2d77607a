//! Talent and talent tree reference data.

use serde::{Deserialize, Serialize};

use crate::ids::{TalentId, TalentTreeId};
use crate::requirements::RequirementExpression;
use crate::value_objects::ModifierGrant;

/// A talent as described by the reference catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TalentDefinition {
    pub id: TalentId,
    pub name: String,
    /// The tree this talent belongs to; classes grant access per tree
    pub tree: TalentTreeId,
    #[serde(default)]
    pub prerequisites: Option<RequirementExpression>,
    #[serde(default)]
    pub modifiers: Vec<ModifierGrant>,
    /// Talents this one replaces when taken
    #[serde(default)]
    pub supersedes: Vec<TalentId>,
}

impl TalentDefinition {
    pub fn new(
        id: impl Into<TalentId>,
        name: impl Into<String>,
        tree: impl Into<TalentTreeId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tree: tree.into(),
            prerequisites: None,
            modifiers: Vec::new(),
            supersedes: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: RequirementExpression) -> Self {
        self.prerequisites = Some(prerequisites);
        self
    }

    pub fn with_modifier(mut self, grant: ModifierGrant) -> Self {
        self.modifiers.push(grant);
        self
    }

    pub fn superseding(mut self, talent: impl Into<TalentId>) -> Self {
        self.supersedes.push(talent.into());
        self
    }
}

/// A named group of talents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TalentTree {
    pub id: TalentTreeId,
    pub name: String,
}

impl TalentTree {
    pub fn new(id: impl Into<TalentTreeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
