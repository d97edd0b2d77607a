//! Feat reference data.

use serde::{Deserialize, Serialize};

use crate::ids::FeatId;
use crate::requirements::RequirementExpression;
use crate::value_objects::ModifierGrant;

/// A feat as described by the reference catalog.
///
/// # Design Decision (ADR-008 Tier 4)
///
/// Simple data struct with public fields: catalog entries have no invariants
/// beyond their identifier, and they are never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatDefinition {
    /// Canonical identifier
    pub id: FeatId,
    /// Display name (presentation and failure messages only)
    pub name: String,
    /// Requirements to take this feat
    #[serde(default)]
    pub prerequisites: Option<RequirementExpression>,
    /// Whether this feat can be taken multiple times
    #[serde(default)]
    pub repeatable: bool,
    /// Whether owning this feat makes the character Force-sensitive
    #[serde(default)]
    pub grants_force_sensitivity: bool,
    /// Modifiers active while the feat is owned
    #[serde(default)]
    pub modifiers: Vec<ModifierGrant>,
    /// Feats this one replaces when taken
    #[serde(default)]
    pub supersedes: Vec<FeatId>,
}

impl FeatDefinition {
    pub fn new(id: impl Into<FeatId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prerequisites: None,
            repeatable: false,
            grants_force_sensitivity: false,
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

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn force_sensitivity(mut self) -> Self {
        self.grants_force_sensitivity = true;
        self
    }

    pub fn superseding(mut self, feat: impl Into<FeatId>) -> Self {
        self.supersedes.push(feat.into());
        self
    }
}
