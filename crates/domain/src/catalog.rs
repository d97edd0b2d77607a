//! Reference-data catalog boundary.
//!
//! Every lookup is an exact match on a canonical identifier and returns
//! `None` when nothing matches. There is no name search and no closest-match
//! fallback; `require_*` turns a miss into [`ProgressionError::UnknownIdentifier`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{
    ClassDefinition, FeatDefinition, SkillDefinition, TalentDefinition, TalentTree,
};
use crate::error::ProgressionError;
use crate::ids::{ClassId, FeatId, SkillId, TalentId, TalentTreeId};
use crate::requirements::RequirementExpression;

/// Canonical lookups into the compendium.
pub trait ReferenceCatalog: Send + Sync {
    fn feat(&self, id: &FeatId) -> Option<&FeatDefinition>;
    fn talent(&self, id: &TalentId) -> Option<&TalentDefinition>;
    fn class(&self, id: &ClassId) -> Option<&ClassDefinition>;
    fn skill(&self, id: &SkillId) -> Option<&SkillDefinition>;
    fn talent_tree(&self, id: &TalentTreeId) -> Option<&TalentTree>;

    /// Entry requirements of a prestige class. `None` for classes without any.
    fn prestige_requirements(&self, id: &ClassId) -> Option<&RequirementExpression>;

    /// All skills, ordered by identifier.
    fn skills(&self) -> Vec<&SkillDefinition>;

    /// Talents of one tree, ordered by identifier.
    fn talents_in_tree(&self, tree: &TalentTreeId) -> Vec<&TalentDefinition>;

    fn require_feat(&self, id: &FeatId) -> Result<&FeatDefinition, ProgressionError> {
        self.feat(id)
            .ok_or_else(|| ProgressionError::unknown(FeatId::KIND, id))
    }

    fn require_talent(&self, id: &TalentId) -> Result<&TalentDefinition, ProgressionError> {
        self.talent(id)
            .ok_or_else(|| ProgressionError::unknown(TalentId::KIND, id))
    }

    fn require_class(&self, id: &ClassId) -> Result<&ClassDefinition, ProgressionError> {
        self.class(id)
            .ok_or_else(|| ProgressionError::unknown(ClassId::KIND, id))
    }

    fn require_skill(&self, id: &SkillId) -> Result<&SkillDefinition, ProgressionError> {
        self.skill(id)
            .ok_or_else(|| ProgressionError::unknown(SkillId::KIND, id))
    }

    fn require_talent_tree(&self, id: &TalentTreeId) -> Result<&TalentTree, ProgressionError> {
        self.talent_tree(id)
            .ok_or_else(|| ProgressionError::unknown(TalentTreeId::KIND, id))
    }
}

/// Serialized form of a catalog: flat lists plus prestige requirements by class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    #[serde(default)]
    pub classes: Vec<ClassDefinition>,
    #[serde(default)]
    pub feats: Vec<FeatDefinition>,
    #[serde(default)]
    pub talents: Vec<TalentDefinition>,
    #[serde(default)]
    pub talent_trees: Vec<TalentTree>,
    #[serde(default)]
    pub skills: Vec<SkillDefinition>,
    #[serde(default)]
    pub prestige_requirements: BTreeMap<ClassId, RequirementExpression>,
}

/// Catalog held entirely in memory, keyed by canonical id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "CatalogDocument", into = "CatalogDocument")]
pub struct InMemoryCatalog {
    classes: BTreeMap<ClassId, ClassDefinition>,
    feats: BTreeMap<FeatId, FeatDefinition>,
    talents: BTreeMap<TalentId, TalentDefinition>,
    talent_trees: BTreeMap<TalentTreeId, TalentTree>,
    skills: BTreeMap<SkillId, SkillDefinition>,
    prestige_requirements: BTreeMap<ClassId, RequirementExpression>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: ClassDefinition) -> Self {
        self.classes.insert(class.id.clone(), class);
        self
    }

    pub fn with_feat(mut self, feat: FeatDefinition) -> Self {
        self.feats.insert(feat.id.clone(), feat);
        self
    }

    pub fn with_talent(mut self, talent: TalentDefinition) -> Self {
        self.talents.insert(talent.id.clone(), talent);
        self
    }

    pub fn with_talent_tree(mut self, tree: TalentTree) -> Self {
        self.talent_trees.insert(tree.id.clone(), tree);
        self
    }

    pub fn with_skill(mut self, skill: SkillDefinition) -> Self {
        self.skills.insert(skill.id.clone(), skill);
        self
    }

    pub fn with_prestige_requirements(
        mut self,
        class: impl Into<ClassId>,
        requirements: RequirementExpression,
    ) -> Self {
        self.prestige_requirements.insert(class.into(), requirements);
        self
    }
}

fn index_unique<K, V>(
    kind: &str,
    items: Vec<V>,
    key: impl Fn(&V) -> K,
) -> Result<BTreeMap<K, V>, String>
where
    K: Ord + std::fmt::Display,
{
    let mut map = BTreeMap::new();
    for item in items {
        let id = key(&item);
        if map.contains_key(&id) {
            return Err(format!("duplicate {kind} identifier in catalog: {id}"));
        }
        map.insert(id, item);
    }
    Ok(map)
}

impl TryFrom<CatalogDocument> for InMemoryCatalog {
    type Error = String;

    fn try_from(doc: CatalogDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            classes: index_unique(ClassId::KIND, doc.classes, |c| c.id.clone())?,
            feats: index_unique(FeatId::KIND, doc.feats, |f| f.id.clone())?,
            talents: index_unique(TalentId::KIND, doc.talents, |t| t.id.clone())?,
            talent_trees: index_unique(TalentTreeId::KIND, doc.talent_trees, |t| t.id.clone())?,
            skills: index_unique(SkillId::KIND, doc.skills, |s| s.id.clone())?,
            prestige_requirements: doc.prestige_requirements,
        })
    }
}

impl From<InMemoryCatalog> for CatalogDocument {
    fn from(catalog: InMemoryCatalog) -> Self {
        Self {
            classes: catalog.classes.into_values().collect(),
            feats: catalog.feats.into_values().collect(),
            talents: catalog.talents.into_values().collect(),
            talent_trees: catalog.talent_trees.into_values().collect(),
            skills: catalog.skills.into_values().collect(),
            prestige_requirements: catalog.prestige_requirements,
        }
    }
}

impl ReferenceCatalog for InMemoryCatalog {
    fn feat(&self, id: &FeatId) -> Option<&FeatDefinition> {
        self.feats.get(id)
    }

    fn talent(&self, id: &TalentId) -> Option<&TalentDefinition> {
        self.talents.get(id)
    }

    fn class(&self, id: &ClassId) -> Option<&ClassDefinition> {
        self.classes.get(id)
    }

    fn skill(&self, id: &SkillId) -> Option<&SkillDefinition> {
        self.skills.get(id)
    }

    fn talent_tree(&self, id: &TalentTreeId) -> Option<&TalentTree> {
        self.talent_trees.get(id)
    }

    fn prestige_requirements(&self, id: &ClassId) -> Option<&RequirementExpression> {
        self.prestige_requirements.get(id)
    }

    fn skills(&self) -> Vec<&SkillDefinition> {
        self.skills.values().collect()
    }

    fn talents_in_tree(&self, tree: &TalentTreeId) -> Vec<&TalentDefinition> {
        self.talents.values().filter(|t| &t.tree == tree).collect()
    }
}
