//! Delta - the declarative description of one state change.
//!
//! A delta is produced once by the resolver and consumed once by the
//! commit path. [`Delta::apply_to`] is the only function that turns a
//! snapshot into a changed snapshot; the resolver uses it to project the
//! post-level state and the store uses it to commit, so both see the same
//! result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ProgressionError;
use crate::ids::{CharacterId, ClassId, FeatId, SkillId, TalentId};
use crate::value_objects::{Ability, Statistic};

use super::snapshot::{CharacterSnapshot, ClassLevelEntry, StateVersion};

/// A scalar field a delta can set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Field {
    Level,
    ClassLevel(ClassId),
    Ability(Ability),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level => f.write_str("level"),
            Self::ClassLevel(class) => write!(f, "class_level:{class}"),
            Self::Ability(ability) => write!(f, "ability:{}", ability.as_str()),
        }
    }
}

impl From<Field> for String {
    fn from(value: Field) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "level" {
            return Ok(Self::Level);
        }
        if let Some(class) = value.strip_prefix("class_level:") {
            return Ok(Self::ClassLevel(ClassId::new(class)));
        }
        if let Some(code) = value.strip_prefix("ability:") {
            return Ability::ALL
                .into_iter()
                .find(|a| a.as_str() == code)
                .map(Self::Ability)
                .ok_or_else(|| format!("unknown ability code: {code}"));
        }
        Err(format!("unknown field: {value}"))
    }
}

/// An identifier set a delta can add to or remove from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Feats,
    Talents,
    TrainedSkills,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Feats => "feats",
            Self::Talents => "talents",
            Self::TrainedSkills => "trained_skills",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    character_id: CharacterId,
    base_version: StateVersion,
    set: BTreeMap<Field, i32>,
    add: BTreeMap<Collection, Vec<String>>,
    remove: BTreeMap<Collection, Vec<String>>,
    append: Vec<ClassLevelEntry>,
    computed: BTreeMap<Statistic, i32>,
}

impl Delta {
    pub fn builder(character_id: CharacterId, base_version: StateVersion) -> DeltaBuilder {
        DeltaBuilder {
            delta: Delta {
                character_id,
                base_version,
                set: BTreeMap::new(),
                add: BTreeMap::new(),
                remove: BTreeMap::new(),
                append: Vec::new(),
                computed: BTreeMap::new(),
            },
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn character_id(&self) -> CharacterId {
        self.character_id
    }

    /// Version of the snapshot this delta was resolved against.
    pub fn base_version(&self) -> StateVersion {
        self.base_version
    }

    pub fn set(&self) -> &BTreeMap<Field, i32> {
        &self.set
    }

    pub fn add(&self) -> &BTreeMap<Collection, Vec<String>> {
        &self.add
    }

    pub fn remove(&self) -> &BTreeMap<Collection, Vec<String>> {
        &self.remove
    }

    pub fn append(&self) -> &[ClassLevelEntry] {
        &self.append
    }

    pub fn computed(&self) -> &BTreeMap<Statistic, i32> {
        &self.computed
    }

    pub fn added(&self, collection: Collection) -> &[String] {
        self.add.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn removed(&self, collection: Collection) -> &[String] {
        self.remove.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn computed_value(&self, statistic: &Statistic) -> Option<i32> {
        self.computed.get(statistic).copied()
    }

    pub fn set_value(&self, field: &Field) -> Option<i32> {
        self.set.get(field).copied()
    }

    // =========================================================================
    // Application
    // =========================================================================

    /// Produce the snapshot that results from applying this delta.
    ///
    /// Every entry is applied to a private copy; on any error the copy is
    /// dropped, so callers observe either the untouched input or the fully
    /// applied result. The returned snapshot keeps the input's version;
    /// bumping it is the committer's job.
    pub fn apply_to(
        &self,
        snapshot: &CharacterSnapshot,
    ) -> Result<CharacterSnapshot, ProgressionError> {
        if snapshot.id() != self.character_id {
            return Err(ProgressionError::invalid_delta(format!(
                "delta for character {} applied to character {}",
                self.character_id,
                snapshot.id()
            )));
        }
        if snapshot.version() != self.base_version {
            return Err(ProgressionError::ConcurrentModification {
                expected: self.base_version,
                actual: snapshot.version(),
            });
        }

        let mut next = snapshot.clone();

        for (field, value) in &self.set {
            match field {
                Field::Level => next.set_level(level_value(field, *value)?),
                Field::ClassLevel(class) => {
                    next.set_class_level(class.clone(), level_value(field, *value)?)
                }
                Field::Ability(ability) => next.abilities_mut().set(*ability, *value),
            }
        }

        for (collection, ids) in &self.remove {
            for id in ids {
                let removed = match collection {
                    Collection::Feats => next.feats_mut().remove(&FeatId::new(id.as_str())),
                    Collection::Talents => next.talents_mut().remove(&TalentId::new(id.as_str())),
                    Collection::TrainedSkills => {
                        next.trained_skills_mut().remove(&SkillId::new(id.as_str()))
                    }
                };
                if !removed {
                    return Err(ProgressionError::invalid_delta(format!(
                        "cannot remove {id} from {collection}: not owned"
                    )));
                }
            }
        }

        for (collection, ids) in &self.add {
            for id in ids {
                let inserted = match collection {
                    Collection::Feats => next.feats_mut().insert(FeatId::new(id.as_str())),
                    Collection::Talents => next.talents_mut().insert(TalentId::new(id.as_str())),
                    Collection::TrainedSkills => {
                        next.trained_skills_mut().insert(SkillId::new(id.as_str()))
                    }
                };
                if !inserted {
                    return Err(ProgressionError::invalid_delta(format!(
                        "cannot add {id} to {collection}: already owned"
                    )));
                }
            }
        }

        for entry in &self.append {
            next.push_history(entry.clone());
        }

        next.check_consistency()?;
        Ok(next)
    }

    /// [`apply_to`](Self::apply_to) followed by the version bump a commit performs.
    pub fn commit_onto(
        &self,
        snapshot: &CharacterSnapshot,
    ) -> Result<CharacterSnapshot, ProgressionError> {
        let mut next = self.apply_to(snapshot)?;
        next.set_version(snapshot.version().next());
        Ok(next)
    }
}

fn level_value(field: &Field, value: i32) -> Result<u8, ProgressionError> {
    u8::try_from(value)
        .map_err(|_| ProgressionError::invalid_delta(format!("{field} out of range: {value}")))
}

/// Assembles a [`Delta`]. Once `build` is called the delta cannot change.
#[derive(Debug, Clone)]
pub struct DeltaBuilder {
    delta: Delta,
}

impl DeltaBuilder {
    pub fn set(mut self, field: Field, value: i32) -> Self {
        self.delta.set.insert(field, value);
        self
    }

    pub fn add(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.delta.add.entry(collection).or_default().push(id.into());
        self
    }

    pub fn remove(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.delta
            .remove
            .entry(collection)
            .or_default()
            .push(id.into());
        self
    }

    pub fn append(mut self, entry: ClassLevelEntry) -> Self {
        self.delta.append.push(entry);
        self
    }

    pub fn computed(mut self, computed: BTreeMap<Statistic, i32>) -> Self {
        self.delta.computed = computed;
        self
    }

    pub fn build(self) -> Delta {
        self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::LevelChoices;
    use crate::value_objects::AbilityScores;

    fn level_one() -> CharacterSnapshot {
        CharacterSnapshot::new(CharacterId::new(), AbilityScores::new())
            .with_class_level("scout", LevelChoices::default())
            .with_feat("weapon_proficiency_pistols")
            .with_version(StateVersion::new(7))
    }

    fn level_two_delta(snapshot: &CharacterSnapshot) -> DeltaBuilder {
        Delta::builder(snapshot.id(), snapshot.version())
            .set(Field::Level, 2)
            .set(Field::ClassLevel(ClassId::new("scout")), 2)
            .add(Collection::Talents, "acute_senses")
            .append(ClassLevelEntry {
                class_id: ClassId::new("scout"),
                class_level: 2,
                character_level: 2,
                choices: LevelChoices {
                    talents: vec![TalentId::new("acute_senses")],
                    ..LevelChoices::default()
                },
            })
    }

    #[test]
    fn applies_every_entry() {
        let snapshot = level_one();
        let next = level_two_delta(&snapshot)
            .set(Field::Ability(Ability::Dex), 14)
            .build()
            .apply_to(&snapshot)
            .unwrap();

        assert_eq!(next.character_level(), 2);
        assert_eq!(next.class_level(&ClassId::new("scout")), 2);
        assert!(next.owns_talent(&TalentId::new("acute_senses")));
        assert_eq!(next.abilities().score(Ability::Dex), 14);
        assert_eq!(next.version(), snapshot.version());
    }

    #[test]
    fn commit_onto_bumps_version_once() {
        let snapshot = level_one();
        let next = level_two_delta(&snapshot)
            .build()
            .commit_onto(&snapshot)
            .unwrap();
        assert_eq!(next.version(), StateVersion::new(8));
    }

    #[test]
    fn failure_midway_leaves_input_untouched() {
        let snapshot = level_one();
        let before = snapshot.clone();
        let result = level_two_delta(&snapshot)
            .remove(Collection::Feats, "not_owned")
            .build()
            .apply_to(&snapshot);

        assert!(matches!(result, Err(ProgressionError::InvalidDelta(_))));
        assert_eq!(snapshot, before);
    }

    #[test]
    fn adding_owned_id_is_rejected() {
        let snapshot = level_one();
        let result = level_two_delta(&snapshot)
            .add(Collection::Feats, "weapon_proficiency_pistols")
            .build()
            .apply_to(&snapshot);
        assert!(matches!(result, Err(ProgressionError::InvalidDelta(_))));
    }

    #[test]
    fn stale_base_version_is_concurrent_modification() {
        let snapshot = level_one();
        let delta = Delta::builder(snapshot.id(), StateVersion::new(6)).build();
        assert_eq!(
            delta.apply_to(&snapshot),
            Err(ProgressionError::ConcurrentModification {
                expected: StateVersion::new(6),
                actual: StateVersion::new(7),
            })
        );
    }

    #[test]
    fn level_without_history_is_rejected() {
        let snapshot = level_one();
        let delta = Delta::builder(snapshot.id(), snapshot.version())
            .set(Field::Level, 2)
            .build();
        assert!(matches!(
            delta.apply_to(&snapshot),
            Err(ProgressionError::InvalidDelta(_))
        ));
    }

    #[test]
    fn serializes_with_string_keys() {
        let snapshot = level_one();
        let delta = level_two_delta(&snapshot)
            .computed(BTreeMap::from([(Statistic::BaseAttack, 1)]))
            .build();
        let json = serde_json::to_value(&delta).unwrap();

        assert_eq!(json["set"]["level"], 2);
        assert_eq!(json["set"]["class_level:scout"], 2);
        assert_eq!(json["add"]["talents"][0], "acute_senses");
        assert_eq!(json["computed"]["base_attack"], 1);

        let back: Delta = serde_json::from_value(json).unwrap();
        assert_eq!(back, delta);
    }
}
