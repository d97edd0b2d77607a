//! In-memory character records and modifier sources.
//!
//! Records live in a `DashMap`; a commit holds the entry's write guard while
//! it checks the version and swaps the snapshot, so concurrent commits on one
//! character serialize and commits on different characters do not contend.

use async_trait::async_trait;
use dashmap::DashMap;
use saga_domain::{CharacterId, CharacterSnapshot, Delta, Modifier};

use crate::infrastructure::ports::{CharacterRecordRepo, CommitError, ModifierProvider, RepoError};

/// Character records keyed by id.
#[derive(Default)]
pub struct InMemoryCharacterStore {
    records: DashMap<CharacterId, CharacterSnapshot>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot` as-is, replacing any record with the same id.
    ///
    /// Seeding bypasses the version check; it is for loading records, not
    /// for changing them.
    pub fn seed(&self, snapshot: CharacterSnapshot) {
        self.records.insert(snapshot.id(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CharacterRecordRepo for InMemoryCharacterStore {
    async fn get(&self, id: CharacterId) -> Result<Option<CharacterSnapshot>, RepoError> {
        Ok(self.records.get(&id).map(|record| record.value().clone()))
    }

    async fn commit(&self, delta: &Delta) -> Result<CharacterSnapshot, CommitError> {
        let id = delta.character_id();
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("Character", id))?;

        let next = delta.commit_onto(record.value())?;
        *record.value_mut() = next.clone();
        Ok(next)
    }
}

/// Externally owned modifiers keyed by character.
#[derive(Default)]
pub struct InMemoryModifierStore {
    modifiers: DashMap<CharacterId, Vec<Modifier>>,
}

impl InMemoryModifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: CharacterId, modifiers: Vec<Modifier>) {
        self.modifiers.insert(id, modifiers);
    }

    pub fn push(&self, id: CharacterId, modifier: Modifier) {
        self.modifiers.entry(id).or_default().push(modifier);
    }

    pub fn clear(&self, id: CharacterId) {
        self.modifiers.remove(&id);
    }
}

#[async_trait]
impl ModifierProvider for InMemoryModifierStore {
    async fn active_modifiers(&self, id: CharacterId) -> Result<Vec<Modifier>, RepoError> {
        Ok(self
            .modifiers
            .get(&id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_domain::{
        AbilityScores, Collection, Field, LevelChoices, ModifierSource, ProgressionError,
        StateVersion, Statistic,
    };
    use std::sync::Arc;

    fn record() -> CharacterSnapshot {
        CharacterSnapshot::new(CharacterId::new(), AbilityScores::new())
            .with_class_level("scout", LevelChoices::default())
            .with_version(StateVersion::new(4))
    }

    fn train_stealth(snapshot: &CharacterSnapshot) -> Delta {
        Delta::builder(snapshot.id(), snapshot.version())
            .add(Collection::TrainedSkills, "stealth")
            .build()
    }

    #[tokio::test]
    async fn commit_swaps_record_and_bumps_version() {
        let store = InMemoryCharacterStore::new();
        let snapshot = record();
        store.seed(snapshot.clone());

        let committed = store.commit(&train_stealth(&snapshot)).await.unwrap();

        assert_eq!(committed.version(), StateVersion::new(5));
        assert!(committed.is_trained(&"stealth".into()));
        let stored = store.get(snapshot.id()).await.unwrap().unwrap();
        assert_eq!(stored, committed);
    }

    #[tokio::test]
    async fn stale_commit_is_rejected_and_record_kept() {
        let store = InMemoryCharacterStore::new();
        let snapshot = record();
        store.seed(snapshot.clone());
        store.commit(&train_stealth(&snapshot)).await.unwrap();

        let stale = Delta::builder(snapshot.id(), snapshot.version())
            .add(Collection::Feats, "dodge")
            .build();
        let result = store.commit(&stale).await;

        assert!(matches!(
            result,
            Err(CommitError::Rejected(ProgressionError::ConcurrentModification { expected, actual }))
                if expected == StateVersion::new(4) && actual == StateVersion::new(5)
        ));
        let stored = store.get(snapshot.id()).await.unwrap().unwrap();
        assert!(!stored.owns_feat(&"dodge".into()));
    }

    #[tokio::test]
    async fn invalid_delta_leaves_record_untouched() {
        let store = InMemoryCharacterStore::new();
        let snapshot = record();
        store.seed(snapshot.clone());

        let delta = Delta::builder(snapshot.id(), snapshot.version())
            .set(Field::Level, 2)
            .build();
        let result = store.commit(&delta).await;

        assert!(matches!(
            result,
            Err(CommitError::Rejected(ProgressionError::InvalidDelta(_)))
        ));
        assert_eq!(store.get(snapshot.id()).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn commit_to_missing_record_is_not_found() {
        let store = InMemoryCharacterStore::new();
        let delta = train_stealth(&record());

        match store.commit(&delta).await {
            Err(CommitError::Repo(err)) => assert!(err.is_not_found()),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn racing_commits_on_one_version_have_one_winner() {
        let store = Arc::new(InMemoryCharacterStore::new());
        let snapshot = record();
        store.seed(snapshot.clone());

        let handles: Vec<_> = ["stealth", "perception", "endurance", "mechanics"]
            .into_iter()
            .map(|skill| {
                let store = Arc::clone(&store);
                let delta = Delta::builder(snapshot.id(), snapshot.version())
                    .add(Collection::TrainedSkills, skill)
                    .build();
                tokio::spawn(async move { store.commit(&delta).await })
            })
            .collect();

        let mut committed = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(CommitError::Rejected(err)) if err.is_retryable() => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(conflicts, 3);
        let stored = store.get(snapshot.id()).await.unwrap().unwrap();
        assert_eq!(stored.version(), StateVersion::new(5));
        assert_eq!(stored.trained_skills().len(), 1);
    }

    #[tokio::test]
    async fn modifier_store_returns_empty_for_unknown_character() {
        let store = InMemoryModifierStore::new();
        let id = CharacterId::new();
        assert!(store.active_modifiers(id).await.unwrap().is_empty());

        store.push(
            id,
            Modifier::new(
                ModifierSource::Item("blaster_rifle".into()),
                Statistic::RangedAttack,
                1,
                "equipment",
            ),
        );
        assert_eq!(store.active_modifiers(id).await.unwrap().len(), 1);

        store.clear(id);
        assert!(store.active_modifiers(id).await.unwrap().is_empty());
    }
}
