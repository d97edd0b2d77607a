//! The single mutation point for character progression.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use saga_domain::{
    CharacterId, CharacterSnapshot, Delta, DerivedStatCalculator, DerivedStats, ProgressionError,
    ReferenceCatalog, Ruleset, StateVersion, Statistic,
};
use serde::Serialize;

use crate::infrastructure::ports::{CharacterRecordRepo, ClockPort, CommitError, ModifierProvider};

use super::error::ProgressionUseCaseError;

// =============================================================================
// Result Types
// =============================================================================

/// A statistic whose resolved value differs from the value derived after
/// commit. `None` means the statistic is missing on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatMismatch {
    pub statistic: Statistic,
    pub resolved: Option<i32>,
    pub derived: Option<i32>,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedProgression {
    pub character_id: CharacterId,
    pub new_version: StateVersion,
    pub committed_at: DateTime<Utc>,
    /// The record as stored by the commit.
    pub snapshot: CharacterSnapshot,
    /// Statistics re-derived from the committed record, `None` when
    /// re-derivation failed.
    pub derived: Option<DerivedStats>,
    /// Why re-derivation failed. The commit stands either way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rederive_error: Option<String>,
    /// Empty unless re-derivation disagreed with the delta's computed values.
    pub determinism_violations: Vec<StatMismatch>,
}

impl AppliedProgression {
    pub fn is_consistent(&self) -> bool {
        self.rederive_error.is_none() && self.determinism_violations.is_empty()
    }
}

// =============================================================================
// Applier
// =============================================================================

/// Commits resolved deltas under optimistic concurrency.
///
/// The delta is applied all-or-nothing by the record store. After a commit
/// the character is re-derived and checked against what the resolver
/// computed; a disagreement is reported and logged, but the commit stands.
pub struct ProgressionApplier {
    records: Arc<dyn CharacterRecordRepo>,
    modifiers: Arc<dyn ModifierProvider>,
    clock: Arc<dyn ClockPort>,
    catalog: Arc<dyn ReferenceCatalog>,
    rules: Arc<Ruleset>,
}

impl ProgressionApplier {
    pub fn new(
        records: Arc<dyn CharacterRecordRepo>,
        modifiers: Arc<dyn ModifierProvider>,
        clock: Arc<dyn ClockPort>,
        catalog: Arc<dyn ReferenceCatalog>,
        rules: Arc<Ruleset>,
    ) -> Self {
        Self {
            records,
            modifiers,
            clock,
            catalog,
            rules,
        }
    }

    /// Commit `delta` if the character is still at `expected_version`.
    ///
    /// # Returns
    /// * `Ok(AppliedProgression)` - committed, version bumped by one. Any
    ///   failure after the commit is carried on the receipt, never returned
    /// * `Err(Progression(ConcurrentModification))` - the character changed
    ///   since the delta was resolved; nothing was written
    /// * `Err(Progression(InvalidDelta))` - the delta does not target this
    ///   character and version, or does not fit the record
    pub async fn apply(
        &self,
        character_id: CharacterId,
        expected_version: StateVersion,
        delta: &Delta,
    ) -> Result<AppliedProgression, ProgressionUseCaseError> {
        if delta.character_id() != character_id {
            return Err(ProgressionError::invalid_delta(format!(
                "delta for character {} submitted for character {character_id}",
                delta.character_id()
            ))
            .into());
        }
        if delta.base_version() != expected_version {
            return Err(ProgressionError::invalid_delta(format!(
                "delta resolved against version {} submitted with expected version {expected_version}",
                delta.base_version()
            ))
            .into());
        }

        let committed = match self.records.commit(delta).await {
            Ok(snapshot) => snapshot,
            Err(CommitError::Rejected(err)) if err.is_retryable() => {
                tracing::warn!(
                    character_id = %character_id,
                    expected_version = %expected_version,
                    error = %err,
                    "Progression lost to a concurrent modification"
                );
                return Err(err.into());
            }
            Err(CommitError::Repo(err)) if err.is_not_found() => {
                return Err(ProgressionUseCaseError::CharacterNotFound(character_id));
            }
            Err(err) => return Err(err.into()),
        };
        let committed_at = self.clock.now();

        tracing::info!(
            character_id = %character_id,
            version = %committed.version(),
            level = committed.character_level(),
            "Committed progression"
        );

        let (derived, rederive_error, determinism_violations) =
            match self.rederive(&committed).await {
                Ok(derived) => {
                    let violations = compare_computed(delta, &derived);
                    if !violations.is_empty() {
                        tracing::error!(
                            character_id = %character_id,
                            version = %committed.version(),
                            mismatches = ?violations,
                            "Determinism violation: committed state derives different statistics than its delta"
                        );
                    }
                    (Some(derived), None, violations)
                }
                Err(err) => {
                    tracing::error!(
                        character_id = %character_id,
                        version = %committed.version(),
                        error = %err,
                        "Committed progression could not be re-derived"
                    );
                    (None, Some(err.to_string()), Vec::new())
                }
            };

        Ok(AppliedProgression {
            character_id,
            new_version: committed.version(),
            committed_at,
            snapshot: committed,
            derived,
            rederive_error,
            determinism_violations,
        })
    }

    async fn rederive(
        &self,
        committed: &CharacterSnapshot,
    ) -> Result<DerivedStats, ProgressionUseCaseError> {
        let modifiers = self.modifiers.active_modifiers(committed.id()).await?;
        Ok(DerivedStatCalculator::new(self.catalog.as_ref(), self.rules.as_ref())
            .derive(committed, &modifiers)?)
    }
}

/// Differences between the delta's computed values and `derived`.
///
/// A delta with no computed section makes no claim and never mismatches.
fn compare_computed(delta: &Delta, derived: &DerivedStats) -> Vec<StatMismatch> {
    let resolved = delta.computed();
    if resolved.is_empty() {
        return Vec::new();
    }

    let derived = derived.to_map();
    let statistics: BTreeSet<&Statistic> = resolved.keys().chain(derived.keys()).collect();
    statistics
        .into_iter()
        .filter_map(|statistic| {
            let resolved = resolved.get(statistic).copied();
            let derived = derived.get(statistic).copied();
            (resolved != derived).then(|| StatMismatch {
                statistic: statistic.clone(),
                resolved,
                derived,
            })
        })
        .collect()
}
