//! Progression use cases.
//!
//! Reads go straight to the pure domain components: derived statistics,
//! prerequisite checks, previews, talent listings. The only write is
//! [`ProgressionApplier::apply`], which commits a previewed delta.

mod applier;
mod error;

#[cfg(test)]
mod tests;

pub use applier::{AppliedProgression, ProgressionApplier, StatMismatch};
pub use error::ProgressionUseCaseError;

use std::sync::Arc;

use saga_domain::{
    CharacterId, CharacterSnapshot, ClassId, Delta, DerivedStatCalculator, DerivedStats, Modifier,
    PendingSelections, PrerequisiteValidator, ProgressionIntent, ProgressionResolver,
    ReferenceCatalog, RequirementExpression, Ruleset, StateVersion, TalentOption,
    ValidationReport,
};
use serde::Serialize;

use crate::infrastructure::ports::{CharacterRecordRepo, ClockPort, ModifierProvider};

// =============================================================================
// Result Types
// =============================================================================

/// A resolved, uncommitted progression.
///
/// Hand `delta` and `expected_version` back to
/// [`ProgressionUseCases::apply`] to commit it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub delta: Delta,
    pub expected_version: StateVersion,
}

// =============================================================================
// Use Cases
// =============================================================================

/// Container for progression use cases.
pub struct ProgressionUseCases {
    records: Arc<dyn CharacterRecordRepo>,
    modifiers: Arc<dyn ModifierProvider>,
    catalog: Arc<dyn ReferenceCatalog>,
    rules: Arc<Ruleset>,
    applier: ProgressionApplier,
}

impl ProgressionUseCases {
    pub fn new(
        records: Arc<dyn CharacterRecordRepo>,
        modifiers: Arc<dyn ModifierProvider>,
        clock: Arc<dyn ClockPort>,
        catalog: Arc<dyn ReferenceCatalog>,
        rules: Arc<Ruleset>,
    ) -> Self {
        let applier = ProgressionApplier::new(
            records.clone(),
            modifiers.clone(),
            clock,
            catalog.clone(),
            rules.clone(),
        );
        Self {
            records,
            modifiers,
            catalog,
            rules,
            applier,
        }
    }

    /// Current derived statistics of a character.
    pub async fn derived_stats(
        &self,
        character_id: CharacterId,
    ) -> Result<DerivedStats, ProgressionUseCaseError> {
        let snapshot = self.snapshot(character_id).await?;
        let modifiers = self.modifiers.active_modifiers(character_id).await?;
        Ok(DerivedStatCalculator::new(self.catalog.as_ref(), self.rules.as_ref())
            .derive(&snapshot, &modifiers)?)
    }

    /// Evaluate `expression` against the character as it stands.
    pub async fn check(
        &self,
        character_id: CharacterId,
        expression: &RequirementExpression,
    ) -> Result<ValidationReport, ProgressionUseCaseError> {
        let snapshot = self.snapshot(character_id).await?;
        let modifiers = self.modifiers.active_modifiers(character_id).await?;
        let report = PrerequisiteValidator::new(self.catalog.as_ref(), self.rules.as_ref())
            .with_modifiers(&modifiers)
            .validate(expression, &snapshot, None)?;

        tracing::debug!(
            character_id = %character_id,
            valid = report.valid,
            failed = report.failed_clauses.len(),
            "Checked requirements"
        );
        Ok(report)
    }

    /// Resolve `intent` without committing anything.
    pub async fn preview(
        &self,
        character_id: CharacterId,
        intent: &ProgressionIntent,
    ) -> Result<Preview, ProgressionUseCaseError> {
        let snapshot = self.snapshot(character_id).await?;
        let modifiers = self.modifiers.active_modifiers(character_id).await?;
        let delta = self.resolve(&snapshot, &modifiers, intent)?;

        tracing::debug!(
            character_id = %character_id,
            class_id = %intent.class_id,
            target_level = intent.target_level,
            base_version = %delta.base_version(),
            "Resolved progression preview"
        );
        Ok(Preview {
            expected_version: delta.base_version(),
            delta,
        })
    }

    /// Commit a previously resolved delta.
    pub async fn apply(
        &self,
        character_id: CharacterId,
        expected_version: StateVersion,
        delta: &Delta,
    ) -> Result<AppliedProgression, ProgressionUseCaseError> {
        self.applier
            .apply(character_id, expected_version, delta)
            .await
    }

    /// Preview and commit in one call.
    ///
    /// A concurrent modification between the two steps is returned as is;
    /// the caller decides whether to re-resolve.
    pub async fn level_up(
        &self,
        character_id: CharacterId,
        intent: &ProgressionIntent,
    ) -> Result<AppliedProgression, ProgressionUseCaseError> {
        let preview = self.preview(character_id, intent).await?;
        self.apply(character_id, preview.expected_version, &preview.delta)
            .await
    }

    /// Talents of `class_id`'s trees with their prerequisite reports, as
    /// they would stand for the next level in that class.
    pub async fn talent_options(
        &self,
        character_id: CharacterId,
        class_id: &ClassId,
    ) -> Result<Vec<TalentOption>, ProgressionUseCaseError> {
        let snapshot = self.snapshot(character_id).await?;
        let modifiers = self.modifiers.active_modifiers(character_id).await?;
        let pending = PendingSelections::advancing(class_id.clone());
        Ok(ProgressionResolver::new(self.catalog.as_ref(), self.rules.as_ref())
            .available_talents(&snapshot, &modifiers, class_id, Some(&pending))?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn snapshot(
        &self,
        character_id: CharacterId,
    ) -> Result<CharacterSnapshot, ProgressionUseCaseError> {
        self.records
            .get(character_id)
            .await?
            .ok_or(ProgressionUseCaseError::CharacterNotFound(character_id))
    }

    fn resolve(
        &self,
        snapshot: &CharacterSnapshot,
        modifiers: &[Modifier],
        intent: &ProgressionIntent,
    ) -> Result<Delta, ProgressionUseCaseError> {
        let resolver = ProgressionResolver::new(self.catalog.as_ref(), self.rules.as_ref());
        resolver.preview(snapshot, modifiers, intent).map_err(|err| {
            if err.is_user_facing() {
                tracing::debug!(
                    character_id = %snapshot.id(),
                    error = %err,
                    "Progression intent rejected"
                );
            } else {
                tracing::warn!(
                    character_id = %snapshot.id(),
                    error = %err,
                    "Progression failed on reference data"
                );
            }
            err.into()
        })
    }
}
