//! Repository port traits for character state.

use async_trait::async_trait;
use saga_domain::{CharacterId, CharacterSnapshot, Delta, Modifier};

use super::error::{CommitError, RepoError};

// =============================================================================
// Character Records
// =============================================================================

/// Versioned storage of character snapshots.
///
/// `commit` is the only write. It must compare the record's current version
/// with `delta.base_version()` and swap in the updated snapshot in one atomic
/// step, so that of two commits against the same version exactly one wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterRecordRepo: Send + Sync {
    async fn get(&self, id: CharacterId) -> Result<Option<CharacterSnapshot>, RepoError>;

    /// Apply `delta` and bump the version. Returns the committed snapshot.
    async fn commit(&self, delta: &Delta) -> Result<CharacterSnapshot, CommitError>;
}

// =============================================================================
// Modifiers
// =============================================================================

/// Modifiers owned outside the character record: equipment, temporary
/// effects. Feat, talent and condition modifiers are derived from the
/// snapshot and never come from here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModifierProvider: Send + Sync {
    async fn active_modifiers(&self, id: CharacterId) -> Result<Vec<Modifier>, RepoError>;
}
