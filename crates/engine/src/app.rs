//! Application state and composition.

use std::sync::Arc;

use saga_domain::{ReferenceCatalog, Ruleset};

use crate::infrastructure::{
    clock::SystemClock,
    memory_store::{InMemoryCharacterStore, InMemoryModifierStore},
    ports::{CharacterRecordRepo, ClockPort, ModifierProvider},
};
use crate::use_cases;

/// Main application state.
///
/// Holds the injected ports and the use cases built on them.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Container for the injected ports.
pub struct Repositories {
    pub records: Arc<dyn CharacterRecordRepo>,
    pub modifiers: Arc<dyn ModifierProvider>,
}

/// Container for all use cases.
pub struct UseCases {
    pub progression: use_cases::ProgressionUseCases,
}

impl App {
    pub fn new(
        records: Arc<dyn CharacterRecordRepo>,
        modifiers: Arc<dyn ModifierProvider>,
        clock: Arc<dyn ClockPort>,
        catalog: Arc<dyn ReferenceCatalog>,
        rules: Arc<Ruleset>,
    ) -> Self {
        let progression = use_cases::ProgressionUseCases::new(
            records.clone(),
            modifiers.clone(),
            clock,
            catalog,
            rules,
        );
        Self {
            repositories: Repositories { records, modifiers },
            use_cases: UseCases { progression },
        }
    }

    /// An app over in-memory stores and the system clock. The stores are
    /// returned alongside so callers can seed them.
    pub fn in_memory(
        catalog: Arc<dyn ReferenceCatalog>,
        rules: Arc<Ruleset>,
    ) -> (Self, Arc<InMemoryCharacterStore>, Arc<InMemoryModifierStore>) {
        let records = Arc::new(InMemoryCharacterStore::new());
        let modifiers = Arc::new(InMemoryModifierStore::new());
        let app = Self::new(
            records.clone(),
            modifiers.clone(),
            Arc::new(SystemClock::new()),
            catalog,
            rules,
        );
        (app, records, modifiers)
    }
}
