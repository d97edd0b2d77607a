//! Character progression: snapshots, intents, deltas, and resolution.

mod delta;
mod intent;
mod resolver;
mod snapshot;

pub use delta::{Collection, Delta, DeltaBuilder, Field};
pub use intent::{ChoiceSlot, MissingSelection, ProgressionIntent};
pub use resolver::{LevelPlan, ProgressionResolver, TalentOption};
pub use snapshot::{CharacterSnapshot, ClassLevelEntry, LevelChoices, StateVersion};
