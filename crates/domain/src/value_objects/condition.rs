//! Condition track position.

use serde::{Deserialize, Serialize};

/// Position on the condition track.
///
/// The penalty for each step is ruleset data (see
/// [`Ruleset::condition_penalty`](crate::Ruleset::condition_penalty)); this
/// type only knows the ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStep {
    #[default]
    Normal,
    MinusOne,
    MinusTwo,
    MinusFive,
    MinusTen,
    Helpless,
}

impl ConditionStep {
    /// Steps in track order, top to bottom.
    pub const TRACK: [ConditionStep; 6] = [
        Self::Normal,
        Self::MinusOne,
        Self::MinusTwo,
        Self::MinusFive,
        Self::MinusTen,
        Self::Helpless,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::MinusOne => 1,
            Self::MinusTwo => 2,
            Self::MinusFive => 3,
            Self::MinusTen => 4,
            Self::Helpless => 5,
        }
    }
}
