//! Statistic computation: bonus aggregation and derived statistics.

mod aggregator;
mod derived;

pub use aggregator::{Breakdown, Stacking, StackingTable};
pub use derived::{base_attack_for, DerivedStatCalculator, DerivedStats};
