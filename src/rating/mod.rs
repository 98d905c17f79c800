//! Rating system built on the classic logistic (ELO) curve
//!
//! This module provides the rating calculator, storage interfaces, and the
//! settlement engine that applies rating deltas, win/loss counters, dodge
//! penalties, and history snapshots as one logical unit.

pub mod elo;
pub mod engine;
pub mod storage;

// Re-export commonly used types
pub use elo::EloCalculator;
pub use engine::{RatingEngine, Settlement};
pub use storage::{InMemoryRatingStore, MockRatingStore, RatingStore};
