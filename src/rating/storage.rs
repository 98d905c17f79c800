//! Rating storage interface and implementations
//!
//! This module defines the interface for persisting and retrieving
//! per-player, per-mode rating records, with an in-memory implementation
//! and a call-recording mock for tests.

use crate::error::{LadderError, Result};
use crate::types::{Mode, PlayerId, RatingRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Trait for rating storage operations
///
/// Records are created on first contact and never deleted. Rating mutation
/// goes exclusively through `apply` (settlement) and `unapply` (undo).
pub trait RatingStore: Send + Sync {
    /// Get a player's record for a mode, defaulting for unseen players
    fn get(&self, player_id: &str, mode: Mode) -> Result<RatingRecord>;

    /// Set a player's rating and bump their win or loss counter
    fn apply(&self, player_id: &str, mode: Mode, new_rating: i32, won: bool) -> Result<()>;

    /// Set a player's rating and decrement their win or loss counter,
    /// floored at zero
    fn unapply(&self, player_id: &str, mode: Mode, restored_rating: i32, won: bool) -> Result<()>;

    /// All records for a mode, rating descending
    fn standings(&self, mode: Mode) -> Result<Vec<(PlayerId, RatingRecord)>>;
}

/// In-memory rating store implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStore {
    records: RwLock<HashMap<(PlayerId, Mode), RatingRecord>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a record (for tests)
    pub fn preset(&self, player_id: &str, mode: Mode, record: RatingRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire rating store write lock".to_string(),
            })?;

        records.insert((player_id.to_string(), mode), record);
        Ok(())
    }
}

impl RatingStore for InMemoryRatingStore {
    fn get(&self, player_id: &str, mode: Mode) -> Result<RatingRecord> {
        let records = self
            .records
            .read()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire rating store read lock".to_string(),
            })?;

        Ok(records
            .get(&(player_id.to_string(), mode))
            .copied()
            .unwrap_or_default())
    }

    fn apply(&self, player_id: &str, mode: Mode, new_rating: i32, won: bool) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire rating store write lock".to_string(),
            })?;

        let record = records
            .entry((player_id.to_string(), mode))
            .or_default();
        record.rating = new_rating;
        if won {
            record.wins += 1;
        } else {
            record.losses += 1;
        }

        Ok(())
    }

    fn unapply(&self, player_id: &str, mode: Mode, restored_rating: i32, won: bool) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire rating store write lock".to_string(),
            })?;

        let record = records
            .entry((player_id.to_string(), mode))
            .or_default();
        record.rating = restored_rating;
        if won {
            record.wins = record.wins.saturating_sub(1);
        } else {
            record.losses = record.losses.saturating_sub(1);
        }

        Ok(())
    }

    fn standings(&self, mode: Mode) -> Result<Vec<(PlayerId, RatingRecord)>> {
        let records = self
            .records
            .read()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire rating store read lock".to_string(),
            })?;

        let mut rows: Vec<(PlayerId, RatingRecord)> = records
            .iter()
            .filter(|((_, m), _)| *m == mode)
            .map(|((id, _), record)| (id.clone(), *record))
            .collect();

        rows.sort_by(|a, b| b.1.rating.cmp(&a.1.rating).then(a.0.cmp(&b.0)));
        Ok(rows)
    }
}

/// Call applied through a rating store (for test assertions)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedWrite {
    pub player_id: PlayerId,
    pub mode: Mode,
    pub rating: i32,
    pub won: bool,
}

/// Mock rating store for testing, with optional failure injection
#[derive(Debug, Default)]
pub struct MockRatingStore {
    inner: InMemoryRatingStore,
    applies: RwLock<Vec<AppliedWrite>>,
    fail_applies_after: RwLock<Option<usize>>,
    fail_all: AtomicBool,
}

impl MockRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation from now on
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Let the next `n` applies succeed, then fail subsequent ones
    pub fn fail_applies_after(&self, n: usize) {
        if let Ok(mut guard) = self.fail_applies_after.write() {
            *guard = Some(n);
        }
    }

    /// All apply calls recorded so far
    pub fn applied_writes(&self) -> Vec<AppliedWrite> {
        self.applies.read().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn preset(&self, player_id: &str, mode: Mode, record: RatingRecord) -> Result<()> {
        self.inner.preset(player_id, mode, record)
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(LadderError::StorageFailure {
                message: "injected rating store failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl RatingStore for MockRatingStore {
    fn get(&self, player_id: &str, mode: Mode) -> Result<RatingRecord> {
        self.check_failure()?;
        self.inner.get(player_id, mode)
    }

    fn apply(&self, player_id: &str, mode: Mode, new_rating: i32, won: bool) -> Result<()> {
        self.check_failure()?;

        if let Ok(mut budget) = self.fail_applies_after.write() {
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(LadderError::StorageFailure {
                        message: "injected rating store apply failure".to_string(),
                    }
                    .into());
                }
                *remaining -= 1;
            }
        }

        if let Ok(mut applies) = self.applies.write() {
            applies.push(AppliedWrite {
                player_id: player_id.to_string(),
                mode,
                rating: new_rating,
                won,
            });
        }

        self.inner.apply(player_id, mode, new_rating, won)
    }

    fn unapply(&self, player_id: &str, mode: Mode, restored_rating: i32, won: bool) -> Result<()> {
        // Compensating writes stay available even while applies are failing
        self.inner.unapply(player_id, mode, restored_rating, won)
    }

    fn standings(&self, mode: Mode) -> Result<Vec<(PlayerId, RatingRecord)>> {
        self.check_failure()?;
        self.inner.standings(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_player_gets_default() {
        let store = InMemoryRatingStore::new();
        let record = store.get("new_player", Mode::Solo).unwrap();
        assert_eq!(record.rating, crate::types::DEFAULT_RATING);
        assert_eq!(record.wins, 0);
        assert_eq!(record.losses, 0);
    }

    #[test]
    fn test_apply_bumps_counters() {
        let store = InMemoryRatingStore::new();

        store.apply("p1", Mode::Solo, 1015, true).unwrap();
        let record = store.get("p1", Mode::Solo).unwrap();
        assert_eq!(record.rating, 1015);
        assert_eq!(record.wins, 1);
        assert_eq!(record.losses, 0);

        store.apply("p1", Mode::Solo, 1000, false).unwrap();
        let record = store.get("p1", Mode::Solo).unwrap();
        assert_eq!(record.rating, 1000);
        assert_eq!(record.wins, 1);
        assert_eq!(record.losses, 1);
    }

    #[test]
    fn test_modes_are_isolated() {
        let store = InMemoryRatingStore::new();

        store.apply("p1", Mode::Solo, 1100, true).unwrap();

        assert_eq!(store.get("p1", Mode::Solo).unwrap().rating, 1100);
        assert_eq!(
            store.get("p1", Mode::Chaos).unwrap().rating,
            crate::types::DEFAULT_RATING
        );
    }

    #[test]
    fn test_unapply_floors_counters() {
        let store = InMemoryRatingStore::new();

        store.apply("p1", Mode::Solo, 1015, true).unwrap();
        store.unapply("p1", Mode::Solo, 1000, true).unwrap();

        let record = store.get("p1", Mode::Solo).unwrap();
        assert_eq!(record.rating, 1000);
        assert_eq!(record.wins, 0);

        // Decrementing past zero stays at zero
        store.unapply("p1", Mode::Solo, 1000, true).unwrap();
        assert_eq!(store.get("p1", Mode::Solo).unwrap().wins, 0);
    }

    #[test]
    fn test_standings_sorted_descending() {
        let store = InMemoryRatingStore::new();

        store.apply("low", Mode::Solo, 900, false).unwrap();
        store.apply("high", Mode::Solo, 1200, true).unwrap();
        store.apply("mid", Mode::Solo, 1050, true).unwrap();
        store.apply("other_mode", Mode::Chaos, 2000, true).unwrap();

        let standings = store.standings(Mode::Solo).unwrap();
        let ids: Vec<&str> = standings.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_mock_failure_injection() {
        let store = MockRatingStore::new();

        store.fail_applies_after(2);
        assert!(store.apply("p1", Mode::Solo, 1015, true).is_ok());
        assert!(store.apply("p2", Mode::Solo, 1015, true).is_ok());
        assert!(store.apply("p3", Mode::Solo, 1015, true).is_err());

        assert_eq!(store.applied_writes().len(), 2);

        // Compensation path keeps working
        assert!(store.unapply("p1", Mode::Solo, 1000, true).is_ok());
    }
}
