//! Match history and dodge ledger interfaces with in-memory implementations
//!
//! Both stores are append-only logs: the history store keeps settled-match
//! snapshots keyed by a store-assigned id and supports most-recent lookup
//! and deletion for undo; the dodge ledger keeps confirmed dodge events per
//! player per mode.

use crate::error::{LadderError, Result};
use crate::types::{HistoryEntry, HistoryEntryId, Mode, PlayerId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Trait for persisting settled-match snapshots
pub trait MatchHistoryStore: Send + Sync {
    /// Append a settlement snapshot, returning its store-assigned id
    fn append(&self, entry: HistoryEntry) -> Result<HistoryEntryId>;

    /// The most recently appended entry for a mode, if any
    fn most_recent(&self, mode: Mode) -> Result<Option<(HistoryEntryId, HistoryEntry)>>;

    /// Delete an entry; returns whether it existed
    fn delete(&self, entry_id: HistoryEntryId) -> Result<bool>;
}

/// One confirmed dodge event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DodgeLedgerEntry {
    pub player_id: PlayerId,
    pub mode: Mode,
    pub recorded_at: DateTime<Utc>,
}

/// Trait for the per-player, per-mode dodge ledger
pub trait DodgeLedger: Send + Sync {
    /// Record a confirmed dodge
    fn record(&self, player_id: &str, mode: Mode) -> Result<()>;

    /// Number of confirmed dodges for a player in a mode
    fn count_for(&self, player_id: &str, mode: Mode) -> Result<u32>;

    /// Delete the player's most recent entry for a mode; returns whether
    /// one existed
    fn delete_most_recent(&self, player_id: &str, mode: Mode) -> Result<bool>;
}

#[derive(Debug, Default)]
struct HistoryInner {
    next_id: HistoryEntryId,
    entries: Vec<(HistoryEntryId, HistoryEntry)>,
}

/// In-memory match history store implementation
#[derive(Debug, Default)]
pub struct InMemoryMatchHistoryStore {
    inner: RwLock<HistoryInner>,
}

impl InMemoryMatchHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries (for tests and stats)
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MatchHistoryStore for InMemoryMatchHistoryStore {
    fn append(&self, entry: HistoryEntry) -> Result<HistoryEntryId> {
        let mut inner = self.inner.write().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire history write lock".to_string(),
        })?;

        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push((id, entry));
        Ok(id)
    }

    fn most_recent(&self, mode: Mode) -> Result<Option<(HistoryEntryId, HistoryEntry)>> {
        let inner = self.inner.read().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire history read lock".to_string(),
        })?;

        // Ids are monotonic, so the last matching entry is the most recent
        Ok(inner
            .entries
            .iter()
            .rev()
            .find(|(_, e)| e.mode == mode)
            .cloned())
    }

    fn delete(&self, entry_id: HistoryEntryId) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire history write lock".to_string(),
        })?;

        let before = inner.entries.len();
        inner.entries.retain(|(id, _)| *id != entry_id);
        Ok(inner.entries.len() < before)
    }
}

/// In-memory dodge ledger implementation
#[derive(Debug, Default)]
pub struct InMemoryDodgeLedger {
    entries: RwLock<Vec<DodgeLedgerEntry>>,
}

impl InMemoryDodgeLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DodgeLedger for InMemoryDodgeLedger {
    fn record(&self, player_id: &str, mode: Mode) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire dodge ledger write lock".to_string(),
            })?;

        entries.push(DodgeLedgerEntry {
            player_id: player_id.to_string(),
            mode,
            recorded_at: current_timestamp(),
        });
        Ok(())
    }

    fn count_for(&self, player_id: &str, mode: Mode) -> Result<u32> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire dodge ledger read lock".to_string(),
            })?;

        Ok(entries
            .iter()
            .filter(|e| e.player_id == player_id && e.mode == mode)
            .count() as u32)
    }

    fn delete_most_recent(&self, player_id: &str, mode: Mode) -> Result<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire dodge ledger write lock".to_string(),
            })?;

        let position = entries
            .iter()
            .rposition(|e| e.player_id == player_id && e.mode == mode);

        match position {
            Some(index) => {
                entries.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
