//! Undo coordination: compensating reversal of the most recent settlement
//!
//! Undo subtracts the stored applied deltas, decrements win/loss counters
//! (floored at zero), removes the dodge-ledger entry the settlement created,
//! and deletes the history entry. It is a compensating action, not a true
//! transactional rollback: it assumes no further matches have been settled
//! for the affected players since the one being undone.

use crate::error::{LadderError, Result};
use crate::history::{DodgeLedger, MatchHistoryStore};
use crate::rating::storage::RatingStore;
use crate::types::{HistoryEntry, MatchUndone, Mode, PlayerDelta, PlayerId};
use crate::utils::current_timestamp;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reverses settlements, most recent first, per mode
pub struct UndoCoordinator {
    ratings: Arc<dyn RatingStore>,
    history: Arc<dyn MatchHistoryStore>,
    dodges: Arc<dyn DodgeLedger>,
}

impl UndoCoordinator {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        history: Arc<dyn MatchHistoryStore>,
        dodges: Arc<dyn DodgeLedger>,
    ) -> Self {
        Self {
            ratings,
            history,
            dodges,
        }
    }

    /// Reverse the most recently settled match for a mode
    ///
    /// On any storage failure the writes already applied are compensated,
    /// so a reported failure leaves all state unchanged.
    pub fn undo_last(&self, mode: Mode) -> Result<MatchUndone> {
        let (entry_id, entry) = self
            .history
            .most_recent(mode)?
            .ok_or_else(|| LadderError::NotFound {
                what: format!("settled {} match to undo", mode),
            })?;

        let winner_reversals = self.compute_reversals(&entry.winners, &entry.winner_deltas, mode)?;
        let loser_reversals = self.compute_reversals(&entry.losers, &entry.loser_deltas, mode)?;

        let mut reverted: Vec<(PlayerId, i32, bool)> = Vec::new();
        let mut dodge_removed = false;

        let write_result = (|| -> Result<()> {
            for delta in &winner_reversals {
                self.ratings
                    .unapply(&delta.player_id, mode, delta.new_rating, true)?;
                reverted.push((delta.player_id.clone(), delta.old_rating, true));
            }
            for delta in &loser_reversals {
                self.ratings
                    .unapply(&delta.player_id, mode, delta.new_rating, false)?;
                reverted.push((delta.player_id.clone(), delta.old_rating, false));
            }

            if let Some(dodge) = &entry.dodge {
                if self.dodges.delete_most_recent(&dodge.player_id, mode)? {
                    dodge_removed = true;
                } else {
                    warn!(
                        "No dodge ledger entry found for {} in {} while undoing",
                        dodge.player_id, mode
                    );
                }
            }

            if !self.history.delete(entry_id)? {
                return Err(LadderError::StorageFailure {
                    message: format!("history entry {} vanished during undo", entry_id),
                }
                .into());
            }
            Ok(())
        })();

        match write_result {
            Ok(()) => {
                info!(
                    "Undid {} match: {} winners and {} losers restored",
                    mode,
                    winner_reversals.len(),
                    loser_reversals.len()
                );
                Ok(MatchUndone {
                    mode,
                    winners: winner_reversals,
                    losers: loser_reversals,
                    had_dodge: entry.dodge.is_some(),
                    timestamp: current_timestamp(),
                })
            }
            Err(err) => {
                warn!("Undo failed for {}, rolling back: {}", mode, err);
                self.roll_back(mode, &entry, &reverted, dodge_removed);
                Err(err)
            }
        }
    }

    /// Current rating minus the stored applied delta per player, never
    /// below zero
    fn compute_reversals(
        &self,
        players: &[PlayerId],
        deltas: &[i32],
        mode: Mode,
    ) -> Result<Vec<PlayerDelta>> {
        players
            .iter()
            .zip(deltas)
            .map(|(player_id, delta)| {
                let current = self.ratings.get(player_id, mode)?.rating;
                let restored = (current - delta).max(0);
                Ok(PlayerDelta {
                    player_id: player_id.clone(),
                    old_rating: current,
                    new_rating: restored,
                    delta: restored - current,
                })
            })
            .collect()
    }

    /// Best-effort compensation of a partially applied undo
    fn roll_back(
        &self,
        mode: Mode,
        entry: &HistoryEntry,
        reverted: &[(PlayerId, i32, bool)],
        dodge_removed: bool,
    ) {
        if dodge_removed {
            if let Some(dodge) = &entry.dodge {
                if let Err(e) = self.dodges.record(&dodge.player_id, mode) {
                    error!(
                        "Rollback of dodge ledger removal for {} failed: {}",
                        dodge.player_id, e
                    );
                }
            }
        }

        for (player_id, pre_undo_rating, won) in reverted.iter().rev() {
            if let Err(e) = self.ratings.apply(player_id, mode, *pre_undo_rating, *won) {
                error!("Rollback of undo write for {} failed: {}", player_id, e);
            }
        }
    }
}
