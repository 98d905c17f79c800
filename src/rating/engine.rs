//! Settlement engine: computes rating deltas and persists them atomically
//!
//! A settlement touches the rating store (six records), possibly the dodge
//! ledger, and the match history store. The writes form one logical unit:
//! if any of them fails, the engine reverses the writes already applied and
//! reports the failure, leaving the match free to retry.

use crate::config::RatingConfig;
use crate::error::Result;
use crate::history::{DodgeLedger, MatchHistoryStore};
use crate::rating::elo::EloCalculator;
use crate::rating::storage::RatingStore;
use crate::types::{
    DodgeOutcome, HistoryEntry, HistoryEntryId, Mode, PlayerDelta, PlayerId, RatingRecord,
    SIDE_SIZE,
};
use crate::utils::{current_timestamp, mean_rating};
use std::sync::Arc;
use tracing::{error, warn};

/// Result of a persisted settlement
#[derive(Debug, Clone)]
pub struct Settlement {
    pub winners: Vec<PlayerDelta>,
    pub losers: Vec<PlayerDelta>,
    pub dodge: Option<DodgeOutcome>,
    pub history_id: HistoryEntryId,
}

/// Applies the rating update algorithm and writes through to the stores
pub struct RatingEngine {
    calculator: EloCalculator,
    ratings: Arc<dyn RatingStore>,
    history: Arc<dyn MatchHistoryStore>,
    dodges: Arc<dyn DodgeLedger>,
}

impl RatingEngine {
    pub fn new(
        config: RatingConfig,
        ratings: Arc<dyn RatingStore>,
        history: Arc<dyn MatchHistoryStore>,
        dodges: Arc<dyn DodgeLedger>,
    ) -> Result<Self> {
        Ok(Self {
            calculator: EloCalculator::new(config)?,
            ratings,
            history,
            dodges,
        })
    }

    pub fn calculator(&self) -> &EloCalculator {
        &self.calculator
    }

    /// Settle a match: compute per-player deltas against the opposing side
    /// average, apply the dodge rules, floor ratings at zero, and persist
    /// ratings, counters, dodge ledger, and history as one unit.
    ///
    /// `dodger`, when present, must be on the losing side.
    pub fn settle(
        &self,
        mode: Mode,
        winners: &[PlayerId],
        losers: &[PlayerId],
        dodger: Option<&str>,
    ) -> Result<Settlement> {
        assert_eq!(
            winners.len(),
            SIDE_SIZE,
            "settlement requires exactly {} winners",
            SIDE_SIZE
        );
        assert_eq!(
            losers.len(),
            SIDE_SIZE,
            "settlement requires exactly {} losers",
            SIDE_SIZE
        );
        if let Some(d) = dodger {
            assert!(
                losers.iter().any(|l| l == d),
                "confirmed dodger must be on the losing side"
            );
        }

        // Read phase: no side effects until everything is computed
        let winner_records = self.read_records(winners, mode)?;
        let loser_records = self.read_records(losers, mode)?;

        let winner_avg = mean_rating(&winner_records.iter().map(|r| r.rating).collect::<Vec<_>>());
        let loser_avg = mean_rating(&loser_records.iter().map(|r| r.rating).collect::<Vec<_>>());

        let dodge = match dodger {
            Some(d) => {
                let prior = self.dodges.count_for(d, mode)?;
                Some(DodgeOutcome {
                    player_id: d.to_string(),
                    penalty: self.calculator.dodge_penalty(prior),
                })
            }
            None => None,
        };

        let config = self.calculator.config().clone();
        let mut winner_deltas = Vec::with_capacity(SIDE_SIZE);
        for (player_id, record) in winners.iter().zip(&winner_records) {
            let old_rating = record.rating;
            let mut delta = self.calculator.delta(old_rating, loser_avg, true);
            if dodge.is_some() {
                // Winners earn less credit against a tainted match
                delta = self
                    .calculator
                    .scale_for_dodge(delta, config.winner_dodge_scale);
            }
            let new_rating = (old_rating + delta).max(0);
            winner_deltas.push(PlayerDelta {
                player_id: player_id.clone(),
                old_rating,
                new_rating,
                delta: new_rating - old_rating,
            });
        }

        let mut loser_deltas = Vec::with_capacity(SIDE_SIZE);
        for (player_id, record) in losers.iter().zip(&loser_records) {
            let old_rating = record.rating;
            let mut delta = self.calculator.delta(old_rating, winner_avg, false);
            if let Some(outcome) = &dodge {
                if *player_id == outcome.player_id {
                    delta -= outcome.penalty;
                } else {
                    // Non-dodging losers are largely shielded
                    delta = self
                        .calculator
                        .scale_for_dodge(delta, config.loser_dodge_scale);
                }
            }
            let new_rating = (old_rating + delta).max(0);
            loser_deltas.push(PlayerDelta {
                player_id: player_id.clone(),
                old_rating,
                new_rating,
                delta: new_rating - old_rating,
            });
        }

        // Write phase with compensation on failure
        let mut applied: Vec<(PlayerId, i32, bool)> = Vec::new();
        let mut dodge_recorded = false;

        let write_result = (|| -> Result<HistoryEntryId> {
            for d in &winner_deltas {
                self.ratings.apply(&d.player_id, mode, d.new_rating, true)?;
                applied.push((d.player_id.clone(), d.old_rating, true));
            }
            for d in &loser_deltas {
                self.ratings.apply(&d.player_id, mode, d.new_rating, false)?;
                applied.push((d.player_id.clone(), d.old_rating, false));
            }
            if let Some(outcome) = &dodge {
                self.dodges.record(&outcome.player_id, mode)?;
                dodge_recorded = true;
            }

            self.history.append(HistoryEntry {
                mode,
                winners: winners.to_vec(),
                losers: losers.to_vec(),
                winner_deltas: winner_deltas.iter().map(|d| d.delta).collect(),
                loser_deltas: loser_deltas.iter().map(|d| d.delta).collect(),
                dodge: dodge.clone(),
                recorded_at: current_timestamp(),
            })
        })();

        match write_result {
            Ok(history_id) => Ok(Settlement {
                winners: winner_deltas,
                losers: loser_deltas,
                dodge,
                history_id,
            }),
            Err(err) => {
                warn!(
                    "Settlement write failed for mode {}, rolling back {} applied writes: {}",
                    mode,
                    applied.len(),
                    err
                );
                self.roll_back(mode, &applied, dodge_recorded, dodger);
                Err(err)
            }
        }
    }

    fn read_records(&self, players: &[PlayerId], mode: Mode) -> Result<Vec<RatingRecord>> {
        players
            .iter()
            .map(|p| self.ratings.get(p, mode))
            .collect()
    }

    /// Best-effort compensating reversal of a partially applied settlement
    fn roll_back(
        &self,
        mode: Mode,
        applied: &[(PlayerId, i32, bool)],
        dodge_recorded: bool,
        dodger: Option<&str>,
    ) {
        if dodge_recorded {
            if let Some(d) = dodger {
                if let Err(e) = self.dodges.delete_most_recent(d, mode) {
                    error!("Rollback of dodge ledger entry for {} failed: {}", d, e);
                }
            }
        }

        for (player_id, old_rating, won) in applied.iter().rev() {
            if let Err(e) = self.ratings.unapply(player_id, mode, *old_rating, *won) {
                error!("Rollback of rating write for {} failed: {}", player_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LadderError;
    use crate::history::{InMemoryDodgeLedger, InMemoryMatchHistoryStore};
    use crate::rating::storage::{InMemoryRatingStore, MockRatingStore};
    use crate::types::DEFAULT_RATING;

    fn side(prefix: &str) -> Vec<PlayerId> {
        (1..=SIDE_SIZE)
            .map(|i| format!("{}{}", prefix, i))
            .collect()
    }

    fn build_engine() -> (
        RatingEngine,
        Arc<InMemoryRatingStore>,
        Arc<InMemoryMatchHistoryStore>,
        Arc<InMemoryDodgeLedger>,
    ) {
        let ratings = Arc::new(InMemoryRatingStore::new());
        let history = Arc::new(InMemoryMatchHistoryStore::new());
        let dodges = Arc::new(InMemoryDodgeLedger::new());
        let engine = RatingEngine::new(
            RatingConfig::default(),
            ratings.clone(),
            history.clone(),
            dodges.clone(),
        )
        .unwrap();
        (engine, ratings, history, dodges)
    }

    #[test]
    fn test_even_settlement_moves_fifteen_points() {
        let (engine, ratings, history, _) = build_engine();
        let winners = side("w");
        let losers = side("l");

        let settlement = engine.settle(Mode::Solo, &winners, &losers, None).unwrap();

        for d in &settlement.winners {
            assert_eq!(d.old_rating, DEFAULT_RATING);
            assert_eq!(d.new_rating, 1015);
            assert_eq!(d.delta, 15);
        }
        for d in &settlement.losers {
            assert_eq!(d.new_rating, 985);
            assert_eq!(d.delta, -15);
        }

        let w1 = ratings.get("w1", Mode::Solo).unwrap();
        assert_eq!(w1.rating, 1015);
        assert_eq!(w1.wins, 1);

        let l1 = ratings.get("l1", Mode::Solo).unwrap();
        assert_eq!(l1.rating, 985);
        assert_eq!(l1.losses, 1);

        assert_eq!(history.len(), 1);
        let (_, entry) = history.most_recent(Mode::Solo).unwrap().unwrap();
        assert_eq!(entry.winner_deltas, vec![15, 15, 15]);
        assert_eq!(entry.loser_deltas, vec![-15, -15, -15]);
        assert!(entry.dodge.is_none());
    }

    #[test]
    fn test_dodge_settlement_scales_and_penalizes() {
        let (engine, ratings, history, dodges) = build_engine();
        let winners = side("w");
        let losers = side("l");

        let settlement = engine
            .settle(Mode::Solo, &winners, &losers, Some("l2"))
            .unwrap();

        // Winners: round(30 * 0.5) = 15, scaled by 0.8 and truncated = 12
        for d in &settlement.winners {
            assert_eq!(d.delta, 12);
        }

        // Non-dodging losers: -15 scaled by 0.3, truncated toward zero = -4
        let shielded = settlement
            .losers
            .iter()
            .find(|d| d.player_id == "l1")
            .unwrap();
        assert_eq!(shielded.delta, -4);

        // The dodger takes the raw loss plus the first-offense penalty
        let dodger = settlement
            .losers
            .iter()
            .find(|d| d.player_id == "l2")
            .unwrap();
        assert_eq!(dodger.delta, -15 - 15);
        assert!(dodger.new_rating < shielded.new_rating);

        let outcome = settlement.dodge.unwrap();
        assert_eq!(outcome.player_id, "l2");
        assert_eq!(outcome.penalty, 15);

        assert_eq!(dodges.count_for("l2", Mode::Solo).unwrap(), 1);
        let (_, entry) = history.most_recent(Mode::Solo).unwrap().unwrap();
        assert_eq!(entry.dodge.as_ref().unwrap().player_id, "l2");

        assert_eq!(ratings.get("l2", Mode::Solo).unwrap().rating, 970);
    }

    #[test]
    fn test_repeat_dodger_pays_more() {
        let (engine, _, _, dodges) = build_engine();
        dodges.record("l2", Mode::Solo).unwrap();
        dodges.record("l2", Mode::Solo).unwrap();

        let settlement = engine
            .settle(Mode::Solo, &side("w"), &side("l"), Some("l2"))
            .unwrap();

        // Two priors: 15 * 2^2 = 60
        assert_eq!(settlement.dodge.unwrap().penalty, 60);
    }

    #[test]
    fn test_rating_floor_at_zero() {
        let (engine, ratings, history, _) = build_engine();
        ratings
            .preset(
                "l2",
                Mode::Solo,
                RatingRecord {
                    rating: 10,
                    wins: 0,
                    losses: 4,
                },
            )
            .unwrap();

        let settlement = engine
            .settle(Mode::Solo, &side("w"), &side("l"), Some("l2"))
            .unwrap();

        let dodger = settlement
            .losers
            .iter()
            .find(|d| d.player_id == "l2")
            .unwrap();
        assert_eq!(dodger.new_rating, 0);
        // The stored delta is the applied movement, so undo can restore 10
        assert_eq!(dodger.delta, -10);

        let (_, entry) = history.most_recent(Mode::Solo).unwrap().unwrap();
        let stored = entry.loser_deltas[losers_index(&entry.losers, "l2")];
        assert_eq!(stored, -10);
    }

    fn losers_index(losers: &[PlayerId], id: &str) -> usize {
        losers.iter().position(|l| l == id).unwrap()
    }

    #[test]
    fn test_storage_failure_rolls_back_everything() {
        let ratings = Arc::new(MockRatingStore::new());
        let history = Arc::new(InMemoryMatchHistoryStore::new());
        let dodges = Arc::new(InMemoryDodgeLedger::new());
        let engine = RatingEngine::new(
            RatingConfig::default(),
            ratings.clone(),
            history.clone(),
            dodges.clone(),
        )
        .unwrap();

        // Fail on the fourth rating write, mid-settlement
        ratings.fail_applies_after(3);

        let err = engine
            .settle(Mode::Solo, &side("w"), &side("l"), Some("l1"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::StorageFailure { .. })
        ));

        // The three applied writes were compensated
        for id in ["w1", "w2", "w3"] {
            let record = ratings.get(id, Mode::Solo).unwrap();
            assert_eq!(record.rating, DEFAULT_RATING);
            assert_eq!(record.wins, 0);
        }

        // No dodge entry, no history entry
        assert_eq!(dodges.count_for("l1", Mode::Solo).unwrap(), 0);
        assert!(history.is_empty());
    }

    #[test]
    #[should_panic(expected = "exactly 3 winners")]
    fn test_wrong_side_size_is_fatal() {
        let (engine, _, _, _) = build_engine();
        let _ = engine.settle(
            Mode::Solo,
            &["only".to_string()],
            &side("l"),
            None,
        );
    }
}
