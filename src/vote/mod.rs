//! Vote coordination for pending matches
//!
//! One coordinator exists per in-flight match. All vote and accusation
//! mutations go through a single async mutex, so majority detection fires
//! exactly once even when participants act concurrently. The coordinator
//! only decides; the side-effecting settlement happens outside its lock,
//! after the match has already been marked as resolving, and is confirmed
//! or aborted through `complete_resolution` / `abort_resolution`.

use crate::error::{LadderError, Result};
use crate::types::{
    MatchRecord, MatchStatus, PlayerId, ResolutionReason, Side, VoteChoice, DODGE_CONFIRMATIONS,
    MAJORITY_VOTES, MATCH_SIZE,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Current vote counts on a pending match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTallies {
    pub votes_a: u32,
    pub votes_b: u32,
    pub cancel: u32,
}

impl VoteTallies {
    pub fn cast(&self) -> u32 {
        self.votes_a + self.votes_b + self.cancel
    }
}

/// A terminal decision reached by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Winner {
        side: Side,
        reason: ResolutionReason,
    },
    Cancelled {
        cancel_votes: u32,
    },
}

/// Outcome of a vote mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteDecision {
    /// Still pending (including the 3-3 stalemate with all votes cast)
    Pending(VoteTallies),
    /// The mutation resolved the match; the caller must settle and then
    /// confirm or abort the resolution
    Resolve(Resolution),
}

/// Outcome of a dodge-accusation mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DodgeDecision {
    Recorded {
        accusations_against: u32,
    },
    /// The accusation confirmed a dodge; the accused's side loses
    Confirmed {
        accused: PlayerId,
        winning_side: Side,
    },
}

#[derive(Debug, Default)]
struct VoteState {
    votes: HashMap<PlayerId, VoteChoice>,
    accusations: HashMap<PlayerId, PlayerId>,
    status: Option<MatchStatus>,
    resolving: bool,
}

impl VoteState {
    fn status(&self) -> MatchStatus {
        self.status.unwrap_or(MatchStatus::Pending)
    }

    fn tallies(&self) -> VoteTallies {
        let mut tallies = VoteTallies {
            votes_a: 0,
            votes_b: 0,
            cancel: 0,
        };
        for choice in self.votes.values() {
            match choice {
                VoteChoice::Win(Side::TeamA) => tallies.votes_a += 1,
                VoteChoice::Win(Side::TeamB) => tallies.votes_b += 1,
                VoteChoice::Cancel => tallies.cancel += 1,
            }
        }
        tallies
    }
}

/// Per-match vote coordinator
pub struct VoteCoordinator {
    record: MatchRecord,
    state: Mutex<VoteState>,
}

impl VoteCoordinator {
    /// Create a coordinator for a freshly formed match, in `pending` with
    /// empty vote and accusation state
    pub fn new(record: MatchRecord) -> Self {
        Self {
            record,
            state: Mutex::new(VoteState::default()),
        }
    }

    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    pub async fn status(&self) -> MatchStatus {
        self.state.lock().await.status()
    }

    pub async fn tallies(&self) -> VoteTallies {
        self.state.lock().await.tallies()
    }

    /// Record (or overwrite) a participant's vote and evaluate resolution
    pub async fn cast_vote(&self, voter: &str, choice: VoteChoice) -> Result<VoteDecision> {
        self.check_participant(voter)?;

        if matches!(choice, VoteChoice::Cancel) && !self.record.mode.supports_cancel() {
            return Err(LadderError::ValidationError {
                reason: format!("{} matches cannot be cancelled by vote", self.record.mode),
            }
            .into());
        }

        let mut state = self.state.lock().await;
        self.check_pending(&state)?;

        // Re-votes overwrite; an identical re-vote leaves tallies unchanged
        state.votes.insert(voter.to_string(), choice);

        let tallies = state.tallies();
        if let Some(resolution) = Self::evaluate(&tallies) {
            state.resolving = true;
            return Ok(VoteDecision::Resolve(resolution));
        }

        Ok(VoteDecision::Pending(tallies))
    }

    /// Record (or overwrite) a participant's dodge accusation
    pub async fn report_dodge(&self, accuser: &str, accused: &str) -> Result<DodgeDecision> {
        self.check_participant(accuser)?;

        if accuser == accused {
            return Err(LadderError::ValidationError {
                reason: "players cannot accuse themselves of dodging".to_string(),
            }
            .into());
        }

        let accused_side =
            self.record
                .side_of(accused)
                .ok_or_else(|| LadderError::InvalidParticipant {
                    player_id: accused.to_string(),
                    match_id: self.record.id.to_string(),
                })?;

        let mut state = self.state.lock().await;
        self.check_pending(&state)?;

        state
            .accusations
            .insert(accuser.to_string(), accused.to_string());

        let against = state
            .accusations
            .values()
            .filter(|a| a.as_str() == accused)
            .count() as u32;

        if against >= DODGE_CONFIRMATIONS {
            state.resolving = true;
            return Ok(DodgeDecision::Confirmed {
                accused: accused.to_string(),
                winning_side: accused_side.opposite(),
            });
        }

        Ok(DodgeDecision::Recorded {
            accusations_against: against,
        })
    }

    /// Confirm a resolution after its side effects persisted; the match
    /// becomes terminal and the ephemeral vote state is discarded
    pub async fn complete_resolution(&self, status: MatchStatus) {
        debug_assert!(status.is_terminal());
        let mut state = self.state.lock().await;
        state.status = Some(status);
        state.resolving = false;
        state.votes.clear();
        state.accusations.clear();
    }

    /// Abort a resolution whose side effects failed; the match stays
    /// pending with its votes intact so the next qualifying vote or
    /// accusation retries the settlement
    pub async fn abort_resolution(&self) {
        let mut state = self.state.lock().await;
        state.resolving = false;
    }

    fn check_participant(&self, player_id: &str) -> Result<()> {
        if !self.record.is_participant(player_id) {
            return Err(LadderError::InvalidParticipant {
                player_id: player_id.to_string(),
                match_id: self.record.id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_pending(&self, state: &VoteState) -> Result<()> {
        if state.status().is_terminal() || state.resolving {
            return Err(LadderError::AlreadyInProgress {
                reason: format!("match {} is already settled", self.record.id),
            }
            .into());
        }
        Ok(())
    }

    /// Resolution rule, evaluated after every vote
    fn evaluate(tallies: &VoteTallies) -> Option<Resolution> {
        if tallies.votes_a >= MAJORITY_VOTES {
            return Some(Resolution::Winner {
                side: Side::TeamA,
                reason: ResolutionReason::Majority {
                    votes: tallies.votes_a,
                },
            });
        }
        if tallies.votes_b >= MAJORITY_VOTES {
            return Some(Resolution::Winner {
                side: Side::TeamB,
                reason: ResolutionReason::Majority {
                    votes: tallies.votes_b,
                },
            });
        }
        if tallies.cancel >= MAJORITY_VOTES {
            return Some(Resolution::Cancelled {
                cancel_votes: tallies.cancel,
            });
        }

        // With every participant having voted and no threshold reached,
        // strict plurality between the sides decides; a side tie stays
        // pending indefinitely
        if tallies.cast() == MATCH_SIZE as u32 {
            if tallies.votes_a > tallies.votes_b {
                return Some(Resolution::Winner {
                    side: Side::TeamA,
                    reason: ResolutionReason::FinalCount {
                        winner_votes: tallies.votes_a,
                        loser_votes: tallies.votes_b,
                    },
                });
            }
            if tallies.votes_b > tallies.votes_a {
                return Some(Resolution::Winner {
                    side: Side::TeamB,
                    reason: ResolutionReason::FinalCount {
                        winner_votes: tallies.votes_b,
                        loser_votes: tallies.votes_a,
                    },
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CosmeticPayload, Mode};
    use crate::utils::{current_timestamp, generate_match_id};

    fn make_record(mode: Mode) -> MatchRecord {
        MatchRecord {
            id: generate_match_id(),
            mode,
            side_a: vec!["a1".into(), "a2".into(), "a3".into()],
            side_b: vec!["b1".into(), "b2".into(), "b3".into()],
            room_code: "ROOM1234".to_string(),
            cosmetics: CosmeticPayload::MapSuggestions { maps: vec![] },
            created_at: current_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_majority_short_circuit() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        for voter in ["a1", "a2", "a3"] {
            let decision = coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamA))
                .await
                .unwrap();
            assert!(matches!(decision, VoteDecision::Pending(_)));
        }

        // Fourth vote settles regardless of the remaining two
        let decision = coordinator
            .cast_vote("b1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();
        assert_eq!(
            decision,
            VoteDecision::Resolve(Resolution::Winner {
                side: Side::TeamA,
                reason: ResolutionReason::Majority { votes: 4 },
            })
        );
    }

    #[tokio::test]
    async fn test_revote_is_idempotent() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        coordinator
            .cast_vote("a1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();
        let decision = coordinator
            .cast_vote("a1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();

        assert_eq!(
            decision,
            VoteDecision::Pending(VoteTallies {
                votes_a: 1,
                votes_b: 0,
                cancel: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_revote_overwrites_prior_choice() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        coordinator
            .cast_vote("a1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();
        let decision = coordinator
            .cast_vote("a1", VoteChoice::Win(Side::TeamB))
            .await
            .unwrap();

        assert_eq!(
            decision,
            VoteDecision::Pending(VoteTallies {
                votes_a: 0,
                votes_b: 1,
                cancel: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_final_count_plurality_with_cancel_voter() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        // 3 for A, 2 for B, and the last participant votes cancel: all six
        // have voted, no threshold reached, strict plurality decides
        for voter in ["a1", "a2", "a3"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamA))
                .await
                .unwrap();
        }
        for voter in ["b1", "b2"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamB))
                .await
                .unwrap();
        }

        let decision = coordinator
            .cast_vote("b3", VoteChoice::Cancel)
            .await
            .unwrap();
        assert_eq!(
            decision,
            VoteDecision::Resolve(Resolution::Winner {
                side: Side::TeamA,
                reason: ResolutionReason::FinalCount {
                    winner_votes: 3,
                    loser_votes: 2,
                },
            })
        );
    }

    #[tokio::test]
    async fn test_sixth_side_vote_without_tie_is_a_majority() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        for voter in ["a1", "a2"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamA))
                .await
                .unwrap();
        }
        for voter in ["b1", "b2", "b3"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamB))
                .await
                .unwrap();
        }

        // Six side votes cannot split unevenly without crossing the
        // majority threshold, so the short-circuit fires
        let decision = coordinator
            .cast_vote("a3", VoteChoice::Win(Side::TeamB))
            .await
            .unwrap();
        assert_eq!(
            decision,
            VoteDecision::Resolve(Resolution::Winner {
                side: Side::TeamB,
                reason: ResolutionReason::Majority { votes: 4 },
            })
        );
    }

    #[tokio::test]
    async fn test_three_three_tie_stays_pending() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        for voter in ["a1", "a2", "a3"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamA))
                .await
                .unwrap();
        }
        for voter in ["b1", "b2"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamB))
                .await
                .unwrap();
        }

        let decision = coordinator
            .cast_vote("b3", VoteChoice::Win(Side::TeamB))
            .await
            .unwrap();

        assert_eq!(
            decision,
            VoteDecision::Pending(VoteTallies {
                votes_a: 3,
                votes_b: 3,
                cancel: 0,
            })
        );
        assert_eq!(coordinator.status().await, MatchStatus::Pending);

        // A voter switching sides later can still produce a majority
        let decision = coordinator
            .cast_vote("a3", VoteChoice::Win(Side::TeamB))
            .await
            .unwrap();
        assert!(matches!(
            decision,
            VoteDecision::Resolve(Resolution::Winner {
                side: Side::TeamB,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_votes_cancel_outright() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        for voter in ["a1", "a2", "b1"] {
            let decision = coordinator
                .cast_vote(voter, VoteChoice::Cancel)
                .await
                .unwrap();
            assert!(matches!(decision, VoteDecision::Pending(_)));
        }

        let decision = coordinator
            .cast_vote("b2", VoteChoice::Cancel)
            .await
            .unwrap();
        assert_eq!(
            decision,
            VoteDecision::Resolve(Resolution::Cancelled { cancel_votes: 4 })
        );
    }

    #[tokio::test]
    async fn test_cancel_rejected_in_chaos() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Chaos));

        let err = coordinator
            .cast_vote("a1", VoteChoice::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::ValidationError { .. })
        ));

        // Side votes still work in chaos
        assert!(coordinator
            .cast_vote("a1", VoteChoice::Win(Side::TeamA))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_non_participant_rejected() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        let err = coordinator
            .cast_vote("outsider", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::InvalidParticipant { .. })
        ));

        let err = coordinator
            .report_dodge("outsider", "a1")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::InvalidParticipant { .. })
        ));
    }

    #[tokio::test]
    async fn test_vote_on_terminal_match_rejected() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));
        coordinator.complete_resolution(MatchStatus::Settled).await;

        let err = coordinator
            .cast_vote("a1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::AlreadyInProgress { .. })
        ));
    }

    #[tokio::test]
    async fn test_self_accusation_rejected() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        let err = coordinator.report_dodge("a1", "a1").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_dodge_confirms_at_three_accusers() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        // Vote tallies are irrelevant to dodge confirmation
        coordinator
            .cast_vote("b1", VoteChoice::Win(Side::TeamB))
            .await
            .unwrap();

        let first = coordinator.report_dodge("a1", "b2").await.unwrap();
        assert_eq!(
            first,
            DodgeDecision::Recorded {
                accusations_against: 1,
            }
        );

        coordinator.report_dodge("a2", "b2").await.unwrap();

        let third = coordinator.report_dodge("b1", "b2").await.unwrap();
        assert_eq!(
            third,
            DodgeDecision::Confirmed {
                accused: "b2".to_string(),
                winning_side: Side::TeamA,
            }
        );
    }

    #[tokio::test]
    async fn test_accuser_can_switch_accusation() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        coordinator.report_dodge("a1", "b1").await.unwrap();
        // Switching moves the single outstanding accusation
        let decision = coordinator.report_dodge("a1", "b2").await.unwrap();
        assert_eq!(
            decision,
            DodgeDecision::Recorded {
                accusations_against: 1,
            }
        );

        coordinator.report_dodge("a2", "b1").await.unwrap();
        let decision = coordinator.report_dodge("a3", "b1").await.unwrap();
        // b1 has two accusers (a2, a3); a1 moved to b2
        assert_eq!(
            decision,
            DodgeDecision::Recorded {
                accusations_against: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_abort_resolution_allows_retry() {
        let coordinator = VoteCoordinator::new(make_record(Mode::Solo));

        for voter in ["a1", "a2", "a3"] {
            coordinator
                .cast_vote(voter, VoteChoice::Win(Side::TeamA))
                .await
                .unwrap();
        }
        let decision = coordinator
            .cast_vote("b1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();
        assert!(matches!(decision, VoteDecision::Resolve(_)));

        // While resolving, further votes are rejected
        let err = coordinator
            .cast_vote("b2", VoteChoice::Win(Side::TeamB))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::AlreadyInProgress { .. })
        ));

        // Settlement failed: the match stays pending with votes intact,
        // and an idempotent re-vote triggers the resolution again
        coordinator.abort_resolution().await;
        assert_eq!(coordinator.status().await, MatchStatus::Pending);

        let decision = coordinator
            .cast_vote("b1", VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();
        assert!(matches!(decision, VoteDecision::Resolve(_)));
    }
}
