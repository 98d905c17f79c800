//! Match engine: orchestration of queues, balancing, votes, and settlement
//!
//! The engine owns the per-mode queues, the registry of in-flight matches,
//! and the collaborator stores. Control flow: queue admission feeds the
//! balancer once a draft completes, the balancer's sides become a pending
//! match with its own vote coordinator, vote/dodge resolutions run through
//! the rating engine, and the undo coordinator reverses the most recent
//! settlement on request. Every state change is published as a structured
//! event; the engine never formats user-facing text.

use crate::amqp::publisher::EventPublisher;
use crate::balance;
use crate::config::RatingConfig;
use crate::error::{LadderError, Result};
use crate::history::{DodgeLedger, InMemoryDodgeLedger, InMemoryMatchHistoryStore, MatchHistoryStore};
use crate::metrics::MetricsCollector;
use crate::player::{InMemoryPlayerDirectory, PlayerDirectory};
use crate::queue::{AdmitOutcome, QueueManager};
use crate::rating::engine::RatingEngine;
use crate::rating::storage::{InMemoryRatingStore, RatingStore};
use crate::team::{InMemoryTeamRegistry, TeamRegistry};
use crate::types::*;
use crate::undo::UndoCoordinator;
use crate::utils::{current_timestamp, generate_match_id, generate_room_code};
use crate::vote::{DodgeDecision, Resolution, VoteCoordinator, VoteDecision, VoteTallies};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

/// Counters describing engine activity since startup
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub players_queued: u64,
    pub matches_formed: u64,
    pub matches_settled: u64,
    pub matches_cancelled: u64,
    pub matches_undone: u64,
    pub votes_cast: u64,
    pub dodges_confirmed: u64,
    pub active_matches: usize,
}

/// The main match engine
pub struct MatchEngine {
    queues: QueueManager,
    active: RwLock<HashMap<MatchId, Arc<VoteCoordinator>>>,
    directory: Arc<dyn PlayerDirectory>,
    teams: Arc<dyn TeamRegistry>,
    ratings: Arc<dyn RatingStore>,
    dodges: Arc<dyn DodgeLedger>,
    rating_engine: RatingEngine,
    undo: UndoCoordinator,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<MetricsCollector>,
    stats: RwLock<EngineStats>,
}

impl MatchEngine {
    /// Create an engine over explicit collaborator implementations
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RatingConfig,
        directory: Arc<dyn PlayerDirectory>,
        teams: Arc<dyn TeamRegistry>,
        ratings: Arc<dyn RatingStore>,
        history: Arc<dyn MatchHistoryStore>,
        dodges: Arc<dyn DodgeLedger>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let rating_engine = RatingEngine::new(
            config,
            ratings.clone(),
            history.clone(),
            dodges.clone(),
        )?;
        let undo = UndoCoordinator::new(ratings.clone(), history, dodges.clone());

        Ok(Self {
            queues: QueueManager::new(),
            active: RwLock::new(HashMap::new()),
            directory,
            teams,
            ratings,
            dodges,
            rating_engine,
            undo,
            publisher,
            metrics,
            stats: RwLock::new(EngineStats::default()),
        })
    }

    /// Create an engine backed by the in-memory reference stores
    pub fn with_in_memory_stores(
        config: RatingConfig,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        Self::new(
            config,
            Arc::new(InMemoryPlayerDirectory::new()),
            Arc::new(InMemoryTeamRegistry::new()),
            Arc::new(InMemoryRatingStore::new()),
            Arc::new(InMemoryMatchHistoryStore::new()),
            Arc::new(InMemoryDodgeLedger::new()),
            publisher,
            metrics,
        )
    }

    /// Join a mode's queue; forming a match when the draft completes
    pub async fn join_queue(
        &self,
        mode: Mode,
        player_id: &str,
        display_name: &str,
    ) -> Result<JoinOutcome> {
        self.directory.get_or_create(player_id, display_name)?;
        let rating = self.ratings.get(player_id, mode)?.rating;

        let entrant = self.entrant_for(mode, player_id)?;

        match self.queues.join(mode, entrant.clone()).await? {
            AdmitOutcome::Queued { waiting, needed } => {
                self.bump(|s| s.players_queued += 1);
                self.metrics.record_join(mode, waiting);

                info!(
                    "{} joined {} queue ({} waiting, {} needed)",
                    entrant, mode, waiting, needed
                );

                self.publisher
                    .publish_player_queued(PlayerQueued {
                        mode,
                        entrant,
                        waiting,
                        needed,
                        timestamp: current_timestamp(),
                    })
                    .await?;

                Ok(JoinOutcome::Queued {
                    waiting,
                    needed,
                    rating,
                })
            }
            AdmitOutcome::Drafted { entrants } => {
                self.bump(|s| s.players_queued += 1);
                self.metrics.record_join(mode, 0);

                let match_id = self.form_match(mode, entrants).await?;
                Ok(JoinOutcome::MatchFormed { match_id })
            }
        }
    }

    /// Leave a mode's queue
    pub async fn leave_queue(&self, mode: Mode, player_id: &str) -> Result<LeaveOutcome> {
        let entrant = self.entrant_for(mode, player_id)?;
        let (outcome, remaining) = self.queues.leave(mode, &entrant).await?;

        if outcome == LeaveOutcome::Left {
            self.metrics.record_leave(mode, remaining);
            info!("{} left {} queue ({} remaining)", entrant, mode, remaining);

            self.publisher
                .publish_player_left_queue(PlayerLeftQueue {
                    mode,
                    entrant,
                    waiting: remaining,
                    timestamp: current_timestamp(),
                })
                .await?;
        }

        Ok(outcome)
    }

    /// Record a participant's vote on a pending match
    pub async fn cast_vote(
        &self,
        match_id: MatchId,
        voter: &str,
        choice: VoteChoice,
    ) -> Result<VoteOutcome> {
        let coordinator = self.coordinator(match_id)?;
        let mode = coordinator.record().mode;

        let decision = coordinator.cast_vote(voter, choice).await?;
        self.bump(|s| s.votes_cast += 1);
        self.metrics.record_vote(mode);

        match decision {
            VoteDecision::Pending(tallies) => {
                self.publish_vote_update(&coordinator, tallies).await?;
                Ok(VoteOutcome::Recorded {
                    votes_a: tallies.votes_a,
                    votes_b: tallies.votes_b,
                    cancel_votes: tallies.cancel,
                })
            }
            VoteDecision::Resolve(Resolution::Cancelled { cancel_votes }) => {
                coordinator
                    .complete_resolution(MatchStatus::Cancelled)
                    .await;
                self.bump(|s| s.matches_cancelled += 1);
                self.sync_active_matches();
                self.metrics.record_cancelled(mode);

                info!(
                    "Match {} cancelled by {} participant votes",
                    match_id, cancel_votes
                );

                self.publisher
                    .publish_match_cancelled(MatchCancelled {
                        match_id,
                        mode,
                        cancel_votes,
                        timestamp: current_timestamp(),
                    })
                    .await?;

                Ok(VoteOutcome::Cancelled)
            }
            VoteDecision::Resolve(Resolution::Winner { side, reason }) => {
                self.settle_resolution(&coordinator, side, reason).await?;
                Ok(VoteOutcome::Settled { winning_side: side })
            }
        }
    }

    /// Record a dodge accusation on a pending match
    pub async fn report_dodge(
        &self,
        match_id: MatchId,
        accuser: &str,
        accused: &str,
    ) -> Result<DodgeReportOutcome> {
        let coordinator = self.coordinator(match_id)?;

        match coordinator.report_dodge(accuser, accused).await? {
            DodgeDecision::Recorded {
                accusations_against,
            } => {
                info!(
                    "Dodge accusation recorded against {} on match {} ({}/{})",
                    accused, match_id, accusations_against, DODGE_CONFIRMATIONS
                );
                Ok(DodgeReportOutcome::Recorded {
                    accusations_against,
                })
            }
            DodgeDecision::Confirmed {
                accused,
                winning_side,
            } => {
                self.bump(|s| s.dodges_confirmed += 1);
                self.settle_resolution(
                    &coordinator,
                    winning_side,
                    ResolutionReason::DodgeConfirmed {
                        accused: accused.clone(),
                    },
                )
                .await?;
                Ok(DodgeReportOutcome::Confirmed { accused })
            }
        }
    }

    /// Reverse the most recent settlement for a mode
    pub async fn undo_last(&self, mode: Mode) -> Result<MatchUndone> {
        let report = self.undo.undo_last(mode)?;

        self.bump(|s| s.matches_undone += 1);
        self.metrics.record_undone(mode);

        self.publisher
            .publish_match_undone(report.clone())
            .await?;

        Ok(report)
    }

    /// Create a fixed team of three registered players
    pub fn create_team(
        &self,
        name: &str,
        captain: &str,
        second: &str,
        third: &str,
    ) -> Result<Team> {
        for member in [captain, second, third] {
            if self.directory.get(member)?.is_none() {
                return Err(LadderError::NotFound {
                    what: format!("player {}", member),
                }
                .into());
            }
        }

        let team = self.teams.create_team(name, captain, second, third)?;
        info!("Team '{}' created with captain {}", team.name, team.captain);
        Ok(team)
    }

    /// The fixed team a player belongs to, if any
    pub fn team_of_player(&self, player_id: &str) -> Result<Option<Team>> {
        self.teams.team_of_player(player_id)
    }

    /// Dissolve a fixed team (captain only) and drop its queue entry
    pub async fn dissolve_team(&self, team_id: TeamId, requested_by: &str) -> Result<Team> {
        let team = self.teams.dissolve_team(team_id, requested_by)?;

        // A dissolved team cannot stay queued for a match
        let (outcome, _) = self
            .queues
            .leave(Mode::FixedTeam, &Entrant::Team(team.id))
            .await?;
        if outcome == LeaveOutcome::Left {
            info!("Dissolved team '{}' removed from queue", team.name);
        }

        Ok(team)
    }

    /// Top standings rows for a mode
    pub fn standings(&self, mode: Mode, limit: usize) -> Result<Vec<StandingsRow>> {
        let rows = self.ratings.standings(mode)?;
        let ids: Vec<PlayerId> = rows.iter().take(limit).map(|(id, _)| id.clone()).collect();
        let names = self.directory.display_names(&ids)?;

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(player_id, record)| StandingsRow {
                display_name: names
                    .get(&player_id)
                    .cloned()
                    .unwrap_or_else(|| player_id.clone()),
                player_id,
                rating: record.rating,
                wins: record.wins,
                losses: record.losses,
            })
            .collect())
    }

    /// A registered player's standing in one mode
    pub fn player_summary(&self, player_id: &str, mode: Mode) -> Result<PlayerSummary> {
        let profile = self
            .directory
            .get(player_id)?
            .ok_or_else(|| LadderError::NotFound {
                what: format!("player {}", player_id),
            })?;

        let record = self.ratings.get(player_id, mode)?;
        let standings = self.ratings.standings(mode)?;
        let rank = standings
            .iter()
            .position(|(id, _)| id == player_id)
            .map(|index| index + 1)
            .unwrap_or(standings.len() + 1);
        let dodge_count = self.dodges.count_for(player_id, mode)?;

        Ok(PlayerSummary {
            player_id: profile.id,
            display_name: profile.display_name,
            mode,
            rating: record.rating,
            rank,
            wins: record.wins,
            losses: record.losses,
            dodge_count,
        })
    }

    /// Status of a known match
    pub async fn match_status(&self, match_id: MatchId) -> Result<MatchStatus> {
        Ok(self.coordinator(match_id)?.status().await)
    }

    /// Immutable record of a known match
    pub fn match_record(&self, match_id: MatchId) -> Result<MatchRecord> {
        Ok(self.coordinator(match_id)?.record().clone())
    }

    /// Entrants currently waiting in a mode's queue
    pub async fn queue_depth(&self, mode: Mode) -> usize {
        self.queues.waiting(mode).await
    }

    /// Drop terminal matches from the in-flight registry
    pub async fn cleanup_terminal_matches(&self) -> usize {
        let coordinators: Vec<(MatchId, Arc<VoteCoordinator>)> = match self.active.read() {
            Ok(active) => active
                .iter()
                .map(|(id, coordinator)| (*id, coordinator.clone()))
                .collect(),
            Err(_) => return 0,
        };

        let mut terminal = Vec::new();
        for (match_id, coordinator) in coordinators {
            if coordinator.status().await.is_terminal() {
                terminal.push(match_id);
            }
        }

        let removed = terminal.len();
        if removed > 0 {
            if let Ok(mut active) = self.active.write() {
                for match_id in &terminal {
                    active.remove(match_id);
                }
            }
            info!("Cleaned up {} finished matches", removed);
        }

        removed
    }

    /// Current engine statistics
    pub async fn stats(&self) -> EngineStats {
        self.stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn entrant_for(&self, mode: Mode, player_id: &str) -> Result<Entrant> {
        if mode.queues_teams() {
            let team = self
                .teams
                .team_of_player(player_id)?
                .ok_or_else(|| LadderError::NotFound {
                    what: format!("fixed team for player {}", player_id),
                })?;
            Ok(Entrant::Team(team.id))
        } else {
            Ok(Entrant::Player(player_id.to_string()))
        }
    }

    /// Turn a completed draft into a pending match with a vote coordinator
    async fn form_match(&self, mode: Mode, entrants: Vec<Entrant>) -> Result<MatchId> {
        let (side_a, side_b) = if mode.queues_teams() {
            let mut teams = Vec::with_capacity(entrants.len());
            for entrant in &entrants {
                let team_id = match entrant {
                    Entrant::Team(id) => *id,
                    Entrant::Player(id) => {
                        return Err(LadderError::InternalError {
                            message: format!("player {} drafted into a team queue", id),
                        }
                        .into())
                    }
                };
                let team = self
                    .teams
                    .get_team(team_id)?
                    .ok_or_else(|| LadderError::team_not_found(team_id))?;
                teams.push(team);
            }
            balance::team_sides(&teams[0], &teams[1])
        } else {
            let mut rated = Vec::with_capacity(entrants.len());
            for entrant in &entrants {
                let player_id = match entrant {
                    Entrant::Player(id) => id.clone(),
                    Entrant::Team(id) => {
                        return Err(LadderError::InternalError {
                            message: format!("team {} drafted into a player queue", id),
                        }
                        .into())
                    }
                };
                let rating = self.ratings.get(&player_id, mode)?.rating;
                rated.push(RatedPlayer {
                    id: player_id,
                    rating,
                });
            }
            balance::split_sides(&rated)
        };

        let cosmetics = if mode == Mode::Chaos {
            balance::chaos_draw()
        } else {
            balance::map_suggestions()
        };

        let record = MatchRecord {
            id: generate_match_id(),
            mode,
            side_a,
            side_b,
            room_code: generate_room_code(),
            cosmetics,
            created_at: current_timestamp(),
        };

        let side_a_rated = self.rated_side(&record.side_a, mode)?;
        let side_b_rated = self.rated_side(&record.side_b, mode)?;

        let match_id = record.id;
        let coordinator = Arc::new(VoteCoordinator::new(record.clone()));
        {
            let mut active = self.active.write().map_err(|_| LadderError::InternalError {
                message: "Failed to acquire active matches lock".to_string(),
            })?;
            active.insert(match_id, coordinator);
        }

        self.bump(|s| s.matches_formed += 1);
        self.sync_active_matches();
        self.metrics.record_match_formed(mode);

        info!(
            "Match {} formed for {} (room {}): {:?} vs {:?}",
            match_id, mode, record.room_code, record.side_a, record.side_b
        );

        self.publisher
            .publish_match_formed(MatchFormed {
                match_id,
                mode,
                room_code: record.room_code.clone(),
                side_a: side_a_rated,
                side_b: side_b_rated,
                cosmetics: record.cosmetics.clone(),
                timestamp: current_timestamp(),
            })
            .await?;

        Ok(match_id)
    }

    fn rated_side(&self, players: &[PlayerId], mode: Mode) -> Result<Vec<RatedPlayer>> {
        players
            .iter()
            .map(|id| {
                Ok(RatedPlayer {
                    id: id.clone(),
                    rating: self.ratings.get(id, mode)?.rating,
                })
            })
            .collect()
    }

    /// Persist a winner resolution and publish the settlement
    ///
    /// The coordinator has already marked the match as resolving; on
    /// storage failure the resolution is aborted and the match stays
    /// pending, retried by the next qualifying vote or accusation.
    async fn settle_resolution(
        &self,
        coordinator: &Arc<VoteCoordinator>,
        winning_side: Side,
        reason: ResolutionReason,
    ) -> Result<MatchSettled> {
        let record = coordinator.record();
        let winners = record.side_players(winning_side).to_vec();
        let losers = record.side_players(winning_side.opposite()).to_vec();
        let dodger = match &reason {
            ResolutionReason::DodgeConfirmed { accused } => Some(accused.clone()),
            _ => None,
        };

        let start = Instant::now();
        match self
            .rating_engine
            .settle(record.mode, &winners, &losers, dodger.as_deref())
        {
            Ok(settlement) => {
                coordinator.complete_resolution(MatchStatus::Settled).await;
                self.bump(|s| s.matches_settled += 1);
                self.sync_active_matches();
                self.metrics
                    .record_settled(record.mode, &reason, start.elapsed());

                info!(
                    "Match {} settled: {} wins ({:?})",
                    record.id, winning_side, reason
                );

                let event = MatchSettled {
                    match_id: record.id,
                    mode: record.mode,
                    winning_side,
                    reason,
                    winners: settlement.winners,
                    losers: settlement.losers,
                    dodge: settlement.dodge,
                    timestamp: current_timestamp(),
                };

                self.publisher.publish_match_settled(event.clone()).await?;
                Ok(event)
            }
            Err(err) => {
                coordinator.abort_resolution().await;
                warn!(
                    "Settlement of match {} failed, match stays pending: {}",
                    record.id, err
                );
                Err(err)
            }
        }
    }

    async fn publish_vote_update(
        &self,
        coordinator: &Arc<VoteCoordinator>,
        tallies: VoteTallies,
    ) -> Result<()> {
        let record = coordinator.record();
        self.publisher
            .publish_vote_update(VoteUpdate {
                match_id: record.id,
                mode: record.mode,
                votes_a: tallies.votes_a,
                votes_b: tallies.votes_b,
                cancel_votes: tallies.cancel,
                votes_needed: MAJORITY_VOTES,
                timestamp: current_timestamp(),
            })
            .await
    }

    fn coordinator(&self, match_id: MatchId) -> Result<Arc<VoteCoordinator>> {
        let active = self.active.read().map_err(|_| LadderError::InternalError {
            message: "Failed to acquire active matches lock".to_string(),
        })?;

        match active.get(&match_id) {
            Some(coordinator) => Ok(coordinator.clone()),
            None => Err(LadderError::match_not_found(match_id).into()),
        }
    }

    fn bump<F: FnOnce(&mut EngineStats)>(&self, update: F) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    /// Recount pending matches into the stats snapshot
    fn sync_active_matches(&self) {
        // The registry may briefly include terminal matches awaiting
        // cleanup; the metric gauge tracks the exact pending count instead
        let count = self.active.read().map(|a| a.len()).unwrap_or(0);
        self.bump(|s| s.active_matches = count);
    }
}
