//! Fixed-team registry for the fixed-team mode
//!
//! Teams are an explicit player commitment: exactly three distinct members
//! with a designated captain, at most one team per player, dissolved only
//! by the captain. Settled match history keeps member player ids whether or
//! not the team still exists.

use crate::error::{LadderError, Result};
use crate::types::{Team, TeamId};
use crate::utils::{current_timestamp, generate_team_id};
use std::collections::HashMap;
use std::sync::RwLock;

/// Maximum length of a team name
pub const MAX_TEAM_NAME_LENGTH: usize = 32;

/// Trait for fixed-team bookkeeping
pub trait TeamRegistry: Send + Sync {
    /// Create a team of three distinct players with the first as captain
    fn create_team(&self, name: &str, captain: &str, second: &str, third: &str) -> Result<Team>;

    /// Get a team by id
    fn get_team(&self, team_id: TeamId) -> Result<Option<Team>>;

    /// Get the team a player belongs to, if any
    fn team_of_player(&self, player_id: &str) -> Result<Option<Team>>;

    /// Dissolve a team; only the captain may do this. Irreversible.
    fn dissolve_team(&self, team_id: TeamId, requested_by: &str) -> Result<Team>;
}

/// In-memory team registry implementation
#[derive(Debug, Default)]
pub struct InMemoryTeamRegistry {
    teams: RwLock<HashMap<TeamId, Team>>,
}

impl InMemoryTeamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_roster(name: &str, members: &[&str; 3]) -> Result<()> {
        if name.trim().is_empty() {
            return Err(LadderError::ValidationError {
                reason: "team name cannot be empty".to_string(),
            }
            .into());
        }
        if name.len() > MAX_TEAM_NAME_LENGTH {
            return Err(LadderError::ValidationError {
                reason: format!(
                    "team name exceeds {} characters",
                    MAX_TEAM_NAME_LENGTH
                ),
            }
            .into());
        }
        if members[0] == members[1] || members[0] == members[2] || members[1] == members[2] {
            return Err(LadderError::ValidationError {
                reason: "team members must be three distinct players".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl TeamRegistry for InMemoryTeamRegistry {
    fn create_team(&self, name: &str, captain: &str, second: &str, third: &str) -> Result<Team> {
        Self::validate_roster(name, &[captain, second, third])?;

        let mut teams = self.teams.write().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire team registry write lock".to_string(),
        })?;

        for member in [captain, second, third] {
            if let Some(existing) = teams.values().find(|t| t.contains(member)) {
                return Err(LadderError::AlreadyInProgress {
                    reason: format!(
                        "player {} already belongs to team '{}'",
                        member, existing.name
                    ),
                }
                .into());
            }
        }

        let team = Team {
            id: generate_team_id(),
            name: name.to_string(),
            captain: captain.to_string(),
            members: vec![
                captain.to_string(),
                second.to_string(),
                third.to_string(),
            ],
            created_at: current_timestamp(),
        };

        teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn get_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        let teams = self.teams.read().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire team registry read lock".to_string(),
        })?;

        Ok(teams.get(&team_id).cloned())
    }

    fn team_of_player(&self, player_id: &str) -> Result<Option<Team>> {
        let teams = self.teams.read().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire team registry read lock".to_string(),
        })?;

        Ok(teams.values().find(|t| t.contains(player_id)).cloned())
    }

    fn dissolve_team(&self, team_id: TeamId, requested_by: &str) -> Result<Team> {
        let mut teams = self.teams.write().map_err(|_| LadderError::StorageFailure {
            message: "Failed to acquire team registry write lock".to_string(),
        })?;

        let team = teams
            .get(&team_id)
            .ok_or_else(|| LadderError::team_not_found(team_id))?;

        if team.captain != requested_by {
            return Err(LadderError::ValidationError {
                reason: "only the team captain can dissolve the team".to_string(),
            }
            .into());
        }

        Ok(teams.remove(&team_id).expect("team present under write lock"))
    }
}
