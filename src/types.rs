//! Common types used throughout the ladder service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players (opaque, assigned by the chat platform)
pub type PlayerId = String;

/// Unique identifier for fixed teams
pub type TeamId = Uuid;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Store-assigned identifier for a persisted match history entry
pub type HistoryEntryId = u64;

/// Rating assigned to players on first contact
pub const DEFAULT_RATING: i32 = 1000;

/// Number of players in a match
pub const MATCH_SIZE: usize = 6;

/// Number of players on each side
pub const SIDE_SIZE: usize = 3;

/// Votes required for a strict majority (or an outright cancellation)
pub const MAJORITY_VOTES: u32 = 4;

/// Accusations required to confirm a dodge
pub const DODGE_CONFIRMATIONS: u32 = 3;

/// Independent matchmaking pool with isolated queue, ratings, and history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Solo,
    FixedTeam,
    Chaos,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Solo, Mode::FixedTeam, Mode::Chaos];

    /// Whether participants of this mode can vote to cancel a match
    pub fn supports_cancel(&self) -> bool {
        !matches!(self, Mode::Chaos)
    }

    /// Whether entrants queue as pre-formed teams rather than individuals
    pub fn queues_teams(&self) -> bool {
        matches!(self, Mode::FixedTeam)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Solo => "solo",
            Mode::FixedTeam => "fixed_team",
            Mode::Chaos => "chaos",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two 3-player groupings within a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    TeamA,
    TeamB,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::TeamA => Side::TeamB,
            Side::TeamB => Side::TeamA,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::TeamA => write!(f, "Team A"),
            Side::TeamB => write!(f, "Team B"),
        }
    }
}

/// A participant's current choice on a pending match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    Win(Side),
    Cancel,
}

/// Per-player, per-mode rating record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
}

impl Default for RatingRecord {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            wins: 0,
            losses: 0,
        }
    }
}

/// Registered player profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Fixed 3-player team for the fixed-team mode
///
/// `members` always holds exactly three distinct player ids with the
/// captain first. A team is destroyed only by its captain; settled matches
/// keep the member player ids regardless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub captain: PlayerId,
    pub members: Vec<PlayerId>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn contains(&self, player_id: &str) -> bool {
        self.members.iter().any(|m| m == player_id)
    }
}

/// An entrant waiting in a mode's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entrant {
    Player(PlayerId),
    Team(TeamId),
}

impl std::fmt::Display for Entrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entrant::Player(id) => write!(f, "player {}", id),
            Entrant::Team(id) => write!(f, "team {}", id),
        }
    }
}

/// Match lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Pending,
    Settled,
    Cancelled,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }
}

/// Cosmetic payload attached to a formed match, never consulted by
/// settlement logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CosmeticPayload {
    /// Suggested maps for solo and fixed-team matches
    MapSuggestions { maps: Vec<String> },
    /// Chaos draw: one map, one brawler per participant (side A first,
    /// then side B), one modifier
    ChaosDraw {
        map: String,
        brawlers: Vec<String>,
        modifier: String,
    },
}

/// Immutable description of a formed match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub mode: Mode,
    pub side_a: Vec<PlayerId>,
    pub side_b: Vec<PlayerId>,
    pub room_code: String,
    pub cosmetics: CosmeticPayload,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// All six participant ids, side A first
    pub fn participants(&self) -> impl Iterator<Item = &PlayerId> {
        self.side_a.iter().chain(self.side_b.iter())
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.participants().any(|p| p == player_id)
    }

    /// Which side a participant plays on, if any
    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        if self.side_a.iter().any(|p| p == player_id) {
            Some(Side::TeamA)
        } else if self.side_b.iter().any(|p| p == player_id) {
            Some(Side::TeamB)
        } else {
            None
        }
    }

    pub fn side_players(&self, side: Side) -> &[PlayerId] {
        match side {
            Side::TeamA => &self.side_a,
            Side::TeamB => &self.side_b,
        }
    }
}

/// A player id paired with their rating at match formation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatedPlayer {
    pub id: PlayerId,
    pub rating: i32,
}

/// How a pending match reached its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResolutionReason {
    /// A side reached the strict-majority threshold before all votes were in
    Majority { votes: u32 },
    /// All six votes cast, strict plurality decided
    FinalCount { winner_votes: u32, loser_votes: u32 },
    /// Enough accusers agreed on the same accused player
    DodgeConfirmed { accused: PlayerId },
}

/// Applied rating movement for one player in one settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDelta {
    pub player_id: PlayerId,
    pub old_rating: i32,
    pub new_rating: i32,
    /// Applied delta (`new_rating - old_rating`); stored verbatim so undo
    /// restores the exact pre-match rating even through the zero floor
    pub delta: i32,
}

/// Confirmed dodge attached to a settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DodgeOutcome {
    pub player_id: PlayerId,
    pub penalty: i32,
}

/// Persisted snapshot of a settled match, sufficient for exact reversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub mode: Mode,
    pub winners: Vec<PlayerId>,
    pub losers: Vec<PlayerId>,
    /// Applied deltas in the same order as `winners`
    pub winner_deltas: Vec<i32>,
    /// Applied deltas in the same order as `losers`
    pub loser_deltas: Vec<i32>,
    pub dodge: Option<DodgeOutcome>,
    pub recorded_at: DateTime<Utc>,
}

/// One row of a mode's standings, rating descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingsRow {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
}

/// A single player's standing in one mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub display_name: String,
    pub mode: Mode,
    pub rating: i32,
    /// 1-based position in the mode's standings
    pub rank: usize,
    pub wins: u32,
    pub losses: u32,
    pub dodge_count: u32,
}

/// Outcome of a queue join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JoinOutcome {
    /// Admitted and waiting; `rating` is echoed back for display
    Queued {
        waiting: usize,
        needed: usize,
        rating: i32,
    },
    /// The join filled the queue and a match was formed
    MatchFormed { match_id: MatchId },
}

/// Outcome of a queue leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveOutcome {
    Left,
    NotQueued,
}

/// Outcome of a recorded vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VoteOutcome {
    /// Vote recorded, match still pending (includes the 3-3 stalemate)
    Recorded {
        votes_a: u32,
        votes_b: u32,
        cancel_votes: u32,
    },
    Settled { winning_side: Side },
    Cancelled,
}

/// Outcome of a recorded dodge accusation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DodgeReportOutcome {
    /// Accusation recorded, not yet confirmed
    Recorded { accusations_against: u32 },
    /// Accusation reached the confirmation threshold and settled the match
    Confirmed { accused: PlayerId },
}

/// Event: an entrant was admitted to a mode's queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerQueued {
    pub mode: Mode,
    pub entrant: Entrant,
    pub waiting: usize,
    pub needed: usize,
    pub timestamp: DateTime<Utc>,
}

/// Event: an entrant left a mode's queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeftQueue {
    pub mode: Mode,
    pub entrant: Entrant,
    pub waiting: usize,
    pub timestamp: DateTime<Utc>,
}

/// Event: a match was formed from a full queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFormed {
    pub match_id: MatchId,
    pub mode: Mode,
    pub room_code: String,
    pub side_a: Vec<RatedPlayer>,
    pub side_b: Vec<RatedPlayer>,
    pub cosmetics: CosmeticPayload,
    pub timestamp: DateTime<Utc>,
}

/// Event: vote tallies changed on a pending match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteUpdate {
    pub match_id: MatchId,
    pub mode: Mode,
    pub votes_a: u32,
    pub votes_b: u32,
    pub cancel_votes: u32,
    pub votes_needed: u32,
    pub timestamp: DateTime<Utc>,
}

/// Event: a match settled and ratings were applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSettled {
    pub match_id: MatchId,
    pub mode: Mode,
    pub winning_side: Side,
    pub reason: ResolutionReason,
    pub winners: Vec<PlayerDelta>,
    pub losers: Vec<PlayerDelta>,
    pub dodge: Option<DodgeOutcome>,
    pub timestamp: DateTime<Utc>,
}

/// Event: a match was cancelled by participant vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCancelled {
    pub match_id: MatchId,
    pub mode: Mode,
    pub cancel_votes: u32,
    pub timestamp: DateTime<Utc>,
}

/// Event: the most recent settlement of a mode was reversed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchUndone {
    pub mode: Mode,
    /// Reversal movements: `old_rating` is the rating before the undo,
    /// `new_rating` the restored pre-match rating
    pub winners: Vec<PlayerDelta>,
    pub losers: Vec<PlayerDelta>,
    pub had_dodge: bool,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LadderEvent {
    PlayerQueued(PlayerQueued),
    PlayerLeftQueue(PlayerLeftQueue),
    MatchFormed(MatchFormed),
    VoteUpdate(VoteUpdate),
    MatchSettled(MatchSettled),
    MatchCancelled(MatchCancelled),
    MatchUndone(MatchUndone),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_capabilities() {
        assert!(Mode::Solo.supports_cancel());
        assert!(Mode::FixedTeam.supports_cancel());
        assert!(!Mode::Chaos.supports_cancel());

        assert!(Mode::FixedTeam.queues_teams());
        assert!(!Mode::Solo.queues_teams());
        assert!(!Mode::Chaos.queues_teams());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::TeamA.opposite(), Side::TeamB);
        assert_eq!(Side::TeamB.opposite(), Side::TeamA);
    }

    #[test]
    fn test_default_rating_record() {
        let record = RatingRecord::default();
        assert_eq!(record.rating, DEFAULT_RATING);
        assert_eq!(record.wins, 0);
        assert_eq!(record.losses, 0);
    }

    #[test]
    fn test_match_record_membership() {
        let record = MatchRecord {
            id: Uuid::new_v4(),
            mode: Mode::Solo,
            side_a: vec!["p1".into(), "p2".into(), "p3".into()],
            side_b: vec!["p4".into(), "p5".into(), "p6".into()],
            room_code: "ABC123XY".to_string(),
            cosmetics: CosmeticPayload::MapSuggestions { maps: vec![] },
            created_at: Utc::now(),
        };

        assert!(record.is_participant("p1"));
        assert!(record.is_participant("p6"));
        assert!(!record.is_participant("p7"));

        assert_eq!(record.side_of("p2"), Some(Side::TeamA));
        assert_eq!(record.side_of("p5"), Some(Side::TeamB));
        assert_eq!(record.side_of("p7"), None);

        assert_eq!(record.participants().count(), MATCH_SIZE);
    }

    #[test]
    fn test_match_status_terminal() {
        assert!(!MatchStatus::Pending.is_terminal());
        assert!(MatchStatus::Settled.is_terminal());
        assert!(MatchStatus::Cancelled.is_terminal());
    }
}
