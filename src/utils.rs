//! Utility functions for the ladder service

use crate::types::{MatchId, TeamId};
use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> MatchId {
    Uuid::new_v4()
}

/// Generate a new unique team ID
pub fn generate_team_id() -> TeamId {
    Uuid::new_v4()
}

/// Generate an 8-character alphanumeric room code
pub fn generate_room_code() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Mean of a slice of integer ratings
pub fn mean_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    ratings.iter().map(|&r| r as f64).sum::<f64>() / ratings.len() as f64
}
