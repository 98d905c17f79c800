//! Error types for the ladder service
//!
//! This module defines all error types using anyhow for consistent error
//! handling throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific ladder scenarios
///
/// Every rejected user action maps to a distinguishable variant so the
/// presentation layer can explain the refusal.
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("already in progress: {reason}")]
    AlreadyInProgress { reason: String },

    #[error("player {player_id} is not a participant of match {match_id}")]
    InvalidParticipant {
        player_id: String,
        match_id: String,
    },

    #[error("validation failed: {reason}")]
    ValidationError { reason: String },

    #[error("storage failure: {message}")]
    StorageFailure { message: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}

impl LadderError {
    /// Helper for the common not-found case on matches
    pub fn match_not_found(match_id: impl std::fmt::Display) -> Self {
        LadderError::NotFound {
            what: format!("match {}", match_id),
        }
    }

    /// Helper for the common not-found case on teams
    pub fn team_not_found(team_id: impl std::fmt::Display) -> Self {
        LadderError::NotFound {
            what: format!("team {}", team_id),
        }
    }
}
