//! AMQP message definitions, validation, and serialization

use crate::error::{LadderError, Result};
use crate::types::{LadderEvent, MatchId, Mode, PlayerId, TeamId, VoteChoice};

/// Default queue and exchange names
pub const COMMAND_QUEUE: &str = "ladder.commands";
pub const EVENTS_EXCHANGE: &str = "ladder.events";

/// Routing keys for outbound events
pub const QUEUE_EVENTS_ROUTING_KEY: &str = "queue.updated";
pub const MATCH_FORMED_ROUTING_KEY: &str = "match.formed";
pub const VOTE_UPDATE_ROUTING_KEY: &str = "match.vote";
pub const MATCH_SETTLED_ROUTING_KEY: &str = "match.settled";
pub const MATCH_CANCELLED_ROUTING_KEY: &str = "match.cancelled";
pub const MATCH_UNDONE_ROUTING_KEY: &str = "match.undone";

/// Inbound commands from the chat layer, one per core operation
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "command")]
pub enum LadderCommand {
    JoinQueue {
        mode: Mode,
        player_id: PlayerId,
        display_name: String,
    },
    LeaveQueue {
        mode: Mode,
        player_id: PlayerId,
    },
    CastVote {
        match_id: MatchId,
        voter: PlayerId,
        choice: VoteChoice,
    },
    ReportDodge {
        match_id: MatchId,
        accuser: PlayerId,
        accused: PlayerId,
    },
    CreateTeam {
        name: String,
        captain: PlayerId,
        second: PlayerId,
        third: PlayerId,
    },
    DissolveTeam {
        team_id: TeamId,
        requested_by: PlayerId,
    },
    UndoLast {
        mode: Mode,
        requested_by: PlayerId,
    },
}

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            LadderError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize an envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            LadderError::ValidationError {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize and validate an inbound command
    pub fn deserialize_command(bytes: &[u8]) -> Result<LadderCommand> {
        let command: LadderCommand =
            serde_json::from_slice(bytes).map_err(|e| LadderError::ValidationError {
                reason: format!("Failed to deserialize command: {}", e),
            })?;

        Self::validate_command(&command)?;
        Ok(command)
    }

    /// Validate an inbound command before dispatch
    pub fn validate_command(command: &LadderCommand) -> Result<()> {
        let empty = |field: &str, value: &str| -> Result<()> {
            if value.trim().is_empty() {
                return Err(LadderError::ValidationError {
                    reason: format!("{} cannot be empty", field),
                }
                .into());
            }
            Ok(())
        };

        match command {
            LadderCommand::JoinQueue {
                player_id,
                display_name,
                ..
            } => {
                empty("player id", player_id)?;
                empty("display name", display_name)?;
            }
            LadderCommand::LeaveQueue { player_id, .. } => empty("player id", player_id)?,
            LadderCommand::CastVote { voter, .. } => empty("voter id", voter)?,
            LadderCommand::ReportDodge {
                accuser, accused, ..
            } => {
                empty("accuser id", accuser)?;
                empty("accused id", accused)?;
            }
            LadderCommand::CreateTeam {
                name,
                captain,
                second,
                third,
            } => {
                empty("team name", name)?;
                empty("captain id", captain)?;
                empty("member id", second)?;
                empty("member id", third)?;
            }
            LadderCommand::DissolveTeam { requested_by, .. } => {
                empty("requester id", requested_by)?
            }
            LadderCommand::UndoLast { requested_by, .. } => empty("requester id", requested_by)?,
        }

        Ok(())
    }

    /// Serialize an outbound event to bytes
    pub fn serialize_event(event: &LadderEvent) -> Result<Vec<u8>> {
        serde_json::to_vec(event).map_err(|e| {
            LadderError::InternalError {
                message: format!("Failed to serialize event: {}", e),
            }
            .into()
        })
    }

    /// Get the routing key for an outbound event
    pub fn routing_key(event: &LadderEvent) -> &'static str {
        match event {
            LadderEvent::PlayerQueued(_) | LadderEvent::PlayerLeftQueue(_) => {
                QUEUE_EVENTS_ROUTING_KEY
            }
            LadderEvent::MatchFormed(_) => MATCH_FORMED_ROUTING_KEY,
            LadderEvent::VoteUpdate(_) => VOTE_UPDATE_ROUTING_KEY,
            LadderEvent::MatchSettled(_) => MATCH_SETTLED_ROUTING_KEY,
            LadderEvent::MatchCancelled(_) => MATCH_CANCELLED_ROUTING_KEY,
            LadderEvent::MatchUndone(_) => MATCH_UNDONE_ROUTING_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerQueued, Entrant, Side};
    use crate::utils::{current_timestamp, generate_match_id};

    #[test]
    fn test_command_roundtrip() {
        let command = LadderCommand::CastVote {
            match_id: generate_match_id(),
            voter: "p1".to_string(),
            choice: VoteChoice::Win(Side::TeamA),
        };

        let bytes = serde_json::to_vec(&command).unwrap();
        let parsed = MessageUtils::deserialize_command(&bytes).unwrap();
        assert!(matches!(parsed, LadderCommand::CastVote { .. }));
    }

    #[test]
    fn test_command_validation_rejects_empty_ids() {
        let command = LadderCommand::JoinQueue {
            mode: Mode::Solo,
            player_id: "".to_string(),
            display_name: "Someone".to_string(),
        };
        assert!(MessageUtils::validate_command(&command).is_err());

        let command = LadderCommand::CreateTeam {
            name: "Squad".to_string(),
            captain: "cap".to_string(),
            second: "  ".to_string(),
            third: "p3".to_string(),
        };
        assert!(MessageUtils::validate_command(&command).is_err());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let command = LadderCommand::UndoLast {
            mode: Mode::Chaos,
            requested_by: "admin".to_string(),
        };
        let envelope = MessageEnvelope::new(command, "ladder.admin".to_string());

        let bytes = envelope.to_bytes().unwrap();
        let parsed: MessageEnvelope<LadderCommand> = MessageEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.correlation_id, envelope.correlation_id);
        assert!(matches!(parsed.payload, LadderCommand::UndoLast { .. }));
    }

    #[test]
    fn test_event_routing_keys() {
        let event = LadderEvent::PlayerQueued(PlayerQueued {
            mode: Mode::Solo,
            entrant: Entrant::Player("p1".to_string()),
            waiting: 1,
            needed: 5,
            timestamp: current_timestamp(),
        });
        assert_eq!(MessageUtils::routing_key(&event), QUEUE_EVENTS_ROUTING_KEY);
    }

    #[test]
    fn test_malformed_command_rejected() {
        let err = MessageUtils::deserialize_command(b"not json").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::ValidationError { .. })
        ));
    }
}
