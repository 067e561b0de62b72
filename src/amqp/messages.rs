//! AMQP message definitions and serialization

use crate::error::{ArcadeError, Result};
use crate::types::{ArcadeEvent, ContactRef, GameType, PlayerId};
use serde_json;

/// AMQP queue and exchange names
pub const COMMAND_QUEUE: &str = "arcade.commands";
pub const GAME_EVENTS_EXCHANGE: &str = "arcade.game_events";

/// Routing keys for outbound events
pub const SESSION_CREATED_ROUTING_KEY: &str = "session.created";
pub const MOVE_APPLIED_ROUTING_KEY: &str = "session.move";
pub const SESSION_ENDED_ROUTING_KEY: &str = "session.ended";
pub const QUEUE_UPDATE_ROUTING_KEY: &str = "queue.update";
pub const CHALLENGE_ISSUED_ROUTING_KEY: &str = "challenge.issued";
pub const CHALLENGE_ACCEPTED_ROUTING_KEY: &str = "challenge.accepted";

/// Commands arriving from the chat front-end
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    JoinQueue {
        player_id: PlayerId,
        display_name: String,
        game_type: GameType,
        contact: ContactRef,
    },
    CancelQueue {
        player_id: PlayerId,
    },
    StartSolo {
        player_id: PlayerId,
        display_name: String,
        game_type: GameType,
        contact: ContactRef,
    },
    SubmitMove {
        player_id: PlayerId,
        input: String,
    },
    Forfeit {
        player_id: PlayerId,
    },
    IssueChallenge {
        player_id: PlayerId,
        display_name: String,
        challenged_id: PlayerId,
        game_type: GameType,
        contact: ContactRef,
        guild_id: Option<String>,
    },
    AcceptChallenge {
        player_id: PlayerId,
        display_name: String,
        contact: ContactRef,
        guild_id: Option<String>,
    },
    Rematch {
        player_id: PlayerId,
        contact: ContactRef,
    },
}

impl PlayerCommand {
    /// The player who issued the command
    pub fn player_id(&self) -> &str {
        match self {
            PlayerCommand::JoinQueue { player_id, .. }
            | PlayerCommand::CancelQueue { player_id }
            | PlayerCommand::StartSolo { player_id, .. }
            | PlayerCommand::SubmitMove { player_id, .. }
            | PlayerCommand::Forfeit { player_id }
            | PlayerCommand::IssueChallenge { player_id, .. }
            | PlayerCommand::AcceptChallenge { player_id, .. }
            | PlayerCommand::Rematch { player_id, .. } => player_id,
        }
    }
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
            ArcadeError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ArcadeError::InternalError {
                message: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Serialize a player command to bytes
    pub fn serialize_command(command: &PlayerCommand) -> Result<Vec<u8>> {
        Self::validate_command(command)?;
        serde_json::to_vec(command).map_err(|e| {
            ArcadeError::InternalError {
                message: format!("Failed to serialize command: {}", e),
            }
            .into()
        })
    }

    /// Deserialize player command from bytes
    pub fn deserialize_command(bytes: &[u8]) -> Result<PlayerCommand> {
        let command: PlayerCommand =
            serde_json::from_slice(bytes).map_err(|e| ArcadeError::InternalError {
                message: format!("Failed to deserialize command: {}", e),
            })?;

        Self::validate_command(&command)?;
        Ok(command)
    }

    /// Validate a player command
    pub fn validate_command(command: &PlayerCommand) -> Result<()> {
        if command.player_id().is_empty() {
            return Err(ArcadeError::InternalError {
                message: "Player ID cannot be empty".to_string(),
            }
            .into());
        }

        if let PlayerCommand::IssueChallenge { challenged_id, .. } = command {
            if challenged_id.is_empty() {
                return Err(ArcadeError::InternalError {
                    message: "Challenged player ID cannot be empty".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Get routing key for an outbound event
    pub fn get_routing_key(event: &ArcadeEvent) -> &'static str {
        match event {
            ArcadeEvent::SessionCreated(_) => SESSION_CREATED_ROUTING_KEY,
            ArcadeEvent::MoveApplied(_) => MOVE_APPLIED_ROUTING_KEY,
            ArcadeEvent::SessionEnded(_) => SESSION_ENDED_ROUTING_KEY,
            ArcadeEvent::QueueUpdate(_) => QUEUE_UPDATE_ROUTING_KEY,
            ArcadeEvent::ChallengeIssued(_) => CHALLENGE_ISSUED_ROUTING_KEY,
            ArcadeEvent::ChallengeAccepted(_) => CHALLENGE_ACCEPTED_ROUTING_KEY,
        }
    }
}
