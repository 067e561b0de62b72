//! Error types for the arcade core
//!
//! Domain errors are expected, recoverable conditions surfaced to the
//! presentation layer as structured results. Infrastructure failures
//! (broker, store) are the only fatal class.

use crate::types::{GameType, PlayerId};
use chrono::{DateTime, Utc};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Structured error taxonomy for matchmaking, sessions, and rating
#[derive(Debug, thiserror::Error)]
pub enum ArcadeError {
    #[error("Player {player_id} already has an active session")]
    AlreadyInSession { player_id: PlayerId },

    #[error("Player {player_id} is already queued")]
    AlreadyQueued { player_id: PlayerId },

    #[error("Player {player_id} is locked out of matchmaking until {until}")]
    QueueLocked {
        player_id: PlayerId,
        until: DateTime<Utc>,
    },

    #[error("It is not {player_id}'s turn")]
    NotYourTurn { player_id: PlayerId },

    #[error("Illegal move: {reason}")]
    IllegalMove { reason: String },

    #[error("No pending challenge for {player_id}")]
    NoChallenge { player_id: PlayerId },

    #[error("Challenger {challenger_id} is no longer available")]
    ChallengerUnavailable { challenger_id: PlayerId },

    #[error("Player {player_id} cannot challenge themselves")]
    SelfChallenge { player_id: PlayerId },

    #[error("No session found for {reference}")]
    SessionNotFound { reference: String },

    #[error("Candidate {player_id} was claimed by a concurrent search")]
    RaceLost { player_id: PlayerId },

    #[error("No game engine registered for {game_type}")]
    EngineUnavailable { game_type: GameType },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl ArcadeError {
    /// Whether the presentation layer should treat this as a normal,
    /// user-visible outcome rather than a fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ArcadeError::AmqpConnectionFailed { .. }
                | ArcadeError::ConfigurationError { .. }
                | ArcadeError::InternalError { .. }
        )
    }
}

/// Extract the domain error from an `anyhow::Error`, if there is one.
pub fn as_arcade_error(err: &anyhow::Error) -> Option<&ArcadeError> {
    err.downcast_ref::<ArcadeError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let err = ArcadeError::AlreadyQueued {
            player_id: "p1".to_string(),
        };
        assert!(err.is_recoverable());

        let err = ArcadeError::InternalError {
            message: "lock poisoned".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ArcadeError::NoChallenge {
            player_id: "p1".to_string(),
        }
        .into();

        match as_arcade_error(&err) {
            Some(ArcadeError::NoChallenge { player_id }) => assert_eq!(player_id, "p1"),
            other => panic!("unexpected downcast result: {:?}", other),
        }
    }
}
