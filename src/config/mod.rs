//! Configuration management for the arcade service
//!
//! This module handles all configuration loading from environment variables,
//! validation, and default values for the game core.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AmqpSettings, AppConfig, ChallengeSettings, MatchmakingSettings,
    RatingSettings, ServiceSettings, SessionSettings,
};
