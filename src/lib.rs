//! Arcade - matchmaking and session core for chat mini-games
//!
//! This crate provides AMQP-driven matchmaking, challenge handling, live
//! game sessions with inactivity timers, and an Elo-based rating engine
//! for casual chat mini-games.

pub mod amqp;
pub mod challenge;
pub mod config;
pub mod error;
pub mod game;
pub mod matchmaking;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ArcadeError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use challenge::ChallengeRegistry;
pub use game::{GameEngine, GameRegistry};
pub use matchmaking::{MatchPoller, MatchQueue};
pub use rating::RatingEngine;
pub use session::SessionManager;
pub use store::{InMemoryStore, Store};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
