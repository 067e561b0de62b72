//! Rating system for pvp and solo games
//!
//! Elo drives the competitive games; solo games rank by a wins-weighted
//! score. The engine also owns post-game bookkeeping: counters, streaks,
//! the daily same-pair farming cap, and match history.

pub mod elo;
pub mod engine;

pub use elo::{calculate_elo_change, EloChange};
pub use engine::RatingEngine;
