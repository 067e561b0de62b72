//! Persistence interface and implementations
//!
//! This module defines the interface for persisting players, per-game
//! statistics, and match history, with an in-memory implementation.
//! The trait is the seam a database-backed store would plug into.

pub mod memory;

pub use memory::InMemoryStore;

use crate::types::{GameStat, GameType, MatchRecord, Player, PlayerId};
use chrono::{DateTime, Utc};

/// Mutation applied to a record while the store holds its write lock.
/// Keeps read-modify-write cycles atomic per key without exposing the lock.
pub type Mutation<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Trait for player/statistics storage operations
pub trait Store: Send + Sync {
    /// Get a player record
    fn get_player(&self, player_id: &str) -> crate::error::Result<Option<Player>>;

    /// Get or create a player record
    fn ensure_player(&self, player_id: &str, display_name: &str)
        -> crate::error::Result<Player>;

    /// Atomically mutate a player record, creating it first if absent.
    /// Returns the record after mutation.
    fn update_player(
        &self,
        player_id: &str,
        mutate: Mutation<Player>,
    ) -> crate::error::Result<Player>;

    /// Get a player's statistics for one game type
    fn get_stat(
        &self,
        player_id: &str,
        game_type: GameType,
    ) -> crate::error::Result<Option<GameStat>>;

    /// Atomically mutate a stat record, creating the default (rating 1000,
    /// zero counters) first if absent. Returns the record after mutation.
    fn update_stat(
        &self,
        player_id: &str,
        game_type: GameType,
        mutate: Mutation<GameStat>,
    ) -> crate::error::Result<GameStat>;

    /// Top stat records for a game type, sorted by rank score descending
    fn top_stats(
        &self,
        game_type: GameType,
        limit: usize,
    ) -> crate::error::Result<Vec<GameStat>>;

    /// Append a completed match to the history
    fn record_match(&self, record: MatchRecord) -> crate::error::Result<()>;

    /// How many matches this exact pair has completed for this game type
    /// since the given instant. Order of the two ids does not matter.
    fn pair_games_since(
        &self,
        player_a: &str,
        player_b: &str,
        game_type: GameType,
        since: DateTime<Utc>,
    ) -> crate::error::Result<usize>;

    /// Most recent matches involving a player, newest first
    fn recent_matches(
        &self,
        player_id: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<MatchRecord>>;

    /// Total number of known players
    fn player_count(&self) -> crate::error::Result<usize>;
}

/// Canonical ordering for an unordered player pair
pub fn pair_key(a: &str, b: &str) -> (PlayerId, PlayerId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
