//! In-memory store implementation
//!
//! Single RwLock over one inner struct so multi-map updates stay consistent.

use crate::error::ArcadeError;
use crate::store::{pair_key, Mutation, Store};
use crate::types::{GameStat, GameType, MatchRecord, Player, PlayerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    players: HashMap<PlayerId, Player>,
    stats: HashMap<(PlayerId, GameType), GameStat>,
    matches: Vec<MatchRecord>,
}

/// In-memory store backing the game core
#[derive(Debug)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    max_match_records: usize,
}

impl InMemoryStore {
    pub fn new(max_match_records: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_match_records,
        }
    }

    fn read(&self) -> crate::error::Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| {
            ArcadeError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> crate::error::Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| {
            ArcadeError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            }
            .into()
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl Store for InMemoryStore {
    fn get_player(&self, player_id: &str) -> crate::error::Result<Option<Player>> {
        Ok(self.read()?.players.get(player_id).cloned())
    }

    fn ensure_player(
        &self,
        player_id: &str,
        display_name: &str,
    ) -> crate::error::Result<Player> {
        let mut inner = self.write()?;
        let player = inner
            .players
            .entry(player_id.to_string())
            .or_insert_with(|| Player::new(player_id.to_string(), display_name));
        Ok(player.clone())
    }

    fn update_player(
        &self,
        player_id: &str,
        mutate: Mutation<Player>,
    ) -> crate::error::Result<Player> {
        let mut inner = self.write()?;
        let player = inner
            .players
            .entry(player_id.to_string())
            .or_insert_with(|| Player::new(player_id.to_string(), player_id));
        mutate(player);
        Ok(player.clone())
    }

    fn get_stat(
        &self,
        player_id: &str,
        game_type: GameType,
    ) -> crate::error::Result<Option<GameStat>> {
        Ok(self
            .read()?
            .stats
            .get(&(player_id.to_string(), game_type))
            .cloned())
    }

    fn update_stat(
        &self,
        player_id: &str,
        game_type: GameType,
        mutate: Mutation<GameStat>,
    ) -> crate::error::Result<GameStat> {
        let mut inner = self.write()?;
        let stat = inner
            .stats
            .entry((player_id.to_string(), game_type))
            .or_insert_with(|| GameStat::new(player_id.to_string(), game_type));
        mutate(stat);
        Ok(stat.clone())
    }

    fn top_stats(
        &self,
        game_type: GameType,
        limit: usize,
    ) -> crate::error::Result<Vec<GameStat>> {
        let inner = self.read()?;
        let mut entries: Vec<GameStat> = inner
            .stats
            .values()
            .filter(|s| s.game_type == game_type)
            .cloned()
            .collect();

        entries.sort_by(|a, b| {
            b.rank_score
                .partial_cmp(&a.rank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(limit);

        Ok(entries)
    }

    fn record_match(&self, record: MatchRecord) -> crate::error::Result<()> {
        let mut inner = self.write()?;
        inner.matches.push(record);

        // Bound history growth; oldest records go first
        if inner.matches.len() > self.max_match_records {
            let excess = inner.matches.len() - self.max_match_records;
            inner.matches.drain(..excess);
        }

        Ok(())
    }

    fn pair_games_since(
        &self,
        player_a: &str,
        player_b: &str,
        game_type: GameType,
        since: DateTime<Utc>,
    ) -> crate::error::Result<usize> {
        let key = pair_key(player_a, player_b);
        let inner = self.read()?;

        let count = inner
            .matches
            .iter()
            .filter(|m| m.game_type == game_type && m.completed_at >= since)
            .filter(|m| {
                m.player2_id
                    .as_deref()
                    .map(|p2| pair_key(&m.player1_id, p2) == key)
                    .unwrap_or(false)
            })
            .count();

        Ok(count)
    }

    fn recent_matches(
        &self,
        player_id: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<MatchRecord>> {
        let inner = self.read()?;
        let mut result: Vec<MatchRecord> = inner
            .matches
            .iter()
            .rev()
            .filter(|m| {
                m.player1_id == player_id || m.player2_id.as_deref() == Some(player_id)
            })
            .take(limit)
            .cloned()
            .collect();
        result.shrink_to_fit();
        Ok(result)
    }

    fn player_count(&self) -> crate::error::Result<usize> {
        Ok(self.read()?.players.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchOutcome, OutcomeReason};
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn record(p1: &str, p2: &str, game_type: GameType, ago_minutes: i64) -> MatchRecord {
        MatchRecord {
            game_type,
            player1_id: p1.to_string(),
            player2_id: Some(p2.to_string()),
            winner_id: Some(p1.to_string()),
            outcome: MatchOutcome::Decisive {
                winner: p1.to_string(),
                loser: p2.to_string(),
                reason: OutcomeReason::Played,
            },
            rating_delta: 16,
            rated: true,
            duration_seconds: Some(60),
            completed_at: current_timestamp() - Duration::minutes(ago_minutes),
        }
    }

    #[test]
    fn test_ensure_player_idempotent() {
        let store = InMemoryStore::default();
        let first = store.ensure_player("alice", "Alice").unwrap();
        let second = store.ensure_player("alice", "SomebodyElse").unwrap();
        assert_eq!(first.display_name, "Alice");
        assert_eq!(second.display_name, "Alice");
        assert_eq!(store.player_count().unwrap(), 1);
    }

    #[test]
    fn test_update_stat_creates_default() {
        let store = InMemoryStore::default();
        let stat = store
            .update_stat("alice", GameType::TicTacToe, Box::new(|s| s.wins += 1))
            .unwrap();
        assert_eq!(stat.wins, 1);
        assert_eq!(stat.rating, GameStat::DEFAULT_RATING);

        // Second mutation sees the first
        let stat = store
            .update_stat("alice", GameType::TicTacToe, Box::new(|s| s.wins += 1))
            .unwrap();
        assert_eq!(stat.wins, 2);
    }

    #[test]
    fn test_stats_keyed_per_game_type() {
        let store = InMemoryStore::default();
        store
            .update_stat("alice", GameType::TicTacToe, Box::new(|s| s.wins = 5))
            .unwrap();

        let other = store.get_stat("alice", GameType::ConnectFour).unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn test_top_stats_sorted_by_rank_score() {
        let store = InMemoryStore::default();
        for (id, score) in [("a", 50.0), ("b", 120.0), ("c", 80.0)] {
            store
                .update_stat(
                    id,
                    GameType::NumberGuess,
                    Box::new(move |s| s.rank_score = score),
                )
                .unwrap();
        }

        let top = store.top_stats(GameType::NumberGuess, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].player_id, "b");
        assert_eq!(top[1].player_id, "c");
    }

    #[test]
    fn test_pair_games_since_is_order_insensitive() {
        let store = InMemoryStore::default();
        store
            .record_match(record("alice", "bob", GameType::TicTacToe, 10))
            .unwrap();
        store
            .record_match(record("bob", "alice", GameType::TicTacToe, 5))
            .unwrap();
        // Different game type must not count
        store
            .record_match(record("alice", "bob", GameType::ConnectFour, 5))
            .unwrap();

        let since = current_timestamp() - Duration::hours(1);
        let count = store
            .pair_games_since("alice", "bob", GameType::TicTacToe, since)
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_pair_games_since_respects_cutoff() {
        let store = InMemoryStore::default();
        store
            .record_match(record("alice", "bob", GameType::TicTacToe, 120))
            .unwrap();
        store
            .record_match(record("alice", "bob", GameType::TicTacToe, 10))
            .unwrap();

        let since = current_timestamp() - Duration::hours(1);
        let count = store
            .pair_games_since("alice", "bob", GameType::TicTacToe, since)
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_recent_matches_newest_first() {
        let store = InMemoryStore::default();
        store
            .record_match(record("alice", "bob", GameType::TicTacToe, 30))
            .unwrap();
        store
            .record_match(record("alice", "carol", GameType::TicTacToe, 10))
            .unwrap();
        store
            .record_match(record("bob", "carol", GameType::TicTacToe, 5))
            .unwrap();

        let recent = store.recent_matches("alice", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].player2_id.as_deref(), Some("carol"));
    }

    #[test]
    fn test_match_history_bounded() {
        let store = InMemoryStore::new(2);
        for _ in 0..5 {
            store
                .record_match(record("alice", "bob", GameType::TicTacToe, 1))
                .unwrap();
        }
        let since = current_timestamp() - Duration::hours(1);
        let count = store
            .pair_games_since("alice", "bob", GameType::TicTacToe, since)
            .unwrap();
        assert_eq!(count, 2);
    }
}
