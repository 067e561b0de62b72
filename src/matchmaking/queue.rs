//! Matchmaking queue
//!
//! A single FIFO list shared by all game types, plus the recent-opponent
//! ledger that keeps just-played pairs from instantly rematching through
//! the queue.

use crate::error::{ArcadeError, Result};
use crate::store::pair_key;
use crate::types::{GameType, QueueEntry, RecentOpponentRecord};
use crate::utils::ratings_within_tolerance;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct QueueInner {
    /// FIFO; earlier entries matched first
    entries: Vec<QueueEntry>,
    recent: Vec<RecentOpponentRecord>,
}

/// Thread-safe matchmaking queue
#[derive(Debug, Default)]
pub struct MatchQueue {
    inner: RwLock<QueueInner>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, QueueInner>> {
        self.inner.read().map_err(|_| lock_error().into())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, QueueInner>> {
        self.inner.write().map_err(|_| lock_error().into())
    }

    /// Add a player to the queue. A player searches for one game at a time.
    pub fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        let mut inner = self.write()?;
        if inner.entries.iter().any(|e| e.player_id == entry.player_id) {
            return Err(ArcadeError::AlreadyQueued {
                player_id: entry.player_id,
            }
            .into());
        }
        inner.entries.push(entry);
        Ok(())
    }

    /// Remove and return a player's entry
    pub fn take(&self, player_id: &str) -> Result<Option<QueueEntry>> {
        let mut inner = self.write()?;
        let pos = inner.entries.iter().position(|e| e.player_id == player_id);
        Ok(pos.map(|i| inner.entries.remove(i)))
    }

    /// Put an entry back at the head of the line. Used when a pairing race
    /// is lost after the candidate was already removed.
    pub fn reinsert_front(&self, entry: QueueEntry) -> Result<()> {
        let mut inner = self.write()?;
        inner.entries.insert(0, entry);
        Ok(())
    }

    pub fn is_queued(&self, player_id: &str) -> Result<bool> {
        Ok(self.read()?.entries.iter().any(|e| e.player_id == player_id))
    }

    /// Drop entries queued before `cutoff` and return them. A live search
    /// task never lets its entry get this old, so anything removed here was
    /// orphaned by a dead task.
    pub fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<QueueEntry>> {
        let mut inner = self.write()?;
        let (stale, live) = inner
            .entries
            .drain(..)
            .partition(|e| e.queued_at < cutoff);
        inner.entries = live;
        Ok(stale)
    }

    /// Oldest queued opponent for the same game type whose rank score
    /// snapshot sits within `tolerance`, skipping pairs that played through
    /// the queue after `recent_cutoff`. Does not remove the entry.
    pub fn find_candidate(
        &self,
        player_id: &str,
        game_type: GameType,
        rank_score: f64,
        tolerance: f64,
        recent_cutoff: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>> {
        let inner = self.read()?;
        Ok(inner
            .entries
            .iter()
            .find(|e| {
                e.player_id != player_id
                    && e.game_type == game_type
                    && ratings_within_tolerance(e.rank_score, rank_score, tolerance)
                    && !Self::recently_paired(
                        &inner.recent,
                        player_id,
                        &e.player_id,
                        game_type,
                        recent_cutoff,
                    )
            })
            .cloned())
    }

    /// Record a queue pairing and drop ledger entries older than `prune_cutoff`
    pub fn record_pairing(
        &self,
        player_a: &str,
        player_b: &str,
        game_type: GameType,
        now: DateTime<Utc>,
        prune_cutoff: DateTime<Utc>,
    ) -> Result<()> {
        let (a, b) = pair_key(player_a, player_b);
        let mut inner = self.write()?;
        inner.recent.retain(|r| r.matched_at >= prune_cutoff);
        inner.recent.push(RecentOpponentRecord {
            player_a: a,
            player_b: b,
            game_type,
            matched_at: now,
        });
        Ok(())
    }

    pub fn was_recent_pair(
        &self,
        player_a: &str,
        player_b: &str,
        game_type: GameType,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        let inner = self.read()?;
        Ok(Self::recently_paired(
            &inner.recent,
            player_a,
            player_b,
            game_type,
            cutoff,
        ))
    }

    fn recently_paired(
        recent: &[RecentOpponentRecord],
        player_a: &str,
        player_b: &str,
        game_type: GameType,
        cutoff: DateTime<Utc>,
    ) -> bool {
        let key = pair_key(player_a, player_b);
        recent.iter().any(|r| {
            r.game_type == game_type
                && r.matched_at >= cutoff
                && (r.player_a.clone(), r.player_b.clone()) == key
        })
    }

    pub fn len(&self, game_type: GameType) -> Result<usize> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| e.game_type == game_type)
            .count())
    }

    pub fn total_len(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }
}

fn lock_error() -> ArcadeError {
    ArcadeError::InternalError {
        message: "Failed to acquire queue lock".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn entry(player_id: &str, game_type: GameType, rank_score: f64) -> QueueEntry {
        QueueEntry {
            player_id: player_id.to_string(),
            game_type,
            contact: "ch1".to_string(),
            rank_score,
            queued_at: current_timestamp(),
        }
    }

    fn far_past() -> DateTime<Utc> {
        current_timestamp() - Duration::hours(24)
    }

    #[test]
    fn test_enqueue_rejects_double_entry() {
        let queue = MatchQueue::new();
        queue.enqueue(entry("alice", GameType::TicTacToe, 1000.0)).unwrap();

        // Even for a different game type
        let err = queue
            .enqueue(entry("alice", GameType::ConnectFour, 1000.0))
            .unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::AlreadyQueued { .. })
        ));
    }

    #[test]
    fn test_fifo_candidate_order() {
        let queue = MatchQueue::new();
        queue.enqueue(entry("first", GameType::TicTacToe, 1000.0)).unwrap();
        queue.enqueue(entry("second", GameType::TicTacToe, 1000.0)).unwrap();

        let candidate = queue
            .find_candidate("searcher", GameType::TicTacToe, 1000.0, 100.0, far_past())
            .unwrap()
            .unwrap();
        assert_eq!(candidate.player_id, "first");
    }

    #[test]
    fn test_tolerance_filters_candidates() {
        let queue = MatchQueue::new();
        queue.enqueue(entry("strong", GameType::TicTacToe, 1400.0)).unwrap();

        let tight = queue
            .find_candidate("searcher", GameType::TicTacToe, 1000.0, 100.0, far_past())
            .unwrap();
        assert!(tight.is_none());

        let relaxed = queue
            .find_candidate("searcher", GameType::TicTacToe, 1000.0, 500.0, far_past())
            .unwrap();
        assert_eq!(relaxed.unwrap().player_id, "strong");
    }

    #[test]
    fn test_candidate_must_match_game_type() {
        let queue = MatchQueue::new();
        queue.enqueue(entry("bob", GameType::ConnectFour, 1000.0)).unwrap();

        let candidate = queue
            .find_candidate("alice", GameType::TicTacToe, 1000.0, 10_000.0, far_past())
            .unwrap();
        assert!(candidate.is_none());
    }

    #[test]
    fn test_recent_pair_excluded_until_cutoff() {
        let queue = MatchQueue::new();
        let now = current_timestamp();
        queue
            .record_pairing("alice", "bob", GameType::TicTacToe, now, far_past())
            .unwrap();
        queue.enqueue(entry("bob", GameType::TicTacToe, 1000.0)).unwrap();

        let cooldown_cutoff = now - Duration::minutes(5);
        let candidate = queue
            .find_candidate("alice", GameType::TicTacToe, 1000.0, 100.0, cooldown_cutoff)
            .unwrap();
        assert!(candidate.is_none());

        // After the cooldown the pair is matchable again
        let later_cutoff = now + Duration::minutes(6);
        let candidate = queue
            .find_candidate("alice", GameType::TicTacToe, 1000.0, 100.0, later_cutoff)
            .unwrap();
        assert!(candidate.is_some());
    }

    #[test]
    fn test_recent_pair_is_order_and_game_scoped() {
        let queue = MatchQueue::new();
        let now = current_timestamp();
        queue
            .record_pairing("alice", "bob", GameType::TicTacToe, now, far_past())
            .unwrap();

        let cutoff = now - Duration::minutes(5);
        assert!(queue
            .was_recent_pair("bob", "alice", GameType::TicTacToe, cutoff)
            .unwrap());
        assert!(!queue
            .was_recent_pair("alice", "bob", GameType::ConnectFour, cutoff)
            .unwrap());
    }

    #[test]
    fn test_take_and_reinsert() {
        let queue = MatchQueue::new();
        queue.enqueue(entry("alice", GameType::TicTacToe, 1000.0)).unwrap();
        queue.enqueue(entry("bob", GameType::TicTacToe, 1000.0)).unwrap();

        let taken = queue.take("alice").unwrap().unwrap();
        assert!(!queue.is_queued("alice").unwrap());
        assert!(queue.take("ghost").unwrap().is_none());

        queue.reinsert_front(taken).unwrap();
        let candidate = queue
            .find_candidate("searcher", GameType::TicTacToe, 1000.0, 100.0, far_past())
            .unwrap()
            .unwrap();
        assert_eq!(candidate.player_id, "alice");
    }

    #[test]
    fn test_sweep_expired_drops_only_old_entries() {
        let queue = MatchQueue::new();
        let mut old = entry("old", GameType::TicTacToe, 1000.0);
        old.queued_at = current_timestamp() - Duration::minutes(10);
        queue.enqueue(old).unwrap();
        queue.enqueue(entry("fresh", GameType::TicTacToe, 1000.0)).unwrap();

        let cutoff = current_timestamp() - Duration::minutes(5);
        let stale = queue.sweep_expired(cutoff).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].player_id, "old");
        assert!(!queue.is_queued("old").unwrap());
        assert!(queue.is_queued("fresh").unwrap());
    }

    #[test]
    fn test_lengths() {
        let queue = MatchQueue::new();
        queue.enqueue(entry("a", GameType::TicTacToe, 1000.0)).unwrap();
        queue.enqueue(entry("b", GameType::ConnectFour, 1000.0)).unwrap();

        assert_eq!(queue.len(GameType::TicTacToe).unwrap(), 1);
        assert_eq!(queue.total_len().unwrap(), 2);
    }
}
