//! Per-player match polling
//!
//! Each searching player gets a background task that rescans the queue on
//! a fixed cadence. The tolerance widens with the attempt count; after
//! enough empty scans a bot-capable game falls back to the house bot, and
//! eventually the search gives up.
//!
//! Pairing is a two-step removal: the candidate's entry comes out of the
//! queue first, then the searcher's own. If the searcher's entry is gone
//! by then, another poller already claimed them; the candidate goes back
//! to the head of the queue and this search stops.

use crate::amqp::publisher::EventPublisher;
use crate::config::MatchmakingSettings;
use crate::error::{ArcadeError, Result};
use crate::matchmaking::queue::MatchQueue;
use crate::metrics::MetricsCollector;
use crate::session::SessionManager;
use crate::store::Store;
use crate::types::{
    GameStat, GameType, Pairing, PairingOrigin, PlayerId, QueueEntry, QueueStatus, QueueUpdate,
    BOT_PLAYER_ID,
};
use crate::utils::current_timestamp;
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Drives queue searches for all players
pub struct MatchPoller {
    queue: Arc<MatchQueue>,
    store: Arc<dyn Store>,
    sessions: Arc<SessionManager>,
    publisher: Arc<dyn EventPublisher>,
    settings: MatchmakingSettings,
    tasks: std::sync::Mutex<HashMap<PlayerId, JoinHandle<()>>>,
    metrics: Arc<MetricsCollector>,
}

impl MatchPoller {
    pub fn new(
        queue: Arc<MatchQueue>,
        store: Arc<dyn Store>,
        sessions: Arc<SessionManager>,
        publisher: Arc<dyn EventPublisher>,
        settings: MatchmakingSettings,
    ) -> Self {
        // Create a default metrics collector if none provided
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(queue, store, sessions, publisher, settings, metrics)
    }

    pub fn with_metrics(
        queue: Arc<MatchQueue>,
        store: Arc<dyn Store>,
        sessions: Arc<SessionManager>,
        publisher: Arc<dyn EventPublisher>,
        settings: MatchmakingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queue,
            store,
            sessions,
            publisher,
            settings,
            tasks: std::sync::Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Enqueue a player and spawn their search task
    pub async fn start_search(
        self: &Arc<Self>,
        player_id: &str,
        display_name: &str,
        game_type: GameType,
        contact: &str,
    ) -> Result<()> {
        let player = self.store.ensure_player(player_id, display_name)?;

        let now = current_timestamp();
        if player.is_queue_locked(now) {
            return Err(ArcadeError::QueueLocked {
                player_id: player_id.to_string(),
                until: player.queue_locked_until.unwrap_or(now),
            }
            .into());
        }
        if self.sessions.session_for_player(player_id).is_some() {
            return Err(ArcadeError::AlreadyInSession {
                player_id: player_id.to_string(),
            }
            .into());
        }

        let rank_score = self
            .store
            .get_stat(player_id, game_type)?
            .map(|s| s.rank_score)
            .unwrap_or_else(|| GameStat::new(player_id.to_string(), game_type).rank_score);

        let entry = QueueEntry {
            player_id: player_id.to_string(),
            game_type,
            contact: contact.to_string(),
            rank_score,
            queued_at: now,
        };
        self.queue.enqueue(entry.clone())?;
        self.metrics.record_search_started(game_type);

        info!(
            player_id = %player_id,
            game_type = %game_type,
            rank_score,
            "Search started"
        );
        self.publisher
            .publish_queue_update(QueueUpdate {
                player_id: player_id.to_string(),
                game_type,
                status: QueueStatus::Searching,
                timestamp: now,
            })
            .await?;

        let poller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            poller.run_search(entry).await;
        });
        self.register_task(player_id, handle);

        Ok(())
    }

    /// Cancel a player's search. Returns whether an entry was removed.
    pub async fn cancel_search(&self, player_id: &str) -> Result<bool> {
        let removed = self.queue.take(player_id)?;
        self.abort_task(player_id);

        match removed {
            Some(entry) => {
                info!(player_id = %player_id, "Search cancelled");
                self.metrics.record_search_resolved(
                    entry.game_type,
                    "cancelled",
                    waited_since(entry.queued_at),
                    0,
                );
                self.publisher
                    .publish_queue_update(QueueUpdate {
                        player_id: player_id.to_string(),
                        game_type: entry.game_type,
                        status: QueueStatus::Cancelled,
                        timestamp: current_timestamp(),
                    })
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// One full search: widen, fall back, give up
    async fn run_search(self: Arc<Self>, entry: QueueEntry) {
        let player_id = entry.player_id.clone();
        let interval = std::time::Duration::from_secs(self.settings.poll_interval_seconds);

        for attempt in 1..=self.settings.max_attempts {
            tokio::time::sleep(interval).await;

            // Matched through a challenge or by another poller in the meantime
            if self.sessions.session_for_player(&player_id).is_some() {
                // A race-restored entry may still sit in the queue. When we
                // take it here nobody else resolved this search yet.
                if let Ok(Some(left)) = self.queue.take(&player_id) {
                    self.metrics.record_search_resolved(
                        left.game_type,
                        "matched",
                        waited_since(left.queued_at),
                        attempt,
                    );
                }
                self.clear_task(&player_id);
                return;
            }
            if !self.queue.is_queued(&player_id).unwrap_or(false) {
                self.clear_task(&player_id);
                return;
            }

            let tolerance = self.tolerance_for_attempt(attempt);
            debug!(player_id = %player_id, attempt, tolerance, "Scanning queue");

            match self.try_pair(&entry, tolerance, attempt).await {
                Ok(true) => {
                    self.clear_task(&player_id);
                    return;
                }
                Ok(false) => {}
                Err(e)
                    if matches!(
                        crate::error::as_arcade_error(&e),
                        Some(ArcadeError::RaceLost { .. })
                    ) =>
                {
                    debug!(player_id = %player_id, "Claim race lost; still searching");
                }
                Err(e) => {
                    warn!(player_id = %player_id, error = %e, "Queue scan failed");
                }
            }

            if attempt >= self.settings.bot_fallback_attempt
                && self.settings.enable_bot_fallback
                && entry.game_type.supports_bot()
            {
                if let Err(e) = self.pair_with_bot(&entry, attempt).await {
                    warn!(player_id = %player_id, error = %e, "Bot fallback failed");
                }
                self.clear_task(&player_id);
                return;
            }
        }

        // Exhausted every attempt
        if let Ok(Some(left)) = self.queue.take(&player_id) {
            info!(player_id = %player_id, "Search gave up with no opponent");
            self.metrics.record_search_resolved(
                left.game_type,
                "no_opponent",
                waited_since(left.queued_at),
                self.settings.max_attempts,
            );
            let _ = self
                .publisher
                .publish_queue_update(QueueUpdate {
                    player_id: player_id.clone(),
                    game_type: entry.game_type,
                    status: QueueStatus::NoOpponent,
                    timestamp: current_timestamp(),
                })
                .await;
        }
        self.clear_task(&player_id);
    }

    /// Scan for a candidate and pair with the first viable one.
    /// Returns true when this search is over (matched or raced out).
    async fn try_pair(
        self: &Arc<Self>,
        entry: &QueueEntry,
        tolerance: f64,
        attempt: u32,
    ) -> Result<bool> {
        let now = current_timestamp();
        let cooldown_cutoff =
            now - ChronoDuration::seconds(self.settings.recent_opponent_cooldown_seconds as i64);

        loop {
            let candidate = match self.queue.find_candidate(
                &entry.player_id,
                entry.game_type,
                entry.rank_score,
                tolerance,
                cooldown_cutoff,
            )? {
                Some(c) => c,
                None => return Ok(false),
            };

            // Candidate first; a concurrent poller may have taken them
            let candidate = match self.queue.take(&candidate.player_id)? {
                Some(c) => c,
                None => continue,
            };

            // Stale entry: the candidate already plays elsewhere. Drop the
            // entry and keep scanning.
            if self
                .sessions
                .session_for_player(&candidate.player_id)
                .is_some()
            {
                debug!(
                    candidate = %candidate.player_id,
                    "Dropped stale queue entry"
                );
                self.metrics.record_search_resolved(
                    candidate.game_type,
                    "expired",
                    waited_since(candidate.queued_at),
                    0,
                );
                self.publisher
                    .publish_queue_update(QueueUpdate {
                        player_id: candidate.player_id.clone(),
                        game_type: candidate.game_type,
                        status: QueueStatus::Expired,
                        timestamp: now,
                    })
                    .await?;
                continue;
            }

            // Now our own entry; if it is gone, another scan claimed us
            if self.queue.take(&entry.player_id)?.is_none() {
                self.queue.reinsert_front(candidate)?;

                if self.sessions.session_for_player(&entry.player_id).is_some() {
                    debug!(player_id = %entry.player_id, "Pairing race lost");
                    return Ok(true);
                }

                // Symmetric claim race: both scans took the other's entry
                // first and neither built a session. Restore our entry and
                // keep searching.
                match self.queue.enqueue(entry.clone()) {
                    Ok(()) => {}
                    // The other scan restored us already
                    Err(e)
                        if matches!(
                            crate::error::as_arcade_error(&e),
                            Some(ArcadeError::AlreadyQueued { .. })
                        ) => {}
                    Err(e) => return Err(e),
                }
                return Err(ArcadeError::RaceLost {
                    player_id: entry.player_id.clone(),
                }
                .into());
            }

            return self
                .complete_pairing(entry, candidate, attempt)
                .await
                .map(|_| true);
        }
    }

    async fn complete_pairing(
        self: &Arc<Self>,
        entry: &QueueEntry,
        candidate: QueueEntry,
        attempt: u32,
    ) -> Result<()> {
        let now = current_timestamp();
        let prune_cutoff =
            now - ChronoDuration::seconds(self.settings.recent_opponent_cooldown_seconds as i64);
        self.queue.record_pairing(
            &entry.player_id,
            &candidate.player_id,
            entry.game_type,
            now,
            prune_cutoff,
        )?;

        // The candidate waited longer, so they move first
        let pairing = Pairing {
            game_type: entry.game_type,
            initiator: candidate.player_id.clone(),
            initiator_contact: candidate.contact.clone(),
            opponent: Some(entry.player_id.clone()),
            opponent_contact: Some(entry.contact.clone()),
            rated: entry.game_type.is_rated(),
            origin: PairingOrigin::Queue,
        };

        info!(
            player1 = %candidate.player_id,
            player2 = %entry.player_id,
            game_type = %entry.game_type,
            "Queue pair formed"
        );

        // Stop the candidate's own poller before it scans again
        self.abort_task(&candidate.player_id);

        self.sessions.create_session(pairing).await?;

        self.metrics.record_search_resolved(
            entry.game_type,
            "matched",
            waited_since(entry.queued_at),
            attempt,
        );
        // The candidate was claimed by this scan, not one of their own
        self.metrics.record_search_resolved(
            candidate.game_type,
            "matched",
            waited_since(candidate.queued_at),
            0,
        );

        for (player, game_type) in [
            (&candidate.player_id, candidate.game_type),
            (&entry.player_id, entry.game_type),
        ] {
            self.publisher
                .publish_queue_update(QueueUpdate {
                    player_id: player.clone(),
                    game_type,
                    status: QueueStatus::Matched,
                    timestamp: now,
                })
                .await?;
        }

        Ok(())
    }

    /// Unranked match against the house bot
    async fn pair_with_bot(self: &Arc<Self>, entry: &QueueEntry, attempt: u32) -> Result<()> {
        if self.queue.take(&entry.player_id)?.is_none() {
            return Ok(());
        }

        info!(
            player_id = %entry.player_id,
            game_type = %entry.game_type,
            "Falling back to the house bot"
        );
        self.metrics.record_search_resolved(
            entry.game_type,
            "bot_fallback",
            waited_since(entry.queued_at),
            attempt,
        );

        let pairing = Pairing {
            game_type: entry.game_type,
            initiator: entry.player_id.clone(),
            initiator_contact: entry.contact.clone(),
            opponent: Some(BOT_PLAYER_ID.to_string()),
            opponent_contact: Some(entry.contact.clone()),
            rated: false,
            origin: PairingOrigin::BotFallback,
        };
        self.sessions.create_session(pairing).await?;

        self.publisher
            .publish_queue_update(QueueUpdate {
                player_id: entry.player_id.clone(),
                game_type: entry.game_type,
                status: QueueStatus::Matched,
                timestamp: current_timestamp(),
            })
            .await?;

        Ok(())
    }

    fn tolerance_for_attempt(&self, attempt: u32) -> f64 {
        if attempt <= 3 {
            self.settings.tolerance_tight
        } else if attempt <= 6 {
            self.settings.tolerance_relaxed
        } else {
            self.settings.tolerance_open
        }
    }

    fn register_task(&self, player_id: &str, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(old) = tasks.insert(player_id.to_string(), handle) {
                old.abort();
            }
        }
    }

    fn abort_task(&self, player_id: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(handle) = tasks.remove(player_id) {
                handle.abort();
            }
        }
    }

    fn clear_task(&self, player_id: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.remove(player_id);
        }
    }

    /// Number of live search tasks (for monitoring)
    pub fn active_searches(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }
}

/// Time a queue entry has spent waiting
fn waited_since(queued_at: chrono::DateTime<chrono::Utc>) -> std::time::Duration {
    (current_timestamp() - queued_at).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::config::{ChallengeSettings, RatingSettings, SessionSettings};
    use crate::game::GameRegistry;
    use crate::rating::RatingEngine;
    use crate::store::InMemoryStore;

    fn poller(
        settings: MatchmakingSettings,
    ) -> (Arc<MatchPoller>, Arc<InMemoryStore>, Arc<MockEventPublisher>, Arc<SessionManager>) {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(MockEventPublisher::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(GameRegistry::with_defaults()),
            store.clone(),
            RatingEngine::new(store.clone(), RatingSettings::default()),
            publisher.clone(),
            SessionSettings::default(),
            ChallengeSettings::default(),
        ));
        let queue = Arc::new(MatchQueue::new());
        let poller = Arc::new(MatchPoller::new(
            queue,
            store.clone(),
            sessions.clone(),
            publisher.clone(),
            settings,
        ));
        (poller, store, publisher, sessions)
    }

    fn fast_settings() -> MatchmakingSettings {
        MatchmakingSettings {
            poll_interval_seconds: 1,
            ..MatchmakingSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_players_pair_within_tight_tolerance() {
        let (poller, _, _, sessions) = poller(fast_settings());

        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();
        poller
            .start_search("bob", "Bob", GameType::TicTacToe, "ch2")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        let session = sessions.session_for_player("alice").unwrap();
        assert!(session.involves("bob"));
        assert!(session.rated);
        // Alice queued first, so she moves first
        assert_eq!(session.player1_id, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wide_gap_pairs_only_after_tolerance_relaxes() {
        let (poller, store, _, sessions) = poller(fast_settings());

        // 1000 vs 1200: outside 100, inside 500
        store
            .update_stat("bob", GameType::TicTacToe, Box::new(|s| {
                s.rating = 1200;
                s.recompute_rank_score();
            }))
            .unwrap();

        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();
        poller
            .start_search("bob", "Bob", GameType::TicTacToe, "ch2")
            .await
            .unwrap();

        // Attempts 1-3 are tight and must not pair
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(sessions.session_for_player("alice").is_none());

        // Attempt 4 relaxes to 500
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert!(sessions.session_for_player("alice").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_fallback_for_bot_capable_game() {
        let (poller, _, _, sessions) = poller(MatchmakingSettings {
            poll_interval_seconds: 1,
            bot_fallback_attempt: 2,
            ..MatchmakingSettings::default()
        });

        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(4)).await;

        let session = sessions.session_for_player("alice").unwrap();
        assert_eq!(session.player2_id.as_deref(), Some(BOT_PLAYER_ID));
        assert!(!session.rated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_bot_fallback_for_wordduel() {
        let (poller, _, publisher, sessions) = poller(MatchmakingSettings {
            poll_interval_seconds: 1,
            bot_fallback_attempt: 2,
            max_attempts: 3,
            ..MatchmakingSettings::default()
        });

        poller
            .start_search("alice", "Alice", GameType::WordDuel, "ch1")
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(6)).await;

        assert!(sessions.session_for_player("alice").is_none());
        let events = publisher.get_published_events();
        let gave_up = events.iter().any(|e| {
            matches!(e, crate::types::ArcadeEvent::QueueUpdate(u)
                if u.status == QueueStatus::NoOpponent && u.player_id == "alice")
        });
        assert!(gave_up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_the_search() {
        let (poller, _, publisher, _) = poller(fast_settings());

        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();
        assert!(poller.cancel_search("alice").await.unwrap());
        assert!(!poller.cancel_search("alice").await.unwrap());

        let events = publisher.get_published_events();
        let cancelled = events.iter().any(|e| {
            matches!(e, crate::types::ArcadeEvent::QueueUpdate(u)
                if u.status == QueueStatus::Cancelled)
        });
        assert!(cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_locked_player_cannot_search() {
        let (poller, store, _, _) = poller(fast_settings());
        store
            .update_player("alice", Box::new(|p| {
                p.queue_locked_until =
                    Some(current_timestamp() + ChronoDuration::minutes(5));
            }))
            .unwrap();

        let err = poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::QueueLocked { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_search_rejected() {
        let (poller, _, _, _) = poller(fast_settings());
        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();

        let err = poller
            .start_search("alice", "Alice", GameType::ConnectFour, "ch1")
            .await
            .unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::AlreadyQueued { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_candidate_is_dropped_and_search_continues() {
        let (poller, _, publisher, sessions) = poller(fast_settings());

        // Bob is queued but already ended up in a session (stale entry)
        poller
            .start_search("bob", "Bob", GameType::TicTacToe, "ch2")
            .await
            .unwrap();
        poller.abort_task("bob");
        sessions
            .create_session(Pairing {
                game_type: GameType::TicTacToe,
                initiator: "bob".to_string(),
                initiator_contact: "ch2".to_string(),
                opponent: Some("carol".to_string()),
                opponent_contact: Some("ch3".to_string()),
                rated: true,
                origin: PairingOrigin::Challenge,
            })
            .await
            .unwrap();

        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        // Alice is still searching; bob's stale entry was expired out
        assert!(sessions.session_for_player("alice").is_none());
        assert!(poller.queue.is_queued("alice").unwrap());
        assert!(!poller.queue.is_queued("bob").unwrap());

        let events = publisher.get_published_events();
        let expired = events.iter().any(|e| {
            matches!(e, crate::types::ArcadeEvent::QueueUpdate(u)
                if u.status == QueueStatus::Expired && u.player_id == "bob")
        });
        assert!(expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_symmetric_claim_race_restores_both_and_pairs_next_scan() {
        let (poller, _, _, sessions) = poller(fast_settings());

        let entry_for = |player_id: &str, contact: &str| QueueEntry {
            player_id: player_id.to_string(),
            game_type: GameType::TicTacToe,
            contact: contact.to_string(),
            rank_score: 1000.0,
            queued_at: current_timestamp(),
        };

        // Bob is queued; alice's own entry was already claimed by a
        // concurrent scan that never got as far as building a session
        poller.queue.enqueue(entry_for("bob", "ch2")).unwrap();
        let alice = entry_for("alice", "ch1");

        let err = poller.try_pair(&alice, 100.0, 1).await.unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::RaceLost { .. })
        ));

        // Nobody is stranded: both entries are back in the queue
        assert!(poller.queue.is_queued("alice").unwrap());
        assert!(poller.queue.is_queued("bob").unwrap());
        assert!(sessions.session_for_player("alice").is_none());

        // The next scan completes the pairing
        assert!(poller.try_pair(&alice, 100.0, 2).await.unwrap());
        let session = sessions.session_for_player("alice").unwrap();
        assert!(session.involves("bob"));
        assert!(!poller.queue.is_queued("alice").unwrap());
        assert!(!poller.queue.is_queued("bob").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_lifecycle_moves_queue_counters() {
        let (base, store, publisher, sessions) = poller(fast_settings());
        let collector =
            Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
        let poller = Arc::new(MatchPoller::with_metrics(
            base.queue.clone(),
            store,
            sessions,
            publisher,
            fast_settings(),
            collector.clone(),
        ));

        poller
            .start_search("alice", "Alice", GameType::TicTacToe, "ch1")
            .await
            .unwrap();
        let queue_metrics = collector.queue();
        assert_eq!(
            queue_metrics
                .searches_started_total
                .with_label_values(&["tictactoe"])
                .get(),
            1
        );
        assert_eq!(
            queue_metrics
                .players_waiting
                .with_label_values(&["tictactoe"])
                .get(),
            1
        );

        assert!(poller.cancel_search("alice").await.unwrap());
        assert_eq!(
            queue_metrics
                .searches_resolved_total
                .with_label_values(&["tictactoe", "cancelled"])
                .get(),
            1
        );
        assert_eq!(
            queue_metrics
                .players_waiting
                .with_label_values(&["tictactoe"])
                .get(),
            0
        );

        // A completed pairing resolves both sides as matched
        poller
            .start_search("bob", "Bob", GameType::TicTacToe, "ch2")
            .await
            .unwrap();
        poller
            .start_search("carol", "Carol", GameType::TicTacToe, "ch3")
            .await
            .unwrap();
        poller.abort_task("bob");
        poller.abort_task("carol");

        let carol = QueueEntry {
            player_id: "carol".to_string(),
            game_type: GameType::TicTacToe,
            contact: "ch3".to_string(),
            rank_score: 100.0,
            queued_at: current_timestamp(),
        };
        assert!(poller.try_pair(&carol, 1000.0, 2).await.unwrap());

        assert_eq!(
            queue_metrics
                .searches_resolved_total
                .with_label_values(&["tictactoe", "matched"])
                .get(),
            2
        );
        assert_eq!(
            queue_metrics
                .players_waiting
                .with_label_values(&["tictactoe"])
                .get(),
            0
        );
    }
}
