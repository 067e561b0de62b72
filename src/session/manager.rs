//! Session manager
//!
//! Invariants enforced here:
//! - a player is in at most one live session at a time
//! - moves for one session apply strictly one at a time
//! - an inactivity timer armed against an older move_seq never fires

use crate::amqp::publisher::EventPublisher;
use crate::config::{ChallengeSettings, SessionSettings};
use crate::error::{ArcadeError, Result};
use crate::game::{GameRegistry, MoveOutcome, TerminalStatus, TimeoutPolicy};
use crate::metrics::MetricsCollector;
use crate::rating::RatingEngine;
use crate::store::Store;
use crate::types::{
    is_bot, MatchOutcome, MoveApplied, OutcomeReason, Pairing, PlayerId, RatingSummary, Session,
    SessionCreated, SessionEnded, SessionId, BOT_PLAYER_ID,
};
use crate::utils::{current_timestamp, generate_session_id};
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Manages all live sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
    by_player: RwLock<HashMap<PlayerId, SessionId>>,
    /// Per-session move serialization
    move_locks: std::sync::Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
    registry: Arc<GameRegistry>,
    store: Arc<dyn Store>,
    rating: RatingEngine,
    publisher: Arc<dyn EventPublisher>,
    settings: SessionSettings,
    forfeit_rules: ChallengeSettings,
    metrics: Arc<MetricsCollector>,
}

impl SessionManager {
    pub fn new(
        registry: Arc<GameRegistry>,
        store: Arc<dyn Store>,
        rating: RatingEngine,
        publisher: Arc<dyn EventPublisher>,
        settings: SessionSettings,
        forfeit_rules: ChallengeSettings,
    ) -> Self {
        // Create a default metrics collector if none provided
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(
            registry,
            store,
            rating,
            publisher,
            settings,
            forfeit_rules,
            metrics,
        )
    }

    pub fn with_metrics(
        registry: Arc<GameRegistry>,
        store: Arc<dyn Store>,
        rating: RatingEngine,
        publisher: Arc<dyn EventPublisher>,
        settings: SessionSettings,
        forfeit_rules: ChallengeSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_player: RwLock::new(HashMap::new()),
            move_locks: std::sync::Mutex::new(HashMap::new()),
            registry,
            store,
            rating,
            publisher,
            settings,
            forfeit_rules,
            metrics,
        }
    }

    /// The live session a player is in, if any
    pub fn session_for_player(&self, player_id: &str) -> Option<Session> {
        let by_player = self.by_player.read().ok()?;
        let session_id = by_player.get(player_id)?;
        self.sessions.read().ok()?.get(session_id).cloned()
    }

    pub fn get_session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.read().ok()?.get(session_id).cloned()
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Create a session from a resolved pairing. Fails with
    /// `AlreadyInSession` if any human participant is already playing.
    pub async fn create_session(self: &Arc<Self>, pairing: Pairing) -> Result<Session> {
        let engine = self.registry.get(pairing.game_type)?;

        let mut players: Vec<PlayerId> = vec![pairing.initiator.clone()];
        if let Some(opponent) = &pairing.opponent {
            players.push(opponent.clone());
        }

        let initial = engine.create_state(&players)?;

        let session = Session {
            id: generate_session_id(),
            game_type: pairing.game_type,
            player1_id: pairing.initiator.clone(),
            player2_id: pairing.opponent.clone(),
            player1_contact: pairing.initiator_contact.clone(),
            player2_contact: pairing.opponent_contact.clone(),
            current_turn: initial.first_turn.clone(),
            state: initial.state,
            rated: pairing.rated,
            move_seq: 0,
            last_action: current_timestamp(),
            started_at: current_timestamp(),
        };

        // Insert under both locks together so the one-session-per-player
        // check and the insert are a single atomic step
        {
            let mut sessions = self.sessions.write().map_err(|_| lock_error())?;
            let mut by_player = self.by_player.write().map_err(|_| lock_error())?;

            for player in players.iter().filter(|p| !is_bot(p)) {
                if by_player.contains_key(player.as_str()) {
                    return Err(ArcadeError::AlreadyInSession {
                        player_id: player.clone(),
                    }
                    .into());
                }
            }

            for player in players.iter().filter(|p| !is_bot(p)) {
                by_player.insert(player.clone(), session.id);
            }
            sessions.insert(session.id, session.clone());
        }

        info!(
            session_id = %session.id,
            game_type = %session.game_type,
            player1 = %session.player1_id,
            player2 = ?session.player2_id,
            rated = session.rated,
            origin = ?pairing.origin,
            "Session created"
        );
        self.metrics
            .record_session_created(session.game_type, session.rated);

        self.publisher
            .publish_session_created(SessionCreated {
                session_id: session.id,
                game_type: session.game_type,
                player1_id: session.player1_id.clone(),
                player2_id: session.player2_id.clone(),
                first_turn: session.current_turn.clone(),
                rated: session.rated,
                origin: pairing.origin,
                timestamp: current_timestamp(),
            })
            .await?;

        self.arm_timer(session.id, session.move_seq);
        Ok(session)
    }

    /// Apply one move for a player. Returns the session after the move,
    /// or `None` when the move ended it.
    pub async fn submit_move(
        self: &Arc<Self>,
        player_id: &str,
        input: &str,
    ) -> Result<Option<Session>> {
        let session_id = self
            .by_player
            .read()
            .map_err(|_| lock_error())?
            .get(player_id)
            .copied()
            .ok_or_else(|| ArcadeError::SessionNotFound {
                reference: player_id.to_string(),
            })?;

        let move_lock = self.move_lock(session_id)?;
        let _guard = move_lock.lock().await;

        // Re-read under the move lock; the session may have ended while
        // we waited
        let session = self
            .get_session(&session_id)
            .ok_or_else(|| ArcadeError::SessionNotFound {
                reference: player_id.to_string(),
            })?;

        if session.current_turn.as_deref() != Some(player_id) {
            return Err(ArcadeError::NotYourTurn {
                player_id: player_id.to_string(),
            }
            .into());
        }

        let engine = self.registry.get(session.game_type)?;
        let result = engine.apply_move(&session.state, player_id, input)?;

        if let MoveOutcome::Illegal(reason) = result.outcome {
            return Err(ArcadeError::IllegalMove { reason }.into());
        }

        let updated =
            self.commit_move(session_id, result.state, result.next_turn, player_id)
                .await?;

        if let Some(ended) = self.settle_if_terminal(&updated).await? {
            return Ok(ended);
        }

        // House bot answers immediately when it is on turn
        if updated.current_turn.as_deref() == Some(BOT_PLAYER_ID) {
            return self.play_bot_turns(session_id).await;
        }

        self.arm_timer(session_id, updated.move_seq);
        Ok(Some(updated))
    }

    /// End a session because a player gave up. Pvp sessions count as a
    /// forfeit loss; solo sessions are simply discarded.
    pub async fn forfeit(self: &Arc<Self>, player_id: &str) -> Result<MatchOutcome> {
        let session =
            self.session_for_player(player_id)
                .ok_or_else(|| ArcadeError::SessionNotFound {
                    reference: player_id.to_string(),
                })?;

        let move_lock = self.move_lock(session.id)?;
        let _guard = move_lock.lock().await;

        // Re-check: the session may have finished while we waited
        let session =
            self.get_session(&session.id)
                .ok_or_else(|| ArcadeError::SessionNotFound {
                    reference: player_id.to_string(),
                })?;

        let outcome = match session.opponent_of(player_id) {
            Some(opponent) => {
                self.record_forfeit(player_id)?;
                self.metrics.record_forfeit();
                MatchOutcome::Decisive {
                    winner: opponent.clone(),
                    loser: player_id.to_string(),
                    reason: OutcomeReason::Forfeit,
                }
            }
            None => MatchOutcome::Abandoned {
                player: player_id.to_string(),
            },
        };

        self.finish(&session, outcome.clone()).await?;
        Ok(outcome)
    }

    /// Inactivity timer callback. A no-op when the session advanced (or
    /// ended) since the timer was armed.
    pub async fn handle_timeout(self: &Arc<Self>, session_id: SessionId, armed_seq: u64) {
        let move_lock = match self.move_lock(session_id) {
            Ok(lock) => lock,
            Err(_) => return,
        };
        let _guard = move_lock.lock().await;

        let session = match self.get_session(&session_id) {
            Some(s) if s.move_seq == armed_seq => s,
            _ => {
                debug!(session_id = %session_id, armed_seq, "Stale timer ignored");
                return;
            }
        };

        if let Err(e) = self.apply_timeout(&session).await {
            warn!(session_id = %session_id, error = %e, "Timeout handling failed");
        }
    }

    async fn apply_timeout(self: &Arc<Self>, session: &Session) -> Result<()> {
        let engine = self.registry.get(session.game_type)?;
        self.metrics.record_timeout(session.game_type);

        // Solo sessions are discarded on timeout, no stats either way
        if session.game_type.is_solo() {
            info!(session_id = %session.id, "Solo session timed out");
            return self
                .finish(
                    session,
                    MatchOutcome::Abandoned {
                        player: session.player1_id.clone(),
                    },
                )
                .await;
        }

        match engine.timeout_policy() {
            TimeoutPolicy::SkipRound => {
                info!(session_id = %session.id, "Round skipped after inactivity");
                let result = engine.skip_round(&session.state)?;
                let updated = self
                    .commit_move(session.id, result.state, result.next_turn, "")
                    .await?;

                if self.settle_if_terminal(&updated).await?.is_none() {
                    self.arm_timer(session.id, updated.move_seq);
                }
                Ok(())
            }
            TimeoutPolicy::ForfeitOnTurn => {
                let loser = match engine.current_turn(&session.state)? {
                    Some(p) => p,
                    None => session.player1_id.clone(),
                };
                let winner = session
                    .opponent_of(&loser)
                    .cloned()
                    .unwrap_or_else(|| session.player1_id.clone());

                info!(
                    session_id = %session.id,
                    loser = %loser,
                    "Session forfeited after inactivity"
                );
                self.finish(
                    session,
                    MatchOutcome::Decisive {
                        winner,
                        loser,
                        reason: OutcomeReason::Timeout,
                    },
                )
                .await
            }
        }
    }

    /// Sweep for sessions whose timer was lost. Run from a background task.
    pub async fn sweep_stale(self: &Arc<Self>) {
        let overdue = ChronoDuration::seconds(2 * self.settings.afk_timeout_seconds as i64);
        let now = current_timestamp();

        let stale: Vec<(SessionId, u64)> = match self.sessions.read() {
            Ok(sessions) => sessions
                .values()
                .filter(|s| now - s.last_action > overdue)
                .map(|s| (s.id, s.move_seq))
                .collect(),
            Err(_) => return,
        };

        for (session_id, seq) in stale {
            warn!(session_id = %session_id, "Sweeping overdue session");
            self.handle_timeout(session_id, seq).await;
        }
    }

    /// Spawn the periodic stale-session sweep
    pub fn start_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = std::time::Duration::from_secs(manager.settings.cleanup_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.sweep_stale().await;
            }
        })
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn move_lock(&self, session_id: SessionId) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self.move_locks.lock().map_err(|_| lock_error())?;
        Ok(locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Write an accepted state transition back and publish it
    async fn commit_move(
        &self,
        session_id: SessionId,
        state: serde_json::Value,
        next_turn: Option<PlayerId>,
        moved_by: &str,
    ) -> Result<Session> {
        let updated = {
            let mut sessions = self.sessions.write().map_err(|_| lock_error())?;
            let session =
                sessions
                    .get_mut(&session_id)
                    .ok_or_else(|| ArcadeError::SessionNotFound {
                        reference: session_id.to_string(),
                    })?;
            session.state = state;
            session.current_turn = next_turn;
            session.move_seq += 1;
            session.last_action = current_timestamp();
            session.clone()
        };

        if !moved_by.is_empty() {
            self.publisher
                .publish_move_applied(MoveApplied {
                    session_id,
                    game_type: updated.game_type,
                    by: moved_by.to_string(),
                    state: updated.state.clone(),
                    next_turn: updated.current_turn.clone(),
                    timestamp: current_timestamp(),
                })
                .await?;
        }

        Ok(updated)
    }

    /// Let the bot play until it is no longer on turn or the game ends
    async fn play_bot_turns(self: &Arc<Self>, session_id: SessionId) -> Result<Option<Session>> {
        let mut current = self
            .get_session(&session_id)
            .ok_or_else(|| ArcadeError::SessionNotFound {
                reference: session_id.to_string(),
            })?;

        while current.current_turn.as_deref() == Some(BOT_PLAYER_ID) {
            let engine = self.registry.get(current.game_type)?;

            // Naive bot: first legal slot wins
            let mut applied = None;
            for input in 0..9 {
                let result =
                    engine.apply_move(&current.state, BOT_PLAYER_ID, &input.to_string())?;
                if result.outcome == MoveOutcome::Accepted {
                    applied = Some(result);
                    break;
                }
            }

            let result = match applied {
                Some(r) => r,
                None => break,
            };

            current = self
                .commit_move(session_id, result.state, result.next_turn, BOT_PLAYER_ID)
                .await?;

            if let Some(ended) = self.settle_if_terminal(&current).await? {
                return Ok(ended);
            }
        }

        self.arm_timer(session_id, current.move_seq);
        Ok(Some(current))
    }

    /// Finish the session if its state is terminal. Returns `Some(None)`
    /// when it ended (no live session remains).
    async fn settle_if_terminal(
        self: &Arc<Self>,
        session: &Session,
    ) -> Result<Option<Option<Session>>> {
        let engine = self.registry.get(session.game_type)?;
        let outcome = match engine.terminal_status(&session.state)? {
            TerminalStatus::Ongoing => return Ok(None),
            TerminalStatus::Won(winner) => {
                if session.game_type.is_solo() {
                    MatchOutcome::Solo {
                        player: winner,
                        won: true,
                    }
                } else {
                    let loser = session
                        .opponent_of(&winner)
                        .cloned()
                        .unwrap_or_else(|| session.player1_id.clone());
                    MatchOutcome::Decisive {
                        winner,
                        loser,
                        reason: OutcomeReason::Played,
                    }
                }
            }
            TerminalStatus::Lost(player) => MatchOutcome::Solo {
                player,
                won: false,
            },
            TerminalStatus::Draw => MatchOutcome::Draw {
                players: session.participants().into_iter().cloned().collect(),
            },
        };

        self.finish(session, outcome).await?;
        Ok(Some(None))
    }

    /// Remove the session, settle ratings, and announce the end
    async fn finish(self: &Arc<Self>, session: &Session, outcome: MatchOutcome) -> Result<()> {
        {
            let mut sessions = self.sessions.write().map_err(|_| lock_error())?;
            let mut by_player = self.by_player.write().map_err(|_| lock_error())?;
            sessions.remove(&session.id);
            for player in session.participants() {
                by_player.remove(player.as_str());
            }
        }
        if let Ok(mut locks) = self.move_locks.lock() {
            locks.remove(&session.id);
        }

        let rating: Option<RatingSummary> = self.rating.apply_outcome(session, &outcome)?;

        let duration = (current_timestamp() - session.started_at)
            .to_std()
            .unwrap_or_default();
        self.metrics
            .record_match_completed(session.game_type, &outcome, duration);

        info!(
            session_id = %session.id,
            game_type = %session.game_type,
            outcome = ?outcome,
            "Session ended"
        );

        self.publisher
            .publish_session_ended(SessionEnded {
                session_id: session.id,
                game_type: session.game_type,
                outcome,
                rating,
                timestamp: current_timestamp(),
            })
            .await?;

        Ok(())
    }

    /// Track a forfeit and lock the queue after repeated offenses
    fn record_forfeit(&self, player_id: &str) -> Result<()> {
        let now = current_timestamp();
        let window = ChronoDuration::seconds(self.forfeit_rules.forfeit_window_seconds as i64);
        let lock = ChronoDuration::seconds(self.forfeit_rules.queue_lock_seconds as i64);
        let threshold = self.forfeit_rules.forfeit_threshold;

        let player = self.store.update_player(
            player_id,
            Box::new(move |player| {
                let in_window = player
                    .last_forfeit_at
                    .map(|t| now - t <= window)
                    .unwrap_or(false);
                player.forfeit_count = if in_window { player.forfeit_count + 1 } else { 1 };
                player.last_forfeit_at = Some(now);

                if player.forfeit_count >= threshold {
                    player.queue_locked_until = Some(now + lock);
                    player.forfeit_count = 0;
                }
            }),
        )?;

        if player.is_queue_locked(now) {
            warn!(
                player_id = %player_id,
                until = ?player.queue_locked_until,
                "Player queue-locked for repeated forfeits"
            );
        }
        Ok(())
    }

    fn arm_timer(self: &Arc<Self>, session_id: SessionId, armed_seq: u64) {
        let manager = Arc::clone(self);
        let timeout = std::time::Duration::from_secs(self.settings.afk_timeout_seconds);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            manager.handle_timeout(session_id, armed_seq).await;
        });
    }
}

fn lock_error() -> ArcadeError {
    ArcadeError::InternalError {
        message: "Failed to acquire session lock".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::publisher::MockEventPublisher;
    use crate::config::RatingSettings;
    use crate::store::InMemoryStore;
    use crate::types::{GameType, PairingOrigin};

    fn manager() -> (Arc<SessionManager>, Arc<InMemoryStore>, Arc<MockEventPublisher>) {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(MockEventPublisher::new());
        let rating = RatingEngine::new(store.clone(), RatingSettings::default());
        let manager = Arc::new(SessionManager::new(
            Arc::new(GameRegistry::with_defaults()),
            store.clone(),
            rating,
            publisher.clone(),
            SessionSettings::default(),
            ChallengeSettings::default(),
        ));
        (manager, store, publisher)
    }

    fn pvp_pairing(game_type: GameType, p1: &str, p2: &str) -> Pairing {
        Pairing {
            game_type,
            initiator: p1.to_string(),
            initiator_contact: "ch1".to_string(),
            opponent: Some(p2.to_string()),
            opponent_contact: Some("ch2".to_string()),
            rated: true,
            origin: PairingOrigin::Queue,
        }
    }

    fn solo_pairing(player: &str) -> Pairing {
        Pairing {
            game_type: GameType::NumberGuess,
            initiator: player.to_string(),
            initiator_contact: "ch1".to_string(),
            opponent: None,
            opponent_contact: None,
            rated: false,
            origin: PairingOrigin::Solo,
        }
    }

    #[tokio::test]
    async fn test_create_session_enforces_one_per_player() {
        let (manager, _, _) = manager();
        manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        let err = manager
            .create_session(pvp_pairing(GameType::ConnectFour, "alice", "carol"))
            .await
            .unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::AlreadyInSession { player_id }) if player_id == "alice"
        ));

        // Carol was not swept into a half-created session
        assert!(manager.session_for_player("carol").is_none());
        assert_eq!(manager.active_session_count(), 1);
    }

    #[tokio::test]
    async fn test_full_tictactoe_game_settles_ratings() {
        let (manager, store, publisher) = manager();
        manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        for (player, cell) in [
            ("alice", "0"),
            ("bob", "3"),
            ("alice", "1"),
            ("bob", "4"),
            ("alice", "2"),
        ] {
            manager.submit_move(player, cell).await.unwrap();
        }

        // Session is gone and both players are free again
        assert!(manager.session_for_player("alice").is_none());
        assert!(manager.session_for_player("bob").is_none());

        let alice = store.get_stat("alice", GameType::TicTacToe).unwrap().unwrap();
        assert_eq!(alice.rating, 1016);
        assert_eq!(alice.wins, 1);

        let names = publisher.get_event_names();
        assert_eq!(names.first(), Some(&"SessionCreated"));
        assert_eq!(names.last(), Some(&"SessionEnded"));
        assert_eq!(
            names.iter().filter(|n| **n == "MoveApplied").count(),
            5
        );
    }

    #[tokio::test]
    async fn test_out_of_turn_move_rejected() {
        let (manager, _, _) = manager();
        manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        let err = manager.submit_move("bob", "0").await.unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::NotYourTurn { .. })
        ));
    }

    #[tokio::test]
    async fn test_illegal_move_leaves_session_untouched() {
        let (manager, _, _) = manager();
        let session = manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        let err = manager.submit_move("alice", "99").await.unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::IllegalMove { .. })
        ));

        let after = manager.session_for_player("alice").unwrap();
        assert_eq!(after.move_seq, session.move_seq);
        assert_eq!(after.current_turn.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_move_without_session_rejected() {
        let (manager, _, _) = manager();
        let err = manager.submit_move("ghost", "0").await.unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::SessionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_pvp_forfeit_is_rated_loss_for_quitter() {
        let (manager, store, _) = manager();
        manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        let outcome = manager.forfeit("bob").await.unwrap();
        assert!(matches!(
            outcome,
            MatchOutcome::Decisive {
                ref winner,
                ref loser,
                reason: OutcomeReason::Forfeit,
            } if winner == "alice" && loser == "bob"
        ));

        let bob = store.get_stat("bob", GameType::TicTacToe).unwrap().unwrap();
        assert_eq!(bob.losses, 1);
        assert_eq!(bob.rating, 984);
        assert_eq!(store.get_player("bob").unwrap().unwrap().forfeit_count, 1);
    }

    #[tokio::test]
    async fn test_three_forfeits_lock_the_queue() {
        let (manager, store, _) = manager();

        for _ in 0..3 {
            manager
                .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
                .await
                .unwrap();
            manager.forfeit("bob").await.unwrap();
        }

        let bob = store.get_player("bob").unwrap().unwrap();
        assert!(bob.is_queue_locked(current_timestamp()));
        // Counter resets once the lock lands
        assert_eq!(bob.forfeit_count, 0);
    }

    #[tokio::test]
    async fn test_solo_quit_leaves_no_stats() {
        let (manager, store, _) = manager();
        manager.create_session(solo_pairing("alice")).await.unwrap();

        let outcome = manager.forfeit("alice").await.unwrap();
        assert!(matches!(outcome, MatchOutcome::Abandoned { .. }));
        assert!(store.get_stat("alice", GameType::NumberGuess).unwrap().is_none());
        assert!(manager.session_for_player("alice").is_none());
    }

    #[tokio::test]
    async fn test_stale_timer_is_a_no_op() {
        let (manager, _, publisher) = manager();
        let session = manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        manager.submit_move("alice", "0").await.unwrap();
        publisher.clear_events();

        // Timer armed against move_seq 0 fires after the move advanced it
        manager.handle_timeout(session.id, 0).await;

        assert!(manager.session_for_player("alice").is_some());
        assert!(publisher.get_published_events().is_empty());
    }

    #[tokio::test]
    async fn test_current_timer_forfeits_player_on_turn() {
        let (manager, store, _) = manager();
        let session = manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        let session = {
            manager.submit_move("alice", "0").await.unwrap();
            manager.get_session(&session.id).unwrap()
        };
        assert_eq!(session.current_turn.as_deref(), Some("bob"));

        manager.handle_timeout(session.id, session.move_seq).await;

        assert!(manager.session_for_player("bob").is_none());
        let bob = store.get_stat("bob", GameType::TicTacToe).unwrap().unwrap();
        assert_eq!(bob.losses, 1);
    }

    #[tokio::test]
    async fn test_wordduel_timeout_skips_round_instead_of_forfeiting() {
        let (manager, _, _) = manager();
        let session = manager
            .create_session(pvp_pairing(GameType::WordDuel, "alice", "bob"))
            .await
            .unwrap();

        manager.handle_timeout(session.id, 0).await;

        // Still alive, turn passed to bob, round advanced
        let after = manager.session_for_player("alice").unwrap();
        assert_eq!(after.current_turn.as_deref(), Some("bob"));
        assert_eq!(after.state["round"], 1);
        assert_eq!(after.move_seq, 1);
    }

    #[tokio::test]
    async fn test_solo_timeout_abandons_without_stats() {
        let (manager, store, _) = manager();
        let session = manager.create_session(solo_pairing("alice")).await.unwrap();

        manager.handle_timeout(session.id, 0).await;

        assert!(manager.session_for_player("alice").is_none());
        assert!(store.get_player("alice").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bot_answers_immediately() {
        let (manager, _, _) = manager();
        let pairing = Pairing {
            game_type: GameType::TicTacToe,
            initiator: "alice".to_string(),
            initiator_contact: "ch1".to_string(),
            opponent: Some(BOT_PLAYER_ID.to_string()),
            opponent_contact: Some("ch1".to_string()),
            rated: false,
            origin: PairingOrigin::BotFallback,
        };
        manager.create_session(pairing).await.unwrap();

        let after = manager.submit_move("alice", "4").await.unwrap().unwrap();
        // Bot already moved; it is alice's turn again
        assert_eq!(after.current_turn.as_deref(), Some("alice"));
        assert_eq!(after.move_seq, 2);
    }

    #[tokio::test]
    async fn test_solo_game_completion_records_win() {
        let (manager, store, _) = manager();
        let session = manager.create_session(solo_pairing("alice")).await.unwrap();

        let secret = manager
            .get_session(&session.id)
            .unwrap()
            .state
            .get("secret")
            .and_then(|v| v.as_u64())
            .unwrap();

        let ended = manager
            .submit_move("alice", &secret.to_string())
            .await
            .unwrap();
        assert!(ended.is_none());

        let stat = store
            .get_stat("alice", GameType::NumberGuess)
            .unwrap()
            .unwrap();
        assert_eq!(stat.wins, 1);
        assert!((stat.rank_score - 110.0).abs() < f64::EPSILON);
    }

    fn manager_with_metrics() -> (Arc<SessionManager>, Arc<MetricsCollector>) {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(MockEventPublisher::new());
        let collector =
            Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
        let rating = RatingEngine::with_metrics(
            store.clone(),
            RatingSettings::default(),
            collector.clone(),
        );
        let manager = Arc::new(SessionManager::with_metrics(
            Arc::new(GameRegistry::with_defaults()),
            store,
            rating,
            publisher,
            SessionSettings::default(),
            ChallengeSettings::default(),
            collector.clone(),
        ));
        (manager, collector)
    }

    #[tokio::test]
    async fn test_played_out_session_moves_domain_counters() {
        let (manager, collector) = manager_with_metrics();
        manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();

        let session = collector.session();
        assert_eq!(
            session
                .sessions_created_total
                .with_label_values(&["tictactoe", "rated"])
                .get(),
            1
        );
        assert_eq!(
            session.active_sessions.with_label_values(&["tictactoe"]).get(),
            1
        );

        for (player, cell) in [
            ("alice", "0"),
            ("bob", "3"),
            ("alice", "1"),
            ("bob", "4"),
            ("alice", "2"),
        ] {
            manager.submit_move(player, cell).await.unwrap();
        }

        assert_eq!(
            session
                .matches_completed_total
                .with_label_values(&["tictactoe", "decisive"])
                .get(),
            1
        );
        assert_eq!(
            session.active_sessions.with_label_values(&["tictactoe"]).get(),
            0
        );
        assert_eq!(collector.rating().rating_updates_total.get(), 1);
    }

    #[tokio::test]
    async fn test_forfeit_and_timeout_move_counters() {
        let (manager, collector) = manager_with_metrics();
        manager
            .create_session(pvp_pairing(GameType::TicTacToe, "alice", "bob"))
            .await
            .unwrap();
        manager.forfeit("alice").await.unwrap();
        assert_eq!(collector.session().forfeits_total.get(), 1);

        let session = manager
            .create_session(pvp_pairing(GameType::TicTacToe, "carol", "dave"))
            .await
            .unwrap();
        manager.handle_timeout(session.id, session.move_seq).await;
        assert_eq!(
            collector
                .session()
                .timeouts_total
                .with_label_values(&["tictactoe"])
                .get(),
            1
        );
    }
}
