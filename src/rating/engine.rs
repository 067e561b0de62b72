//! Post-game accounting
//!
//! One entry point, [`RatingEngine::apply_outcome`], turns a terminal
//! session outcome into stat updates, player-record updates, daily streak
//! progression, and a match history record. Rating only moves for rated
//! decisive results between two humans, and the daily same-pair cap zeroes
//! the delta once a pair has farmed enough games in one day.

use crate::config::RatingSettings;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::rating::elo::calculate_elo_change;
use crate::store::Store;
use crate::types::{
    is_bot, GameStat, GameType, MatchOutcome, MatchRecord, Player, RatingSummary, Session,
};
use crate::utils::{current_timestamp, day_key, is_next_day, start_of_day_utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Applies terminal outcomes to the persistent player data
pub struct RatingEngine {
    store: Arc<dyn Store>,
    settings: RatingSettings,
    metrics: Arc<MetricsCollector>,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn Store>, settings: RatingSettings) -> Self {
        // Create a default metrics collector if none provided
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(store, settings, metrics)
    }

    pub fn with_metrics(
        store: Arc<dyn Store>,
        settings: RatingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            settings,
            metrics,
        }
    }

    /// Apply a terminal outcome. Returns the rating movement for rated
    /// decisive pvp results, `None` otherwise. Abandoned sessions leave
    /// no trace at all.
    pub fn apply_outcome(
        &self,
        session: &Session,
        outcome: &MatchOutcome,
    ) -> Result<Option<RatingSummary>> {
        let now = current_timestamp();
        let game_type = session.game_type;

        match outcome {
            MatchOutcome::Abandoned { player } => {
                debug!(player_id = %player, session_id = %session.id, "Session abandoned, no stats recorded");
                Ok(None)
            }

            MatchOutcome::Solo { player, won } => {
                let won = *won;
                self.store.update_stat(
                    player,
                    game_type,
                    Box::new(move |stat| {
                        if won {
                            stat.wins += 1;
                            stat.win_streak += 1;
                            stat.best_streak = stat.best_streak.max(stat.win_streak);
                        } else {
                            stat.losses += 1;
                            stat.win_streak = 0;
                        }
                        stat.recompute_win_rate();
                        stat.recompute_rank_score();
                    }),
                )?;
                self.touch_player(player, won, !won, now)?;
                self.store.record_match(MatchRecord {
                    game_type,
                    player1_id: player.clone(),
                    player2_id: None,
                    winner_id: won.then(|| player.clone()),
                    outcome: outcome.clone(),
                    rating_delta: 0,
                    rated: false,
                    duration_seconds: Some((now - session.started_at).num_seconds()),
                    completed_at: now,
                })?;
                Ok(None)
            }

            MatchOutcome::Draw { players } => {
                for player in players.iter().filter(|p| !is_bot(p)) {
                    self.store.update_stat(
                        player,
                        game_type,
                        Box::new(|stat| {
                            stat.draws += 1;
                            stat.recompute_win_rate();
                            stat.recompute_rank_score();
                        }),
                    )?;
                    self.touch_player(player, false, false, now)?;
                }
                self.store.record_match(MatchRecord {
                    game_type,
                    player1_id: session.player1_id.clone(),
                    player2_id: session.player2_id.clone(),
                    winner_id: None,
                    outcome: outcome.clone(),
                    rating_delta: 0,
                    rated: session.rated,
                    duration_seconds: Some((now - session.started_at).num_seconds()),
                    completed_at: now,
                })?;
                Ok(None)
            }

            MatchOutcome::Decisive {
                winner,
                loser,
                reason,
            } => {
                let both_human = !is_bot(winner) && !is_bot(loser);
                let rated = session.rated && game_type.is_rated() && both_human;

                // Count this pair's finished games since UTC midnight before
                // recording the current one. At the cap the delta is zeroed;
                // counters and streaks still move.
                let (summary, delta) = if rated {
                    let timer = self.metrics.start_timer();
                    let prior_pair_games = self.store.pair_games_since(
                        winner,
                        loser,
                        game_type,
                        start_of_day_utc(now),
                    )?;
                    let suppressed = prior_pair_games >= self.settings.daily_pair_limit;

                    if suppressed {
                        info!(
                            winner = %winner,
                            loser = %loser,
                            game_type = %game_type,
                            games_today = prior_pair_games,
                            "Daily pair limit reached, rating change suppressed"
                        );
                        self.metrics.record_rating_update(
                            timer.stop(),
                            true,
                            self.current_rating(winner, game_type)?,
                        );
                        (
                            Some(RatingSummary {
                                winner_change: 0,
                                loser_change: 0,
                                suppressed: true,
                                daily_pair_games: prior_pair_games + 1,
                            }),
                            0,
                        )
                    } else {
                        let winner_rating = self.current_rating(winner, game_type)?;
                        let loser_rating = self.current_rating(loser, game_type)?;
                        let change = calculate_elo_change(
                            winner_rating,
                            loser_rating,
                            self.settings.k_factor,
                            self.settings.rating_floor,
                        );

                        let winner_new = change.winner_new;
                        let loser_new = change.loser_new;
                        self.store.update_stat(
                            winner,
                            game_type,
                            Box::new(move |stat| stat.rating = winner_new),
                        )?;
                        self.store.update_stat(
                            loser,
                            game_type,
                            Box::new(move |stat| stat.rating = loser_new),
                        )?;

                        self.metrics
                            .record_rating_update(timer.stop(), false, change.winner_new);

                        (
                            Some(RatingSummary {
                                winner_change: change.winner_new - winner_rating,
                                loser_change: change.loser_new - loser_rating,
                                suppressed: false,
                                daily_pair_games: prior_pair_games + 1,
                            }),
                            change.delta,
                        )
                    }
                } else {
                    (None, 0)
                };

                if !is_bot(winner) {
                    self.store.update_stat(
                        winner,
                        game_type,
                        Box::new(|stat| {
                            stat.wins += 1;
                            stat.win_streak += 1;
                            stat.best_streak = stat.best_streak.max(stat.win_streak);
                            stat.recompute_win_rate();
                            stat.recompute_rank_score();
                        }),
                    )?;
                    self.touch_player(winner, true, false, now)?;
                }
                if !is_bot(loser) {
                    self.store.update_stat(
                        loser,
                        game_type,
                        Box::new(|stat| {
                            stat.losses += 1;
                            stat.win_streak = 0;
                            stat.recompute_win_rate();
                            stat.recompute_rank_score();
                        }),
                    )?;
                    self.touch_player(loser, false, true, now)?;
                }

                debug!(
                    winner = %winner,
                    loser = %loser,
                    game_type = %game_type,
                    reason = ?reason,
                    delta,
                    "Decisive outcome applied"
                );

                self.store.record_match(MatchRecord {
                    game_type,
                    player1_id: session.player1_id.clone(),
                    player2_id: session.player2_id.clone(),
                    winner_id: Some(winner.clone()),
                    outcome: outcome.clone(),
                    rating_delta: delta,
                    rated,
                    duration_seconds: Some((now - session.started_at).num_seconds()),
                    completed_at: now,
                })?;

                Ok(summary)
            }
        }
    }

    /// Current stored rating, falling back to the default for new players
    fn current_rating(&self, player_id: &str, game_type: GameType) -> Result<i32> {
        Ok(self
            .store
            .get_stat(player_id, game_type)?
            .map(|s| s.rating)
            .unwrap_or(GameStat::DEFAULT_RATING))
    }

    /// Update lifetime totals and the daily play streak
    fn touch_player(
        &self,
        player_id: &str,
        won: bool,
        lost: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Player> {
        let today = day_key(now);
        self.store.update_player(
            player_id,
            Box::new(move |player| {
                if won {
                    player.total_wins += 1;
                }
                if lost {
                    player.total_losses += 1;
                }
                match player.last_played_date.as_deref() {
                    Some(d) if d == today => {}
                    Some(d) if is_next_day(d, &today) => player.daily_streak += 1,
                    _ => player.daily_streak = 1,
                }
                player.last_played_date = Some(today);
            }),
        )
    }
}
