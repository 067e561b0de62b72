//! Prometheus metrics collection
//!
//! Central collector for queue, session, and rating metrics. All metric
//! families are registered on a single registry that the health server
//! exposes at `/metrics`.

use crate::types::{GameType, MatchOutcome};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Central metrics collector for the arcade service
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    queue_metrics: QueueMetrics,
    session_metrics: SessionMetrics,
    rating_metrics: RatingMetrics,
}

/// Service-level operational metrics
pub struct ServiceMetrics {
    pub uptime_seconds: IntGauge,
    pub amqp_messages_total: IntCounterVec,
    pub amqp_errors_total: IntCounterVec,
    pub health_status: IntGauge,
    pub component_health: IntGaugeVec,
}

/// Matchmaking queue metrics
pub struct QueueMetrics {
    pub searches_started_total: IntCounterVec,
    pub players_waiting: IntGaugeVec,
    pub searches_resolved_total: IntCounterVec,
    pub queue_wait_time_seconds: HistogramVec,
    pub search_attempts: Histogram,
}

/// Game session metrics
pub struct SessionMetrics {
    pub active_sessions: IntGaugeVec,
    pub sessions_created_total: IntCounterVec,
    pub matches_completed_total: IntCounterVec,
    pub timeouts_total: IntCounterVec,
    pub forfeits_total: IntCounter,
    pub session_duration_seconds: HistogramVec,
}

/// Rating engine metrics
pub struct RatingMetrics {
    pub rating_calculation_duration: Histogram,
    pub rating_updates_total: IntCounter,
    pub suppressed_deltas_total: IntCounter,
    pub rating_distribution: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with all metric families registered
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            session_metrics,
            rating_metrics,
        })
    }

    /// Get the prometheus registry for metric exposition
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    /// Record a player starting a queue search
    pub fn record_search_started(&self, game_type: GameType) {
        self.queue_metrics
            .searches_started_total
            .with_label_values(&[game_type.as_str()])
            .inc();

        self.queue_metrics
            .players_waiting
            .with_label_values(&[game_type.as_str()])
            .inc();
    }

    /// Record how a queue search ended
    ///
    /// `resolution` is one of "matched", "bot_fallback", "cancelled",
    /// "expired", or "no_opponent".
    pub fn record_search_resolved(
        &self,
        game_type: GameType,
        resolution: &str,
        waited: Duration,
        attempts: u32,
    ) {
        self.queue_metrics
            .searches_resolved_total
            .with_label_values(&[game_type.as_str(), resolution])
            .inc();

        self.queue_metrics
            .players_waiting
            .with_label_values(&[game_type.as_str()])
            .dec();

        self.queue_metrics
            .queue_wait_time_seconds
            .with_label_values(&[game_type.as_str()])
            .observe(waited.as_secs_f64());

        self.queue_metrics.search_attempts.observe(attempts as f64);
    }

    /// Record a session being created
    pub fn record_session_created(&self, game_type: GameType, rated: bool) {
        let rated_str = if rated { "rated" } else { "unrated" };

        self.session_metrics
            .sessions_created_total
            .with_label_values(&[game_type.as_str(), rated_str])
            .inc();

        self.session_metrics
            .active_sessions
            .with_label_values(&[game_type.as_str()])
            .inc();
    }

    /// Record a completed match and its outcome
    pub fn record_match_completed(
        &self,
        game_type: GameType,
        outcome: &MatchOutcome,
        duration: Duration,
    ) {
        let outcome_str = match outcome {
            MatchOutcome::Decisive { .. } => "decisive",
            MatchOutcome::Draw { .. } => "draw",
            MatchOutcome::Solo { won: true, .. } => "solo_won",
            MatchOutcome::Solo { won: false, .. } => "solo_lost",
            MatchOutcome::Abandoned { .. } => "abandoned",
        };

        self.session_metrics
            .matches_completed_total
            .with_label_values(&[game_type.as_str(), outcome_str])
            .inc();

        self.session_metrics
            .active_sessions
            .with_label_values(&[game_type.as_str()])
            .dec();

        self.session_metrics
            .session_duration_seconds
            .with_label_values(&[game_type.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Record an idle timeout firing on a session
    pub fn record_timeout(&self, game_type: GameType) {
        self.session_metrics
            .timeouts_total
            .with_label_values(&[game_type.as_str()])
            .inc();
    }

    /// Record a forfeit
    pub fn record_forfeit(&self) {
        self.session_metrics.forfeits_total.inc();
    }

    /// Record a rating calculation and its result
    pub fn record_rating_update(&self, duration: Duration, suppressed: bool, new_rating: i32) {
        self.rating_metrics
            .rating_calculation_duration
            .observe(duration.as_secs_f64());

        self.rating_metrics.rating_updates_total.inc();

        if suppressed {
            self.rating_metrics.suppressed_deltas_total.inc();
        }

        self.rating_metrics
            .rating_distribution
            .observe(new_rating as f64);
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }
    }

    /// Update health status (0=unhealthy, 1=degraded, 2=healthy)
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("arcade_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new("arcade_amqp_messages_total", "Total AMQP messages processed"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("arcade_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "arcade_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("arcade_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let searches_started_total = IntCounterVec::new(
            Opts::new(
                "arcade_searches_started_total",
                "Total queue searches started",
            ),
            &["game_type"],
        )?;
        registry.register(Box::new(searches_started_total.clone()))?;

        let players_waiting = IntGaugeVec::new(
            Opts::new("arcade_players_waiting", "Players currently in queue"),
            &["game_type"],
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let searches_resolved_total = IntCounterVec::new(
            Opts::new(
                "arcade_searches_resolved_total",
                "Queue searches by resolution",
            ),
            &["game_type", "resolution"],
        )?;
        registry.register(Box::new(searches_resolved_total.clone()))?;

        let queue_wait_time_seconds = HistogramVec::new(
            HistogramOpts::new("arcade_queue_wait_time_seconds", "Player queue wait time")
                .buckets(vec![5.0, 15.0, 30.0, 60.0, 90.0, 120.0, 180.0]),
            &["game_type"],
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        let search_attempts = Histogram::with_opts(
            HistogramOpts::new(
                "arcade_search_attempts",
                "Poll attempts before a search resolved",
            )
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 6.0, 9.0, 12.0]),
        )?;
        registry.register(Box::new(search_attempts.clone()))?;

        Ok(Self {
            searches_started_total,
            players_waiting,
            searches_resolved_total,
            queue_wait_time_seconds,
            search_attempts,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_sessions = IntGaugeVec::new(
            Opts::new("arcade_active_sessions", "Number of active game sessions"),
            &["game_type"],
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_created_total = IntCounterVec::new(
            Opts::new("arcade_sessions_created_total", "Total sessions created"),
            &["game_type", "rated"],
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let matches_completed_total = IntCounterVec::new(
            Opts::new(
                "arcade_matches_completed_total",
                "Completed matches by outcome",
            ),
            &["game_type", "outcome"],
        )?;
        registry.register(Box::new(matches_completed_total.clone()))?;

        let timeouts_total = IntCounterVec::new(
            Opts::new("arcade_timeouts_total", "Idle timeouts fired"),
            &["game_type"],
        )?;
        registry.register(Box::new(timeouts_total.clone()))?;

        let forfeits_total = IntCounter::new("arcade_forfeits_total", "Total forfeits")?;
        registry.register(Box::new(forfeits_total.clone()))?;

        let session_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "arcade_session_duration_seconds",
                "Session duration from start to finish",
            )
            .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
            &["game_type"],
        )?;
        registry.register(Box::new(session_duration_seconds.clone()))?;

        Ok(Self {
            active_sessions,
            sessions_created_total,
            matches_completed_total,
            timeouts_total,
            forfeits_total,
            session_duration_seconds,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_calculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "arcade_rating_calculation_duration_seconds",
                "Rating calculation time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        let rating_updates_total =
            IntCounter::new("arcade_rating_updates_total", "Total rating updates applied")?;
        registry.register(Box::new(rating_updates_total.clone()))?;

        let suppressed_deltas_total = IntCounter::new(
            "arcade_suppressed_deltas_total",
            "Rating deltas suppressed by the daily pair limit",
        )?;
        registry.register(Box::new(suppressed_deltas_total.clone()))?;

        let rating_distribution = Histogram::with_opts(
            HistogramOpts::new("arcade_rating_distribution", "Player rating distribution")
                .buckets(vec![
                    500.0, 800.0, 1000.0, 1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2500.0,
                ]),
        )?;
        registry.register(Box::new(rating_distribution.clone()))?;

        Ok(Self {
            rating_calculation_duration,
            rating_updates_total,
            suppressed_deltas_total,
            rating_distribution,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameType, MatchOutcome, OutcomeReason};
    use std::time::Duration;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _queue = collector.queue();
        let _session = collector.session();
        let _rating = collector.rating();
    }

    #[test]
    fn test_search_lifecycle_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_search_started(GameType::TicTacToe);
        collector.record_search_resolved(
            GameType::TicTacToe,
            "matched",
            Duration::from_secs(12),
            2,
        );

        let waiting = collector
            .queue()
            .players_waiting
            .with_label_values(&["tictactoe"])
            .get();
        assert_eq!(waiting, 0);
    }

    #[test]
    fn test_session_lifecycle_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_session_created(GameType::ConnectFour, true);
        assert_eq!(
            collector
                .session()
                .active_sessions
                .with_label_values(&["connect4"])
                .get(),
            1
        );

        let outcome = MatchOutcome::Decisive {
            winner: "alice".to_string(),
            loser: "bob".to_string(),
            reason: OutcomeReason::Played,
        };
        collector.record_match_completed(GameType::ConnectFour, &outcome, Duration::from_secs(90));
        assert_eq!(
            collector
                .session()
                .active_sessions
                .with_label_values(&["connect4"])
                .get(),
            0
        );
    }

    #[test]
    fn test_rating_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_rating_update(Duration::from_micros(50), false, 1016);
        collector.record_rating_update(Duration::from_micros(50), true, 1016);

        assert_eq!(collector.rating().rating_updates_total.get(), 2);
        assert_eq!(collector.rating().suppressed_deltas_total.get(), 1);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("amqp", true);
        collector.update_component_health("session_manager", false);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration >= Duration::from_millis(10));
    }
}
