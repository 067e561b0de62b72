//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the store,
//! matchmaking, sessions, challenges, and rating together behind the
//! AMQP command stream.

use crate::amqp::connection::{AmqpConnection, ConnectionConfig};
use crate::amqp::handlers::{CommandConsumer, CommandHandler};
use crate::amqp::messages::PlayerCommand;
use crate::amqp::publisher::{AmqpEventPublisher, EventPublisher, PublisherConfig};
use crate::challenge::ChallengeRegistry;
use crate::config::AppConfig;
use crate::error::{ArcadeError, Result as ArcadeResult};
use crate::game::GameRegistry;
use crate::matchmaking::{MatchPoller, MatchQueue};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::rating::RatingEngine;
use crate::session::SessionManager;
use crate::store::{InMemoryStore, Store};
use crate::types::{
    ChallengeIssued, GameType, Pairing, PairingOrigin, PlayerId, BOT_PLAYER_ID,
};
use crate::utils::current_timestamp;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Production command handler dispatching player commands to the core
pub struct ArcadeCommandHandler {
    store: Arc<dyn Store>,
    sessions: Arc<SessionManager>,
    poller: Arc<MatchPoller>,
    challenges: Arc<ChallengeRegistry>,
    publisher: Arc<dyn EventPublisher>,
}

impl ArcadeCommandHandler {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionManager>,
        poller: Arc<MatchPoller>,
        challenges: Arc<ChallengeRegistry>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            sessions,
            poller,
            challenges,
            publisher,
        }
    }

    async fn start_solo(
        &self,
        player_id: &str,
        display_name: &str,
        game_type: GameType,
        contact: &str,
    ) -> ArcadeResult<()> {
        if !game_type.is_solo() {
            return Err(ArcadeError::IllegalMove {
                reason: format!("{} requires an opponent", game_type),
            }
            .into());
        }

        self.store.ensure_player(player_id, display_name)?;
        self.sessions
            .create_session(Pairing {
                game_type,
                initiator: player_id.to_string(),
                initiator_contact: contact.to_string(),
                opponent: None,
                opponent_contact: None,
                rated: false,
                origin: PairingOrigin::Solo,
            })
            .await?;
        Ok(())
    }

    /// Guard shared by challenge issue and rematch: the challenger must be
    /// unlocked and both sides must be free.
    fn check_challenge_allowed(
        &self,
        challenger_id: &str,
        challenged_id: &str,
    ) -> ArcadeResult<()> {
        let now = current_timestamp();
        if let Some(player) = self.store.get_player(challenger_id)? {
            if player.is_queue_locked(now) {
                return Err(ArcadeError::QueueLocked {
                    player_id: challenger_id.to_string(),
                    until: player.queue_locked_until.unwrap_or(now),
                }
                .into());
            }
        }

        for side in [challenger_id, challenged_id] {
            if self.sessions.session_for_player(side).is_some() {
                return Err(ArcadeError::AlreadyInSession {
                    player_id: side.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn issue_challenge(
        &self,
        challenger_id: &str,
        display_name: &str,
        challenged_id: &str,
        game_type: GameType,
        contact: &str,
        guild_id: Option<String>,
        is_rematch: bool,
    ) -> ArcadeResult<()> {
        if game_type.is_solo() {
            return Err(ArcadeError::IllegalMove {
                reason: format!("{} cannot be played against another player", game_type),
            }
            .into());
        }

        self.store.ensure_player(challenger_id, display_name)?;
        self.check_challenge_allowed(challenger_id, challenged_id)?;

        let challenge = self.challenges.issue(
            challenger_id,
            challenged_id,
            game_type,
            contact.to_string(),
            guild_id,
        )?;

        self.publisher
            .publish_challenge_issued(ChallengeIssued {
                challenge_id: challenge.id,
                challenger_id: challenge.challenger_id.clone(),
                challenged_id: challenge.challenged_id.clone(),
                game_type,
                is_rematch,
                timestamp: current_timestamp(),
            })
            .await?;
        Ok(())
    }

    async fn accept_challenge(
        &self,
        player_id: &str,
        display_name: &str,
        contact: &str,
        guild_id: Option<String>,
    ) -> ArcadeResult<()> {
        self.store.ensure_player(player_id, display_name)?;

        if self.sessions.session_for_player(player_id).is_some() {
            return Err(ArcadeError::AlreadyInSession {
                player_id: player_id.to_string(),
            }
            .into());
        }

        let challenge = self.challenges.accept(player_id, guild_id.as_deref())?;

        // The challenge is already consumed; if its issuer got busy in the
        // meantime it is simply discarded
        if self
            .sessions
            .session_for_player(&challenge.challenger_id)
            .is_some()
        {
            return Err(ArcadeError::ChallengerUnavailable {
                challenger_id: challenge.challenger_id.clone(),
            }
            .into());
        }

        let session = self
            .sessions
            .create_session(Pairing {
                game_type: challenge.game_type,
                initiator: challenge.challenger_id.clone(),
                initiator_contact: challenge.contact.clone(),
                opponent: Some(player_id.to_string()),
                opponent_contact: Some(contact.to_string()),
                rated: challenge.game_type.is_rated(),
                origin: PairingOrigin::Challenge,
            })
            .await?;

        self.publisher
            .publish_challenge_accepted(crate::types::ChallengeAccepted {
                challenge_id: challenge.id,
                challenger_id: challenge.challenger_id,
                challenged_id: player_id.to_string(),
                game_type: session.game_type,
                timestamp: current_timestamp(),
            })
            .await?;
        Ok(())
    }

    /// Rematch: re-challenge the opponent from the player's most recent
    /// pvp match, subject to the usual challenge guards.
    async fn rematch(&self, player_id: &str, contact: &str) -> ArcadeResult<()> {
        let recent = self.store.recent_matches(player_id, 10)?;
        let last_pvp = recent.iter().find_map(|record| {
            let opponent = if record.player1_id == player_id {
                record.player2_id.as_deref()
            } else {
                Some(record.player1_id.as_str())
            }?;
            if opponent == BOT_PLAYER_ID {
                return None;
            }
            Some((opponent.to_string(), record.game_type))
        });

        let (opponent, game_type) = match last_pvp {
            Some(found) => found,
            None => {
                return Err(ArcadeError::SessionNotFound {
                    reference: format!("no recent opponent for {}", player_id),
                }
                .into())
            }
        };

        self.issue_challenge(player_id, player_id, &opponent, game_type, contact, None, true)
            .await
    }
}

#[async_trait]
impl CommandHandler for ArcadeCommandHandler {
    async fn handle_command(&self, command: PlayerCommand) -> ArcadeResult<()> {
        let start_time = std::time::Instant::now();
        let player_id: PlayerId = command.player_id().to_string();

        let result = match command {
            PlayerCommand::JoinQueue {
                player_id,
                display_name,
                game_type,
                contact,
            } => {
                if game_type.is_solo() {
                    // Solo games have no queue; they start immediately
                    self.start_solo(&player_id, &display_name, game_type, &contact)
                        .await
                } else {
                    self.poller
                        .start_search(&player_id, &display_name, game_type, &contact)
                        .await
                }
            }
            PlayerCommand::CancelQueue { player_id } => {
                self.poller.cancel_search(&player_id).await.map(|_| ())
            }
            PlayerCommand::StartSolo {
                player_id,
                display_name,
                game_type,
                contact,
            } => {
                self.start_solo(&player_id, &display_name, game_type, &contact)
                    .await
            }
            PlayerCommand::SubmitMove { player_id, input } => self
                .sessions
                .submit_move(&player_id, &input)
                .await
                .map(|_| ()),
            PlayerCommand::Forfeit { player_id } => {
                if self.sessions.session_for_player(&player_id).is_some() {
                    self.sessions.forfeit(&player_id).await.map(|_| ())
                } else if self.poller.cancel_search(&player_id).await? {
                    // Giving up while only queued just drops the entry
                    Ok(())
                } else {
                    Err(ArcadeError::SessionNotFound {
                        reference: player_id.clone(),
                    }
                    .into())
                }
            }
            PlayerCommand::IssueChallenge {
                player_id,
                display_name,
                challenged_id,
                game_type,
                contact,
                guild_id,
            } => {
                self.issue_challenge(
                    &player_id,
                    &display_name,
                    &challenged_id,
                    game_type,
                    &contact,
                    guild_id,
                    false,
                )
                .await
            }
            PlayerCommand::AcceptChallenge {
                player_id,
                display_name,
                contact,
                guild_id,
            } => {
                self.accept_challenge(&player_id, &display_name, &contact, guild_id)
                    .await
            }
            PlayerCommand::Rematch { player_id, contact } => {
                self.rematch(&player_id, &contact).await
            }
        };

        let elapsed = start_time.elapsed();
        match &result {
            Ok(()) => debug!(
                player_id = %player_id,
                time_ms = elapsed.as_secs_f64() * 1000.0,
                "Command processed"
            ),
            Err(e) => info!(
                player_id = %player_id,
                time_ms = elapsed.as_secs_f64() * 1000.0,
                error = %e,
                "Command rejected"
            ),
        }
        result
    }

    async fn handle_error(&self, error: ArcadeError, message_data: &[u8]) {
        error!(
            error = %error,
            message_size = message_data.len(),
            "Command handling failed"
        );

        if !message_data.is_empty() {
            let preview_len = std::cmp::min(100, message_data.len());
            let preview = String::from_utf8_lossy(&message_data[..preview_len]);
            error!("Message preview: {:?}", preview);
        }
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Persistent player and match data
    store: Arc<dyn Store>,

    /// Live session management
    sessions: Arc<SessionManager>,

    /// Matchmaking queue and its polling driver
    queue: Arc<MatchQueue>,
    poller: Arc<MatchPoller>,

    /// Pending challenges
    challenges: Arc<ChallengeRegistry>,

    /// AMQP connection for message handling
    amqp_connection: Arc<AmqpConnection>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// AMQP consumer for player commands
    command_consumer: Option<CommandConsumer>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    /// Startup timestamp for uptime reporting
    started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing arcade game core");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        let amqp_connection = Self::initialize_amqp(&config).await?;
        let metrics_service = Self::initialize_metrics(&config)?;

        let (store, sessions, queue, poller, challenges) = Self::initialize_core(
            &config,
            amqp_connection.clone(),
            metrics_service.collector(),
        )
        .await?;

        Ok(Self {
            config,
            store,
            sessions,
            queue,
            poller,
            challenges,
            amqp_connection,
            metrics_service,
            background_tasks: Vec::new(),
            command_consumer: None,
            is_running: Arc::new(RwLock::new(false)),
            started_at: current_timestamp(),
        })
    }

    /// Start all background services and message consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting arcade game core");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_command_consumption().await?;
        self.start_background_tasks();

        info!("Arcade game core started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        *self.is_running.write().await = false;

        if let Some(consumer) = &self.command_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop command consumer: {}", e);
            } else {
                info!("Command consumption stopped");
            }
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        info!(
            active_sessions = self.sessions.active_session_count(),
            players_waiting = self.queue.total_len().unwrap_or(0),
            pending_challenges = self.challenges.pending_count(),
            "Final service statistics"
        );
        info!("Shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    pub fn queue(&self) -> Arc<MatchQueue> {
        self.queue.clone()
    }

    pub fn poller(&self) -> Arc<MatchPoller> {
        self.poller.clone()
    }

    pub fn challenges(&self) -> Arc<ChallengeRegistry> {
        self.challenges.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    pub fn amqp_connection(&self) -> Arc<AmqpConnection> {
        self.amqp_connection.clone()
    }

    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    fn initialize_metrics(config: &AppConfig) -> Result<Arc<MetricsService>, ServiceError> {
        info!(
            "Initializing metrics service on port {}",
            config.service.health_port
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server = Arc::new(HealthServer::new(health_config, metrics_collector.clone()));
        Ok(Arc::new(MetricsService::new(
            metrics_collector,
            health_server,
        )))
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("Metrics service started on port {}", port);
        Ok(())
    }

    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.amqp.url);

        let connection_config = ConnectionConfig {
            url: config.amqp.url.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
        };

        let connection = AmqpConnection::new(connection_config).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            }
        })?;

        Ok(Arc::new(connection))
    }

    /// Build the store, session manager, queue, poller, and challenge
    /// registry wired to an AMQP publisher.
    async fn initialize_core(
        config: &AppConfig,
        amqp_connection: Arc<AmqpConnection>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<
        (
            Arc<dyn Store>,
            Arc<SessionManager>,
            Arc<MatchQueue>,
            Arc<MatchPoller>,
            Arc<ChallengeRegistry>,
        ),
        ServiceError,
    > {
        info!("Initializing game core components");

        let channel =
            amqp_connection
                .open_channel()
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to open AMQP channel: {}", e),
                })?;

        let publisher_config = Self::publisher_config_from(config);
        let publisher: Arc<dyn EventPublisher> = Arc::new(
            AmqpEventPublisher::with_metrics(channel, publisher_config, metrics.clone())
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to initialize event publisher: {}", e),
                })?,
        );

        let store: Arc<dyn Store> = Arc::new(InMemoryStore::default());
        let registry = Arc::new(GameRegistry::with_defaults());
        let rating =
            RatingEngine::with_metrics(store.clone(), config.rating.clone(), metrics.clone());

        let sessions = Arc::new(SessionManager::with_metrics(
            registry,
            store.clone(),
            rating,
            publisher.clone(),
            config.session.clone(),
            config.challenge.clone(),
            metrics.clone(),
        ));

        let queue = Arc::new(MatchQueue::new());
        let poller = Arc::new(MatchPoller::with_metrics(
            queue.clone(),
            store.clone(),
            sessions.clone(),
            publisher.clone(),
            config.matchmaking.clone(),
            metrics,
        ));

        let challenges = Arc::new(ChallengeRegistry::new(config.challenge.ttl_seconds));

        Ok((store, sessions, queue, poller, challenges))
    }

    async fn start_command_consumption(&mut self) -> Result<(), ServiceError> {
        let queue_name = self.config.amqp.command_queue_name.clone();
        info!("Starting command consumption from queue '{}'", queue_name);

        let channel =
            self.amqp_connection
                .open_channel()
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to open consumer channel: {}", e),
                })?;

        let queue_declare_args = amqprs::channel::QueueDeclareArguments::new(&queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();

        channel
            .queue_declare(queue_declare_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        let handler = Arc::new(ArcadeCommandHandler::new(
            self.store.clone(),
            self.sessions.clone(),
            self.poller.clone(),
            self.challenges.clone(),
            self.publisher_for_handler().await?,
        ));

        let consumer = CommandConsumer::new(handler, channel);
        consumer
            .start_consuming(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming commands: {}", e),
            })?;

        self.command_consumer = Some(consumer);

        info!("Now listening for player commands on '{}'", queue_name);
        Ok(())
    }

    /// Dedicated publisher channel for the command handler
    async fn publisher_for_handler(&self) -> Result<Arc<dyn EventPublisher>, ServiceError> {
        let channel =
            self.amqp_connection
                .open_channel()
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to open publisher channel: {}", e),
                })?;

        let publisher_config = Self::publisher_config_from(&self.config);

        Ok(Arc::new(
            AmqpEventPublisher::with_metrics(
                channel,
                publisher_config,
                self.metrics_service.collector(),
            )
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize handler publisher: {}", e),
            })?,
        ))
    }

    /// Publisher settings derived from the AMQP configuration
    fn publisher_config_from(config: &AppConfig) -> PublisherConfig {
        PublisherConfig {
            exchange_name: config.amqp.exchange_name.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
            ..PublisherConfig::default()
        }
    }

    fn start_background_tasks(&mut self) {
        info!("Starting background maintenance tasks");

        // Stale-session sweep
        self.background_tasks
            .push(self.sessions.start_cleanup_task());

        // Service health metrics
        let health_metrics_task = {
            let metrics_collector = self.metrics_service.collector();
            let sessions = self.sessions.clone();
            let queue = self.queue.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                let start_time = tokio::time::Instant::now();

                while *is_running.read().await {
                    interval.tick().await;

                    let uptime_seconds = start_time.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);
                    metrics_collector.update_health_status(2);
                    metrics_collector.update_component_health("amqp", true);
                    metrics_collector
                        .update_component_health("session_manager", true);

                    debug!(
                        uptime_seconds,
                        active_sessions = sessions.active_session_count(),
                        players_waiting = queue.total_len().unwrap_or(0),
                        "Updated service health metrics"
                    );
                }
            })
        };
        self.background_tasks.push(health_metrics_task);

        // Orphaned queue entries (dead search tasks) are dropped after 5 minutes
        let queue_sweep_task = {
            let queue = self.queue.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));

                while *is_running.read().await {
                    interval.tick().await;

                    let cutoff = crate::utils::current_timestamp() - chrono::Duration::minutes(5);
                    match queue.sweep_expired(cutoff) {
                        Ok(stale) if !stale.is_empty() => {
                            warn!(
                                count = stale.len(),
                                "Swept orphaned queue entries"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Queue sweep failed: {}", e),
                    }
                }
            })
        };
        self.background_tasks.push(queue_sweep_task);

        info!("Background maintenance tasks started");
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks", task_count);
        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        info!("All background tasks stopped");
    }
}
