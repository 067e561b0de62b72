//! AMQP event publisher for outbound game events

use crate::amqp::messages::{MessageEnvelope, MessageUtils, GAME_EVENTS_EXCHANGE};
use crate::error::{ArcadeError, Result};
use crate::metrics::MetricsCollector;
use crate::types::{
    ArcadeEvent, ChallengeAccepted, ChallengeIssued, MoveApplied, QueueUpdate, SessionCreated,
    SessionEnded,
};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing game events to the presentation layer
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_session_created(&self, event: SessionCreated) -> Result<()>;

    async fn publish_move_applied(&self, event: MoveApplied) -> Result<()>;

    async fn publish_session_ended(&self, event: SessionEnded) -> Result<()>;

    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()>;

    async fn publish_challenge_issued(&self, event: ChallengeIssued) -> Result<()>;

    async fn publish_challenge_accepted(&self, event: ChallengeAccepted) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: GAME_EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
        }
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
    published_messages: std::sync::Mutex<std::collections::HashSet<String>>, // For deduplication
    metrics: Arc<MetricsCollector>,
}

impl AmqpEventPublisher {
    /// Create a new event publisher
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        // Create a default metrics collector if none provided
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(channel, config, metrics).await
    }

    /// Create a new event publisher with metrics collector
    pub async fn with_metrics(
        channel: Channel,
        config: PublisherConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published_messages: std::sync::Mutex::new(std::collections::HashSet::new()),
            metrics,
        };

        publisher.setup_exchanges().await?;

        Ok(publisher)
    }

    /// Set up the game events exchange
    async fn setup_exchanges(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            ArcadeError::AmqpConnectionFailed {
                message: format!("Failed to declare game events exchange: {}", e),
            }
        })?;

        info!("Successfully set up AMQP exchanges");
        Ok(())
    }

    async fn publish_event(&self, event: ArcadeEvent) -> Result<()> {
        let routing_key = MessageUtils::get_routing_key(&event);
        let envelope = MessageEnvelope::new(event, routing_key.to_string());
        self.publish_with_retry(&envelope).await
    }

    /// Publish with retry logic and correlation-id deduplication
    async fn publish_with_retry(&self, envelope: &MessageEnvelope<ArcadeEvent>) -> Result<()> {
        if self.config.enable_deduplication {
            let published_messages =
                self.published_messages
                    .lock()
                    .map_err(|_| ArcadeError::InternalError {
                        message: "Failed to acquire published messages lock".to_string(),
                    })?;
            if published_messages.contains(&envelope.correlation_id) {
                debug!(
                    "Message {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    if self.config.enable_deduplication {
                        let mut published_messages =
                            self.published_messages.lock().map_err(|_| {
                                ArcadeError::InternalError {
                                    message: "Failed to acquire published messages lock"
                                        .to_string(),
                                }
                            })?;
                        published_messages.insert(envelope.correlation_id.clone());
                    }

                    debug!(
                        "Successfully published message {} with routing key {}",
                        envelope.correlation_id, envelope.routing_key
                    );
                    self.metrics.record_amqp_operation("publish", true);
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        self.metrics.record_amqp_operation("publish", false);
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish(&self, envelope: &MessageEnvelope<ArcadeEvent>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| ArcadeError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }

    /// Clear deduplication cache (useful for testing or memory management)
    pub fn clear_deduplication_cache(&self) {
        if let Ok(mut published_messages) = self.published_messages.lock() {
            published_messages.clear();
        }
    }

    /// Get number of cached message IDs (for monitoring)
    pub fn cached_message_count(&self) -> usize {
        self.published_messages
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_session_created(&self, event: SessionCreated) -> Result<()> {
        self.publish_event(ArcadeEvent::SessionCreated(event)).await
    }

    async fn publish_move_applied(&self, event: MoveApplied) -> Result<()> {
        self.publish_event(ArcadeEvent::MoveApplied(event)).await
    }

    async fn publish_session_ended(&self, event: SessionEnded) -> Result<()> {
        self.publish_event(ArcadeEvent::SessionEnded(event)).await
    }

    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        self.publish_event(ArcadeEvent::QueueUpdate(event)).await
    }

    async fn publish_challenge_issued(&self, event: ChallengeIssued) -> Result<()> {
        self.publish_event(ArcadeEvent::ChallengeIssued(event)).await
    }

    async fn publish_challenge_accepted(&self, event: ChallengeAccepted) -> Result<()> {
        self.publish_event(ArcadeEvent::ChallengeAccepted(event))
            .await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<ArcadeEvent>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<ArcadeEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Get published event type names in order (for testing)
    pub fn get_event_names(&self) -> Vec<&'static str> {
        self.get_published_events()
            .iter()
            .map(|e| match e {
                ArcadeEvent::SessionCreated(_) => "SessionCreated",
                ArcadeEvent::MoveApplied(_) => "MoveApplied",
                ArcadeEvent::SessionEnded(_) => "SessionEnded",
                ArcadeEvent::QueueUpdate(_) => "QueueUpdate",
                ArcadeEvent::ChallengeIssued(_) => "ChallengeIssued",
                ArcadeEvent::ChallengeAccepted(_) => "ChallengeAccepted",
            })
            .collect()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: ArcadeEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_session_created(&self, event: SessionCreated) -> Result<()> {
        self.record(ArcadeEvent::SessionCreated(event));
        Ok(())
    }

    async fn publish_move_applied(&self, event: MoveApplied) -> Result<()> {
        self.record(ArcadeEvent::MoveApplied(event));
        Ok(())
    }

    async fn publish_session_ended(&self, event: SessionEnded) -> Result<()> {
        self.record(ArcadeEvent::SessionEnded(event));
        Ok(())
    }

    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        self.record(ArcadeEvent::QueueUpdate(event));
        Ok(())
    }

    async fn publish_challenge_issued(&self, event: ChallengeIssued) -> Result<()> {
        self.record(ArcadeEvent::ChallengeIssued(event));
        Ok(())
    }

    async fn publish_challenge_accepted(&self, event: ChallengeAccepted) -> Result<()> {
        self.record(ArcadeEvent::ChallengeAccepted(event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameType, QueueStatus};
    use crate::utils;

    #[test]
    fn test_publisher_config_default() {
        let config = PublisherConfig::default();
        assert_eq!(config.exchange_name, GAME_EVENTS_EXCHANGE);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 500);
        assert!(config.enable_deduplication);
    }

    #[tokio::test]
    async fn test_mock_publisher_records_events() {
        let publisher = MockEventPublisher::new();

        publisher
            .publish_queue_update(QueueUpdate {
                player_id: "alice".to_string(),
                game_type: GameType::TicTacToe,
                status: QueueStatus::Searching,
                timestamp: utils::current_timestamp(),
            })
            .await
            .unwrap();

        assert_eq!(publisher.get_event_names(), vec!["QueueUpdate"]);

        publisher.clear_events();
        assert!(publisher.get_published_events().is_empty());
    }

    // Note: Integration tests with an actual AMQP broker would go in tests/
}
