//! AMQP message handlers for processing player commands
//!
//! This module provides the message handling infrastructure for the game
//! core: command consumption, deserialization, and error handling.

use crate::amqp::messages::{MessageUtils, PlayerCommand};
use crate::error::{ArcadeError, Result};
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Trait defining the interface for handling player commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle one player command
    async fn handle_command(&self, command: PlayerCommand) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: ArcadeError, message_data: &[u8]);
}

/// Consumer for handling player command messages
pub struct CommandConsumer {
    handler: Arc<dyn CommandHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl CommandConsumer {
    /// Create a new command consumer
    pub fn new(handler: Arc<dyn CommandHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("command-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the command queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(CommandDelivery::new(self.handler.clone()), args)
            .await
            .map_err(|e| ArcadeError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming commands from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            ArcadeError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming commands");
        Ok(())
    }
}

/// Internal consumer implementation
struct CommandDelivery {
    handler: Arc<dyn CommandHandler>,
}

impl CommandDelivery {
    fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self { handler }
    }

    async fn process_message(&self, content: &[u8]) -> Result<()> {
        let command = MessageUtils::deserialize_command(content)?;

        debug!(
            player_id = %command.player_id(),
            command = ?command,
            "Player command parsed"
        );

        self.handler.handle_command(command).await?;
        Ok(())
    }
}

#[async_trait]
impl AsyncConsumer for CommandDelivery {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        let start_time = std::time::Instant::now();

        match self.process_message(&content).await {
            Ok(_) => {
                debug!(
                    delivery_tag,
                    processing_ms = start_time.elapsed().as_secs_f64() * 1000.0,
                    "Command processed"
                );
            }
            Err(e) => {
                error!(
                    delivery_tag,
                    processing_ms = start_time.elapsed().as_secs_f64() * 1000.0,
                    error = %e,
                    "Command processing failed"
                );
                self.handler
                    .handle_error(
                        ArcadeError::InternalError {
                            message: e.to_string(),
                        },
                        &content,
                    )
                    .await;
            }
        }
    }
}

/// Mock command handler for testing
pub struct MockCommandHandler {
    pub received_commands: Arc<tokio::sync::Mutex<Vec<PlayerCommand>>>,
}

impl Default for MockCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommandHandler {
    pub fn new() -> Self {
        Self {
            received_commands: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CommandHandler for MockCommandHandler {
    async fn handle_command(&self, command: PlayerCommand) -> Result<()> {
        let mut commands = self.received_commands.lock().await;
        commands.push(command);
        Ok(())
    }

    async fn handle_error(&self, error: ArcadeError, _message_data: &[u8]) {
        eprintln!("Mock handler received error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameType;

    #[tokio::test]
    async fn test_mock_handler() {
        let handler = MockCommandHandler::new();
        let command = PlayerCommand::JoinQueue {
            player_id: "test_player".to_string(),
            display_name: "Test Player".to_string(),
            game_type: GameType::TicTacToe,
            contact: "channel-1".to_string(),
        };

        handler.handle_command(command.clone()).await.unwrap();

        let received = handler.received_commands.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].player_id(), "test_player");
    }
}
