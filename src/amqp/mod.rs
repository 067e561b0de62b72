//! AMQP integration: connection management, message definitions,
//! command consumption, and event publishing

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

pub use connection::AmqpConnection;
pub use handlers::{CommandConsumer, CommandHandler};
pub use messages::{MessageEnvelope, MessageUtils, PlayerCommand};
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher, PublisherConfig};
