//! AMQP integration for the ladder service
//!
//! This module handles broker connections, inbound command consumption,
//! and outbound event publishing. The chat presentation layer lives on the
//! other side of the broker; the core only ever sees structured commands
//! and emits structured events.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::CommandHandler;
pub use messages::{LadderCommand, MessageEnvelope};
pub use publisher::{EventPublisher, MockEventPublisher};
