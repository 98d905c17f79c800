//! AMQP message handlers for processing inbound ladder commands
//!
//! Each inbound command maps 1:1 to a core engine operation. The consumer
//! deserializes, validates, and dispatches; rejected commands carry a
//! distinguishable reason back into the error handler so the presentation
//! layer can explain the refusal.

use crate::amqp::messages::{LadderCommand, MessageUtils};
use crate::error::{LadderError, Result};
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Trait defining the interface for handling inbound commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a validated ladder command
    async fn handle_command(&self, command: LadderCommand) -> Result<()>;

    /// Handle processing errors (malformed payloads, rejected commands)
    async fn handle_error(&self, error: LadderError, message_data: &[u8]);
}

/// Consumer wrapper for the command queue
pub struct CommandConsumer {
    handler: Arc<dyn CommandHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl CommandConsumer {
    /// Create a new command consumer
    pub fn new(handler: Arc<dyn CommandHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("ladder-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming commands from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(InnerConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| LadderError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming commands from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming commands
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel
            .basic_cancel(args)
            .await
            .map_err(|e| LadderError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            })?;

        info!("Stopped consuming commands");
        Ok(())
    }
}

/// Internal consumer implementation
struct InnerConsumer {
    handler: Arc<dyn CommandHandler>,
}

impl InnerConsumer {
    fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self { handler }
    }

    async fn process_message(&self, content: &[u8]) -> Result<()> {
        let command = MessageUtils::deserialize_command(content)?;
        self.handler.handle_command(command).await
    }
}

#[async_trait]
impl AsyncConsumer for InnerConsumer {
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
            Ok(()) => {
                info!(
                    "Command processed - delivery_tag: {}, time: {:.2}ms",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                warn!(
                    "Command rejected - delivery_tag: {}, time: {:.2}ms, reason: {}",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0,
                    e
                );
                let ladder_error = match e.downcast::<LadderError>() {
                    Ok(err) => err,
                    Err(other) => LadderError::InternalError {
                        message: other.to_string(),
                    },
                };
                self.handler.handle_error(ladder_error, &content).await;
            }
        }
    }
}

/// Dead letter tracking for commands that keep failing
pub struct DeadLetterHandler {
    retry_attempts: std::collections::HashMap<String, u32>,
    max_retries: u32,
}

impl DeadLetterHandler {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retry_attempts: std::collections::HashMap::new(),
            max_retries,
        }
    }

    /// Track a failed command; returns true while retrying is worthwhile
    pub fn should_retry(&mut self, message_id: String, error: &LadderError) -> bool {
        let retry_count = self.retry_attempts.entry(message_id.clone()).or_insert(0);
        *retry_count += 1;

        if *retry_count <= self.max_retries {
            warn!(
                "Command {} failed (attempt {}), will retry: {}",
                message_id, retry_count, error
            );
            true
        } else {
            error!(
                "Command {} exceeded max retries ({}), dropping: {}",
                message_id, self.max_retries, error
            );
            self.retry_attempts.remove(&message_id);
            false
        }
    }
}
