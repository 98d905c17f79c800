//! AMQP event publisher for outbound ladder events

use crate::amqp::messages::{MessageEnvelope, MessageUtils, EVENTS_EXCHANGE};
use crate::error::{LadderError, Result};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Trait for publishing ladder events to the presentation layer
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_player_queued(&self, event: PlayerQueued) -> Result<()>;

    async fn publish_player_left_queue(&self, event: PlayerLeftQueue) -> Result<()>;

    async fn publish_match_formed(&self, event: MatchFormed) -> Result<()>;

    async fn publish_vote_update(&self, event: VoteUpdate) -> Result<()>;

    async fn publish_match_settled(&self, event: MatchSettled) -> Result<()>;

    async fn publish_match_cancelled(&self, event: MatchCancelled) -> Result<()>;

    async fn publish_match_undone(&self, event: MatchUndone) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange: EVENTS_EXCHANGE.to_string(),
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
    published: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl AmqpEventPublisher {
    /// Create a new event publisher and declare its exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published: std::sync::Mutex::new(std::collections::HashSet::new()),
        };

        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            LadderError::AmqpConnectionFailed {
                message: format!("Failed to declare events exchange: {}", e),
            }
        })?;

        info!("Declared AMQP events exchange '{}'", self.config.exchange);
        Ok(())
    }

    /// Publish an event with retry and optional correlation-id dedup
    async fn publish(&self, event: LadderEvent) -> Result<()> {
        let routing_key = MessageUtils::routing_key(&event);
        let envelope = MessageEnvelope::new(event, routing_key.to_string());

        if self.config.enable_deduplication {
            let published = self
                .published
                .lock()
                .map_err(|_| LadderError::InternalError {
                    message: "Failed to acquire published-messages lock".to_string(),
                })?;
            if published.contains(&envelope.correlation_id) {
                debug!(
                    "Event {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(&envelope).await {
                Ok(()) => {
                    if self.config.enable_deduplication {
                        let mut published =
                            self.published
                                .lock()
                                .map_err(|_| LadderError::InternalError {
                                    message: "Failed to acquire published-messages lock"
                                        .to_string(),
                                })?;
                        published.insert(envelope.correlation_id.clone());
                    }

                    debug!(
                        "Published event {} to exchange {} ({})",
                        envelope.correlation_id, self.config.exchange, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish event {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    debug!(
                        "Publish attempt {} failed for event {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<LadderEvent>) -> Result<()> {
        let body = envelope.to_bytes()?;
        let args = BasicPublishArguments::new(&self.config.exchange, &envelope.routing_key);

        self.channel
            .basic_publish(BasicProperties::default(), body, args)
            .await
            .map_err(|e| {
                LadderError::AmqpConnectionFailed {
                    message: format!("Failed to publish event: {}", e),
                }
                .into()
            })
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_player_queued(&self, event: PlayerQueued) -> Result<()> {
        self.publish(LadderEvent::PlayerQueued(event)).await
    }

    async fn publish_player_left_queue(&self, event: PlayerLeftQueue) -> Result<()> {
        self.publish(LadderEvent::PlayerLeftQueue(event)).await
    }

    async fn publish_match_formed(&self, event: MatchFormed) -> Result<()> {
        self.publish(LadderEvent::MatchFormed(event)).await
    }

    async fn publish_vote_update(&self, event: VoteUpdate) -> Result<()> {
        self.publish(LadderEvent::VoteUpdate(event)).await
    }

    async fn publish_match_settled(&self, event: MatchSettled) -> Result<()> {
        self.publish(LadderEvent::MatchSettled(event)).await
    }

    async fn publish_match_cancelled(&self, event: MatchCancelled) -> Result<()> {
        self.publish(LadderEvent::MatchCancelled(event)).await
    }

    async fn publish_match_undone(&self, event: MatchUndone) -> Result<()> {
        self.publish(LadderEvent::MatchUndone(event)).await
    }
}

/// Mock event publisher for tests: records every event in order
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    events: std::sync::Mutex<Vec<LadderEvent>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events in publish order
    pub fn events(&self) -> Vec<LadderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Count recorded events of a given variant name
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| Self::type_name(event) == event_type)
            .count()
    }

    /// The most recent event, if any
    pub fn last_event(&self) -> Option<LadderEvent> {
        self.events().last().cloned()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    fn type_name(event: &LadderEvent) -> &'static str {
        match event {
            LadderEvent::PlayerQueued(_) => "PlayerQueued",
            LadderEvent::PlayerLeftQueue(_) => "PlayerLeftQueue",
            LadderEvent::MatchFormed(_) => "MatchFormed",
            LadderEvent::VoteUpdate(_) => "VoteUpdate",
            LadderEvent::MatchSettled(_) => "MatchSettled",
            LadderEvent::MatchCancelled(_) => "MatchCancelled",
            LadderEvent::MatchUndone(_) => "MatchUndone",
        }
    }

    fn record(&self, event: LadderEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| LadderError::InternalError {
                message: "Failed to acquire mock publisher lock".to_string(),
            })?
            .push(event);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_player_queued(&self, event: PlayerQueued) -> Result<()> {
        self.record(LadderEvent::PlayerQueued(event))
    }

    async fn publish_player_left_queue(&self, event: PlayerLeftQueue) -> Result<()> {
        self.record(LadderEvent::PlayerLeftQueue(event))
    }

    async fn publish_match_formed(&self, event: MatchFormed) -> Result<()> {
        self.record(LadderEvent::MatchFormed(event))
    }

    async fn publish_vote_update(&self, event: VoteUpdate) -> Result<()> {
        self.record(LadderEvent::VoteUpdate(event))
    }

    async fn publish_match_settled(&self, event: MatchSettled) -> Result<()> {
        self.record(LadderEvent::MatchSettled(event))
    }

    async fn publish_match_cancelled(&self, event: MatchCancelled) -> Result<()> {
        self.record(LadderEvent::MatchCancelled(event))
    }

    async fn publish_match_undone(&self, event: MatchUndone) -> Result<()> {
        self.record(LadderEvent::MatchUndone(event))
    }
}
