//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the match
//! engine to its AMQP edge, metrics endpoints, and background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{CommandConsumer, CommandHandler};
use crate::amqp::messages::LadderCommand;
use crate::amqp::publisher::{AmqpEventPublisher, PublisherConfig};
use crate::config::AppConfig;
use crate::engine::MatchEngine;
use crate::error::{LadderError, Result as LadderResult};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
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
}

/// Production command handler that dispatches to the match engine
struct EngineCommandHandler {
    engine: Arc<MatchEngine>,
    metrics: Arc<MetricsCollector>,
}

impl EngineCommandHandler {
    fn new(engine: Arc<MatchEngine>, metrics: Arc<MetricsCollector>) -> Self {
        Self { engine, metrics }
    }

    fn command_name(command: &LadderCommand) -> &'static str {
        match command {
            LadderCommand::JoinQueue { .. } => "join_queue",
            LadderCommand::LeaveQueue { .. } => "leave_queue",
            LadderCommand::CastVote { .. } => "cast_vote",
            LadderCommand::ReportDodge { .. } => "report_dodge",
            LadderCommand::CreateTeam { .. } => "create_team",
            LadderCommand::DissolveTeam { .. } => "dissolve_team",
            LadderCommand::UndoLast { .. } => "undo_last",
        }
    }
}

#[async_trait]
impl CommandHandler for EngineCommandHandler {
    async fn handle_command(&self, command: LadderCommand) -> LadderResult<()> {
        let name = Self::command_name(&command);
        self.metrics.record_command(name);

        let start = Instant::now();
        let result = match command {
            LadderCommand::JoinQueue {
                mode,
                player_id,
                display_name,
            } => self
                .engine
                .join_queue(mode, &player_id, &display_name)
                .await
                .map(|_| ()),
            LadderCommand::LeaveQueue { mode, player_id } => self
                .engine
                .leave_queue(mode, &player_id)
                .await
                .map(|_| ()),
            LadderCommand::CastVote {
                match_id,
                voter,
                choice,
            } => self
                .engine
                .cast_vote(match_id, &voter, choice)
                .await
                .map(|_| ()),
            LadderCommand::ReportDodge {
                match_id,
                accuser,
                accused,
            } => self
                .engine
                .report_dodge(match_id, &accuser, &accused)
                .await
                .map(|_| ()),
            LadderCommand::CreateTeam {
                name,
                captain,
                second,
                third,
            } => self
                .engine
                .create_team(&name, &captain, &second, &third)
                .map(|_| ()),
            LadderCommand::DissolveTeam {
                team_id,
                requested_by,
            } => self
                .engine
                .dissolve_team(team_id, &requested_by)
                .await
                .map(|_| ()),
            LadderCommand::UndoLast { mode, requested_by } => {
                info!("Undo requested for {} by {}", mode, requested_by);
                self.engine.undo_last(mode).await.map(|_| ())
            }
        };

        debug!(
            "Command {} handled in {:.2}ms",
            name,
            start.elapsed().as_secs_f64() * 1000.0
        );
        result
    }

    async fn handle_error(&self, error: LadderError, message_data: &[u8]) {
        let kind = match &error {
            LadderError::NotFound { .. } => "not_found",
            LadderError::AlreadyInProgress { .. } => "already_in_progress",
            LadderError::InvalidParticipant { .. } => "invalid_participant",
            LadderError::ValidationError { .. } => "validation",
            LadderError::StorageFailure { .. } => "storage",
            LadderError::AmqpConnectionFailed { .. } => "amqp",
            LadderError::ConfigurationError { .. } => "configuration",
            LadderError::InternalError { .. } => "internal",
        };
        self.metrics.record_command_error(kind);

        warn!(
            "Command rejected ({}) - size: {} bytes, reason: {}",
            kind,
            message_data.len(),
            error
        );
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core match engine
    engine: Arc<MatchEngine>,

    /// AMQP connection for command handling
    amqp_connection: Arc<AmqpConnection>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// AMQP consumer for inbound commands
    command_consumer: Option<CommandConsumer>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    /// Startup instant for uptime reporting
    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing brawl-ladder matchmaking service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        // AMQP connection
        let amqp_config = AmqpConfig::from_url(&config.amqp.url).map_err(|e| {
            ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            }
        })?;
        let amqp_connection = Arc::new(AmqpConnection::new(amqp_config).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            }
        })?);

        // Metrics collector
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        // Event publisher over its own channel
        let publisher_channel = amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to open AMQP channel: {}", e),
            })?;
        let publisher_config = PublisherConfig {
            exchange: config.amqp.events_exchange.clone(),
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
            ..Default::default()
        };
        let event_publisher = Arc::new(
            AmqpEventPublisher::new(publisher_channel, publisher_config)
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to initialize event publisher: {}", e),
                })?,
        );

        // Match engine over the in-memory reference stores
        let engine = Arc::new(
            MatchEngine::with_in_memory_stores(
                config.rating.clone(),
                event_publisher,
                metrics_collector.clone(),
            )
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize match engine: {}", e),
            })?,
        );

        // Health and metrics endpoints
        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_engine(engine.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            config,
            engine,
            amqp_connection,
            metrics_service,
            background_tasks: Vec::new(),
            command_consumer: None,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start all background services and command consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting brawl-ladder matchmaking service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_command_consumption().await?;
        self.start_background_tasks();

        info!("Brawl-ladder matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of brawl-ladder service");

        *self.is_running.write().await = false;

        if let Some(consumer) = &self.command_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            }
        }

        let task_count = self.background_tasks.len();
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        debug!("Aborted {} background tasks", task_count);

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        let final_stats = self.engine.stats().await;
        info!("Final service statistics: {:?}", final_stats);
        info!("Brawl-ladder service shutdown completed");

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn engine(&self) -> Arc<MatchEngine> {
        self.engine.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    pub fn amqp_connection(&self) -> Arc<AmqpConnection> {
        self.amqp_connection.clone()
    }

    /// Time since initialization
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.metrics_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        });
        self.background_tasks.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Metrics and health endpoints started on port {}", port);
        Ok(())
    }

    async fn start_command_consumption(&mut self) -> Result<(), ServiceError> {
        let channel = self
            .amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        let queue_name = self.config.amqp.command_queue.clone();
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

        let handler = Arc::new(EngineCommandHandler::new(
            self.engine.clone(),
            self.metrics_service.collector(),
        ));
        let consumer = CommandConsumer::new(handler, channel);

        consumer
            .start_consuming(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming commands: {}", e),
            })?;

        self.command_consumer = Some(consumer);

        info!("Listening for ladder commands on queue '{}'", queue_name);
        Ok(())
    }

    fn start_background_tasks(&mut self) {
        // Uptime metric task
        let uptime_task = {
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));

                while *is_running.read().await {
                    interval.tick().await;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(started_at.elapsed().as_secs() as i64);
                    metrics_collector.update_health_status(2);
                }
            })
        };

        // Finished-match cleanup task
        let cleanup_task = {
            let engine = self.engine.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(300));

                while *is_running.read().await {
                    interval.tick().await;
                    let removed = engine.cleanup_terminal_matches().await;
                    if removed > 0 {
                        debug!("Match registry cleanup removed {} entries", removed);
                    }
                }
            })
        };

        self.background_tasks.push(uptime_task);
        self.background_tasks.push(cleanup_task);

        info!("Background maintenance tasks started");
    }
}
