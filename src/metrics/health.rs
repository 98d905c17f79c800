//! Health check endpoints and Prometheus metrics server
//!
//! Provides the HTTP surface of the service: liveness/readiness probes,
//! metrics scraping, engine statistics, and read-only standings queries
//! for the presentation layer.

use crate::engine::MatchEngine;
use crate::metrics::collector::MetricsCollector;
use crate::types::Mode;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub engine: Option<Arc<MatchEngine>>,
}

/// Health server that provides HTTP endpoints for monitoring and queries
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                engine: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the match engine for stats and standings endpoints
    pub fn with_engine(mut self, engine: Arc<MatchEngine>) -> Self {
        self.state.engine = Some(engine);
        self
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Create the Axum router with all endpoints
    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/standings/{mode}", get(standings_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }

        Ok(())
    }
}

fn parse_mode(raw: &str) -> Option<Mode> {
    Mode::ALL.into_iter().find(|mode| mode.as_str() == raw)
}

/// Root endpoint handler - shows service information
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "brawl-ladder",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/metrics",
            "/stats",
            "/standings/{mode}"
        ]
    }))
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    if state.engine.is_some() {
        state.metrics_collector.update_health_status(2);
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "brawl-ladder",
                "version": env!("CARGO_PKG_VERSION")
            })),
        )
    } else {
        state.metrics_collector.update_health_status(0);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "brawl-ladder",
                "version": env!("CARGO_PKG_VERSION"),
                "error": "Engine not initialized"
            })),
        )
    }
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    if state.engine.is_some() {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                error!("Metrics encoding produced invalid UTF-8: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to encode metrics".to_string(),
                )
            }
        },
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
        }
    }
}

/// Engine statistics endpoint handler
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match &state.engine {
        Some(engine) => {
            let stats = engine.stats().await;
            (StatusCode::OK, Json(json!(stats)))
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Engine not initialized" })),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct StandingsQuery {
    limit: Option<usize>,
}

/// Standings query endpoint handler
async fn standings_handler(
    State(state): State<HealthServerState>,
    Path(mode): Path<String>,
    Query(query): Query<StandingsQuery>,
) -> impl IntoResponse {
    let Some(mode) = parse_mode(&mode) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown mode: {}", mode) })),
        );
    };

    let Some(engine) = &state.engine else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Engine not initialized" })),
        );
    };

    match engine.standings(mode, query.limit.unwrap_or(20)) {
        Ok(rows) => (StatusCode::OK, Json(json!({ "mode": mode, "rows": rows }))),
        Err(e) => {
            error!("Standings query failed for {}: {}", mode, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "standings query failed" })),
            )
        }
    }
}
