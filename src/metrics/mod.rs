//! Metrics and monitoring for the ladder service
//!
//! This module provides Prometheus metrics collection and the HTTP
//! endpoints for health checks, readiness, metrics scraping, and
//! standings queries.

pub mod collector;
pub mod health;

pub use collector::{MatchMetrics, MetricsCollector, QueueMetrics, ServiceMetrics};
pub use health::{HealthServer, HealthServerConfig};

use std::sync::Arc;

/// Unified metrics service combining collection and HTTP exposure
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn health_server(&self) -> Arc<HealthServer> {
        self.health_server.clone()
    }

    /// Start the HTTP endpoints
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    /// Stop the HTTP endpoints
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
