//! Service-level health checks

use crate::engine::EngineStats;
use crate::error::Result;
use crate::service::app::AppState;
use std::sync::Arc;

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Snapshot of service health and engine activity
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub stats: EngineStats,
    pub uptime_seconds: u64,
}

/// Health check entry points used by the CLI and periodic monitoring
pub struct HealthCheck;

impl HealthCheck {
    /// Full health check with engine statistics
    pub async fn check(app_state: Arc<AppState>) -> Result<HealthReport> {
        let stats = app_state.engine().stats().await;
        let status = if app_state.is_running().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Ok(HealthReport {
            status,
            stats,
            uptime_seconds: app_state.uptime().as_secs(),
        })
    }

    /// Cheap liveness probe
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        Ok(if app_state.is_running().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        })
    }
}
