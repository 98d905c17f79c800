//! Metrics collection using Prometheus

use crate::types::{Mode, ResolutionReason};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the ladder service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service: ServiceMetrics,
    queue: QueueMetrics,
    matches: MatchMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Inbound commands processed, by command name
    pub commands_total: IntCounterVec,

    /// Rejected or failed commands, by error kind
    pub command_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Entrants currently waiting, by mode
    pub queue_depth: IntGaugeVec,

    /// Total queue admissions, by mode
    pub joins_total: IntCounterVec,

    /// Total queue departures, by mode
    pub leaves_total: IntCounterVec,
}

/// Match lifecycle metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches formed, by mode
    pub formed_total: IntCounterVec,

    /// Matches settled, by mode and resolution kind
    pub settled_total: IntCounterVec,

    /// Matches cancelled by vote, by mode
    pub cancelled_total: IntCounterVec,

    /// Settlements reversed, by mode
    pub undone_total: IntCounterVec,

    /// Votes recorded, by mode
    pub votes_total: IntCounterVec,

    /// Dodges confirmed, by mode
    pub dodges_total: IntCounterVec,

    /// Matches currently pending
    pub active_matches: IntGauge,

    /// Settlement write latency
    pub settlement_duration_seconds: Histogram,
}

impl MetricsCollector {
    /// Create a collector with all metric families registered
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let service = ServiceMetrics {
            uptime_seconds: IntGauge::with_opts(Opts::new(
                "ladder_uptime_seconds",
                "Service uptime in seconds",
            ))?,
            commands_total: IntCounterVec::new(
                Opts::new("ladder_commands_total", "Inbound commands processed"),
                &["command"],
            )?,
            command_errors_total: IntCounterVec::new(
                Opts::new("ladder_command_errors_total", "Commands rejected or failed"),
                &["kind"],
            )?,
            health_status: IntGauge::with_opts(Opts::new(
                "ladder_health_status",
                "Health status (0=unhealthy, 1=degraded, 2=healthy)",
            ))?,
        };

        let queue = QueueMetrics {
            queue_depth: IntGaugeVec::new(
                Opts::new("ladder_queue_depth", "Entrants currently waiting"),
                &["mode"],
            )?,
            joins_total: IntCounterVec::new(
                Opts::new("ladder_queue_joins_total", "Queue admissions"),
                &["mode"],
            )?,
            leaves_total: IntCounterVec::new(
                Opts::new("ladder_queue_leaves_total", "Queue departures"),
                &["mode"],
            )?,
        };

        let matches = MatchMetrics {
            formed_total: IntCounterVec::new(
                Opts::new("ladder_matches_formed_total", "Matches formed"),
                &["mode"],
            )?,
            settled_total: IntCounterVec::new(
                Opts::new("ladder_matches_settled_total", "Matches settled"),
                &["mode", "resolution"],
            )?,
            cancelled_total: IntCounterVec::new(
                Opts::new("ladder_matches_cancelled_total", "Matches cancelled by vote"),
                &["mode"],
            )?,
            undone_total: IntCounterVec::new(
                Opts::new("ladder_matches_undone_total", "Settlements reversed"),
                &["mode"],
            )?,
            votes_total: IntCounterVec::new(
                Opts::new("ladder_votes_total", "Votes recorded"),
                &["mode"],
            )?,
            dodges_total: IntCounterVec::new(
                Opts::new("ladder_dodges_confirmed_total", "Dodges confirmed"),
                &["mode"],
            )?,
            active_matches: IntGauge::with_opts(Opts::new(
                "ladder_active_matches",
                "Matches currently pending",
            ))?,
            settlement_duration_seconds: Histogram::with_opts(HistogramOpts::new(
                "ladder_settlement_duration_seconds",
                "Settlement write latency",
            ))?,
        };

        registry.register(Box::new(service.uptime_seconds.clone()))?;
        registry.register(Box::new(service.commands_total.clone()))?;
        registry.register(Box::new(service.command_errors_total.clone()))?;
        registry.register(Box::new(service.health_status.clone()))?;
        registry.register(Box::new(queue.queue_depth.clone()))?;
        registry.register(Box::new(queue.joins_total.clone()))?;
        registry.register(Box::new(queue.leaves_total.clone()))?;
        registry.register(Box::new(matches.formed_total.clone()))?;
        registry.register(Box::new(matches.settled_total.clone()))?;
        registry.register(Box::new(matches.cancelled_total.clone()))?;
        registry.register(Box::new(matches.undone_total.clone()))?;
        registry.register(Box::new(matches.votes_total.clone()))?;
        registry.register(Box::new(matches.dodges_total.clone()))?;
        registry.register(Box::new(matches.active_matches.clone()))?;
        registry.register(Box::new(matches.settlement_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            service,
            queue,
            matches,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.matches
    }

    pub fn record_join(&self, mode: Mode, depth: usize) {
        self.queue.joins_total.with_label_values(&[mode.as_str()]).inc();
        self.queue
            .queue_depth
            .with_label_values(&[mode.as_str()])
            .set(depth as i64);
    }

    pub fn record_leave(&self, mode: Mode, depth: usize) {
        self.queue.leaves_total.with_label_values(&[mode.as_str()]).inc();
        self.queue
            .queue_depth
            .with_label_values(&[mode.as_str()])
            .set(depth as i64);
    }

    pub fn record_match_formed(&self, mode: Mode) {
        self.matches
            .formed_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.matches.active_matches.inc();
        self.queue
            .queue_depth
            .with_label_values(&[mode.as_str()])
            .set(0);
    }

    pub fn record_vote(&self, mode: Mode) {
        self.matches
            .votes_total
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    pub fn record_settled(&self, mode: Mode, reason: &ResolutionReason, duration: Duration) {
        let resolution = match reason {
            ResolutionReason::Majority { .. } => "majority",
            ResolutionReason::FinalCount { .. } => "final_count",
            ResolutionReason::DodgeConfirmed { .. } => "dodge",
        };
        self.matches
            .settled_total
            .with_label_values(&[mode.as_str(), resolution])
            .inc();
        if matches!(reason, ResolutionReason::DodgeConfirmed { .. }) {
            self.matches
                .dodges_total
                .with_label_values(&[mode.as_str()])
                .inc();
        }
        self.matches.active_matches.dec();
        self.matches
            .settlement_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn record_cancelled(&self, mode: Mode) {
        self.matches
            .cancelled_total
            .with_label_values(&[mode.as_str()])
            .inc();
        self.matches.active_matches.dec();
    }

    pub fn record_undone(&self, mode: Mode) {
        self.matches
            .undone_total
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    pub fn record_command(&self, command: &str) {
        self.service
            .commands_total
            .with_label_values(&[command])
            .inc();
    }

    pub fn record_command_error(&self, kind: &str) {
        self.service
            .command_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn update_health_status(&self, status: i64) {
        self.service.health_status.set(status);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("default metric registration cannot conflict")
    }
}
