//! Metrics collection using Prometheus
//!
//! Match lifecycle, handler pool and game-network call metrics for the
//! match broker, registered under the `match_broker_` prefix.

use crate::matches::orchestrator::OrchestratorStats;
use crate::matches::monitor::MonitorOutcome;
use crate::types::{HandlerId, MatchStatus};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the match broker
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Match lifecycle metrics
    match_metrics: MatchMetrics,

    /// Handler pool metrics
    handler_metrics: HandlerMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Notifications published, by status
    pub notifications_total: IntCounterVec,
}

/// Match lifecycle metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches scheduled, by kind (single or tournament)
    pub matches_scheduled_total: IntCounterVec,

    /// Monitoring outcomes (converted, cancelled, failed)
    pub matches_resolved_total: IntCounterVec,

    /// Matches finished through a status query
    pub matches_finished_total: IntCounter,

    /// Matches with a live monitoring task
    pub matches_in_flight: IntGauge,

    /// Status queries by stored status
    pub status_queries_total: IntCounterVec,

    /// Lobby invites sent, by status
    pub invites_total: IntCounterVec,

    /// Tournament descriptors processed, by outcome
    pub tournament_descriptors_total: IntCounterVec,
}

/// Handler pool metrics
#[derive(Clone)]
pub struct HandlerMetrics {
    /// Handlers currently connected
    pub handlers_ready: IntGauge,

    /// Matches owned by each handler
    pub handler_active_matches: IntGaugeVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Game-network call durations
    pub game_network_duration: HistogramVec,

    /// Time from lobby creation until the lobby launches a match
    pub lobby_conversion_duration: Histogram,

    /// Match-history lookup durations by source
    pub history_fetch_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let handler_metrics = HandlerMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            match_metrics,
            handler_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get handler metrics
    pub fn handlers(&self) -> &HandlerMetrics {
        &self.handler_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from orchestrator stats
    pub fn update_from_orchestrator_stats(&self, stats: &OrchestratorStats) {
        self.match_metrics
            .matches_in_flight
            .set(stats.in_flight as i64);
    }

    /// Record a match being scheduled
    pub fn record_match_scheduled(&self, tournament: bool) {
        let kind = if tournament { "tournament" } else { "single" };
        self.match_metrics
            .matches_scheduled_total
            .with_label_values(&[kind])
            .inc();
        self.match_metrics.matches_in_flight.inc();
    }

    /// Record the end of a monitoring task
    pub fn record_monitor_outcome(&self, outcome: &MonitorOutcome) {
        self.match_metrics
            .matches_resolved_total
            .with_label_values(&[outcome.label()])
            .inc();
        self.match_metrics.matches_in_flight.dec();
    }

    /// Record a match transitioning to finished
    pub fn record_match_finished(&self) {
        self.match_metrics.matches_finished_total.inc();
    }

    /// Record a status query against a stored record
    pub fn record_status_query(&self, status: MatchStatus) {
        self.match_metrics
            .status_queries_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// Record a lobby invite
    pub fn record_invite(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.match_metrics
            .invites_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record the outcome of one tournament descriptor
    pub fn record_tournament_descriptor(&self, outcome: &str) {
        self.match_metrics
            .tournament_descriptors_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a published notification
    pub fn record_notification(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.service_metrics
            .notifications_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record a game-network call
    pub fn record_game_network_call(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.performance_metrics
            .game_network_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    /// Record how long a lobby took to launch
    pub fn record_lobby_conversion(&self, duration: Duration) {
        self.performance_metrics
            .lobby_conversion_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a match-history lookup
    pub fn record_history_fetch(&self, source: &str, duration: Duration) {
        self.performance_metrics
            .history_fetch_duration
            .with_label_values(&[source])
            .observe(duration.as_secs_f64());
    }

    /// Update handler pool gauges
    pub fn update_handler(&self, handler_id: HandlerId, active_matches: usize) {
        self.handler_metrics
            .handler_active_matches
            .with_label_values(&[&handler_id.to_string()])
            .set(active_matches as i64);
    }

    pub fn update_handlers_ready(&self, ready: usize) {
        self.handler_metrics.handlers_ready.set(ready as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("match_broker_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "match_broker_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("match_broker_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "match_broker_notifications_total",
                "Notifications published",
            ),
            &["status"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            notifications_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_scheduled_total = IntCounterVec::new(
            Opts::new(
                "match_broker_matches_scheduled_total",
                "Total matches scheduled",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(matches_scheduled_total.clone()))?;

        let matches_resolved_total = IntCounterVec::new(
            Opts::new(
                "match_broker_matches_resolved_total",
                "Monitoring task outcomes",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(matches_resolved_total.clone()))?;

        let matches_finished_total = IntCounter::new(
            "match_broker_matches_finished_total",
            "Matches observed finished",
        )?;
        registry.register(Box::new(matches_finished_total.clone()))?;

        let matches_in_flight = IntGauge::new(
            "match_broker_matches_in_flight",
            "Matches with a live monitoring task",
        )?;
        registry.register(Box::new(matches_in_flight.clone()))?;

        let status_queries_total = IntCounterVec::new(
            Opts::new(
                "match_broker_status_queries_total",
                "Match status queries by stored status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(status_queries_total.clone()))?;

        let invites_total = IntCounterVec::new(
            Opts::new("match_broker_invites_total", "Lobby invites sent"),
            &["status"],
        )?;
        registry.register(Box::new(invites_total.clone()))?;

        let tournament_descriptors_total = IntCounterVec::new(
            Opts::new(
                "match_broker_tournament_descriptors_total",
                "Tournament match descriptors processed",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(tournament_descriptors_total.clone()))?;

        Ok(Self {
            matches_scheduled_total,
            matches_resolved_total,
            matches_finished_total,
            matches_in_flight,
            status_queries_total,
            invites_total,
            tournament_descriptors_total,
        })
    }
}

impl HandlerMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let handlers_ready =
            IntGauge::new("match_broker_handlers_ready", "Connected session handlers")?;
        registry.register(Box::new(handlers_ready.clone()))?;

        let handler_active_matches = IntGaugeVec::new(
            Opts::new(
                "match_broker_handler_active_matches",
                "Matches owned by each handler",
            ),
            &["handler"],
        )?;
        registry.register(Box::new(handler_active_matches.clone()))?;

        Ok(Self {
            handlers_ready,
            handler_active_matches,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let game_network_duration = HistogramVec::new(
            HistogramOpts::new(
                "match_broker_game_network_duration_seconds",
                "Game-network call duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(game_network_duration.clone()))?;

        let lobby_conversion_duration = Histogram::with_opts(
            HistogramOpts::new(
                "match_broker_lobby_conversion_duration_seconds",
                "Time until a lobby launches a match",
            )
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(lobby_conversion_duration.clone()))?;

        let history_fetch_duration = HistogramVec::new(
            HistogramOpts::new(
                "match_broker_history_fetch_duration_seconds",
                "Match history lookup duration",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["source"],
        )?;
        registry.register(Box::new(history_fetch_duration.clone()))?;

        Ok(Self {
            game_network_duration,
            lobby_conversion_duration,
            history_fetch_duration,
        })
    }
}
