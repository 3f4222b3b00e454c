//! Metrics and monitoring for the match broker
//!
//! Prometheus metrics collection and the health, readiness and metrics
//! endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    HandlerMetrics, MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics,
    ServiceMetrics,
};
pub use health::{monitoring_routes, render_metrics, MonitoringState};
