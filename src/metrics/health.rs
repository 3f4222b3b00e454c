//! Monitoring endpoints: probes, Prometheus scrape and broker statistics
//!
//! Served on the same listener as the match API; see
//! [`crate::api::ApiServer`].

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

const SERVICE_NAME: &str = "match-broker";

/// State shared by the monitoring routes
#[derive(Clone)]
pub struct MonitoringState {
    pub metrics: Arc<MetricsCollector>,
    /// Absent until the service is wired; every probe then reports unavailable
    pub app: Option<Arc<AppState>>,
}

impl MonitoringState {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics, app: None }
    }

    pub fn with_app(mut self, app: Arc<AppState>) -> Self {
        self.app = Some(app);
        self
    }
}

/// The three probe flavours exposed to orchestrators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Health,
    Ready,
    Alive,
}

impl Probe {
    fn name(self) -> &'static str {
        match self {
            Probe::Health => "health",
            Probe::Ready => "ready",
            Probe::Alive => "alive",
        }
    }

    async fn evaluate(self, app: Arc<AppState>) -> Result<HealthStatus> {
        match self {
            Probe::Health | Probe::Alive => HealthCheck::liveness_check(app).await,
            Probe::Ready => HealthCheck::readiness_check(app).await,
        }
    }

    /// Liveness only passes when fully healthy; the others tolerate degradation
    fn passes(self, status: HealthStatus) -> bool {
        match self {
            Probe::Alive => status == HealthStatus::Healthy,
            Probe::Health | Probe::Ready => status != HealthStatus::Unhealthy,
        }
    }
}

/// Router with `/health`, `/ready`, `/alive`, `/metrics` and `/stats`
pub fn monitoring_routes(state: MonitoringState) -> Router {
    Router::new()
        .route("/health", get(|s: State<MonitoringState>| probe(s, Probe::Health)))
        .route("/ready", get(|s: State<MonitoringState>| probe(s, Probe::Ready)))
        .route("/alive", get(|s: State<MonitoringState>| probe(s, Probe::Alive)))
        .route("/metrics", get(scrape))
        .route("/stats", get(broker_stats))
        .with_state(state)
}

async fn probe(State(state): State<MonitoringState>, kind: Probe) -> (StatusCode, Json<Value>) {
    debug!("{} probe requested", kind.name());

    let Some(app) = state.app else {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(not_wired()));
    };

    let status = match kind.evaluate(app.clone()).await {
        Ok(status) => status,
        Err(e) => {
            error!("{} probe failed: {}", kind.name(), e);
            HealthStatus::Unhealthy
        }
    };

    let code = if kind.passes(status) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let pool = app.pool();
    (
        code,
        Json(json!({
            "probe": kind.name(),
            "status": status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "handlersReady": pool.ready_count(),
            "handlersTotal": pool.len()
        })),
    )
}

async fn scrape(State(state): State<MonitoringState>) -> Response {
    match render_metrics(&state.metrics) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Metrics scrape failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

async fn broker_stats(State(state): State<MonitoringState>) -> (StatusCode, Json<Value>) {
    let Some(app) = state.app else {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(not_wired()));
    };

    let health = match HealthCheck::check(app.clone()).await {
        Ok(health) => health,
        Err(e) => {
            error!("Failed to assemble broker stats: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": SERVICE_NAME,
                    "error": e.to_string(),
                    "timestamp": chrono::Utc::now()
                })),
            );
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "service": {
                "name": health.service,
                "version": health.version,
                "status": health.status,
                "uptimeSeconds": health.stats.uptime_seconds
            },
            "handlers": {
                "ready": health.stats.handlers_ready,
                "total": health.stats.handlers_total,
                "policy": app.pool().policy()
            },
            "matches": app.stats().ok(),
            "components": health.checks,
            "timestamp": chrono::Utc::now()
        })),
    )
}

fn not_wired() -> Value {
    json!({
        "status": HealthStatus::Unhealthy,
        "service": SERVICE_NAME,
        "error": "service not initialized"
    })
}

/// Encode every registered metric in the Prometheus text format
pub fn render_metrics(metrics: &MetricsCollector) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metrics.registry().gather(), &mut buffer)
        .context("encoding metric families")?;
    String::from_utf8(buffer).context("metric text is not UTF-8")
}
