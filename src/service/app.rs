//! Broker wiring and lifecycle
//!
//! [`AppState`] wires the handler pool, match store, orchestrator and
//! tournament scheduler together, serves the HTTP API and runs the
//! background maintenance tasks.

use crate::api::{ApiServer, ServerConfig};
use crate::config::AppConfig;
use crate::handlers::HandlerPool;
use crate::history::{InMemoryPlayerRepository, MatchHistoryProvider, OpenDotaClient, PlayerRepository};
use crate::matches::{MatchOrchestrator, OrchestratorStats};
use crate::metrics::MetricsCollector;
use crate::network::{GameClient, SimulatedGameClient};
use crate::notify::{
    HttpNotificationPublisher, LogNotificationPublisher, NotificationPublisher, PublisherConfig,
};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::store::{InMemoryMatchStore, MatchRepository, MatchStore};
use crate::tournament::TournamentScheduler;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// External collaborators of the service, replaceable in tests
pub struct ServiceComponents {
    pub clients: Vec<(String, Arc<dyn GameClient>)>,
    pub store: Arc<dyn MatchStore>,
    pub players: Arc<dyn PlayerRepository>,
    pub history: Option<Arc<dyn MatchHistoryProvider>>,
    pub notifier: Arc<dyn NotificationPublisher>,
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    pool: Arc<HandlerPool>,
    orchestrator: MatchOrchestrator,
    scheduler: Arc<TournamentScheduler>,
    metrics: Arc<MetricsCollector>,

    /// HTTP server, once started
    server: Mutex<Option<Arc<ApiServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Initialize the application from configuration
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing match broker service");
        info!(
            "Configuration: service={}, handlers={}, policy={}",
            config.service.name,
            config.handlers.accounts.len(),
            config.handlers.selection_policy
        );

        let components = Self::initialize_components(&config)?;
        Self::with_components(config, components)
    }

    /// Initialize the application around the given collaborators
    pub fn with_components(
        config: AppConfig,
        components: ServiceComponents,
    ) -> Result<Self, ServiceError> {
        let metrics =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let pool = Arc::new(
            HandlerPool::new(components.clients).with_policy(config.handlers.selection_policy),
        );
        if pool.is_empty() {
            return Err(ServiceError::Configuration {
                message: "handler pool is empty".to_string(),
            });
        }

        let mut orchestrator = MatchOrchestrator::new(
            pool.clone(),
            Arc::new(MatchRepository::new(components.store)),
            components.players,
            metrics.clone(),
            config.orchestrator_settings(),
        );
        if let Some(history) = components.history {
            orchestrator = orchestrator.with_history_provider(history);
        }

        let scheduler = Arc::new(TournamentScheduler::new(
            orchestrator.clone(),
            components.notifier,
            metrics.clone(),
            config.notifications.service_name.clone(),
            config.matches.default_game_mode.clone(),
        ));

        info!(
            "Match broker initialized with {} handlers ({} ready)",
            pool.len(),
            pool.ready_count()
        );

        Ok(Self {
            config,
            pool,
            orchestrator,
            scheduler,
            metrics,
            server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    fn initialize_components(config: &AppConfig) -> Result<ServiceComponents, ServiceError> {
        warn!(
            "Game-network handlers run in simulated mode ({} accounts)",
            config.handlers.accounts.len()
        );
        let clients = config
            .handlers
            .accounts
            .iter()
            .map(|account| {
                let client: Arc<dyn GameClient> = Arc::new(SimulatedGameClient::new(account.clone()));
                (account.clone(), client)
            })
            .collect();

        let history = OpenDotaClient::new(
            config.history.opendota_base_url.clone(),
            config.history_timeout(),
        )
        .map_err(|e| ServiceError::Initialization {
            message: format!("Failed to create OpenDota client: {}", e),
        })?;

        let notifier: Arc<dyn NotificationPublisher> = match &config.notifications.endpoint {
            Some(endpoint) => {
                info!("Publishing notifications to {}", endpoint);
                Arc::new(
                    HttpNotificationPublisher::new(endpoint.clone(), PublisherConfig::default())
                        .map_err(|e| ServiceError::Initialization {
                            message: format!("Failed to create notification publisher: {}", e),
                        })?,
                )
            }
            None => {
                info!("No notification endpoint configured, notifications are logged only");
                Arc::new(LogNotificationPublisher)
            }
        };

        Ok(ServiceComponents {
            clients,
            store: Arc::new(InMemoryMatchStore::new()),
            players: Arc::new(InMemoryPlayerRepository::new()),
            history: Some(Arc::new(history)),
            notifier,
        })
    }

    /// Start the HTTP API and background services
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting match broker service");

        // Mark as running
        *self.is_running.write().await = true;

        self.start_api_server().await?;
        self.start_background_tasks()?;

        info!("✅ Match broker service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of match broker");

        // Mark as not running
        *self.is_running.write().await = false;

        let aborted = self.orchestrator.shutdown();
        info!("Aborted {} in-flight match monitors", aborted);

        let server = self
            .server
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Failed to acquire server lock".to_string(),
            })?
            .take();
        if let Some(server) = server {
            server.stop();
        }

        self.stop_background_tasks().await;

        let final_stats = self
            .orchestrator
            .get_stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Match broker shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn pool(&self) -> &Arc<HandlerPool> {
        &self.pool
    }

    pub fn orchestrator(&self) -> &MatchOrchestrator {
        &self.orchestrator
    }

    pub fn scheduler(&self) -> &Arc<TournamentScheduler> {
        &self.scheduler
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn stats(&self) -> crate::error::Result<OrchestratorStats> {
        self.orchestrator.get_stats()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_api_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let server_config = ServerConfig {
            host: self.config.service.host.clone(),
            port: self.config.service.http_port,
        };
        let server = Arc::new(ApiServer::new(server_config, self.clone()));

        let task_server = server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = task_server.start().await {
                error!("HTTP server failed: {}", e);
            } else {
                info!("HTTP server task completed");
            }
        });

        *self
            .server
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "Failed to acquire server lock".to_string(),
            })? = Some(server);
        self.push_task(handle)?;

        info!(
            "✅ HTTP API started on {}:{}",
            self.config.service.host, self.config.service.http_port
        );
        Ok(())
    }

    /// Periodic gauges refreshes; both loops end once the service stops running
    fn start_background_tasks(self: &Arc<Self>) -> Result<(), ServiceError> {
        let app = self.clone();
        self.spawn_periodic("match gauges", Duration::from_secs(15), move || {
            let app = app.clone();
            async move { app.refresh_match_gauges() }
        })?;

        let app = self.clone();
        self.spawn_periodic("health gauges", Duration::from_secs(30), move || {
            let app = app.clone();
            async move { app.refresh_health_gauges().await }
        })?;

        Ok(())
    }

    fn spawn_periodic<F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        tick: F,
    ) -> Result<(), ServiceError>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let is_running = self.is_running.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            debug!("{} refresh every {}s", name, period.as_secs());
            while *is_running.read().await {
                interval.tick().await;
                tick().await;
            }
            debug!("{} refresh ended", name);
        });

        self.push_task(handle)
    }

    fn refresh_match_gauges(&self) {
        match self.orchestrator.get_stats() {
            Ok(stats) => self.metrics.update_from_orchestrator_stats(&stats),
            Err(e) => warn!("Skipping match gauge refresh: {}", e),
        }

        self.metrics.update_handlers_ready(self.pool.ready_count());
        for handler in self.pool.handlers() {
            self.metrics
                .update_handler(handler.id(), handler.active_matches());
        }
    }

    async fn refresh_health_gauges(self: Arc<Self>) {
        self.metrics
            .service()
            .uptime_seconds
            .set(self.uptime().as_secs() as i64);

        let health = match HealthCheck::check(self.clone()).await {
            Ok(health) => health,
            Err(e) => {
                warn!("Skipping health gauge refresh: {}", e);
                return;
            }
        };

        self.metrics.update_health_status(match health.status {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        });
        for check in &health.checks {
            self.metrics
                .update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
        }
    }

    fn push_task(&self, handle: JoinHandle<()>) -> Result<(), ServiceError> {
        self.background_tasks
            .lock()
            .map_err(|_| ServiceError::BackgroundTask {
                message: "task list poisoned".to_string(),
            })?
            .push(handle);
        Ok(())
    }

    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = match self.background_tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => {
                warn!("Task list poisoned, background tasks left running");
                return;
            }
        };

        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            // Cancellation is the expected outcome
            let _ = task.await;
        }
        debug!("Background tasks stopped");
    }
}
