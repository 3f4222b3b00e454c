//! Match broker service binary
//!
//! Resolves configuration (file, environment, then flags), installs the
//! tracing subscriber and runs the broker until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use match_broker::config::{validate_config, AppConfig};
use match_broker::handlers::SelectionPolicy;
use match_broker::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Schedules matches onto game-network bot handlers and tracks them to completion
#[derive(Debug, Parser)]
#[command(
    name = "match-broker",
    version,
    about = "Match lifecycle orchestrator over a pool of game-network bot handlers",
    long_about = "Opens a lobby per scheduled match on one of the configured bot handlers, \
                  cancels lobbies whose players never show up and resolves results for \
                  API clients and tournament brackets."
)]
struct Args {
    /// TOML configuration file; environment variables still apply on top
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start the broker, print its health report and exit non-zero unless healthy
    #[arg(long)]
    health_check: bool,

    /// Tracing filter, e.g. `info` or `match_broker=debug`
    #[arg(short, long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Port of the API listener
    #[arg(long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Bot accounts, one handler each
    #[arg(long, value_name = "ACCOUNTS", value_delimiter = ',')]
    accounts: Option<Vec<String>>,

    /// How new matches pick a handler: first, round_robin or least_loaded
    #[arg(long, value_name = "POLICY")]
    selection_policy: Option<SelectionPolicy>,

    /// Seconds a lobby may wait for its players before it is cancelled
    #[arg(long, value_name = "SECONDS")]
    time_to_cancel: Option<u64>,

    /// Shorthand for `--log-level debug`
    #[arg(short, long)]
    debug: bool,

    /// Resolve and validate the configuration, then exit
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Flags win over the file and the environment
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(filter) = &self.log_level {
            config.service.log_level = filter.clone();
        }
        if self.debug {
            config.service.log_level = "debug".to_string();
        }
        if let Some(port) = self.http_port {
            config.service.http_port = port;
        }
        if let Some(accounts) = &self.accounts {
            config.handlers.accounts = accounts.clone();
        }
        if let Some(policy) = self.selection_policy {
            config.handlers.selection_policy = policy;
        }
        if let Some(seconds) = self.time_to_cancel {
            config.matches.time_to_cancel_seconds = seconds;
        }
    }

    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AppConfig::from_env()?,
        };
        self.apply_overrides(&mut config);
        validate_config(&config)?;
        Ok(config)
    }
}

fn install_tracing(filter: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("tracing subscriber already installed: {}", e))
}

fn log_effective_config(config: &AppConfig) {
    info!("🎮 Match Broker v{}", match_broker::VERSION);
    info!("   Service: {} (log filter {})", config.service.name, config.service.log_level);
    info!("   Listening on {}:{}", config.service.host, config.service.http_port);
    info!(
        "   Handlers: {} [{}] via {}",
        config.handlers.accounts.len(),
        config.handlers.accounts.join(", "),
        config.handlers.selection_policy
    );
    info!(
        "   Lobby deadline: {}s, poll every {}ms",
        config.matches.time_to_cancel_seconds, config.matches.lobby_poll_interval_ms
    );
    info!(
        "   Notifications: {}",
        config.notifications.endpoint.as_deref().unwrap_or("log only")
    );
}

/// Boot the broker once, report its health and tear it down again
async fn report_health(config: AppConfig) -> Result<ExitCode> {
    let app = Arc::new(AppState::new(config).await?);
    app.start().await?;
    let report = HealthCheck::check(app.clone()).await;
    app.shutdown().await?;

    let health = match report {
        Ok(health) => health,
        Err(e) => {
            error!("Health check could not run: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("{} {}", health.service, health.status);
    for check in &health.checks {
        match &check.message {
            Some(message) => println!("  {:<16} {} ({})", check.name, check.status, message),
            None => println!("  {:<16} {}", check.name, check.status),
        }
    }
    println!(
        "  handlers ready   {}/{}",
        health.stats.handlers_ready, health.stats.handlers_total
    );

    Ok(if health.status == HealthStatus::Healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn shutdown_requested() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("SIGINT received"),
        _ = terminate => info!("SIGTERM received"),
    }
}

async fn serve(config: AppConfig) -> Result<ExitCode> {
    let app = match AppState::new(config.clone()).await {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!("Broker wiring failed: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Err(e) = app.start().await {
        error!("Broker failed to start: {}", e);
        return Ok(ExitCode::FAILURE);
    }
    info!("✅ Accepting matches, Ctrl+C to stop");

    shutdown_requested().await;

    let in_flight = app.stats().map(|stats| stats.in_flight).unwrap_or(0);
    info!("🛑 Stopping, {} match monitors will be aborted", in_flight);

    match tokio::time::timeout(config.shutdown_timeout(), app.shutdown()).await {
        Ok(Ok(())) => info!("Broker stopped cleanly"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!(
            "Shutdown exceeded {}s, exiting anyway",
            config.service.shutdown_timeout_seconds
        ),
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Err(e) = install_tracing(&config.service.log_level) {
        eprintln!("{}", e);
        return Ok(ExitCode::FAILURE);
    }

    if args.health_check {
        return report_health(config).await;
    }

    log_effective_config(&config);
    if args.dry_run {
        info!("Configuration is valid, dry run complete");
        return Ok(ExitCode::SUCCESS);
    }

    serve(config).await
}
