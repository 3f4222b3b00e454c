//! Main application configuration
//!
//! Defaults, overridden by an optional TOML file, overridden by environment
//! variables. Command-line flags are applied on top in `main`.

use crate::handlers::SelectionPolicy;
use crate::history::opendota::DEFAULT_OPENDOTA_URL;
use crate::matches::{MonitorSettings, OrchestratorSettings};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub handlers: HandlerSettings,
    pub matches: MatchSettings,
    pub history: HistorySettings,
    pub notifications: NotificationSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging, metrics and notifications
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP API binds to
    pub host: String,
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Game-network handler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerSettings {
    /// Bot account names, one handler each
    pub accounts: Vec<String>,
    pub selection_policy: SelectionPolicy,
}

/// Match lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Time players have to launch a lobby before it is cancelled
    pub time_to_cancel_seconds: u64,
    pub lobby_poll_interval_ms: u64,
    /// Game mode used for tournament lobbies
    pub default_game_mode: String,
    pub max_history_limit: usize,
}

/// External match-history service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub opendota_base_url: String,
    pub request_timeout_seconds: u64,
}

/// Notification delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Notification service endpoint; notifications are only logged when unset
    pub endpoint: Option<String>,
    /// Service name stamped on outgoing notifications
    pub service_name: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "match-broker".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            accounts: vec!["bot-0".to_string()],
            selection_policy: SelectionPolicy::First,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            time_to_cancel_seconds: 600, // 10 minutes
            lobby_poll_interval_ms: 5000,
            default_game_mode: "captains_mode".to_string(),
            max_history_limit: 20,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            opendota_base_url: DEFAULT_OPENDOTA_URL.to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_name: "match-broker".to_string(),
        }
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = parse_env("HTTP_PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = parse_env("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Handler settings
        if let Ok(accounts) = env::var("HANDLER_ACCOUNTS") {
            self.handlers.accounts = accounts
                .split(',')
                .map(str::trim)
                .filter(|account| !account.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(policy) = env::var("HANDLER_SELECTION_POLICY") {
            self.handlers.selection_policy = policy
                .parse()
                .map_err(|e: String| anyhow!("Invalid HANDLER_SELECTION_POLICY value: {}", e))?;
        }

        // Match settings
        if let Ok(seconds) = env::var("TIME_TO_CANCEL_SECONDS") {
            self.matches.time_to_cancel_seconds = parse_env("TIME_TO_CANCEL_SECONDS", &seconds)?;
        }
        if let Ok(interval) = env::var("LOBBY_POLL_INTERVAL_MS") {
            self.matches.lobby_poll_interval_ms = parse_env("LOBBY_POLL_INTERVAL_MS", &interval)?;
        }
        if let Ok(mode) = env::var("DEFAULT_GAME_MODE") {
            self.matches.default_game_mode = mode;
        }
        if let Ok(limit) = env::var("MAX_HISTORY_LIMIT") {
            self.matches.max_history_limit = parse_env("MAX_HISTORY_LIMIT", &limit)?;
        }

        // History settings
        if let Ok(url) = env::var("OPENDOTA_BASE_URL") {
            self.history.opendota_base_url = url;
        }
        if let Ok(timeout) = env::var("HISTORY_REQUEST_TIMEOUT_SECONDS") {
            self.history.request_timeout_seconds =
                parse_env("HISTORY_REQUEST_TIMEOUT_SECONDS", &timeout)?;
        }

        // Notification settings
        if let Ok(endpoint) = env::var("NOTIFICATION_ENDPOINT") {
            self.notifications.endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        if let Ok(name) = env::var("NOTIFICATION_SERVICE_NAME") {
            self.notifications.service_name = name;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history.request_timeout_seconds)
    }

    /// Orchestrator settings derived from the match section
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            monitor: MonitorSettings {
                time_to_cancel: Duration::from_secs(self.matches.time_to_cancel_seconds),
                poll_interval: Duration::from_millis(self.matches.lobby_poll_interval_ms),
            },
            max_history_limit: self.matches.max_history_limit,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.handlers.accounts.is_empty() {
        return Err(anyhow!("At least one handler account is required"));
    }

    // Validate match settings
    if config.matches.time_to_cancel_seconds == 0 {
        return Err(anyhow!("Time to cancel must be greater than 0"));
    }
    if config.matches.lobby_poll_interval_ms == 0 {
        return Err(anyhow!("Lobby poll interval must be greater than 0"));
    }
    if config.matches.max_history_limit == 0 {
        return Err(anyhow!("Max history limit must be greater than 0"));
    }

    if config.history.opendota_base_url.is_empty() {
        return Err(anyhow!("OpenDota base URL cannot be empty"));
    }
    if config.history.request_timeout_seconds == 0 {
        return Err(anyhow!("History request timeout must be greater than 0"));
    }

    Ok(())
}
