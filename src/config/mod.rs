//! Configuration management for the match broker
//!
//! Configuration is loaded from an optional TOML file and environment
//! variables, then validated before the service starts.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, HandlerSettings, HistorySettings, MatchSettings,
    NotificationSettings, ServiceSettings,
};
