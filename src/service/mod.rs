//! Service layer for the match broker
//!
//! Application state, health checks and background task management for the
//! running service.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceComponents, ServiceError};
pub use health::{HealthCheck, HealthStatus};
