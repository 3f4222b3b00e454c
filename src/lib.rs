//! Match Broker - match lifecycle orchestration over game-network bot handlers
//!
//! This crate schedules matches onto a pool of bot handlers, supervises a
//! monitoring task per match until its lobby launches or is cancelled, and
//! resolves match status for clients. Tournament brackets are scheduled in
//! batches on top of the same orchestrator.

pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod matches;
pub mod metrics;
pub mod network;
pub mod notify;
pub mod service;
pub mod store;
pub mod tournament;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{BrokerError, ErrorKind, Result};
pub use types::*;

// Re-export key components
pub use handlers::{HandlerPool, SelectionPolicy};
pub use matches::{MatchInfo, MatchOrchestrator, MatchView};
pub use network::GameClient;
pub use tournament::TournamentScheduler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
