//! Tournament bracket scheduling
//!
//! Bracket descriptors arrive in batches from the tournament service. Each
//! one becomes a match plan keyed by its bracket index and is scheduled on
//! its own; the players are then notified.

pub mod plan;
pub mod scheduler;

pub use plan::{plan_from_descriptor, server_region};
pub use scheduler::{BracketScheduleOutcome, ScheduleResult, TournamentScheduler};
