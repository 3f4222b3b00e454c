//! Error types for the match broker
//!
//! Core operations return [`BrokerError`] so callers can tell "not found"
//! apart from upstream failures and invariant violations. Service wiring and
//! configuration loading use `anyhow` on top of this.

use crate::types::MatchStatus;
use std::fmt::Display;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Broad classification of a [`BrokerError`], used to pick a response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Upstream,
    InvariantViolation,
    Conflict,
    Unavailable,
    InvalidRequest,
    Internal,
}

/// Custom error types for specific broker scenarios
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Match not found: {match_idx}")]
    MatchNotFound { match_idx: String },

    #[error("match not found: external match {match_id}")]
    ExternalMatchNotFound { match_id: u64 },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: u64 },

    #[error("Handler not found: {handler_id}")]
    HandlerNotFound { handler_id: usize },

    #[error("No game-network handler available")]
    NoHandlerAvailable,

    #[error("Match already scheduled: {match_idx}")]
    AlreadyScheduled { match_idx: String },

    #[error("Match {match_idx} is already {status} and cannot be rescheduled")]
    AlreadyProgressed {
        match_idx: String,
        status: MatchStatus,
    },

    #[error("Game network request failed ({operation}): {message}")]
    Upstream { operation: String, message: String },

    #[error("Illegal status transition for match {match_idx}: {from} -> {to}")]
    InvalidTransition {
        match_idx: String,
        from: MatchStatus,
        to: MatchStatus,
    },

    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Match store error: {message}")]
    Store { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl BrokerError {
    /// Build an upstream error for a failed external call
    pub fn upstream(operation: &str, error: impl Display) -> Self {
        Self::Upstream {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    /// Build an internal error for a poisoned lock
    pub fn lock(name: &str) -> Self {
        Self::InternalError {
            message: format!("Failed to acquire {} lock", name),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::MatchNotFound { .. }
            | BrokerError::ExternalMatchNotFound { .. }
            | BrokerError::PlayerNotFound { .. }
            | BrokerError::HandlerNotFound { .. } => ErrorKind::NotFound,
            BrokerError::Upstream { .. } => ErrorKind::Upstream,
            BrokerError::InvalidTransition { .. } | BrokerError::InvariantViolation { .. } => {
                ErrorKind::InvariantViolation
            }
            BrokerError::AlreadyScheduled { .. } | BrokerError::AlreadyProgressed { .. } => {
                ErrorKind::Conflict
            }
            BrokerError::NoHandlerAvailable => ErrorKind::Unavailable,
            BrokerError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            BrokerError::Store { .. } | BrokerError::InternalError { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
