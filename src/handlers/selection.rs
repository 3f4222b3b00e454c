//! Handler selection policies for assigning new matches

use crate::handlers::pool::Handler;
use crate::types::HandlerId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Policy used to pick the handler that will own a new match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    First,
    RoundRobin,
    LeastLoaded,
}

impl SelectionPolicy {
    pub fn selector(&self) -> Arc<dyn HandlerSelector> {
        match self {
            SelectionPolicy::First => Arc::new(FirstAvailableSelector),
            SelectionPolicy::RoundRobin => Arc::new(RoundRobinSelector::default()),
            SelectionPolicy::LeastLoaded => Arc::new(LeastLoadedSelector),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "first" | "first_available" => Ok(SelectionPolicy::First),
            "round_robin" | "round-robin" => Ok(SelectionPolicy::RoundRobin),
            "least_loaded" | "least-loaded" => Ok(SelectionPolicy::LeastLoaded),
            other => Err(format!("unknown handler selection policy: {}", other)),
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::First => write!(f, "first"),
            SelectionPolicy::RoundRobin => write!(f, "round_robin"),
            SelectionPolicy::LeastLoaded => write!(f, "least_loaded"),
        }
    }
}

/// Picks a handler for a new match among the idle handlers
pub trait HandlerSelector: Send + Sync {
    /// Return the pool index of the chosen handler, or `None` if none is idle
    fn select(&self, handlers: &[Arc<Handler>]) -> Option<HandlerId>;

    fn policy(&self) -> SelectionPolicy;
}

/// Always the first idle handler in pool order
#[derive(Debug, Default)]
pub struct FirstAvailableSelector;

impl HandlerSelector for FirstAvailableSelector {
    fn select(&self, handlers: &[Arc<Handler>]) -> Option<HandlerId> {
        handlers.iter().find(|h| h.is_idle()).map(|h| h.id())
    }

    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::First
    }
}

/// Rotates through the idle handlers
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl HandlerSelector for RoundRobinSelector {
    fn select(&self, handlers: &[Arc<Handler>]) -> Option<HandlerId> {
        if handlers.is_empty() {
            return None;
        }

        let start = self.next.fetch_add(1, Ordering::Relaxed);
        (0..handlers.len())
            .map(|offset| &handlers[(start + offset) % handlers.len()])
            .find(|h| h.is_idle())
            .map(|h| h.id())
    }

    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::RoundRobin
    }
}

/// The idle handler that has served the fewest matches, ties broken by pool order
#[derive(Debug, Default)]
pub struct LeastLoadedSelector;

impl HandlerSelector for LeastLoadedSelector {
    fn select(&self, handlers: &[Arc<Handler>]) -> Option<HandlerId> {
        handlers
            .iter()
            .filter(|h| h.is_idle())
            .min_by_key(|h| (h.matches_served(), h.id()))
            .map(|h| h.id())
    }

    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::LeastLoaded
    }
}
