//! Game-network session handlers
//!
//! The pool owns one [`Handler`] per bot account. Status polls use the
//! first available handler; new matches are bound to a handler chosen by a
//! pluggable [`HandlerSelector`] and keep it for their whole lifetime.

pub mod pool;
pub mod selection;

// Re-export commonly used types
pub use pool::{Handler, HandlerLease, HandlerPool};
pub use selection::{
    FirstAvailableSelector, HandlerSelector, LeastLoadedSelector, RoundRobinSelector,
    SelectionPolicy,
};
