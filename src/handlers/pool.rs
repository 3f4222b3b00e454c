//! Handler pool: the fixed, ordered set of game-network sessions

use crate::error::{BrokerError, Result};
use crate::handlers::selection::{FirstAvailableSelector, HandlerSelector, SelectionPolicy};
use crate::network::GameClient;
use crate::types::HandlerId;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// One authenticated session on the game network
pub struct Handler {
    id: HandlerId,
    account: String,
    client: Arc<dyn GameClient>,
    active_matches: AtomicUsize,
    matches_served: AtomicU64,
}

impl Handler {
    pub fn new(id: HandlerId, account: impl Into<String>, client: Arc<dyn GameClient>) -> Self {
        Self {
            id,
            account: account.into(),
            client,
            active_matches: AtomicUsize::new(0),
            matches_served: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn client(&self) -> &Arc<dyn GameClient> {
        &self.client
    }

    pub fn is_ready(&self) -> bool {
        self.client.is_ready()
    }

    /// Number of matches whose lobby this handler currently owns, zero or one
    pub fn active_matches(&self) -> usize {
        self.active_matches.load(Ordering::SeqCst)
    }

    /// Matches this handler has been leased to since startup
    pub fn matches_served(&self) -> u64 {
        self.matches_served.load(Ordering::SeqCst)
    }

    /// Ready and not owned by any match
    pub fn is_idle(&self) -> bool {
        self.is_ready() && self.active_matches() == 0
    }

    /// Claim this handler for a match until the lease is dropped
    ///
    /// A session holds a single lobby, so at most one lease exists at a time;
    /// returns `None` if another match already owns the handler.
    pub fn try_lease(self: &Arc<Self>) -> Option<HandlerLease> {
        self.active_matches
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.matches_served.fetch_add(1, Ordering::SeqCst);
        Some(HandlerLease {
            handler: Arc::clone(self),
        })
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("account", &self.account)
            .field("active_matches", &self.active_matches())
            .field("matches_served", &self.matches_served())
            .finish()
    }
}

/// Ownership of a handler by one match; released on drop
#[derive(Debug)]
pub struct HandlerLease {
    handler: Arc<Handler>,
}

impl HandlerLease {
    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler.id()
    }
}

impl Drop for HandlerLease {
    fn drop(&mut self) {
        self.handler.active_matches.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed ordered collection of session handlers
pub struct HandlerPool {
    handlers: Vec<Arc<Handler>>,
    selector: Arc<dyn HandlerSelector>,
}

impl HandlerPool {
    /// Build a pool from `(account, client)` pairs; pool indices follow input order
    pub fn new<I, S>(clients: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn GameClient>)>,
        S: Into<String>,
    {
        let handlers = clients
            .into_iter()
            .enumerate()
            .map(|(id, (account, client))| Arc::new(Handler::new(id, account, client)))
            .collect();

        Self {
            handlers,
            selector: Arc::new(FirstAvailableSelector),
        }
    }

    /// Replace the policy used to assign handlers to new matches
    pub fn with_selector(mut self, selector: Arc<dyn HandlerSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_policy(self, policy: SelectionPolicy) -> Self {
        self.with_selector(policy.selector())
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.selector.policy()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handlers(&self) -> &[Arc<Handler>] {
        &self.handlers
    }

    pub fn ready_count(&self) -> usize {
        self.handlers.iter().filter(|h| h.is_ready()).count()
    }

    /// First ready handler in pool order, for queries not bound to a match
    pub fn first_available(&self) -> Result<(Arc<Handler>, HandlerId)> {
        if self.handlers.is_empty() {
            warn!("Handler pool is empty");
            return Err(BrokerError::NoHandlerAvailable);
        }

        self.handlers
            .iter()
            .find(|h| h.is_ready())
            .map(|h| (Arc::clone(h), h.id()))
            .ok_or(BrokerError::NoHandlerAvailable)
    }

    /// Handler bound to a match by its stored index
    pub fn by_index(&self, handler_id: HandlerId) -> Result<Arc<Handler>> {
        self.handlers
            .get(handler_id)
            .cloned()
            .ok_or(BrokerError::HandlerNotFound { handler_id })
    }

    /// Lease an idle handler to a new match using the configured policy
    ///
    /// Only handlers that no other match owns are candidates. Fails with
    /// `NoHandlerAvailable` once every ready handler is leased.
    pub fn assign(&self) -> Result<HandlerLease> {
        // A concurrent assign may win the handler between select and lease
        for _ in 0..=self.handlers.len() {
            let Some(handler_id) = self.selector.select(&self.handlers) else {
                break;
            };
            let handler = self.by_index(handler_id)?;

            if let Some(lease) = handler.try_lease() {
                debug!(
                    "Assigned handler {} ({}) via {} policy - matches served: {}",
                    handler_id,
                    handler.account(),
                    self.selector.policy(),
                    handler.matches_served()
                );
                return Ok(lease);
            }
        }

        warn!(
            "No idle handler: {} ready, {} total",
            self.ready_count(),
            self.handlers.len()
        );
        Err(BrokerError::NoHandlerAvailable)
    }
}
