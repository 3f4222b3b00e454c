//! Registry of matches with a live monitoring task

use crate::error::{BrokerError, Result};
use crate::types::MatchIdx;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// In-flight match identifiers and the join handles of their monitoring tasks
///
/// An identifier is registered before its task is spawned and removed by the
/// task itself on completion, so at most one task is ever live per match.
#[derive(Debug, Default)]
pub struct ScheduledMatchRegistry {
    tasks: Mutex<HashMap<MatchIdx, Option<JoinHandle<()>>>>,
}

impl ScheduledMatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `match_idx`; fails if a task for it is still live
    pub fn try_register(&self, match_idx: &str) -> Result<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| BrokerError::lock("scheduled match registry"))?;

        if tasks.contains_key(match_idx) {
            return Err(BrokerError::AlreadyScheduled {
                match_idx: match_idx.to_string(),
            });
        }

        tasks.insert(match_idx.to_string(), None);
        debug!("Registered in-flight match {}", match_idx);
        Ok(())
    }

    /// Attach the spawned task; a no-op if the task already completed
    pub fn attach(&self, match_idx: &str, handle: JoinHandle<()>) -> Result<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| BrokerError::lock("scheduled match registry"))?;

        if let Some(slot) = tasks.get_mut(match_idx) {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Release `match_idx`; returns whether it was registered
    pub fn complete(&self, match_idx: &str) -> bool {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                let removed = tasks.remove(match_idx).is_some();
                if removed {
                    debug!("Released in-flight match {}", match_idx);
                }
                removed
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, match_idx: &str) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.contains_key(match_idx))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers currently in flight
    pub fn ids(&self) -> Vec<MatchIdx> {
        self.tasks
            .lock()
            .map(|tasks| tasks.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Abort every live monitoring task and clear the registry
    pub fn abort_all(&self) -> usize {
        let drained: Vec<_> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain().collect(),
            Err(_) => return 0,
        };

        let count = drained.len();
        for (match_idx, handle) in drained {
            if let Some(handle) = handle {
                debug!("Aborting monitoring task for match {}", match_idx);
                handle.abort();
            }
        }

        if count > 0 {
            info!("Aborted {} in-flight monitoring tasks", count);
        }
        count
    }
}
