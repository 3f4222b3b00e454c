//! Match persistence
//!
//! The [`MatchStore`] is a plain key-value cache holding serialized match
//! records with last-writer-wins semantics. [`MatchRepository`] layers typed
//! access and status-transition checks on top of it, and the
//! [`ScheduledMatchRegistry`] tracks which matches have a live monitoring task.

pub mod registry;
pub mod repository;

use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

pub use registry::ScheduledMatchRegistry;
pub use repository::MatchRepository;

/// Key-value cache holding serialized match records
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Read the raw value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Number of stored keys
    async fn len(&self) -> Result<usize>;

    /// Cheap liveness probe used by health checks
    async fn ping(&self) -> Result<()> {
        self.len().await.map(|_| ())
    }
}

/// In-memory match store
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| BrokerError::lock("match store read"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| BrokerError::lock("match store write"))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|_| BrokerError::lock("match store read"))?;
        Ok(entries.len())
    }
}

/// Match store for testing that records writes and can reject them on demand
#[derive(Debug, Default)]
pub struct MockMatchStore {
    inner: InMemoryMatchStore,
    set_calls: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl MockMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail until re-enabled
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Keys written so far, in write order
    pub fn get_set_calls(&self) -> Vec<String> {
        self.set_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_set_calls(&self) {
        if let Ok(mut calls) = self.set_calls.lock() {
            calls.clear();
        }
    }

    /// Store a raw value, bypassing failure injection
    pub async fn preset(&self, key: &str, value: String) -> Result<()> {
        self.inner.set(key, value).await
    }
}

#[async_trait]
impl MatchStore for MockMatchStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BrokerError::Store {
                message: format!("write rejected for key {}", key),
            });
        }

        self.set_calls
            .lock()
            .map_err(|_| BrokerError::lock("mock store calls"))?
            .push(key.to_string());
        self.inner.set(key, value).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}
