//! Notification publishers

use crate::error::{BrokerError, Result};
use crate::types::Notification;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const OPERATION: &str = "publish_notification";

/// Trait for publishing notifications
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<()>;
}

/// Configuration for notification publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
            publish_timeout_ms: 5000,
        }
    }
}

/// Writes notifications to the log only
#[derive(Debug, Default)]
pub struct LogNotificationPublisher;

#[async_trait]
impl NotificationPublisher for LogNotificationPublisher {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        info!(
            "Notification [{}/{}] ref {} to {} users: {}",
            notification.kind,
            notification.subtype,
            notification.ref_id,
            notification.user_ids.len(),
            notification.content
        );
        Ok(())
    }
}

/// POSTs notifications as JSON to the notification service
pub struct HttpNotificationPublisher {
    client: Client,
    endpoint: String,
    config: PublisherConfig,
    published: Mutex<HashSet<String>>, // For deduplication
}

impl HttpNotificationPublisher {
    pub fn new(endpoint: impl Into<String>, config: PublisherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.publish_timeout_ms))
            .build()
            .map_err(|e| BrokerError::upstream(OPERATION, e))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            config,
            published: Mutex::new(HashSet::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn dedup_key(notification: &Notification) -> String {
        format!(
            "{}:{}:{}",
            notification.kind, notification.subtype, notification.ref_id
        )
    }

    /// Single publish attempt
    async fn try_publish(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| BrokerError::upstream(OPERATION, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::upstream(
                OPERATION,
                format!("notification service returned {}: {}", status, body),
            ));
        }
        Ok(())
    }

    /// Clear deduplication cache
    pub fn clear_deduplication_cache(&self) {
        if let Ok(mut published) = self.published.lock() {
            published.clear();
        }
    }

    pub fn cached_notification_count(&self) -> usize {
        self.published.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationPublisher for HttpNotificationPublisher {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        let key = Self::dedup_key(notification);

        if self.config.enable_deduplication {
            let published = self
                .published
                .lock()
                .map_err(|_| BrokerError::lock("published notifications"))?;
            if published.contains(&key) {
                debug!("Notification {} already published, skipping", key);
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(notification).await {
                Ok(()) => {
                    if self.config.enable_deduplication {
                        self.published
                            .lock()
                            .map_err(|_| BrokerError::lock("published notifications"))?
                            .insert(key.clone());
                    }
                    debug!("Published notification {} to {}", key, self.endpoint);
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish notification {} after {} retries: {}",
                            key, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for notification {}: {}. Retrying in {:?}",
                        retry_count, key, e, delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }
}

/// Mock notification publisher for testing
#[derive(Debug, Default)]
pub struct MockNotificationPublisher {
    published: Mutex<Vec<Notification>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockNotificationPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher
            .fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
        publisher
    }

    /// Get all published notifications (for testing)
    pub fn get_published(&self) -> Vec<Notification> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut published) = self.published.lock() {
            published.clear();
        }
    }
}

#[async_trait]
impl NotificationPublisher for MockNotificationPublisher {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(BrokerError::upstream(OPERATION, "notification service down"));
        }
        if let Ok(mut published) = self.published.lock() {
            published.push(notification.clone());
        }
        Ok(())
    }
}
