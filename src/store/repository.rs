//! Typed access to match records

use crate::error::{BrokerError, Result};
use crate::network::protocol::MatchData;
use crate::store::MatchStore;
use crate::types::{ExternalMatchId, MatchRecord, MatchStatus, TeamDidntShow};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Reads and writes [`MatchRecord`]s and enforces the status state machine
///
/// Status changes go through [`MatchRepository::transition`], which holds a
/// process-wide write lock across the read-check-write sequence so two
/// writers can never both move a record out of the same status.
pub struct MatchRepository {
    store: Arc<dyn MatchStore>,
    write_lock: Mutex<()>,
}

impl MatchRepository {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Write a freshly scheduled record
    ///
    /// An existing record is only replaced while it is still `scheduled`;
    /// anything further along fails with `AlreadyProgressed`.
    pub async fn create(&self, record: &MatchRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.find(&record.match_idx).await? {
            if existing.status != MatchStatus::Scheduled {
                return Err(BrokerError::AlreadyProgressed {
                    match_idx: record.match_idx.clone(),
                    status: existing.status,
                });
            }
            debug!("Replacing scheduled record of match {}", record.match_idx);
        }

        self.write(record).await
    }

    /// Read a record, `MatchNotFound` if absent
    pub async fn get(&self, match_idx: &str) -> Result<MatchRecord> {
        self.find(match_idx)
            .await?
            .ok_or_else(|| BrokerError::MatchNotFound {
                match_idx: match_idx.to_string(),
            })
    }

    pub async fn find(&self, match_idx: &str) -> Result<Option<MatchRecord>> {
        let raw = match self.store.get(match_idx).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| BrokerError::Store {
                message: format!("Failed to decode match {}: {}", match_idx, e),
            })
    }

    /// Move a record to `next`, applying `update` before the write
    pub async fn transition<F>(
        &self,
        match_idx: &str,
        next: MatchStatus,
        update: F,
    ) -> Result<MatchRecord>
    where
        F: FnOnce(&mut MatchRecord),
    {
        let _guard = self.write_lock.lock().await;

        let mut record = self.get(match_idx).await?;
        if !record.status.can_transition_to(next) {
            return Err(BrokerError::InvalidTransition {
                match_idx: match_idx.to_string(),
                from: record.status,
                to: next,
            });
        }

        let previous = record.status;
        update(&mut record);
        record.status = next;
        record.updated_at = Utc::now();
        self.write(&record).await?;

        debug!("Match {} moved {} -> {}", match_idx, previous, next);
        Ok(record)
    }

    /// The lobby launched into a real match
    pub async fn mark_lobby_active(
        &self,
        match_idx: &str,
        external_match_id: ExternalMatchId,
    ) -> Result<MatchRecord> {
        self.transition(match_idx, MatchStatus::LobbyActive, |record| {
            record.external_match_id = Some(external_match_id);
        })
        .await
    }

    pub async fn mark_cancelled(
        &self,
        match_idx: &str,
        reason: &str,
        team_didnt_show: Option<TeamDidntShow>,
    ) -> Result<MatchRecord> {
        self.transition(match_idx, MatchStatus::Cancelled, |record| {
            record.cancel_reason = Some(reason.to_string());
            record.team_didnt_show = team_didnt_show;
        })
        .await
    }

    pub async fn mark_finished(&self, match_idx: &str, match_data: MatchData) -> Result<MatchRecord> {
        self.transition(match_idx, MatchStatus::Finished, |record| {
            record.external_match_id = Some(match_data.match_id);
            record.result = Some(match_data);
        })
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.len().await
    }

    async fn write(&self, record: &MatchRecord) -> Result<()> {
        let raw = serde_json::to_string(record).map_err(|e| BrokerError::Store {
            message: format!("Failed to encode match {}: {}", record.match_idx, e),
        })?;
        self.store.set(&record.match_idx, raw).await
    }
}
