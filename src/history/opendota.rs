//! OpenDota public statistics client

use crate::error::{BrokerError, Result};
use crate::history::{MatchHistoryProvider, PlayerMatchSummary};
use crate::types::PlayerId;
use crate::utils::steam_id_to_account_id;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OPENDOTA_URL: &str = "https://api.opendota.com/api";

const OPERATION: &str = "opendota_player_matches";

/// Fetches recent matches of a player from OpenDota
#[derive(Debug, Clone)]
pub struct OpenDotaClient {
    client: Client,
    base_url: String,
}

impl OpenDotaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::upstream(OPERATION, e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn matches_url(&self, steam_id: PlayerId) -> String {
        format!(
            "{}/players/{}/matches",
            self.base_url,
            steam_id_to_account_id(steam_id)
        )
    }
}

#[async_trait]
impl MatchHistoryProvider for OpenDotaClient {
    async fn player_matches(&self, steam_id: PlayerId, limit: usize) -> Result<Vec<PlayerMatchSummary>> {
        let url = self.matches_url(steam_id);
        debug!("Fetching OpenDota history: {} (limit {})", url, limit);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| BrokerError::upstream(OPERATION, format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BrokerError::PlayerNotFound {
                player_id: steam_id,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::upstream(
                OPERATION,
                format!("opendota returned {}: {}", status, body),
            ));
        }

        response
            .json::<Vec<PlayerMatchSummary>>()
            .await
            .map_err(|e| BrokerError::upstream(OPERATION, format!("invalid response: {e}")))
    }

    fn source(&self) -> &'static str {
        "opendota"
    }
}
