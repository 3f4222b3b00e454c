//! Player records held in the document store

use crate::error::{BrokerError, Result};
use crate::types::{ExternalMatchId, PlayerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Player document: Steam id and the player's historical match ids, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(rename = "_id")]
    pub steam_id: PlayerId,
    #[serde(default)]
    pub matches: Vec<ExternalMatchId>,
}

/// Read access to player documents
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Fetch a player, `PlayerNotFound` if absent
    async fn get_player(&self, steam_id: PlayerId) -> Result<PlayerRecord>;

    /// Insert or replace a player document
    async fn upsert_player(&self, player: PlayerRecord) -> Result<()>;
}

/// In-memory player documents
#[derive(Debug, Default)]
pub struct InMemoryPlayerRepository {
    players: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl InMemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with existing documents
    pub fn with_players(players: impl IntoIterator<Item = PlayerRecord>) -> Self {
        let players = players
            .into_iter()
            .map(|player| (player.steam_id, player))
            .collect();
        Self {
            players: RwLock::new(players),
        }
    }

    pub fn len(&self) -> usize {
        self.players.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PlayerRepository for InMemoryPlayerRepository {
    async fn get_player(&self, steam_id: PlayerId) -> Result<PlayerRecord> {
        let players = self
            .players
            .read()
            .map_err(|_| BrokerError::lock("players read"))?;

        players
            .get(&steam_id)
            .cloned()
            .ok_or(BrokerError::PlayerNotFound {
                player_id: steam_id,
            })
    }

    async fn upsert_player(&self, player: PlayerRecord) -> Result<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| BrokerError::lock("players write"))?;
        players.insert(player.steam_id, player);
        Ok(())
    }
}
