//! Player match history
//!
//! Two sources: the player's stored match ids resolved through the game
//! network, and the public OpenDota statistics service.

pub mod opendota;
pub mod players;

use crate::error::Result;
use crate::types::{ExternalMatchId, PlayerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use opendota::OpenDotaClient;
pub use players::{InMemoryPlayerRepository, PlayerRecord, PlayerRepository};

/// One entry of a player's public match history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMatchSummary {
    pub match_id: ExternalMatchId,
    pub player_slot: u32,
    pub radiant_win: Option<bool>,
    pub duration: u32,
    pub game_mode: u32,
    pub lobby_type: u32,
    pub hero_id: u32,
    pub start_time: i64,
    #[serde(default)]
    pub version: Option<u32>,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    #[serde(default)]
    pub skill: Option<u32>,
    #[serde(default)]
    pub party_size: Option<u32>,
}

impl PlayerMatchSummary {
    /// Slots below 128 are on the radiant side
    pub fn is_radiant(&self) -> bool {
        self.player_slot < 128
    }

    pub fn won(&self) -> bool {
        self.radiant_win == Some(self.is_radiant())
    }
}

/// External lookup of a player's recent matches
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchHistoryProvider: Send + Sync {
    async fn player_matches(&self, steam_id: PlayerId, limit: usize) -> Result<Vec<PlayerMatchSummary>>;

    /// Label used in logs and metrics
    fn source(&self) -> &'static str;
}
