//! Game-network data shapes exchanged with session handlers

use crate::types::{ExternalMatchId, PlayerId};
use serde::{Deserialize, Serialize};

/// Team assignment of a lobby member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyTeam {
    GoodGuys,
    BadGuys,
    Spectator,
    PlayerPool,
}

/// One member of a lobby as reported by the game network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyMember {
    pub id: PlayerId,
    pub team: LobbyTeam,
    #[serde(default)]
    pub name: String,
}

/// Lobby lifecycle as reported by the game network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyState {
    Ui,
    ServerSetup,
    Run,
    PostGame,
}

/// Snapshot of a handler's current lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub lobby_id: u64,
    /// Zero until the lobby launches into a real match
    pub match_id: ExternalMatchId,
    pub state: LobbyState,
    pub game_name: String,
    pub server_region: u32,
    pub members: Vec<LobbyMember>,
}

impl Lobby {
    pub fn has_launched(&self) -> bool {
        self.match_id != 0
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|member| member.id == player_id)
    }
}

/// Result code of a match-details request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResultCode {
    Complete,
    InProgress,
    Unavailable,
    NotFound,
}

impl MatchResultCode {
    /// Map a raw game-coordinator result code
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => MatchResultCode::Complete,
            2 => MatchResultCode::InProgress,
            3 => MatchResultCode::Unavailable,
            _ => MatchResultCode::NotFound,
        }
    }
}

/// Per-player line of a finished match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub account_id: u64,
    pub team: LobbyTeam,
    pub hero_id: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

/// Full payload of a finished match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchData {
    pub match_id: ExternalMatchId,
    pub duration_secs: u32,
    pub radiant_win: bool,
    pub start_time: i64,
    pub game_mode: String,
    pub players: Vec<MatchPlayer>,
}

/// Response to a match-details request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetails {
    pub result: MatchResultCode,
    pub match_data: Option<MatchData>,
}

impl MatchDetails {
    pub fn complete(match_data: MatchData) -> Self {
        Self {
            result: MatchResultCode::Complete,
            match_data: Some(match_data),
        }
    }

    pub fn with_code(result: MatchResultCode) -> Self {
        Self {
            result,
            match_data: None,
        }
    }
}
