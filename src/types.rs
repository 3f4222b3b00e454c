//! Common types used throughout the match broker

use crate::network::protocol::MatchData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Store key of a match record
pub type MatchIdx = String;

/// 64-bit Steam id of a player
pub type PlayerId = u64;

/// Index of a handler inside the handler pool
pub type HandlerId = usize;

/// Match id assigned by the game network once a lobby launches
pub type ExternalMatchId = u64;

/// Lifecycle status of a brokered match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    LobbyActive,
    Finished,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::LobbyActive => "lobby_active",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
            MatchStatus::Unknown => "unknown",
        }
    }

    /// Finished and cancelled matches never change status again
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Scheduled, MatchStatus::LobbyActive)
                | (MatchStatus::Scheduled, MatchStatus::Cancelled)
                | (MatchStatus::LobbyActive, MatchStatus::Finished)
        )
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which roster failed to show up before the lobby deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDidntShow {
    pub radiant: bool,
    pub dire: bool,
}

impl TeamDidntShow {
    pub fn any(&self) -> bool {
        self.radiant || self.dire
    }
}

/// Lobby settings supplied with a schedule request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySettings {
    pub game_name: String,
    pub pass_key: String,
    pub server_region: u32,
    pub game_mode: String,
}

/// Display information for one tournament team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub name: String,
    #[serde(default)]
    pub logo: String,
}

/// Bracket metadata carried by tournament match records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentInfo {
    pub bracket_idx: i64,
    pub tournament_id: i64,
    pub tournament_owner_id: String,
    pub tournament_name: String,
    pub tournament_logo: String,
    pub team1_id: i64,
    pub team2_id: i64,
    pub team1: TeamInfo,
    pub team2: TeamInfo,
    pub number_of_rounds: u32,
    pub start_epoch: i64,
    pub iteration: u32,
}

/// Everything needed to schedule one match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPlan {
    pub radiant: Vec<PlayerId>,
    pub dire: Vec<PlayerId>,
    pub lobby: LobbySettings,
    pub start_at: Option<DateTime<Utc>>,
    pub tournament: Option<TournamentInfo>,
}

impl MatchPlan {
    pub fn all_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.radiant.iter().chain(self.dire.iter()).copied()
    }
}

/// Persisted state of a brokered match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_idx: MatchIdx,
    pub status: MatchStatus,
    pub external_match_id: Option<ExternalMatchId>,
    pub is_tournament_match: bool,
    pub tournament: Option<TournamentInfo>,
    pub handler_id: HandlerId,
    pub cancel_reason: Option<String>,
    pub team_didnt_show: Option<TeamDidntShow>,
    pub radiant_players: Vec<PlayerId>,
    pub dire_players: Vec<PlayerId>,
    pub lobby: LobbySettings,
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Full match payload, stored once the match is finished
    pub result: Option<MatchData>,
}

impl MatchRecord {
    /// Initial record written when a match is scheduled
    pub fn scheduled(match_idx: MatchIdx, plan: &MatchPlan, handler_id: HandlerId) -> Self {
        let now = Utc::now();
        Self {
            match_idx,
            status: MatchStatus::Scheduled,
            external_match_id: None,
            is_tournament_match: plan.tournament.is_some(),
            tournament: plan.tournament.clone(),
            handler_id,
            cancel_reason: None,
            team_didnt_show: None,
            radiant_players: plan.radiant.clone(),
            dire_players: plan.dire.clone(),
            lobby: plan.lobby.clone(),
            start_time: plan.start_at,
            created_at: now,
            updated_at: now,
            result: None,
        }
    }
}

/// Request to schedule a single match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub lobby_config: LobbySettings,
    #[serde(default)]
    pub start_time: String,
}

/// Request to re-invite players to an existing match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinvitePlayersRequest {
    #[serde(deserialize_with = "match_idx_from_string_or_number")]
    pub match_idx: MatchIdx,
    pub players: Vec<PlayerId>,
}

/// One player entry of a bracket match descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentPlayer {
    pub team: String,
    #[serde(rename = "steam_id_64")]
    pub steam_id: String,
    #[serde(default)]
    pub wallet_address: String,
}

/// A bracket match descriptor submitted by the tournament service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourMatch {
    pub match_idx: i64,
    #[serde(default)]
    pub region: String,
    pub tournament_id: i64,
    #[serde(default)]
    pub tournament_owner_id: String,
    pub tournament_name: String,
    #[serde(default)]
    pub tournament_logo: String,
    pub team1_id: i64,
    pub team2_id: i64,
    pub team1: TeamInfo,
    pub team2: TeamInfo,
    pub players: Vec<TournamentPlayer>,
    pub start_epoch: i64,
    #[serde(default)]
    pub number_of_rounds: u32,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub iteration: u32,
}

/// Batch of bracket matches to schedule together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTournamentRequest {
    pub matches: Vec<TourMatch>,
}

/// Identifier map attached to a notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    pub ids: HashMap<String, String>,
}

/// Payload handed to the notification service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub content: String,
    pub metadata: NotificationMetadata,
    pub user_ids: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
    pub ref_id: String,
    pub service: String,
}

/// Accept match indices sent either as JSON strings or integers
fn match_idx_from_string_or_number<'de, D>(deserializer: D) -> Result<MatchIdx, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(text) => text,
        Repr::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(MatchStatus::Scheduled.can_transition_to(MatchStatus::LobbyActive));
        assert!(MatchStatus::Scheduled.can_transition_to(MatchStatus::Cancelled));
        assert!(MatchStatus::LobbyActive.can_transition_to(MatchStatus::Finished));

        assert!(!MatchStatus::Finished.can_transition_to(MatchStatus::Cancelled));
        assert!(!MatchStatus::Cancelled.can_transition_to(MatchStatus::Finished));
        assert!(!MatchStatus::LobbyActive.can_transition_to(MatchStatus::Scheduled));
        assert!(!MatchStatus::Scheduled.can_transition_to(MatchStatus::Scheduled));
    }

    #[test]
    fn test_unrecognised_status_decodes_as_unknown() {
        let status: MatchStatus = serde_json::from_str("\"abandoned\"").unwrap();
        assert_eq!(status, MatchStatus::Unknown);

        let status: MatchStatus = serde_json::from_str("\"lobby_active\"").unwrap();
        assert_eq!(status, MatchStatus::LobbyActive);
    }

    #[test]
    fn test_create_match_request_wire_names() {
        let body = r#"{
            "teamA": [1, 2],
            "teamB": [3],
            "lobbyConfig": {"gameName": "cup", "passKey": "pw", "serverRegion": 3, "gameMode": "cm"}
        }"#;
        let request: CreateMatchRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.team_a, vec![1, 2]);
        assert_eq!(request.lobby_config.server_region, 3);
        assert!(request.start_time.is_empty());
    }

    #[test]
    fn test_reinvite_request_accepts_numeric_idx() {
        let request: ReinvitePlayersRequest =
            serde_json::from_str(r#"{"matchIdx": 42, "players": [7]}"#).unwrap();
        assert_eq!(request.match_idx, "42");

        let request: ReinvitePlayersRequest =
            serde_json::from_str(r#"{"matchIdx": "1700000000", "players": []}"#).unwrap();
        assert_eq!(request.match_idx, "1700000000");
    }

    #[test]
    fn test_tour_match_player_steam_id_field() {
        let body = r#"{"team": "team1", "steam_id_64": "76561198000000001", "walletAddress": "0xabc"}"#;
        let player: TournamentPlayer = serde_json::from_str(body).unwrap();
        assert_eq!(player.steam_id, "76561198000000001");
        assert_eq!(player.wallet_address, "0xabc");
    }
}
