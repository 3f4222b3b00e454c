//! Client-facing summary of a match view

use crate::matches::view::MatchView;
use crate::network::protocol::{Lobby, LobbyTeam};
use crate::types::{MatchIdx, MatchStatus, PlayerId};
use serde::{Deserialize, Serialize};

/// Compact match status returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub match_idx: MatchIdx,
    pub status: MatchStatus,
    pub radiant_players: Vec<PlayerId>,
    pub dire_players: Vec<PlayerId>,
    pub cancelled: bool,
}

/// Project a resolved view into a [`MatchInfo`]
pub fn project(view: &MatchView) -> MatchInfo {
    let status = view.status_info();
    let mut info = MatchInfo {
        match_idx: status.match_idx.clone(),
        status: status.status,
        radiant_players: Vec::new(),
        dire_players: Vec::new(),
        cancelled: false,
    };

    match view {
        MatchView::Lobby(lobby_view) => {
            if let Some(lobby) = &lobby_view.lobby {
                let (radiant, dire) = partition_members(lobby);
                info.radiant_players = radiant;
                info.dire_players = dire;
            }
        }
        MatchView::Pending(_) | MatchView::Finished(_) => {}
        MatchView::Cancelled(_) => info.cancelled = true,
    }

    info
}

/// Split lobby members into radiant and dire by team; other slots are dropped
pub fn partition_members(lobby: &Lobby) -> (Vec<PlayerId>, Vec<PlayerId>) {
    let mut radiant = Vec::new();
    let mut dire = Vec::new();

    for member in &lobby.members {
        match member.team {
            LobbyTeam::GoodGuys => radiant.push(member.id),
            LobbyTeam::BadGuys => dire.push(member.id),
            LobbyTeam::Spectator | LobbyTeam::PlayerPool => {}
        }
    }

    (radiant, dire)
}
