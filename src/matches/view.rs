//! Resolved views of a match returned by status queries

use crate::network::protocol::{Lobby, MatchData};
use crate::types::{ExternalMatchId, MatchIdx, MatchRecord, MatchStatus, TeamDidntShow};
use serde::{Deserialize, Serialize};

/// Status fields shared by every view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatusInfo {
    pub match_idx: MatchIdx,
    pub status: MatchStatus,
    pub match_id: Option<ExternalMatchId>,
    pub is_tournament_match: bool,
}

impl From<&MatchRecord> for MatchStatusInfo {
    fn from(record: &MatchRecord) -> Self {
        Self {
            match_idx: record.match_idx.clone(),
            status: record.status,
            match_id: record.external_match_id,
            is_tournament_match: record.is_tournament_match,
        }
    }
}

/// A scheduled match and the live lobby of the polled handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLobby {
    pub status: MatchStatusInfo,
    pub lobby: Option<Lobby>,
}

/// A finished match with its full payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub status: MatchStatusInfo,
    pub match_data: MatchData,
}

/// A cancelled match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCancel {
    pub status: MatchStatusInfo,
    pub reason: String,
    pub team_didnt_show: TeamDidntShow,
}

/// Result of a match status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchView {
    Lobby(MatchLobby),
    /// Launched but not yet complete, returned unchanged
    Pending(MatchStatusInfo),
    Finished(MatchResult),
    Cancelled(MatchCancel),
}

impl MatchView {
    pub fn status_info(&self) -> &MatchStatusInfo {
        match self {
            MatchView::Lobby(view) => &view.status,
            MatchView::Pending(status) => status,
            MatchView::Finished(view) => &view.status,
            MatchView::Cancelled(view) => &view.status,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.status_info().status
    }

    pub fn cancelled(record: &MatchRecord) -> Self {
        MatchView::Cancelled(MatchCancel {
            status: record.into(),
            reason: record.cancel_reason.clone().unwrap_or_default(),
            team_didnt_show: record.team_didnt_show.unwrap_or_default(),
        })
    }
}
