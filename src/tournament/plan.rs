//! Conversion of bracket match descriptors into match plans

use crate::error::{BrokerError, Result};
use crate::types::{LobbySettings, MatchPlan, PlayerId, TourMatch, TournamentInfo};
use crate::utils::epoch_to_datetime;

/// Server-region codes accepted by the game network
const REGIONS: &[(&str, u32)] = &[
    ("us_west", 1),
    ("us_east", 2),
    ("europe", 3),
    ("eu_west", 3),
    ("korea", 4),
    ("singapore", 5),
    ("sea", 5),
    ("dubai", 6),
    ("australia", 7),
    ("stockholm", 8),
    ("eu_east", 8),
    ("austria", 9),
    ("brazil", 10),
    ("south_africa", 11),
    ("chile", 14),
    ("peru", 15),
    ("india", 16),
    ("japan", 19),
];

/// Map a region name to its server-region code.
///
/// Names are matched case-insensitively with spaces and dashes treated as
/// underscores. An empty region lets the game network pick one.
pub fn server_region(region: &str) -> Result<u32> {
    let normalized = region.trim().to_lowercase().replace([' ', '-'], "_");
    if normalized.is_empty() {
        return Ok(0);
    }

    REGIONS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, code)| *code)
        .ok_or_else(|| BrokerError::InvalidRequest {
            reason: format!("unknown region '{}'", region),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Radiant,
    Dire,
}

fn side_of(label: &str, tour_match: &TourMatch) -> Option<Side> {
    let label = label.trim();
    if label.eq_ignore_ascii_case("team1")
        || label == "1"
        || label.eq_ignore_ascii_case(&tour_match.team1.name)
    {
        Some(Side::Radiant)
    } else if label.eq_ignore_ascii_case("team2")
        || label == "2"
        || label.eq_ignore_ascii_case(&tour_match.team2.name)
    {
        Some(Side::Dire)
    } else {
        None
    }
}

/// Lobby name shown in game
pub fn lobby_name(tour_match: &TourMatch) -> String {
    format!(
        "{}: {} vs {}",
        tour_match.tournament_name, tour_match.team1.name, tour_match.team2.name
    )
}

/// Pass key of a bracket lobby; a rescheduled iteration gets a new one
pub fn pass_key(tour_match: &TourMatch) -> String {
    format!(
        "t{}-m{}-i{}",
        tour_match.tournament_id, tour_match.match_idx, tour_match.iteration
    )
}

/// Build the match plan for a bracket descriptor
pub fn plan_from_descriptor(tour_match: &TourMatch, game_mode: &str) -> Result<MatchPlan> {
    let mut radiant: Vec<PlayerId> = Vec::new();
    let mut dire: Vec<PlayerId> = Vec::new();

    for player in &tour_match.players {
        let steam_id = player
            .steam_id
            .trim()
            .parse::<PlayerId>()
            .map_err(|_| BrokerError::InvalidRequest {
                reason: format!("invalid steam id '{}'", player.steam_id),
            })?;

        match side_of(&player.team, tour_match) {
            Some(Side::Radiant) => radiant.push(steam_id),
            Some(Side::Dire) => dire.push(steam_id),
            None => {
                return Err(BrokerError::InvalidRequest {
                    reason: format!("player {} has unknown team '{}'", steam_id, player.team),
                })
            }
        }
    }

    let start_at = if tour_match.start_epoch > 0 {
        Some(
            epoch_to_datetime(tour_match.start_epoch).ok_or_else(|| BrokerError::InvalidRequest {
                reason: format!("invalid start epoch {}", tour_match.start_epoch),
            })?,
        )
    } else {
        None
    };

    Ok(MatchPlan {
        radiant,
        dire,
        lobby: LobbySettings {
            game_name: lobby_name(tour_match),
            pass_key: pass_key(tour_match),
            server_region: server_region(&tour_match.region)?,
            game_mode: game_mode.to_string(),
        },
        start_at,
        tournament: Some(TournamentInfo {
            bracket_idx: tour_match.match_idx,
            tournament_id: tour_match.tournament_id,
            tournament_owner_id: tour_match.tournament_owner_id.clone(),
            tournament_name: tour_match.tournament_name.clone(),
            tournament_logo: tour_match.tournament_logo.clone(),
            team1_id: tour_match.team1_id,
            team2_id: tour_match.team2_id,
            team1: tour_match.team1.clone(),
            team2: tour_match.team2.clone(),
            number_of_rounds: tour_match.number_of_rounds,
            start_epoch: tour_match.start_epoch,
            iteration: tour_match.iteration,
        }),
    })
}
