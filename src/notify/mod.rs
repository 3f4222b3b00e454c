//! Outbound notifications
//!
//! Scheduling a tournament match notifies its players. Delivery is
//! best-effort: failures are logged by the caller and never undo a schedule.

pub mod publisher;

pub use publisher::{
    HttpNotificationPublisher, LogNotificationPublisher, MockNotificationPublisher,
    NotificationPublisher, PublisherConfig,
};

use crate::types::{MatchIdx, Notification, NotificationMetadata, TourMatch};
use std::collections::HashMap;

pub const NOTIFICATION_TYPE: &str = "tournament";
pub const MATCH_SCHEDULED_SUBTYPE: &str = "match_scheduled";

/// Build the "match scheduled" notification for a bracket match
pub fn match_scheduled(service: &str, match_idx: &MatchIdx, tour_match: &TourMatch) -> Notification {
    let mut ids = HashMap::new();
    ids.insert("matchIdx".to_string(), match_idx.clone());
    ids.insert(
        "tournamentId".to_string(),
        tour_match.tournament_id.to_string(),
    );
    ids.insert("team1Id".to_string(), tour_match.team1_id.to_string());
    ids.insert("team2Id".to_string(), tour_match.team2_id.to_string());

    Notification {
        content: format!(
            "{}: {} vs {} has been scheduled",
            tour_match.tournament_name, tour_match.team1.name, tour_match.team2.name
        ),
        metadata: NotificationMetadata { ids },
        user_ids: tour_match
            .players
            .iter()
            .map(|player| player.steam_id.clone())
            .collect(),
        kind: NOTIFICATION_TYPE.to_string(),
        subtype: MATCH_SCHEDULED_SUBTYPE.to_string(),
        ref_id: match_idx.clone(),
        service: service.to_string(),
    }
}
