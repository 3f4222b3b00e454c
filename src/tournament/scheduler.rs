//! Batch scheduling of bracket matches

use crate::error::Result;
use crate::matches::{MatchOrchestrator, ReinviteReport};
use crate::metrics::MetricsCollector;
use crate::notify::{self, NotificationPublisher};
use crate::types::{MatchIdx, PlayerId, TourMatch};
use crate::tournament::plan::plan_from_descriptor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of scheduling one bracket descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleResult {
    Scheduled {
        #[serde(rename = "matchIdx")]
        match_idx: MatchIdx,
    },
    Skipped { reason: String },
    Failed { error: String },
}

impl ScheduleResult {
    pub fn label(&self) -> &'static str {
        match self {
            ScheduleResult::Scheduled { .. } => "scheduled",
            ScheduleResult::Skipped { .. } => "skipped",
            ScheduleResult::Failed { .. } => "failed",
        }
    }
}

/// Outcome of one descriptor of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketScheduleOutcome {
    pub bracket_idx: i64,
    #[serde(flatten)]
    pub result: ScheduleResult,
}

/// Schedules tournament bracket matches through the orchestrator
pub struct TournamentScheduler {
    orchestrator: MatchOrchestrator,
    notifier: Arc<dyn NotificationPublisher>,
    metrics: Arc<MetricsCollector>,
    service_name: String,
    game_mode: String,
}

impl TournamentScheduler {
    pub fn new(
        orchestrator: MatchOrchestrator,
        notifier: Arc<dyn NotificationPublisher>,
        metrics: Arc<MetricsCollector>,
        service_name: impl Into<String>,
        game_mode: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            notifier,
            metrics,
            service_name: service_name.into(),
            game_mode: game_mode.into(),
        }
    }

    /// Schedule every descriptor independently, in order
    pub async fn schedule_batch(&self, matches: Vec<TourMatch>) -> Vec<BracketScheduleOutcome> {
        let mut outcomes = Vec::with_capacity(matches.len());

        for tour_match in matches {
            let result = if tour_match.cancelled {
                debug!("Skipping cancelled bracket match {}", tour_match.match_idx);
                ScheduleResult::Skipped {
                    reason: "bracket match is cancelled".to_string(),
                }
            } else {
                match self.schedule_one(&tour_match).await {
                    Ok(match_idx) => ScheduleResult::Scheduled { match_idx },
                    Err(e) => {
                        warn!(
                            "Failed to schedule bracket match {} of tournament {}: {}",
                            tour_match.match_idx, tour_match.tournament_id, e
                        );
                        ScheduleResult::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };

            self.metrics.record_tournament_descriptor(result.label());
            outcomes.push(BracketScheduleOutcome {
                bracket_idx: tour_match.match_idx,
                result,
            });
        }

        let scheduled = outcomes
            .iter()
            .filter(|o| matches!(o.result, ScheduleResult::Scheduled { .. }))
            .count();
        info!(
            "Scheduled {}/{} bracket matches",
            scheduled,
            outcomes.len()
        );
        outcomes
    }

    async fn schedule_one(&self, tour_match: &TourMatch) -> Result<MatchIdx> {
        let plan = plan_from_descriptor(tour_match, &self.game_mode)?;
        let match_idx = self
            .orchestrator
            .schedule_with_idx(tour_match.match_idx.to_string(), plan)
            .await?;

        let notification = notify::match_scheduled(&self.service_name, &match_idx, tour_match);
        match self.notifier.publish(&notification).await {
            Ok(()) => self.metrics.record_notification(true),
            Err(e) => {
                self.metrics.record_notification(false);
                warn!(
                    "Failed to notify players of bracket match {}: {}",
                    match_idx, e
                );
            }
        }

        Ok(match_idx)
    }

    /// Reinvite players of a bracket match through its bound handler
    pub async fn reinvite_players(
        &self,
        bracket_idx: i64,
        players: &[PlayerId],
    ) -> Result<ReinviteReport> {
        self.orchestrator
            .reinvite_players(&bracket_idx.to_string(), players)
            .await
    }
}
