//! Per-match monitoring task
//!
//! One [`MatchMonitor`] runs for every scheduled match. It waits for the
//! start time, opens the lobby through the match's handler, invites both
//! rosters and then races lobby conversion against the cancellation
//! deadline. Exactly one status write follows the race.

use crate::error::Result;
use crate::handlers::HandlerLease;
use crate::metrics::MetricsCollector;
use crate::network::protocol::Lobby;
use crate::network::{GameClient, OP_CREATE_LOBBY, OP_CURRENT_LOBBY, OP_INVITE_MEMBER, OP_LEAVE_LOBBY};
use crate::store::MatchRepository;
use crate::types::{ExternalMatchId, MatchIdx, MatchPlan, PlayerId, TeamDidntShow};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Reason stored when the lobby deadline elapses
pub const NO_SHOW_REASON: &str = "players did not join";

/// Timing configuration of a monitoring task
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Time players have to launch the lobby once it is created
    pub time_to_cancel: Duration,
    /// Interval between lobby polls
    pub poll_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            time_to_cancel: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// How a monitoring task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The lobby launched and `lobby_active` was persisted
    Converted { match_id: ExternalMatchId },
    /// `cancelled` was persisted
    Cancelled {
        reason: String,
        team_didnt_show: Option<TeamDidntShow>,
    },
    /// The final status write failed
    Failed { error: String },
}

impl MonitorOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MonitorOutcome::Converted { .. } => "converted",
            MonitorOutcome::Cancelled { .. } => "cancelled",
            MonitorOutcome::Failed { .. } => "failed",
        }
    }
}

enum Race {
    Deadline,
    Converted(ExternalMatchId),
}

/// Drives one scheduled match until its lobby converts or is cancelled
pub struct MatchMonitor {
    match_idx: MatchIdx,
    plan: MatchPlan,
    lease: HandlerLease,
    repository: Arc<MatchRepository>,
    metrics: Arc<MetricsCollector>,
    settings: MonitorSettings,
}

impl MatchMonitor {
    pub fn new(
        match_idx: MatchIdx,
        plan: MatchPlan,
        lease: HandlerLease,
        repository: Arc<MatchRepository>,
        metrics: Arc<MetricsCollector>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            match_idx,
            plan,
            lease,
            repository,
            metrics,
            settings,
        }
    }

    pub fn match_idx(&self) -> &str {
        &self.match_idx
    }

    /// Run the task to completion; the handler lease is released on return
    pub async fn run(self) -> MonitorOutcome {
        self.wait_for_start().await;

        let client = Arc::clone(self.lease.handler().client());
        info!(
            "Match {} starting on handler {} ({})",
            self.match_idx,
            self.lease.handler_id(),
            self.lease.handler().account()
        );

        let lobby = self
            .timed(OP_CREATE_LOBBY, client.create_lobby(&self.plan.lobby))
            .await;
        if let Err(e) = lobby {
            error!("Failed to create lobby for match {}: {}", self.match_idx, e);
            return self
                .cancel(format!("lobby creation failed: {}", e), None)
                .await;
        }
        let lobby_created = Instant::now();

        self.invite_rosters(client.as_ref()).await;

        let mut last_seen = None;
        let deadline = tokio::time::sleep(self.settings.time_to_cancel);
        tokio::pin!(deadline);

        let race = tokio::select! {
            biased;
            _ = &mut deadline => Race::Deadline,
            match_id = self.wait_for_conversion(client.as_ref(), &mut last_seen) => Race::Converted(match_id),
        };

        match race {
            Race::Converted(match_id) => {
                self.metrics.record_lobby_conversion(lobby_created.elapsed());
                self.convert(match_id).await
            }
            Race::Deadline => {
                let team_didnt_show = self.no_shows(last_seen.as_ref());
                info!(
                    "Match {} deadline elapsed - radiant missing: {}, dire missing: {}",
                    self.match_idx, team_didnt_show.radiant, team_didnt_show.dire
                );

                let outcome = self
                    .cancel(NO_SHOW_REASON.to_string(), Some(team_didnt_show))
                    .await;
                if let Err(e) = self.timed(OP_LEAVE_LOBBY, client.leave_lobby()).await {
                    warn!("Failed to leave lobby of match {}: {}", self.match_idx, e);
                }
                outcome
            }
        }
    }

    async fn wait_for_start(&self) {
        let Some(start_at) = self.plan.start_at else {
            return;
        };

        match (start_at - Utc::now()).to_std() {
            Ok(delay) if !delay.is_zero() => {
                debug!(
                    "Match {} waiting {}s for start time {}",
                    self.match_idx,
                    delay.as_secs(),
                    start_at
                );
                tokio::time::sleep(delay).await;
            }
            _ => {}
        }
    }

    async fn invite_rosters(&self, client: &dyn GameClient) {
        for player_id in self.plan.all_players() {
            let result = self
                .timed(OP_INVITE_MEMBER, client.invite_lobby_member(player_id))
                .await;
            self.metrics.record_invite(result.is_ok());
            if let Err(e) = result {
                warn!(
                    "Failed to invite player {} to match {}: {}",
                    player_id, self.match_idx, e
                );
            }
        }
    }

    /// Poll the lobby until it launches; records the last lobby seen
    async fn wait_for_conversion(
        &self,
        client: &dyn GameClient,
        last_seen: &mut Option<Lobby>,
    ) -> ExternalMatchId {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);

        loop {
            ticker.tick().await;

            match self.timed(OP_CURRENT_LOBBY, client.current_lobby()).await {
                Ok(Some(lobby)) if lobby.has_launched() => {
                    info!(
                        "Match {} lobby {} launched as match {}",
                        self.match_idx, lobby.lobby_id, lobby.match_id
                    );
                    return lobby.match_id;
                }
                Ok(Some(lobby)) => {
                    debug!(
                        "Match {} lobby {} has {} members",
                        self.match_idx,
                        lobby.lobby_id,
                        lobby.members.len()
                    );
                    *last_seen = Some(lobby);
                }
                Ok(None) => debug!("Match {} handler reports no lobby", self.match_idx),
                Err(e) => warn!("Failed to poll lobby of match {}: {}", self.match_idx, e),
            }
        }
    }

    /// A team did not show if any of its roster is missing from the lobby
    fn no_shows(&self, lobby: Option<&Lobby>) -> TeamDidntShow {
        let missing = |roster: &[PlayerId]| match lobby {
            Some(lobby) => roster.iter().any(|id| !lobby.contains(*id)),
            None => !roster.is_empty(),
        };

        TeamDidntShow {
            radiant: missing(&self.plan.radiant),
            dire: missing(&self.plan.dire),
        }
    }

    async fn convert(&self, match_id: ExternalMatchId) -> MonitorOutcome {
        match self.repository.mark_lobby_active(&self.match_idx, match_id).await {
            Ok(_) => MonitorOutcome::Converted { match_id },
            Err(e) => {
                error!(
                    "Failed to persist lobby_active for match {}: {}",
                    self.match_idx, e
                );
                MonitorOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn cancel(
        &self,
        reason: String,
        team_didnt_show: Option<TeamDidntShow>,
    ) -> MonitorOutcome {
        match self
            .repository
            .mark_cancelled(&self.match_idx, &reason, team_didnt_show)
            .await
        {
            Ok(_) => MonitorOutcome::Cancelled {
                reason,
                team_didnt_show,
            },
            Err(e) => {
                error!(
                    "Failed to persist cancellation of match {}: {}",
                    self.match_idx, e
                );
                MonitorOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn timed<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timer = self.metrics.start_timer();
        let result = call.await;
        self.metrics
            .record_game_network_call(operation, result.is_ok(), timer.stop());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerPool;
    use crate::network::protocol::LobbyTeam;
    use crate::network::SimulatedGameClient;
    use crate::store::InMemoryMatchStore;
    use crate::types::{LobbySettings, MatchRecord, MatchStatus};

    struct Harness {
        client: Arc<SimulatedGameClient>,
        pool: HandlerPool,
        repository: Arc<MatchRepository>,
        metrics: Arc<MetricsCollector>,
    }

    fn harness() -> Harness {
        let client = Arc::new(SimulatedGameClient::new("bot-0"));
        let dyn_client: Arc<dyn GameClient> = client.clone();
        Harness {
            client,
            pool: HandlerPool::new(vec![("bot-0", dyn_client)]),
            repository: Arc::new(MatchRepository::new(Arc::new(InMemoryMatchStore::new()))),
            metrics: Arc::new(MetricsCollector::new().unwrap()),
        }
    }

    fn plan() -> MatchPlan {
        MatchPlan {
            radiant: vec![1, 2],
            dire: vec![6, 7],
            lobby: LobbySettings {
                game_name: "scrim".to_string(),
                pass_key: "pw".to_string(),
                server_region: 3,
                game_mode: "captains_mode".to_string(),
            },
            start_at: None,
            tournament: None,
        }
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            time_to_cancel: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }

    async fn monitor(h: &Harness, idx: &str) -> MatchMonitor {
        let record = MatchRecord::scheduled(idx.to_string(), &plan(), 0);
        h.repository.create(&record).await.unwrap();
        MatchMonitor::new(
            idx.to_string(),
            plan(),
            h.pool.assign().unwrap(),
            h.repository.clone(),
            h.metrics.clone(),
            settings(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversion_persists_lobby_active() {
        let h = harness();
        let task = tokio::spawn(monitor(&h, "1").await.run());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(h.client.invited_players(), vec![1, 2, 6, 7]);
        h.client.launch_match(999).unwrap();

        let outcome = task.await.unwrap();
        assert_eq!(outcome, MonitorOutcome::Converted { match_id: 999 });

        let record = h.repository.get("1").await.unwrap();
        assert_eq!(record.status, MatchStatus::LobbyActive);
        assert_eq!(record.external_match_id, Some(999));
        assert_eq!(h.pool.by_index(0).unwrap().active_matches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_with_no_show_flags() {
        let h = harness();
        let task = tokio::spawn(monitor(&h, "2").await.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.client.join_lobby(1, LobbyTeam::GoodGuys).unwrap();
        h.client.join_lobby(2, LobbyTeam::GoodGuys).unwrap();
        h.client.join_lobby(6, LobbyTeam::BadGuys).unwrap();

        let outcome = task.await.unwrap();
        let expected = TeamDidntShow {
            radiant: false,
            dire: true,
        };
        assert_eq!(
            outcome,
            MonitorOutcome::Cancelled {
                reason: NO_SHOW_REASON.to_string(),
                team_didnt_show: Some(expected),
            }
        );

        let record = h.repository.get("2").await.unwrap();
        assert_eq!(record.status, MatchStatus::Cancelled);
        assert_eq!(record.team_didnt_show, Some(expected));
        assert!(h.client.lobby_snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lobby_creation_failure_cancels() {
        let h = harness();
        h.client
            .fail_operation(OP_CREATE_LOBBY, "coordinator unavailable")
            .unwrap();

        let outcome = monitor(&h, "3").await.run().await;
        assert_eq!(outcome.label(), "cancelled");

        let record = h.repository.get("3").await.unwrap();
        assert_eq!(record.status, MatchStatus::Cancelled);
        assert!(record
            .cancel_reason
            .unwrap()
            .contains("coordinator unavailable"));
        assert!(h.client.invited_players().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins_simultaneous_conversion() {
        let h = harness();
        let mut monitor = monitor(&h, "4").await;
        // The final poll lands exactly on the deadline
        monitor.settings = MonitorSettings {
            time_to_cancel: Duration::from_secs(10),
            poll_interval: Duration::from_secs(10),
        };
        let task = tokio::spawn(monitor.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.client.launch_match(555).unwrap();

        let outcome = task.await.unwrap();
        assert_eq!(outcome.label(), "cancelled");
        let record = h.repository.get("4").await.unwrap();
        assert_eq!(record.status, MatchStatus::Cancelled);
        assert!(record.external_match_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_start_time() {
        let h = harness();
        let mut monitor = monitor(&h, "5").await;
        monitor.plan.start_at = Some(Utc::now() + chrono::Duration::seconds(30));
        let task = tokio::spawn(monitor.run());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.client.lobby_snapshot().is_none());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(h.client.lobby_snapshot().is_some());
        task.abort();
    }
}
