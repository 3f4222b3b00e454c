//! Match orchestration
//!
//! The [`MatchOrchestrator`] owns the match lifecycle: it writes the initial
//! record, binds a handler, supervises the monitoring task and resolves
//! status queries against the game network.

use crate::error::{BrokerError, Result};
use crate::handlers::{Handler, HandlerPool};
use crate::history::{MatchHistoryProvider, PlayerMatchSummary, PlayerRepository};
use crate::matches::monitor::{MatchMonitor, MonitorOutcome, MonitorSettings};
use crate::matches::projector::{self, MatchInfo};
use crate::matches::view::{MatchLobby, MatchResult, MatchStatusInfo, MatchView};
use crate::metrics::MetricsCollector;
use crate::network::protocol::{MatchDetails, MatchResultCode};
use crate::network::{OP_CURRENT_LOBBY, OP_INVITE_MEMBER, OP_MATCH_DETAILS};
use crate::store::{MatchRepository, ScheduledMatchRegistry};
use crate::types::{
    CreateMatchRequest, ExternalMatchId, MatchIdx, MatchPlan, MatchRecord, MatchStatus, PlayerId,
};
use crate::utils::{generate_match_idx, parse_start_time};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Orchestrator configuration
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub monitor: MonitorSettings,
    /// Upper bound on history lookups, whatever the caller asks for
    pub max_history_limit: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            monitor: MonitorSettings::default(),
            max_history_limit: 20,
        }
    }
}

/// Statistics about orchestrated matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub matches_scheduled: u64,
    pub tournament_matches_scheduled: u64,
    pub lobbies_converted: u64,
    pub matches_cancelled: u64,
    pub matches_finished: u64,
    pub monitor_failures: u64,
    pub reinvites_sent: u64,
    pub reinvite_failures: u64,
    /// Matches with a live monitoring task
    pub in_flight: usize,
}

/// A player the handler failed to invite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedInvite {
    pub player_id: PlayerId,
    pub error: String,
}

/// Per-player outcome of a reinvite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinviteReport {
    pub match_idx: MatchIdx,
    pub handler_id: usize,
    pub invited: Vec<PlayerId>,
    pub failed: Vec<FailedInvite>,
}

impl ReinviteReport {
    pub fn all_invited(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Schedules matches and answers status queries
#[derive(Clone)]
pub struct MatchOrchestrator {
    pool: Arc<HandlerPool>,
    repository: Arc<MatchRepository>,
    registry: Arc<ScheduledMatchRegistry>,
    players: Arc<dyn PlayerRepository>,
    history: Option<Arc<dyn MatchHistoryProvider>>,
    settings: OrchestratorSettings,
    stats: Arc<RwLock<OrchestratorStats>>,
    metrics: Arc<MetricsCollector>,
}

impl MatchOrchestrator {
    pub fn new(
        pool: Arc<HandlerPool>,
        repository: Arc<MatchRepository>,
        players: Arc<dyn PlayerRepository>,
        metrics: Arc<MetricsCollector>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            pool,
            repository,
            registry: Arc::new(ScheduledMatchRegistry::new()),
            players,
            history: None,
            settings,
            stats: Arc::new(RwLock::new(OrchestratorStats::default())),
            metrics,
        }
    }

    /// Attach the external match-history provider
    pub fn with_history_provider(mut self, provider: Arc<dyn MatchHistoryProvider>) -> Self {
        self.history = Some(provider);
        self
    }

    pub fn pool(&self) -> &Arc<HandlerPool> {
        &self.pool
    }

    pub fn repository(&self) -> &Arc<MatchRepository> {
        &self.repository
    }

    pub fn registry(&self) -> &Arc<ScheduledMatchRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Schedule a match from an API request and return its index
    pub async fn schedule_match(&self, request: CreateMatchRequest) -> Result<MatchIdx> {
        let start_at = parse_start_time(&request.start_time);
        if start_at.is_none() && !request.start_time.trim().is_empty() {
            warn!(
                "Unparseable start time '{}', starting match now",
                request.start_time
            );
        }

        let plan = MatchPlan {
            radiant: request.team_a,
            dire: request.team_b,
            lobby: request.lobby_config,
            start_at,
            tournament: None,
        };

        self.schedule_with_idx(generate_match_idx(), plan).await
    }

    /// Schedule a match under a caller-chosen index
    pub async fn schedule_with_idx(&self, match_idx: MatchIdx, plan: MatchPlan) -> Result<MatchIdx> {
        self.registry.try_register(&match_idx)?;
        let lease = match self.pool.assign() {
            Ok(lease) => lease,
            Err(e) => {
                self.registry.complete(&match_idx);
                return Err(e);
            }
        };

        let record = MatchRecord::scheduled(match_idx.clone(), &plan, lease.handler_id());
        if let Err(e) = self.repository.create(&record).await {
            error!("Failed to store scheduled match {}: {}", match_idx, e);
            self.registry.complete(&match_idx);
            return Err(e);
        }

        let tournament = plan.tournament.is_some();
        let handler_id = lease.handler_id();
        self.metrics.record_match_scheduled(tournament);
        self.metrics
            .update_handler(handler_id, lease.handler().active_matches());
        self.update_stats(|stats| {
            stats.matches_scheduled += 1;
            if tournament {
                stats.tournament_matches_scheduled += 1;
            }
        });

        let monitor = MatchMonitor::new(
            match_idx.clone(),
            plan,
            lease,
            self.repository.clone(),
            self.metrics.clone(),
            self.settings.monitor,
        );
        let handle = tokio::spawn(self.clone().supervise(monitor, handler_id));
        self.registry.attach(&match_idx, handle)?;

        info!(
            "Scheduled match {} on handler {} (tournament: {})",
            match_idx, handler_id, tournament
        );
        Ok(match_idx)
    }

    /// Run a monitoring task and release its bookkeeping when it ends
    async fn supervise(self, monitor: MatchMonitor, handler_id: usize) {
        let match_idx = monitor.match_idx().to_string();
        let outcome = monitor.run().await;

        self.registry.complete(&match_idx);
        self.metrics.record_monitor_outcome(&outcome);
        if let Ok(handler) = self.pool.by_index(handler_id) {
            self.metrics
                .update_handler(handler_id, handler.active_matches());
        }

        match &outcome {
            MonitorOutcome::Converted { match_id } => {
                info!("Match {} is live as game {}", match_idx, match_id);
                self.update_stats(|stats| stats.lobbies_converted += 1);
            }
            MonitorOutcome::Cancelled { reason, .. } => {
                info!("Match {} cancelled: {}", match_idx, reason);
                self.update_stats(|stats| stats.matches_cancelled += 1);
            }
            MonitorOutcome::Failed { error } => {
                error!("Monitoring of match {} failed: {}", match_idx, error);
                self.update_stats(|stats| stats.monitor_failures += 1);
            }
        }
    }

    /// Resolve the current view of a match
    pub async fn get_match(&self, match_idx: &str) -> Result<MatchView> {
        let record = self.repository.get(match_idx).await?;
        self.metrics.record_status_query(record.status);

        match record.status {
            MatchStatus::Cancelled => Ok(MatchView::cancelled(&record)),
            MatchStatus::Scheduled => {
                // Only the bound handler holds this match's lobby
                let handler = self.pool.by_index(record.handler_id)?;
                debug!(
                    "Polling lobby for match {} through handler {}",
                    match_idx,
                    handler.id()
                );
                let lobby = self
                    .timed(OP_CURRENT_LOBBY, handler.client().current_lobby())
                    .await?;
                Ok(MatchView::Lobby(MatchLobby {
                    status: (&record).into(),
                    lobby,
                }))
            }
            MatchStatus::Finished if record.result.is_some() => {
                let status = MatchStatusInfo::from(&record);
                let match_data = record.result.ok_or_else(|| BrokerError::InvariantViolation {
                    message: format!("finished match {} lost its payload", match_idx),
                })?;
                Ok(MatchView::Finished(MatchResult { status, match_data }))
            }
            MatchStatus::LobbyActive | MatchStatus::Finished | MatchStatus::Unknown => {
                self.resolve_launched(record).await
            }
        }
    }

    /// Query match details for a launched match and persist completion
    async fn resolve_launched(&self, record: MatchRecord) -> Result<MatchView> {
        let match_id = record
            .external_match_id
            .ok_or_else(|| BrokerError::InvariantViolation {
                message: format!(
                    "match {} is {} without an external match id",
                    record.match_idx, record.status
                ),
            })?;

        let details = self.fetch_match_details(match_id).await?;
        match details.result {
            MatchResultCode::Complete => {
                let match_data =
                    details
                        .match_data
                        .ok_or_else(|| BrokerError::InvariantViolation {
                            message: format!("complete match {} has no payload", match_id),
                        })?;

                let mut status = MatchStatusInfo::from(&record);
                status.status = MatchStatus::Finished;
                status.match_id = Some(match_id);

                if record.status != MatchStatus::Finished {
                    match self
                        .repository
                        .mark_finished(&record.match_idx, match_data.clone())
                        .await
                    {
                        Ok(_) => {
                            info!("Match {} finished (game {})", record.match_idx, match_id);
                            self.metrics.record_match_finished();
                            self.update_stats(|stats| stats.matches_finished += 1);
                        }
                        Err(e) => warn!(
                            "Failed to persist finished status for match {}: {}",
                            record.match_idx, e
                        ),
                    }
                }

                Ok(MatchView::Finished(MatchResult { status, match_data }))
            }
            MatchResultCode::InProgress => Ok(MatchView::Pending((&record).into())),
            MatchResultCode::Unavailable | MatchResultCode::NotFound => {
                debug!(
                    "Match details for game {} returned {:?}",
                    match_id, details.result
                );
                Err(BrokerError::ExternalMatchNotFound { match_id })
            }
        }
    }

    /// Resolve a match and project it for clients
    pub async fn get_match_info(&self, match_idx: &str) -> Result<MatchInfo> {
        let view = self.get_match(match_idx).await?;
        Ok(projector::project(&view))
    }

    /// Invite players again through the match's own handler
    pub async fn reinvite_players(
        &self,
        match_idx: &str,
        players: &[PlayerId],
    ) -> Result<ReinviteReport> {
        let record = self.repository.get(match_idx).await?;
        let handler = self.pool.by_index(record.handler_id)?;

        let mut report = ReinviteReport {
            match_idx: record.match_idx.clone(),
            handler_id: handler.id(),
            invited: Vec::with_capacity(players.len()),
            failed: Vec::new(),
        };

        for &player_id in players {
            match self.invite(&handler, player_id).await {
                Ok(()) => report.invited.push(player_id),
                Err(e) => {
                    warn!(
                        "Reinvite of player {} to match {} failed: {}",
                        player_id, match_idx, e
                    );
                    report.failed.push(FailedInvite {
                        player_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let (sent, failed) = (report.invited.len() as u64, report.failed.len() as u64);
        self.update_stats(|stats| {
            stats.reinvites_sent += sent;
            stats.reinvite_failures += failed;
        });

        info!(
            "Reinvited {}/{} players to match {} via handler {}",
            sent,
            players.len(),
            match_idx,
            handler.id()
        );
        Ok(report)
    }

    /// Invite a single player through the first available handler
    pub async fn invite_to_lobby(&self, player_id: PlayerId) -> Result<()> {
        let (handler, handler_id) = self.pool.first_available()?;
        self.invite(&handler, player_id).await?;
        info!("Invited player {} via handler {}", player_id, handler_id);
        Ok(())
    }

    /// Details of a player's stored matches, newest first
    pub async fn get_player_history(
        &self,
        steam_id: PlayerId,
        limit: usize,
    ) -> Result<Vec<MatchDetails>> {
        let started = Instant::now();
        let player = self.players.get_player(steam_id).await?;
        let limit = limit.min(self.settings.max_history_limit);

        let mut history = Vec::new();
        for &match_id in player.matches.iter().take(limit) {
            history.push(self.fetch_match_details(match_id).await?);
        }

        self.metrics.record_history_fetch("game_network", started.elapsed());
        debug!(
            "Fetched {} history entries for player {}",
            history.len(),
            steam_id
        );
        Ok(history)
    }

    /// Recent public matches of a player from the statistics service
    pub async fn get_player_history_external(
        &self,
        steam_id: PlayerId,
        limit: usize,
    ) -> Result<Vec<PlayerMatchSummary>> {
        let provider = self
            .history
            .as_ref()
            .ok_or_else(|| BrokerError::InvalidRequest {
                reason: "external match history is not configured".to_string(),
            })?;

        let started = Instant::now();
        let limit = limit.min(self.settings.max_history_limit);
        let matches = provider.player_matches(steam_id, limit).await?;
        self.metrics
            .record_history_fetch(provider.source(), started.elapsed());
        Ok(matches)
    }

    /// Current orchestrator statistics
    pub fn get_stats(&self) -> Result<OrchestratorStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| BrokerError::lock("orchestrator stats"))?;

        let mut stats = stats.clone();
        stats.in_flight = self.registry.len();
        Ok(stats)
    }

    /// Abort every in-flight monitoring task
    pub fn shutdown(&self) -> usize {
        self.registry.abort_all()
    }

    async fn fetch_match_details(&self, match_id: ExternalMatchId) -> Result<MatchDetails> {
        let (handler, _) = self.pool.first_available()?;
        self.timed(
            OP_MATCH_DETAILS,
            handler.client().request_match_details(match_id),
        )
        .await
    }

    async fn invite(&self, handler: &Handler, player_id: PlayerId) -> Result<()> {
        let result = self
            .timed(
                OP_INVITE_MEMBER,
                handler.client().invite_lobby_member(player_id),
            )
            .await;
        self.metrics.record_invite(result.is_ok());
        result
    }

    async fn timed<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timer = self.metrics.start_timer();
        let result = call.await;
        self.metrics
            .record_game_network_call(operation, result.is_ok(), timer.stop());
        if let Err(e) = &result {
            warn!("Game network call {} failed: {}", operation, e);
        }
        result
    }

    fn update_stats<F>(&self, update: F)
    where
        F: FnOnce(&mut OrchestratorStats),
    {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire orchestrator stats lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{InMemoryPlayerRepository, MockMatchHistoryProvider, PlayerRecord};
    use crate::network::protocol::{LobbyTeam, MatchData};
    use crate::network::{GameClient, MockGameClient, SimulatedGameClient};
    use crate::store::{InMemoryMatchStore, MockMatchStore};
    use crate::types::LobbySettings;
    use std::time::Duration;

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            monitor: MonitorSettings {
                time_to_cancel: Duration::from_secs(60),
                poll_interval: Duration::from_secs(5),
            },
            max_history_limit: 10,
        }
    }

    fn orchestrator_with(
        clients: Vec<Arc<dyn GameClient>>,
        store: Arc<dyn crate::store::MatchStore>,
    ) -> MatchOrchestrator {
        let pool = HandlerPool::new(
            clients
                .into_iter()
                .enumerate()
                .map(|(i, c)| (format!("bot-{}", i), c)),
        );
        MatchOrchestrator::new(
            Arc::new(pool),
            Arc::new(MatchRepository::new(store)),
            Arc::new(InMemoryPlayerRepository::with_players(vec![PlayerRecord {
                steam_id: 1,
                matches: vec![30, 20, 10],
            }])),
            Arc::new(MetricsCollector::new().unwrap()),
            settings(),
        )
    }

    fn simulated(count: usize) -> (MatchOrchestrator, Vec<Arc<SimulatedGameClient>>) {
        let clients: Vec<_> = (0..count)
            .map(|i| Arc::new(SimulatedGameClient::new(format!("bot-{}", i))))
            .collect();
        let dyn_clients = clients
            .iter()
            .map(|c| c.clone() as Arc<dyn GameClient>)
            .collect();
        (
            orchestrator_with(dyn_clients, Arc::new(InMemoryMatchStore::new())),
            clients,
        )
    }

    fn request() -> CreateMatchRequest {
        CreateMatchRequest {
            team_a: vec![1, 2, 3, 4, 5],
            team_b: vec![6, 7, 8, 9, 10],
            lobby_config: LobbySettings {
                game_name: "scrim".to_string(),
                pass_key: "pw".to_string(),
                server_region: 3,
                game_mode: "captains_mode".to_string(),
            },
            start_time: String::new(),
        }
    }

    fn match_data(match_id: u64) -> MatchData {
        MatchData {
            match_id,
            duration_secs: 2100,
            radiant_win: true,
            start_time: 1_700_000_000,
            game_mode: "captains_mode".to_string(),
            players: Vec::new(),
        }
    }

    /// Seed a record already launched as `match_id`
    async fn launched_record(orchestrator: &MatchOrchestrator, idx: &str, match_id: u64) {
        let plan = MatchPlan {
            radiant: vec![1],
            dire: vec![2],
            lobby: request().lobby_config,
            start_at: None,
            tournament: None,
        };
        let record = MatchRecord::scheduled(idx.to_string(), &plan, 0);
        orchestrator.repository.create(&record).await.unwrap();
        orchestrator
            .repository
            .mark_lobby_active(idx, match_id)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_writes_scheduled_record() {
        let (orchestrator, _) = simulated(1);
        let idx = orchestrator.schedule_match(request()).await.unwrap();
        assert!(!idx.is_empty());

        let record = orchestrator.repository.get(&idx).await.unwrap();
        assert_eq!(record.status, MatchStatus::Scheduled);
        assert_eq!(record.handler_id, 0);
        assert!(orchestrator.registry.contains(&idx));
        assert_eq!(orchestrator.get_stats().unwrap().matches_scheduled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_with_invalid_start_time_starts_now() {
        let (orchestrator, clients) = simulated(1);
        let mut req = request();
        req.start_time = "next tuesday".to_string();

        let idx = orchestrator.schedule_match(req).await.unwrap();
        let record = orchestrator.repository.get(&idx).await.unwrap();
        assert!(record.start_time.is_none());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(clients[0].lobby_snapshot().is_some());
    }

    #[tokio::test]
    async fn test_schedule_without_handlers_fails() {
        let (orchestrator, _) = simulated(0);
        let err = orchestrator.schedule_match(request()).await.unwrap_err();
        assert!(matches!(err, BrokerError::NoHandlerAvailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_store_failure_releases_registry() {
        let store = Arc::new(MockMatchStore::new());
        store.set_fail_writes(true);
        let client: Arc<dyn GameClient> = Arc::new(SimulatedGameClient::new("bot-0"));
        let orchestrator = orchestrator_with(vec![client], store);

        let err = orchestrator
            .schedule_with_idx("77".to_string(), MatchPlan {
                radiant: vec![1],
                dire: vec![2],
                lobby: request().lobby_config,
                start_at: None,
                tournament: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Store { .. }));
        assert!(!orchestrator.registry.contains("77"));
        assert_eq!(orchestrator.pool.by_index(0).unwrap().active_matches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_idx_rejected_while_in_flight() {
        let (orchestrator, _) = simulated(1);
        let plan = MatchPlan {
            radiant: vec![1],
            dire: vec![2],
            lobby: request().lobby_config,
            start_at: None,
            tournament: None,
        };

        orchestrator
            .schedule_with_idx("5".to_string(), plan.clone())
            .await
            .unwrap();
        let err = orchestrator
            .schedule_with_idx("5".to_string(), plan)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::AlreadyScheduled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_matches_get_separate_handlers() {
        let (orchestrator, clients) = simulated(2);
        let first = orchestrator.schedule_match(request()).await.unwrap();
        let second = orchestrator.schedule_match(request()).await.unwrap();

        let first_handler = orchestrator.repository.get(&first).await.unwrap().handler_id;
        let second_handler = orchestrator.repository.get(&second).await.unwrap().handler_id;
        assert_eq!((first_handler, second_handler), (0, 1));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(clients[0].lobby_snapshot().is_some());
        assert!(clients[1].lobby_snapshot().is_some());

        // Both handlers are owned; a third match has nowhere to go
        let err = orchestrator.schedule_match(request()).await.unwrap_err();
        assert!(matches!(err, BrokerError::NoHandlerAvailable));
        assert_eq!(orchestrator.registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_poll_reads_bound_handler_lobby() {
        let (orchestrator, clients) = simulated(2);
        let _first = orchestrator.schedule_match(request()).await.unwrap();
        let second = orchestrator.schedule_match(request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        clients[0].join_lobby(1, LobbyTeam::GoodGuys).unwrap();
        clients[1].join_lobby(6, LobbyTeam::BadGuys).unwrap();

        let info = orchestrator.get_match_info(&second).await.unwrap();
        assert!(info.radiant_players.is_empty());
        assert_eq!(info.dire_players, vec![6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_concluded_match_is_rejected() {
        let (orchestrator, _) = simulated(1);
        let plan = MatchPlan {
            radiant: vec![1],
            dire: vec![2],
            lobby: request().lobby_config,
            start_at: None,
            tournament: None,
        };

        orchestrator
            .schedule_with_idx("7".to_string(), plan.clone())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(
            orchestrator.repository.get("7").await.unwrap().status,
            MatchStatus::Cancelled
        );

        let err = orchestrator
            .schedule_with_idx("7".to_string(), plan)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BrokerError::AlreadyProgressed {
                status: MatchStatus::Cancelled,
                ..
            }
        ));

        let record = orchestrator.repository.get("7").await.unwrap();
        assert_eq!(record.status, MatchStatus::Cancelled);
        assert!(record.cancel_reason.is_some());
        assert!(!orchestrator.registry.contains("7"));
        assert_eq!(orchestrator.pool.by_index(0).unwrap().active_matches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_poll_returns_lobby_without_mutation() {
        let (orchestrator, clients) = simulated(1);
        let idx = orchestrator.schedule_match(request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        clients[0].join_lobby(1, LobbyTeam::GoodGuys).unwrap();
        clients[0].join_lobby(2, LobbyTeam::GoodGuys).unwrap();
        clients[0].join_lobby(6, LobbyTeam::BadGuys).unwrap();

        for _ in 0..3 {
            let info = orchestrator.get_match_info(&idx).await.unwrap();
            assert_eq!(info.status, MatchStatus::Scheduled);
            assert_eq!(info.radiant_players, vec![1, 2]);
            assert_eq!(info.dire_players, vec![6]);
        }

        let record = orchestrator.repository.get(&idx).await.unwrap();
        assert_eq!(record.status, MatchStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_cancelled_match_makes_no_external_calls() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_current_lobby().never();
        mock.expect_request_match_details().never();

        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));

        let plan = MatchPlan {
            radiant: vec![1],
            dire: vec![2],
            lobby: request().lobby_config,
            start_at: None,
            tournament: None,
        };
        let record = MatchRecord::scheduled("10".to_string(), &plan, 0);
        orchestrator.repository.create(&record).await.unwrap();
        orchestrator
            .repository
            .mark_cancelled("10", "players did not join", None)
            .await
            .unwrap();

        let view = orchestrator.get_match("10").await.unwrap();
        match view {
            MatchView::Cancelled(cancel) => assert_eq!(cancel.reason, "players did not join"),
            other => panic!("expected cancelled view, got {:?}", other),
        }
        assert!(orchestrator.get_match_info("10").await.unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_complete_result_finishes_once() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_request_match_details()
            .withf(|id| *id == 999)
            .times(1)
            .returning(|id| Ok(MatchDetails::complete(match_data(id))));

        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));
        launched_record(&orchestrator, "1", 999).await;

        let view = orchestrator.get_match("1").await.unwrap();
        match &view {
            MatchView::Finished(result) => {
                assert_eq!(result.match_data.match_id, 999);
                assert_eq!(result.status.status, MatchStatus::Finished);
            }
            other => panic!("expected finished view, got {:?}", other),
        }

        let record = orchestrator.repository.get("1").await.unwrap();
        assert_eq!(record.status, MatchStatus::Finished);

        // Served from the store; the mock allows exactly one details request
        let again = orchestrator.get_match("1").await.unwrap();
        assert_eq!(again, view);
        assert_eq!(orchestrator.get_stats().unwrap().matches_finished, 1);
    }

    #[tokio::test]
    async fn test_in_progress_returns_status_unchanged() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_request_match_details()
            .returning(|_| Ok(MatchDetails::with_code(MatchResultCode::InProgress)));

        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));
        launched_record(&orchestrator, "2", 500).await;

        let view = orchestrator.get_match("2").await.unwrap();
        assert!(matches!(view, MatchView::Pending(ref s) if s.status == MatchStatus::LobbyActive));
        assert_eq!(
            orchestrator.repository.get("2").await.unwrap().status,
            MatchStatus::LobbyActive
        );
    }

    #[tokio::test]
    async fn test_unrecognised_code_is_not_found_and_store_unchanged() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_request_match_details()
            .returning(|_| Ok(MatchDetails::with_code(MatchResultCode::from_code(42))));

        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));
        launched_record(&orchestrator, "3", 700).await;
        let before = orchestrator.repository.get("3").await.unwrap();

        let err = orchestrator.get_match("3").await.unwrap_err();
        assert!(matches!(err, BrokerError::ExternalMatchNotFound { match_id: 700 }));
        assert!(err.to_string().starts_with("match not found"));

        assert_eq!(orchestrator.repository.get("3").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_finished_persist_failure_still_returns_result() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_request_match_details()
            .returning(|id| Ok(MatchDetails::complete(match_data(id))));

        let store = Arc::new(MockMatchStore::new());
        let orchestrator = orchestrator_with(vec![Arc::new(mock)], store.clone());
        launched_record(&orchestrator, "4", 800).await;
        store.set_fail_writes(true);

        let view = orchestrator.get_match("4").await.unwrap();
        assert_eq!(view.status(), MatchStatus::Finished);
        assert_eq!(
            orchestrator.repository.get("4").await.unwrap().status,
            MatchStatus::LobbyActive
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_surfaced() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_request_match_details()
            .times(1)
            .returning(|_| Err(BrokerError::upstream(OP_MATCH_DETAILS, "timeout")));

        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));
        launched_record(&orchestrator, "6", 900).await;

        let err = orchestrator.get_match("6").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn test_reinvite_uses_bound_handler_only() {
        let mut clients: Vec<Arc<dyn GameClient>> = Vec::new();
        for index in 0..3 {
            let mut mock = MockGameClient::new();
            mock.expect_is_ready().return_const(true);
            if index == 2 {
                mock.expect_invite_lobby_member()
                    .times(3)
                    .returning(|_| Ok(()));
            } else {
                mock.expect_invite_lobby_member().never();
            }
            clients.push(Arc::new(mock));
        }
        let orchestrator = orchestrator_with(clients, Arc::new(InMemoryMatchStore::new()));

        let plan = MatchPlan {
            radiant: vec![1],
            dire: vec![2],
            lobby: request().lobby_config,
            start_at: None,
            tournament: None,
        };
        let record = MatchRecord::scheduled("20".to_string(), &plan, 2);
        orchestrator.repository.create(&record).await.unwrap();

        // Player 99 is on neither roster
        let report = orchestrator
            .reinvite_players("20", &[1, 2, 99])
            .await
            .unwrap();
        assert_eq!(report.handler_id, 2);
        assert_eq!(report.invited, vec![1, 2, 99]);
        assert!(report.all_invited());
    }

    #[tokio::test]
    async fn test_reinvite_collects_failures_and_continues() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_invite_lobby_member().returning(|player| {
            if player == 2 {
                Err(BrokerError::upstream(OP_INVITE_MEMBER, "player offline"))
            } else {
                Ok(())
            }
        });
        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));
        launched_record(&orchestrator, "21", 1).await;

        let report = orchestrator
            .reinvite_players("21", &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(report.invited, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].player_id, 2);

        let stats = orchestrator.get_stats().unwrap();
        assert_eq!(stats.reinvites_sent, 2);
        assert_eq!(stats.reinvite_failures, 1);
    }

    #[tokio::test]
    async fn test_reinvite_unknown_match_is_not_found() {
        let (orchestrator, _) = simulated(1);
        let err = orchestrator.reinvite_players("nope", &[1]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reinvite_with_out_of_range_handler() {
        let (orchestrator, _) = simulated(1);
        let plan = MatchPlan {
            radiant: vec![1],
            dire: vec![2],
            lobby: request().lobby_config,
            start_at: None,
            tournament: None,
        };
        let record = MatchRecord::scheduled("22".to_string(), &plan, 4);
        orchestrator.repository.create(&record).await.unwrap();

        let err = orchestrator.reinvite_players("22", &[1]).await.unwrap_err();
        assert!(matches!(err, BrokerError::HandlerNotFound { handler_id: 4 }));
    }

    #[tokio::test]
    async fn test_invite_to_lobby_uses_first_ready_handler() {
        let (orchestrator, clients) = simulated(2);
        clients[0].set_ready(false);
        clients[1]
            .create_lobby(&request().lobby_config)
            .await
            .unwrap();

        orchestrator.invite_to_lobby(42).await.unwrap();
        assert_eq!(clients[1].invited_players(), vec![42]);
        assert!(clients[0].invited_players().is_empty());
    }

    #[tokio::test]
    async fn test_player_history_fails_fast() {
        let mut mock = MockGameClient::new();
        mock.expect_is_ready().return_const(true);
        mock.expect_request_match_details()
            .times(2)
            .returning(|id| {
                if id == 20 {
                    Err(BrokerError::upstream(OP_MATCH_DETAILS, "timeout"))
                } else {
                    Ok(MatchDetails::complete(match_data(id)))
                }
            });
        let orchestrator =
            orchestrator_with(vec![Arc::new(mock)], Arc::new(InMemoryMatchStore::new()));

        let err = orchestrator.get_player_history(1, 3).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn test_player_history_respects_limit() {
        let (orchestrator, clients) = simulated(1);
        clients[0]
            .set_match_details(30, MatchDetails::complete(match_data(30)))
            .unwrap();
        clients[0]
            .set_match_details(20, MatchDetails::complete(match_data(20)))
            .unwrap();

        let history = orchestrator.get_player_history(1, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].match_data.as_ref().unwrap().match_id, 30);

        let err = orchestrator.get_player_history(2, 5).await.unwrap_err();
        assert!(matches!(err, BrokerError::PlayerNotFound { player_id: 2 }));
    }

    #[tokio::test]
    async fn test_external_history_clamps_limit() {
        let mut provider = MockMatchHistoryProvider::new();
        provider
            .expect_player_matches()
            .withf(|steam_id, limit| *steam_id == 1 && *limit == 10)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        provider.expect_source().return_const("opendota");

        let (orchestrator, _) = simulated(1);
        let orchestrator = orchestrator.with_history_provider(Arc::new(provider));
        let matches = orchestrator
            .get_player_history_external(1, 500)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_external_history_without_provider() {
        let (orchestrator, _) = simulated(1);
        let err = orchestrator
            .get_player_history_external(1, 5)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
    }
}
