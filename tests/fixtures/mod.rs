//! Test fixtures for integration testing
//!
//! Builds a full orchestrator stack over simulated game-network sessions
//! with short monitoring timings.

#![allow(dead_code)]

use match_broker::handlers::{HandlerPool, SelectionPolicy};
use match_broker::history::{InMemoryPlayerRepository, PlayerRecord};
use match_broker::matches::{MatchOrchestrator, MonitorSettings, OrchestratorSettings};
use match_broker::metrics::MetricsCollector;
use match_broker::network::protocol::{LobbyTeam, MatchData, MatchPlayer};
use match_broker::network::{GameClient, SimulatedGameClient};
use match_broker::notify::MockNotificationPublisher;
use match_broker::store::{MatchRepository, MockMatchStore};
use match_broker::tournament::TournamentScheduler;
use match_broker::types::{
    CreateMatchRequest, LobbySettings, PlayerId, TeamInfo, TourMatch, TournamentPlayer,
};
use std::sync::Arc;
use std::time::Duration;

/// Lobby deadline used by the fixtures
pub const TIME_TO_CANCEL: Duration = Duration::from_secs(60);

/// Lobby poll interval used by the fixtures
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A complete broker wired to simulated sessions
pub struct TestSystem {
    pub clients: Vec<Arc<SimulatedGameClient>>,
    pub store: Arc<MockMatchStore>,
    pub repository: Arc<MatchRepository>,
    pub orchestrator: MatchOrchestrator,
    pub scheduler: TournamentScheduler,
    pub notifier: Arc<MockNotificationPublisher>,
}

impl TestSystem {
    pub fn client(&self, handler_id: usize) -> &SimulatedGameClient {
        &self.clients[handler_id]
    }
}

/// Create a system with `handlers` sessions selected by `policy`
pub fn create_test_system(handlers: usize, policy: SelectionPolicy) -> TestSystem {
    let clients: Vec<Arc<SimulatedGameClient>> = (0..handlers)
        .map(|i| Arc::new(SimulatedGameClient::new(format!("bot-{}", i))))
        .collect();

    let pool = HandlerPool::new(clients.iter().map(|client| {
        let dyn_client: Arc<dyn GameClient> = client.clone();
        (client.account().to_string(), dyn_client)
    }))
    .with_policy(policy);

    let store = Arc::new(MockMatchStore::new());
    let repository = Arc::new(MatchRepository::new(store.clone()));
    let players = Arc::new(InMemoryPlayerRepository::with_players(vec![PlayerRecord {
        steam_id: 76561198000000001,
        matches: vec![9001, 9002],
    }]));
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));

    let settings = OrchestratorSettings {
        monitor: MonitorSettings {
            time_to_cancel: TIME_TO_CANCEL,
            poll_interval: POLL_INTERVAL,
        },
        max_history_limit: 20,
    };

    let orchestrator = MatchOrchestrator::new(
        Arc::new(pool),
        repository.clone(),
        players,
        metrics.clone(),
        settings,
    );

    let notifier = Arc::new(MockNotificationPublisher::new());
    let scheduler = TournamentScheduler::new(
        orchestrator.clone(),
        notifier.clone(),
        metrics,
        "match-broker-test",
        "captains_mode",
    );

    TestSystem {
        clients,
        store,
        repository,
        orchestrator,
        scheduler,
        notifier,
    }
}

/// Let spawned monitoring tasks run up to their next timer
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advance the paused clock, running every task that wakes meanwhile
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

pub fn lobby_settings(name: &str) -> LobbySettings {
    LobbySettings {
        game_name: name.to_string(),
        pass_key: "secret".to_string(),
        server_region: 3,
        game_mode: "captains_mode".to_string(),
    }
}

/// Schedule request starting immediately
pub fn match_request(radiant: &[PlayerId], dire: &[PlayerId]) -> CreateMatchRequest {
    CreateMatchRequest {
        team_a: radiant.to_vec(),
        team_b: dire.to_vec(),
        lobby_config: lobby_settings("integration"),
        start_time: String::new(),
    }
}

/// Seat players in the current lobby of `client`
pub fn seat(client: &SimulatedGameClient, players: &[PlayerId], team: LobbyTeam) {
    for player_id in players {
        client
            .join_lobby(*player_id, team)
            .expect("lobby should exist");
    }
}

/// Payload of a finished match
pub fn finished_match(match_id: u64) -> MatchData {
    MatchData {
        match_id,
        duration_secs: 2400,
        radiant_win: true,
        start_time: 1_700_000_000,
        game_mode: "captains_mode".to_string(),
        players: vec![MatchPlayer {
            account_id: 1,
            team: LobbyTeam::GoodGuys,
            hero_id: 14,
            kills: 9,
            deaths: 2,
            assists: 11,
        }],
    }
}

/// Bracket descriptor with one player per side
pub fn bracket_match(match_idx: i64) -> TourMatch {
    TourMatch {
        match_idx,
        region: "europe".to_string(),
        tournament_id: 12,
        tournament_owner_id: "owner".to_string(),
        tournament_name: "Spring Cup".to_string(),
        team1_id: 100,
        team2_id: 200,
        team1: TeamInfo {
            name: "Alpha".to_string(),
            logo: String::new(),
        },
        team2: TeamInfo {
            name: "Bravo".to_string(),
            logo: String::new(),
        },
        players: vec![
            TournamentPlayer {
                team: "team1".to_string(),
                steam_id: "76561198000000001".to_string(),
                wallet_address: String::new(),
            },
            TournamentPlayer {
                team: "team2".to_string(),
                steam_id: "76561198000000002".to_string(),
                wallet_address: String::new(),
            },
        ],
        ..TourMatch::default()
    }
}
