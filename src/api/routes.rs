//! Route handlers of the match API

use crate::error::Result;
use crate::history::PlayerMatchSummary;
use crate::matches::{MatchInfo, MatchView, ReinviteReport};
use crate::metrics::{monitoring_routes, MonitoringState};
use crate::network::protocol::MatchDetails;
use crate::service::AppState;
use crate::tournament::BracketScheduleOutcome;
use crate::types::{
    CreateMatchRequest, MatchIdx, PlayerId, ReinvitePlayersRequest, ScheduleTournamentRequest,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Response to a schedule request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMatch {
    pub match_idx: MatchIdx,
}

/// Body of a bracket reinvite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketReinvite {
    pub players: Vec<PlayerId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

/// Match API routes
pub fn api_routes(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/matches", post(schedule_match))
        .route("/matches/reinvite", post(reinvite_players))
        .route("/matches/{match_idx}", get(get_match))
        .route("/matches/{match_idx}/info", get(get_match_info))
        .route("/tournaments/matches", post(schedule_tournament))
        .route(
            "/tournaments/matches/{bracket_idx}/reinvite",
            post(reinvite_bracket_players),
        )
        .route("/lobby/invite/{steam_id}", post(invite_to_lobby))
        .route("/players/{steam_id}/history", get(player_history))
        .route(
            "/players/{steam_id}/history/opendota",
            get(player_history_external),
        )
        .with_state(app)
}

/// Match API merged with the health and metrics endpoints
pub fn router(app: Arc<AppState>) -> Router {
    let monitoring = MonitoringState::new(app.metrics()).with_app(app.clone());
    api_routes(app).merge(monitoring_routes(monitoring))
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "match-broker",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/matches",
            "/matches/{matchIdx}",
            "/matches/{matchIdx}/info",
            "/matches/reinvite",
            "/tournaments/matches",
            "/lobby/invite/{steamId}",
            "/players/{steamId}/history",
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    }))
}

async fn schedule_match(
    State(app): State<Arc<AppState>>,
    Json(request): Json<CreateMatchRequest>,
) -> Result<Json<ScheduledMatch>> {
    let match_idx = app.orchestrator().schedule_match(request).await?;
    Ok(Json(ScheduledMatch { match_idx }))
}

async fn get_match(
    State(app): State<Arc<AppState>>,
    Path(match_idx): Path<MatchIdx>,
) -> Result<Json<MatchView>> {
    debug!("Match status requested for {}", match_idx);
    Ok(Json(app.orchestrator().get_match(&match_idx).await?))
}

async fn get_match_info(
    State(app): State<Arc<AppState>>,
    Path(match_idx): Path<MatchIdx>,
) -> Result<Json<MatchInfo>> {
    Ok(Json(app.orchestrator().get_match_info(&match_idx).await?))
}

async fn reinvite_players(
    State(app): State<Arc<AppState>>,
    Json(request): Json<ReinvitePlayersRequest>,
) -> Result<Json<ReinviteReport>> {
    let report = app
        .orchestrator()
        .reinvite_players(&request.match_idx, &request.players)
        .await?;
    Ok(Json(report))
}

async fn schedule_tournament(
    State(app): State<Arc<AppState>>,
    Json(request): Json<ScheduleTournamentRequest>,
) -> Json<Vec<BracketScheduleOutcome>> {
    info!(
        "Tournament schedule requested for {} bracket matches",
        request.matches.len()
    );
    Json(app.scheduler().schedule_batch(request.matches).await)
}

async fn reinvite_bracket_players(
    State(app): State<Arc<AppState>>,
    Path(bracket_idx): Path<i64>,
    Json(request): Json<BracketReinvite>,
) -> Result<Json<ReinviteReport>> {
    let report = app
        .scheduler()
        .reinvite_players(bracket_idx, &request.players)
        .await?;
    Ok(Json(report))
}

async fn invite_to_lobby(
    State(app): State<Arc<AppState>>,
    Path(steam_id): Path<PlayerId>,
) -> Result<StatusCode> {
    app.orchestrator().invite_to_lobby(steam_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn player_history(
    State(app): State<Arc<AppState>>,
    Path(steam_id): Path<PlayerId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MatchDetails>>> {
    let history = app
        .orchestrator()
        .get_player_history(steam_id, query.limit())
        .await?;
    Ok(Json(history))
}

async fn player_history_external(
    State(app): State<Arc<AppState>>,
    Path(steam_id): Path<PlayerId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PlayerMatchSummary>>> {
    let history = app
        .orchestrator()
        .get_player_history_external(steam_id, query.limit())
        .await?;
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::history::{InMemoryPlayerRepository, PlayerRecord};
    use crate::network::{GameClient, SimulatedGameClient};
    use crate::notify::MockNotificationPublisher;
    use crate::service::ServiceComponents;
    use crate::store::InMemoryMatchStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt; // for oneshot

    fn app() -> Arc<AppState> {
        let client: Arc<dyn GameClient> = Arc::new(SimulatedGameClient::new("bot-0"));
        let components = ServiceComponents {
            clients: vec![("bot-0".to_string(), client)],
            store: Arc::new(InMemoryMatchStore::new()),
            players: Arc::new(InMemoryPlayerRepository::with_players(vec![PlayerRecord {
                steam_id: 7,
                matches: Vec::new(),
            }])),
            history: None,
            notifier: Arc::new(MockNotificationPublisher::new()),
        };
        Arc::new(AppState::with_components(AppConfig::default(), components).unwrap())
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_then_read_info() {
        let router = api_routes(app());

        let (status, body) = send(
            router.clone(),
            post_json(
                "/matches",
                json!({
                    "teamA": [1, 2],
                    "teamB": [3, 4],
                    "lobbyConfig": {
                        "gameName": "scrim",
                        "passKey": "pw",
                        "serverRegion": 3,
                        "gameMode": "all_pick"
                    },
                    "startTime": ""
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let match_idx = body["matchIdx"].as_str().unwrap().to_string();

        let (status, info) = send(router, get(&format!("/matches/{}/info", match_idx))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["matchIdx"], match_idx.as_str());
        assert_eq!(info["status"], "scheduled");
        assert_eq!(info["cancelled"], false);
    }

    #[tokio::test]
    async fn test_unknown_match_is_404() {
        let (status, body) = send(api_routes(app()), get("/matches/12345")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reinvite_unknown_match_is_404() {
        let (status, _) = send(
            api_routes(app()),
            post_json("/matches/reinvite", json!({"matchIdx": 99, "players": [1]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invite_with_invalid_steam_id_is_rejected() {
        let response = api_routes(app())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/lobby/invite/not-a-number")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tournament_batch_reports_each_descriptor() {
        let (status, body) = send(
            api_routes(app()),
            post_json(
                "/tournaments/matches",
                json!({
                    "matches": [
                        {
                            "matchIdx": 1,
                            "tournamentId": 3,
                            "tournamentName": "Cup",
                            "team1Id": 1,
                            "team2Id": 2,
                            "team1": {"name": "A"},
                            "team2": {"name": "B"},
                            "players": [
                                {"team": "team1", "steam_id_64": "76561198000000001"},
                                {"team": "team2", "steam_id_64": "76561198000000002"}
                            ],
                            "startEpoch": 0
                        },
                        {
                            "matchIdx": 2,
                            "tournamentId": 3,
                            "tournamentName": "Cup",
                            "team1Id": 1,
                            "team2Id": 2,
                            "team1": {"name": "A"},
                            "team2": {"name": "B"},
                            "players": [],
                            "startEpoch": 0,
                            "cancelled": true
                        }
                    ]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["outcome"], "scheduled");
        assert_eq!(body[0]["matchIdx"], "1");
        assert_eq!(body[1]["outcome"], "skipped");
    }

    #[tokio::test]
    async fn test_player_history_routes() {
        let router = api_routes(app());

        let (status, body) = send(router.clone(), get("/players/7/history?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(router.clone(), get("/players/8/history")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(router, get("/players/7/history/opendota")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_merged_router_serves_metrics() {
        let response = router(app()).oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
