//! In-memory game-network session
//!
//! Keeps lobby and match state locally so the broker can run without a live
//! game-network connection. Tests drive it through the control methods
//! (`join_lobby`, `launch_match`, `set_match_details`, `fail_operation`).

use crate::error::{BrokerError, Result};
use crate::network::protocol::{
    Lobby, LobbyMember, LobbyState, LobbyTeam, MatchDetails, MatchResultCode,
};
use crate::network::{
    GameClient, OP_CREATE_LOBBY, OP_CURRENT_LOBBY, OP_INVITE_MEMBER, OP_LEAVE_LOBBY,
    OP_MATCH_DETAILS,
};
use crate::types::{ExternalMatchId, LobbySettings, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct SessionState {
    lobby: Option<Lobby>,
    next_lobby_id: u64,
    invites: Vec<PlayerId>,
    match_details: HashMap<ExternalMatchId, MatchDetails>,
    failures: HashMap<&'static str, String>,
    calls: HashMap<&'static str, usize>,
}

/// Simulated session handler connection
#[derive(Debug)]
pub struct SimulatedGameClient {
    account: String,
    ready: AtomicBool,
    state: Mutex<SessionState>,
}

impl SimulatedGameClient {
    /// Create a connected session for the given bot account
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ready: AtomicBool::new(true),
            state: Mutex::new(SessionState {
                next_lobby_id: 1,
                ..SessionState::default()
            }),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Mark the session as connected or disconnected
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every call of `operation` fail until cleared
    pub fn fail_operation(&self, operation: &'static str, message: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.failures.insert(operation, message.to_string());
        Ok(())
    }

    pub fn clear_failure(&self, operation: &'static str) -> Result<()> {
        let mut state = self.lock()?;
        state.failures.remove(operation);
        Ok(())
    }

    /// Seat a player in the current lobby
    pub fn join_lobby(&self, player_id: PlayerId, team: LobbyTeam) -> Result<()> {
        let mut state = self.lock()?;
        let lobby = state.lobby.as_mut().ok_or_else(no_lobby)?;

        match lobby.members.iter_mut().find(|m| m.id == player_id) {
            Some(member) => member.team = team,
            None => lobby.members.push(LobbyMember {
                id: player_id,
                team,
                name: String::new(),
            }),
        }
        Ok(())
    }

    /// Launch the current lobby into a real match
    pub fn launch_match(&self, match_id: ExternalMatchId) -> Result<()> {
        let mut state = self.lock()?;
        let lobby = state.lobby.as_mut().ok_or_else(no_lobby)?;
        lobby.match_id = match_id;
        lobby.state = LobbyState::Run;
        Ok(())
    }

    /// Register the response returned for a match-details request
    pub fn set_match_details(&self, match_id: ExternalMatchId, details: MatchDetails) -> Result<()> {
        let mut state = self.lock()?;
        state.match_details.insert(match_id, details);
        Ok(())
    }

    /// Players invited so far, in invite order
    pub fn invited_players(&self) -> Vec<PlayerId> {
        self.state
            .lock()
            .map(|state| state.invites.clone())
            .unwrap_or_default()
    }

    /// Number of calls made to `operation`
    pub fn call_count(&self, operation: &'static str) -> usize {
        self.state
            .lock()
            .map(|state| state.calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn lobby_snapshot(&self) -> Option<Lobby> {
        self.state.lock().ok().and_then(|state| state.lobby.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| BrokerError::lock("session state"))
    }

    /// Count the call and return the configured failure, if any
    fn begin(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, SessionState>> {
        let mut state = self.lock()?;
        *state.calls.entry(operation).or_insert(0) += 1;

        if !self.is_ready() {
            return Err(BrokerError::upstream(operation, "session is not connected"));
        }
        if let Some(message) = state.failures.get(operation) {
            return Err(BrokerError::upstream(operation, message));
        }
        Ok(state)
    }
}

fn no_lobby() -> BrokerError {
    BrokerError::upstream(OP_CURRENT_LOBBY, "no active lobby")
}

#[async_trait]
impl GameClient for SimulatedGameClient {
    async fn create_lobby(&self, settings: &LobbySettings) -> Result<Lobby> {
        let mut state = self.begin(OP_CREATE_LOBBY)?;

        let lobby = Lobby {
            lobby_id: state.next_lobby_id,
            match_id: 0,
            state: LobbyState::Ui,
            game_name: settings.game_name.clone(),
            server_region: settings.server_region,
            members: Vec::new(),
        };
        state.next_lobby_id += 1;
        state.lobby = Some(lobby.clone());

        debug!(
            "[{}] created lobby {} '{}'",
            self.account, lobby.lobby_id, lobby.game_name
        );
        Ok(lobby)
    }

    async fn invite_lobby_member(&self, player_id: PlayerId) -> Result<()> {
        let mut state = self.begin(OP_INVITE_MEMBER)?;
        if state.lobby.is_none() {
            return Err(BrokerError::upstream(OP_INVITE_MEMBER, "no active lobby"));
        }
        state.invites.push(player_id);
        debug!("[{}] invited player {}", self.account, player_id);
        Ok(())
    }

    async fn current_lobby(&self) -> Result<Option<Lobby>> {
        let state = self.begin(OP_CURRENT_LOBBY)?;
        Ok(state.lobby.clone())
    }

    async fn request_match_details(&self, match_id: ExternalMatchId) -> Result<MatchDetails> {
        let state = self.begin(OP_MATCH_DETAILS)?;
        Ok(state
            .match_details
            .get(&match_id)
            .cloned()
            .unwrap_or_else(|| MatchDetails::with_code(MatchResultCode::InProgress)))
    }

    async fn leave_lobby(&self) -> Result<()> {
        let mut state = self.begin(OP_LEAVE_LOBBY)?;
        state.lobby = None;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
