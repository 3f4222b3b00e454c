//! Game-network client interface
//!
//! Each session handler wraps one authenticated connection implementing
//! [`GameClient`]. The protocol itself lives outside this crate; the
//! [`SimulatedGameClient`] backs offline runs and tests.

pub mod protocol;
pub mod simulated;

use crate::error::Result;
use crate::types::{ExternalMatchId, LobbySettings, PlayerId};
use async_trait::async_trait;
use protocol::{Lobby, MatchDetails};

pub use simulated::SimulatedGameClient;

/// Operation names used for logging and metrics labels
pub const OP_CREATE_LOBBY: &str = "create_lobby";
pub const OP_INVITE_MEMBER: &str = "invite_lobby_member";
pub const OP_CURRENT_LOBBY: &str = "current_lobby";
pub const OP_MATCH_DETAILS: &str = "request_match_details";
pub const OP_LEAVE_LOBBY: &str = "leave_lobby";

/// One authenticated connection to the game network
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Create a practice lobby owned by this session
    async fn create_lobby(&self, settings: &LobbySettings) -> Result<Lobby>;

    /// Invite a player to the session's current lobby
    async fn invite_lobby_member(&self, player_id: PlayerId) -> Result<()>;

    /// Fetch the session's current lobby, if any
    async fn current_lobby(&self) -> Result<Option<Lobby>>;

    /// Request details of a launched match
    async fn request_match_details(&self, match_id: ExternalMatchId) -> Result<MatchDetails>;

    /// Abandon the session's current lobby
    async fn leave_lobby(&self) -> Result<()>;

    /// Whether the session is connected and logged in
    fn is_ready(&self) -> bool;
}
