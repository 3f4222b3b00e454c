//! Match lifecycle
//!
//! Scheduling, per-match monitoring, status resolution and the client
//! projection of a match.

pub mod monitor;
pub mod orchestrator;
pub mod projector;
pub mod view;

pub use monitor::{MatchMonitor, MonitorOutcome, MonitorSettings, NO_SHOW_REASON};
pub use orchestrator::{
    FailedInvite, MatchOrchestrator, OrchestratorSettings, OrchestratorStats, ReinviteReport,
};
pub use projector::{project, MatchInfo};
pub use view::{MatchCancel, MatchLobby, MatchResult, MatchStatusInfo, MatchView};
