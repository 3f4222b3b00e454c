//! HTTP API
//!
//! Match scheduling, status, reinvite, tournament and player-history routes,
//! served together with the health and metrics endpoints.

pub mod routes;
pub mod server;

pub use routes::{api_routes, router};
pub use server::{ApiServer, ServerConfig};

use crate::error::{BrokerError, ErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

impl ErrorKind {
    /// HTTP status reported for errors of this kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::InvariantViolation | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Upstream => "UPSTREAM_ERROR",
            ErrorKind::InvariantViolation => "INVARIANT_VIOLATION",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Unavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::InvalidRequest => "BAD_REQUEST",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();

        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        } else {
            warn!(status = %status, error = %self, "request failed");
        }

        let body = Json(json!({
            "error": kind.code(),
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}
