//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use playgrid_scheduler::SchedulerError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Domain error from the scheduler.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Missing or invalid credential.
    #[error("unauthorized")]
    Unauthorized,

    /// The external orchestrator's ticks have gone stale; the caller
    /// should trigger recovery (e.g. an explicit tick).
    #[error("scheduler unavailable")]
    SchedulerUnavailable {
        last_tick_at: Option<DateTime<Utc>>,
        grace_secs: u64,
    },
}

/// Machine-readable error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_tick_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grace_secs: Option<u64>,
}

impl ApiError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Scheduler(e) => e.code(),
            Self::Unauthorized => "unauthorized",
            Self::SchedulerUnavailable { .. } => "scheduler_unavailable",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Scheduler(e) => scheduler_status(e),
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SchedulerUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

const fn scheduler_status(error: &SchedulerError) -> StatusCode {
    match error {
        SchedulerError::GameNotFound(_)
        | SchedulerError::HostNotFound(_)
        | SchedulerError::SessionNotFound(_)
        | SchedulerError::NoActiveSession(_)
        | SchedulerError::TicketNotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::PlanRestricted { .. }
        | SchedulerError::ProviderNotLinked(_)
        | SchedulerError::TicketOwnershipMismatch => StatusCode::FORBIDDEN,
        SchedulerError::ActiveSessionLimit { .. }
        | SchedulerError::QueuedSessionLimit { .. }
        | SchedulerError::InvalidSessionState { .. }
        | SchedulerError::HostUnavailable => StatusCode::CONFLICT,
        SchedulerError::ReconnectTokenMismatch => StatusCode::UNAUTHORIZED,
        SchedulerError::ReconnectWindowExpired | SchedulerError::TicketExpired => {
            StatusCode::GONE
        }
        SchedulerError::TicketSignatureMismatch
        | SchedulerError::UnknownProvider(_)
        | SchedulerError::Validation(_) => StatusCode::BAD_REQUEST,
        SchedulerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let (last_tick_at, grace_secs) = match &self {
            Self::SchedulerUnavailable {
                last_tick_at,
                grace_secs,
            } => (*last_tick_at, Some(*grace_secs)),
            _ => (None, None),
        };

        let body = ErrorBody {
            error: self.to_string(),
            code,
            last_tick_at,
            grace_secs,
        };
        (status, Json(body)).into_response()
    }
}
