//! Error types for the scheduler.

use playgrid_core::{Plan, SessionStatus};
use thiserror::Error;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Scheduler errors.
///
/// Each variant carries a stable machine-readable [`code`](Self::code) so
/// API clients can branch without parsing messages.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Unknown game slug.
    #[error("game not found: {0}")]
    GameNotFound(String),

    /// Unknown host id.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// Unknown session id, or the session belongs to another user.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Caller's plan is below the game's minimum.
    #[error("plan {selected} cannot access content requiring {required}")]
    PlanRestricted {
        /// Caller's plan.
        selected: Plan,
        /// Minimum plan for the game.
        required: Plan,
    },

    /// Per-user active session cap reached.
    #[error("active session limit reached ({limit})")]
    ActiveSessionLimit { limit: u32 },

    /// Per-user queued session cap reached.
    #[error("queued session limit reached ({limit})")]
    QueuedSessionLimit { limit: u32 },

    /// Operation is invalid for the session's current state.
    #[error("session {id} is {status}, expected {expected}")]
    InvalidSessionState {
        id: String,
        status: SessionStatus,
        expected: &'static str,
    },

    /// Reconnect token missing or wrong.
    #[error("invalid reconnect token")]
    ReconnectTokenMismatch,

    /// Reconnect attempted after the grace window closed.
    #[error("reconnect window expired")]
    ReconnectWindowExpired,

    /// The session's assigned host is no longer online.
    #[error("assigned host unavailable")]
    HostUnavailable,

    /// Launch provider account not linked for the caller.
    #[error("provider account not linked: {0}")]
    ProviderNotLinked(String),

    /// Unknown launch provider.
    #[error("unsupported provider: {0}")]
    UnknownProvider(String),

    /// No active session matches the ticket request.
    #[error("no active session for game {0}")]
    NoActiveSession(String),

    /// Unknown ticket id.
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    /// Ticket belongs to another user.
    #[error("ticket does not belong to caller")]
    TicketOwnershipMismatch,

    /// Presented signature does not match the stored ticket.
    #[error("invalid ticket signature")]
    TicketSignatureMismatch,

    /// Ticket TTL elapsed.
    #[error("ticket expired")]
    TicketExpired,

    /// Request rejected before mutating state.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::GameNotFound(_) => "game_not_found",
            Self::HostNotFound(_) => "host_not_found",
            Self::SessionNotFound(_) => "session_not_found",
            Self::PlanRestricted { .. } => "plan_restricted",
            Self::ActiveSessionLimit { .. } | Self::QueuedSessionLimit { .. } => {
                "concurrency_limit"
            }
            Self::InvalidSessionState { .. } => "state_conflict",
            Self::ReconnectTokenMismatch => "invalid_reconnect_token",
            Self::ReconnectWindowExpired => "reconnect_window_expired",
            Self::HostUnavailable => "host_unavailable",
            Self::ProviderNotLinked(_) => "provider_not_linked",
            Self::UnknownProvider(_) => "unsupported_provider",
            Self::NoActiveSession(_) => "no_active_session",
            Self::TicketNotFound(_) => "ticket_not_found",
            Self::TicketOwnershipMismatch => "ticket_ownership",
            Self::TicketSignatureMismatch => "invalid_signature",
            Self::TicketExpired => "ticket_expired",
            Self::Validation(_) => "validation",
            Self::Internal(_) => "internal",
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_limits_share_a_code() {
        assert_eq!(
            SchedulerError::ActiveSessionLimit { limit: 1 }.code(),
            "concurrency_limit"
        );
        assert_eq!(
            SchedulerError::QueuedSessionLimit { limit: 1 }.code(),
            "concurrency_limit"
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            SchedulerError::PlanRestricted {
                selected: Plan::Free,
                required: Plan::Ultimate,
            }
            .code(),
            "plan_restricted"
        );
        assert_eq!(SchedulerError::TicketExpired.code(), "ticket_expired");
        assert_eq!(
            SchedulerError::TicketSignatureMismatch.code(),
            "invalid_signature"
        );
    }
}
