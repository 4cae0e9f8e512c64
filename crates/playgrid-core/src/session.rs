//! Session lifecycle states and termination reasons.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a play session.
///
/// Valid transitions: `Queued → Active → Disconnected → Active | Ended`,
/// `Queued → Ended`, `Active → Ended`, `Disconnected → Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for a compatible host slot.
    Queued,
    /// Assigned to a host and streaming.
    Active,
    /// Dropped by the client; host slot held through the grace window.
    Disconnected,
    /// Terminal.
    Ended,
}

impl SessionStatus {
    /// State identifier as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
            Self::Ended => "ended",
        }
    }

    /// Whether the session currently occupies a host slot.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Disconnected)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Terminated by the owning user.
    UserEnded,
    /// Plan's maximum session duration elapsed.
    SessionTimeout,
    /// Reconnect grace window expired.
    ReconnectTimeout,
    /// The assigned host went offline.
    HostOffline,
}

impl EndReason {
    /// Reason identifier as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserEnded => "user_ended",
            Self::SessionTimeout => "session_timeout",
            Self::ReconnectTimeout => "reconnect_timeout",
            Self::HostOffline => "host_offline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_states() {
        assert!(SessionStatus::Active.is_live());
        assert!(SessionStatus::Disconnected.is_live());
        assert!(!SessionStatus::Queued.is_live());
        assert!(!SessionStatus::Ended.is_live());
    }

    #[test]
    fn end_reason_serialises_snake_case() {
        assert_eq!(
            serde_json::to_string(&EndReason::ReconnectTimeout).unwrap(),
            "\"reconnect_timeout\""
        );
        assert_eq!(EndReason::HostOffline.as_str(), "host_offline");
    }
}
