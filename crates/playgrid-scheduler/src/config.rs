//! Configuration for the scheduler.

use serde::Deserialize;
use std::time::Duration;

/// Scheduler tunables.
///
/// Everything here is fixed at process start; the runtime-tunable knobs live
/// in [`crate::policy::SchedulerPolicy`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Heartbeat age beyond which a host decays to offline.
    #[serde(with = "serde_duration_secs")]
    pub heartbeat_timeout: Duration,
    /// Grace window during which a disconnected session may resume.
    #[serde(with = "serde_duration_secs")]
    pub reconnect_grace: Duration,
    /// Interval of the embedded tick driver.
    #[serde(with = "serde_duration_secs")]
    pub tick_interval: Duration,
    /// How stale an external orchestrator tick may be before session-facing
    /// requests are refused with `scheduler_unavailable`.
    #[serde(with = "serde_duration_secs")]
    pub scheduler_grace: Duration,
    /// Gate assignments on the host's reported stream health.
    pub require_stream_health: bool,
    /// Capacity assumed for hosts that register without one.
    pub default_host_capacity: u32,
    /// Launch ticket time-to-live.
    #[serde(with = "serde_duration_secs")]
    pub ticket_ttl: Duration,
    /// HMAC key for launch ticket signatures.
    pub ticket_signing_key: String,
    /// Most recent tickets retained for verification.
    pub ticket_retention_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(45),
            reconnect_grace: Duration::from_secs(5 * 60),
            tick_interval: Duration::from_secs(5),
            scheduler_grace: Duration::from_secs(15),
            require_stream_health: true,
            default_host_capacity: 40,
            ticket_ttl: Duration::from_secs(300),
            ticket_signing_key: "playgrid-ticket-signing-key".to_owned(),
            ticket_retention_limit: 500,
        }
    }
}

impl SchedulerConfig {
    /// Heartbeat timeout as a chrono duration for timestamp arithmetic.
    #[must_use]
    pub fn heartbeat_timeout_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.heartbeat_timeout).unwrap_or_else(|_| chrono::Duration::seconds(45))
    }

    /// Reconnect grace as a chrono duration.
    #[must_use]
    pub fn reconnect_grace_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.reconnect_grace).unwrap_or_else(|_| chrono::Duration::minutes(5))
    }

    /// Ticket TTL as a chrono duration.
    #[must_use]
    pub fn ticket_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ticket_ttl).unwrap_or_else(|_| chrono::Duration::seconds(300))
    }
}

/// Serde helper for `Duration` as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(45));
        assert_eq!(config.reconnect_grace, Duration::from_secs(300));
        assert!(config.require_stream_health);
        assert_eq!(config.ticket_retention_limit, 500);
    }

    #[test]
    fn deserialises_durations_from_seconds() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"heartbeat_timeout": 10, "require_stream_health": false}"#)
                .unwrap();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(10));
        assert!(!config.require_stream_health);
        assert_eq!(config.tick_interval, Duration::from_secs(5));
    }
}
