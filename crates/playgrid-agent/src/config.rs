//! Host agent configuration.

use playgrid_core::GpuTier;
use serde::Deserialize;
use std::time::Duration;

/// Agent configuration, merged from `agent.toml` and `PLAYGRID_AGENT_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Control-plane base URL.
    pub api_base_url: String,
    /// Shared host credential.
    pub host_key: String,
    /// Stable host identifier.
    pub host_id: String,
    /// Display name.
    pub host_name: String,
    /// Region label advertised to the matchmaker.
    pub region: String,
    /// Session slots this rig offers.
    pub capacity: u32,
    /// GPU tier of the rig.
    pub gpu_tier: GpuTier,
    /// Maximum stream FPS.
    pub max_fps: u32,
    /// Game slugs this rig can run; empty means every game.
    pub supported_games: Vec<String>,
    /// Heartbeat interval.
    #[serde(with = "serde_duration_secs")]
    pub heartbeat_interval: Duration,
    /// Consecutive heartbeat failures before re-registering.
    pub heartbeat_failure_threshold: u32,
    /// Wait for the control-plane health probe before registering.
    pub wait_for_health: bool,
    /// How long to wait for the health probe.
    #[serde(with = "serde_duration_secs")]
    pub health_wait_timeout: Duration,
    /// Registration attempts before giving up.
    pub register_max_attempts: u32,
    /// Initial registration backoff; doubles per attempt.
    #[serde(with = "serde_duration_secs")]
    pub register_backoff: Duration,
    /// Backoff cap.
    #[serde(with = "serde_duration_secs")]
    pub register_backoff_max: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let host_id = format!("host-{}", std::process::id());
        Self {
            api_base_url: "http://localhost:5500".to_owned(),
            host_key: "playgrid-host-key".to_owned(),
            host_name: format!("PlayGrid Agent {host_id}"),
            host_id,
            region: "local".to_owned(),
            capacity: 1,
            gpu_tier: GpuTier::Basic,
            max_fps: 60,
            supported_games: Vec::new(),
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_failure_threshold: 3,
            wait_for_health: true,
            health_wait_timeout: Duration::from_secs(30),
            register_max_attempts: 5,
            register_backoff: Duration::from_secs(1),
            register_backoff_max: Duration::from_secs(30),
        }
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
    fn defaults_are_sane() {
        let config = AgentConfig::default();
        assert!(config.host_id.starts_with("host-"));
        assert_eq!(config.capacity, 1);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert!(config.register_backoff < config.register_backoff_max);
    }

    #[test]
    fn deserialises_partial_config() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"host_id": "rig-7", "capacity": 8, "heartbeat_interval": 5, "gpu_tier": "ultimate"}"#,
        )
        .unwrap();
        assert_eq!(config.host_id, "rig-7");
        assert_eq!(config.capacity, 8);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.gpu_tier, GpuTier::Ultimate);
    }
}
