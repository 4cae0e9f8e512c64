//! Host (rig) descriptors: mode, status, capability profile, stream health
//! and per-tier slot reservations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{GpuTier, Plan};

/// Administrative mode of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMode {
    /// Accepting new sessions.
    #[default]
    Active,
    /// Existing sessions run out; no new assignments.
    Draining,
    /// Taken out of rotation entirely; forced offline.
    Maintenance,
}

impl HostMode {
    /// Mode identifier as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Maintenance => "maintenance",
        }
    }
}

/// Liveness status of a host, derived from heartbeat freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// Heartbeating within the timeout window.
    Online,
    /// Stale, explicitly reported offline, or in maintenance.
    Offline,
}

impl HostStatus {
    /// Returns true if the host is online.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Capability profile a host advertises at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    /// Game slugs this host can run. Empty means every game.
    pub supported_games: Vec<String>,
    /// GPU tier of the rig.
    pub gpu_tier: GpuTier,
    /// Maximum stream FPS the rig can sustain.
    pub max_fps: u32,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            supported_games: Vec::new(),
            gpu_tier: GpuTier::Basic,
            max_fps: 60,
        }
    }
}

impl HostCapabilities {
    /// Trims slugs, drops empties, and clamps a zero FPS back to the default.
    pub fn normalise(&mut self) {
        self.supported_games = self
            .supported_games
            .iter()
            .map(|slug| slug.trim().to_owned())
            .filter(|slug| !slug.is_empty())
            .collect();
        if self.max_fps == 0 {
            self.max_fps = 60;
        }
    }

    /// Whether this host can run the given game.
    #[must_use]
    pub fn supports_game(&self, slug: &str) -> bool {
        self.supported_games.is_empty() || self.supported_games.iter().any(|g| g == slug)
    }
}

/// Minimum slot counts held back for each plan tier.
///
/// Reservations protect higher-paying tiers: a lower-tier session may not
/// take a slot that would leave fewer free slots than the unmet reservation
/// for strictly higher tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotPolicy {
    /// Slots reserved for free-tier sessions.
    pub free_reserved_min: u32,
    /// Slots reserved for performance-tier sessions.
    pub performance_reserved_min: u32,
    /// Slots reserved for ultimate-tier sessions.
    pub ultimate_reserved_min: u32,
}

impl SlotPolicy {
    /// Total slots reserved for tiers strictly above `plan`.
    #[must_use]
    pub const fn reserved_above(self, plan: Plan) -> u32 {
        match plan {
            Plan::Free => self.performance_reserved_min + self.ultimate_reserved_min,
            Plan::Performance => self.ultimate_reserved_min,
            Plan::Ultimate => 0,
        }
    }
}

/// Advertised stream encode profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamProfile {
    pub resolution: String,
    pub fps: u32,
    pub bitrate_mbps: u32,
    pub codec: String,
}

impl Default for StreamProfile {
    fn default() -> Self {
        Self {
            resolution: "1080p".to_owned(),
            fps: 60,
            bitrate_mbps: 20,
            codec: "hevc".to_owned(),
        }
    }
}

impl StreamProfile {
    /// Fills empty or zero fields with defaults.
    pub fn normalise(&mut self) {
        let defaults = Self::default();
        self.resolution = non_empty_or(&self.resolution, defaults.resolution);
        self.codec = non_empty_or(&self.codec, defaults.codec).to_lowercase();
        if self.fps == 0 {
            self.fps = defaults.fps;
        }
        if self.bitrate_mbps == 0 {
            self.bitrate_mbps = defaults.bitrate_mbps;
        }
    }
}

/// Stream-path health reported by the host agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamHealth {
    pub stream_software: String,
    pub stream_protocol: String,
    pub remote_network: String,
    pub backup_control: String,
    pub audio_ready: bool,
    pub network_ok: bool,
    pub network_type: String,
    pub uplink_mbps: u32,
    pub downlink_mbps: u32,
    pub jitter_ms: u32,
    pub packet_loss_pct: f64,
    pub profile: StreamProfile,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for StreamHealth {
    fn default() -> Self {
        Self {
            stream_software: "sunshine".to_owned(),
            stream_protocol: "moonlight".to_owned(),
            remote_network: "tailscale".to_owned(),
            backup_control: "parsec".to_owned(),
            audio_ready: true,
            network_ok: true,
            network_type: "ethernet".to_owned(),
            uplink_mbps: 100,
            downlink_mbps: 100,
            jitter_ms: 8,
            packet_loss_pct: 0.0,
            profile: StreamProfile::default(),
            updated_at: None,
        }
    }
}

impl StreamHealth {
    /// Lowercases and trims the string fields, substituting defaults for
    /// empties, and clamps a negative packet loss to zero.
    pub fn normalise(&mut self) {
        let defaults = Self::default();
        self.stream_software = non_empty_or(&self.stream_software, defaults.stream_software).to_lowercase();
        self.stream_protocol = non_empty_or(&self.stream_protocol, defaults.stream_protocol).to_lowercase();
        self.remote_network = non_empty_or(&self.remote_network, defaults.remote_network).to_lowercase();
        self.backup_control = non_empty_or(&self.backup_control, defaults.backup_control).to_lowercase();
        self.network_type = non_empty_or(&self.network_type, defaults.network_type).to_lowercase();
        if self.packet_loss_pct < 0.0 || !self.packet_loss_pct.is_finite() {
            self.packet_loss_pct = 0.0;
        }
        self.profile.normalise();
    }

    /// The stream-health gate used by the matchmaker: audio pipeline and
    /// network path both report ready.
    #[must_use]
    pub const fn is_stream_ready(&self) -> bool {
        self.audio_ready && self.network_ok
    }
}

fn non_empty_or(value: &str, fallback: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_default_allows_all_games() {
        let caps = HostCapabilities::default();
        assert!(caps.supports_game("fortnite"));
        assert!(caps.supports_game("anything"));
    }

    #[test]
    fn capabilities_restrict_to_listed_games() {
        let caps = HostCapabilities {
            supported_games: vec!["roblox".to_owned()],
            ..HostCapabilities::default()
        };
        assert!(caps.supports_game("roblox"));
        assert!(!caps.supports_game("fortnite"));
    }

    #[test]
    fn capabilities_normalise_drops_blank_slugs() {
        let mut caps = HostCapabilities {
            supported_games: vec!["  roblox ".to_owned(), "   ".to_owned()],
            max_fps: 0,
            ..HostCapabilities::default()
        };
        caps.normalise();
        assert_eq!(caps.supported_games, vec!["roblox".to_owned()]);
        assert_eq!(caps.max_fps, 60);
    }

    #[test]
    fn slot_policy_reserved_above() {
        let policy = SlotPolicy {
            free_reserved_min: 3,
            performance_reserved_min: 2,
            ultimate_reserved_min: 5,
        };
        assert_eq!(policy.reserved_above(Plan::Free), 7);
        assert_eq!(policy.reserved_above(Plan::Performance), 5);
        assert_eq!(policy.reserved_above(Plan::Ultimate), 0);
    }

    #[test]
    fn stream_health_defaults_are_ready() {
        let health = StreamHealth::default();
        assert!(health.is_stream_ready());
    }

    #[test]
    fn stream_health_normalises_strings() {
        let mut health = StreamHealth {
            stream_software: "  Sunshine ".to_owned(),
            network_type: String::new(),
            packet_loss_pct: -1.0,
            ..StreamHealth::default()
        };
        health.normalise();
        assert_eq!(health.stream_software, "sunshine");
        assert_eq!(health.network_type, "ethernet");
        assert!((health.packet_loss_pct - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stream_health_deserialises_partial_payload() {
        let health: StreamHealth = serde_json::from_str(r#"{"audio_ready": false}"#).unwrap();
        assert!(!health.audio_ready);
        assert!(health.network_ok);
        assert!(!health.is_stream_ready());
    }

    #[test]
    fn maintenance_is_not_active() {
        assert_ne!(HostMode::Maintenance, HostMode::Active);
        assert_eq!(HostMode::default(), HostMode::Active);
    }
}
