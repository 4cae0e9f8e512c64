//! Plan tiers and the GPU capability ladder.
//!
//! Both orderings are explicit rank functions rather than string-keyed maps
//! so that a missing arm is a compile error, not a silent rank of zero.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Subscription plan tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Queue-based sessions for casual play.
    #[default]
    Free,
    /// Lower latency and priority access.
    Performance,
    /// Best cloud rigs and max quality stream.
    Ultimate,
}

impl Plan {
    /// All plans in ascending rank order.
    pub const ALL: [Self; 3] = [Self::Free, Self::Performance, Self::Ultimate];

    /// Priority rank of this plan. Higher ranks schedule first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Performance => 1,
            Self::Ultimate => 2,
        }
    }

    /// Plan identifier as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Performance => "performance",
            Self::Ultimate => "ultimate",
        }
    }

    /// Parses a plan identifier, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "performance" => Some(Self::Performance),
            "ultimate" => Some(Self::Ultimate),
            _ => None,
        }
    }

    /// Maximum continuous session duration for this plan.
    #[must_use]
    pub fn max_session_duration(self) -> Duration {
        match self {
            Self::Free => Duration::minutes(30),
            Self::Performance => Duration::hours(6),
            Self::Ultimate => Duration::hours(8),
        }
    }

    /// Minimum GPU tier a host must provide to serve this plan.
    #[must_use]
    pub const fn required_gpu_tier(self) -> GpuTier {
        match self {
            Self::Free => GpuTier::Basic,
            Self::Performance => GpuTier::Performance,
            Self::Ultimate => GpuTier::Ultimate,
        }
    }

    /// Minimum stream FPS a host must support to serve this plan.
    #[must_use]
    pub const fn min_fps(self) -> u32 {
        match self {
            Self::Free => 60,
            Self::Performance | Self::Ultimate => 120,
        }
    }

    /// Whether this plan is entitled to content requiring `required`.
    #[must_use]
    pub const fn can_access(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// GPU tier a host advertises in its capability profile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GpuTier {
    /// Entry-level GPU, 1080p-class streaming.
    #[default]
    Basic,
    /// Mid-range GPU, high-refresh 1440p.
    Performance,
    /// Top-end GPU, 4K high-refresh.
    Ultimate,
}

impl GpuTier {
    /// Capability rank of this tier.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Basic => 0,
            Self::Performance => 1,
            Self::Ultimate => 2,
        }
    }

    /// Tier identifier as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Performance => "performance",
            Self::Ultimate => "ultimate",
        }
    }

    /// Whether this tier satisfies a `required` tier.
    #[must_use]
    pub const fn meets(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }
}

impl std::fmt::Display for GpuTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_ranks_are_strictly_ordered() {
        assert!(Plan::Free.rank() < Plan::Performance.rank());
        assert!(Plan::Performance.rank() < Plan::Ultimate.rank());
        assert!(Plan::Free < Plan::Ultimate);
    }

    #[test]
    fn plan_parse_roundtrip() {
        for plan in Plan::ALL {
            assert_eq!(Plan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(Plan::parse("  Ultimate "), Some(Plan::Ultimate));
        assert_eq!(Plan::parse("platinum"), None);
    }

    #[test]
    fn entitlement_follows_rank() {
        assert!(Plan::Ultimate.can_access(Plan::Free));
        assert!(Plan::Performance.can_access(Plan::Performance));
        assert!(!Plan::Free.can_access(Plan::Performance));
    }

    #[test]
    fn session_duration_table() {
        assert_eq!(Plan::Free.max_session_duration(), Duration::minutes(30));
        assert_eq!(Plan::Performance.max_session_duration(), Duration::hours(6));
        assert_eq!(Plan::Ultimate.max_session_duration(), Duration::hours(8));
    }

    #[test]
    fn gpu_tier_meets() {
        assert!(GpuTier::Ultimate.meets(GpuTier::Basic));
        assert!(!GpuTier::Basic.meets(GpuTier::Performance));
        assert!(GpuTier::Performance.meets(GpuTier::Performance));
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&Plan::Ultimate).unwrap(), "\"ultimate\"");
        let parsed: GpuTier = serde_json::from_str("\"performance\"").unwrap();
        assert_eq!(parsed, GpuTier::Performance);
    }
}
