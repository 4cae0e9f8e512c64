//! Runtime-tunable scheduling policy.

use serde::{Deserialize, Serialize};

/// Knobs that can be changed at runtime and take effect on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerPolicy {
    /// Maximum concurrently active sessions per user.
    pub max_active_sessions_per_user: u32,
    /// Maximum concurrently queued sessions per user.
    pub max_queued_sessions_per_user: u32,
    /// Minutes of waiting per aging step.
    pub aging_boost_minutes: u32,
    /// Score added per aging step.
    pub aging_boost_per_step: u32,
    /// Events retained in the scheduler event log.
    pub event_retention_limit: usize,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            max_active_sessions_per_user: 1,
            max_queued_sessions_per_user: 1,
            aging_boost_minutes: 10,
            aging_boost_per_step: 1,
            event_retention_limit: 500,
        }
    }
}

impl SchedulerPolicy {
    /// Clamps every field into its valid range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            max_active_sessions_per_user: self.max_active_sessions_per_user.max(1),
            max_queued_sessions_per_user: self.max_queued_sessions_per_user.max(1),
            aging_boost_minutes: self.aging_boost_minutes.max(1),
            aging_boost_per_step: self.aging_boost_per_step.max(1),
            event_retention_limit: self.event_retention_limit.max(50),
        }
    }

    /// Merges a partial update over this policy and clamps the result.
    #[must_use]
    pub fn merged(self, update: PolicyUpdate) -> Self {
        Self {
            max_active_sessions_per_user: update
                .max_active_sessions_per_user
                .unwrap_or(self.max_active_sessions_per_user),
            max_queued_sessions_per_user: update
                .max_queued_sessions_per_user
                .unwrap_or(self.max_queued_sessions_per_user),
            aging_boost_minutes: update.aging_boost_minutes.unwrap_or(self.aging_boost_minutes),
            aging_boost_per_step: update
                .aging_boost_per_step
                .unwrap_or(self.aging_boost_per_step),
            event_retention_limit: update
                .event_retention_limit
                .unwrap_or(self.event_retention_limit),
        }
        .clamped()
    }
}

/// Partial policy update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PolicyUpdate {
    pub max_active_sessions_per_user: Option<u32>,
    pub max_queued_sessions_per_user: Option<u32>,
    pub aging_boost_minutes: Option<u32>,
    pub aging_boost_per_step: Option<u32>,
    pub event_retention_limit: Option<usize>,
}
