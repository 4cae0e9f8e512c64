//! Fleet capacity observability: per-rig summaries and the autoscale
//! advisor.
//!
//! The advisor only recommends; provisioning is somebody else's job. It
//! keeps a spare-capacity target of 15% of the online fleet so a queue
//! spike does not immediately starve.

use playgrid_core::{HostMode, SessionStatus, StreamHealth};
use serde::Serialize;

use crate::state::{Host, SchedulerState};

/// Advisor verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingRecommendation {
    ScaleUp,
    Stable,
}

/// Capacity advisor output.
#[derive(Debug, Clone, Serialize)]
pub struct CapacityReport {
    pub queue_depth: usize,
    pub active_or_disconnected_sessions: usize,
    pub online_active_hosts: usize,
    pub total_capacity: u32,
    pub free_slots: u32,
    pub desired_spare_capacity: u32,
    pub shortfall: u32,
    pub recommended_additional_hosts: u32,
    pub default_host_capacity: u32,
    pub recommendation: ScalingRecommendation,
}

/// One rig in the fleet summary.
#[derive(Debug, Clone, Serialize)]
pub struct RigSummary {
    pub rig_id: String,
    pub name: String,
    pub region: String,
    pub status: playgrid_core::HostStatus,
    pub mode: HostMode,
    pub active_users: u32,
    pub max_users: u32,
    pub available_users: u32,
    pub saturation_pct: u32,
    pub accepting_users: bool,
    pub stream_health: StreamHealth,
}

impl RigSummary {
    fn from_host(host: &Host) -> Self {
        let max_users = host.capacity.max(1);
        let active_users = host.active_sessions;
        let available_users = max_users.saturating_sub(active_users);
        let saturation_pct = (active_users * 100).div_ceil(max_users).min(100);

        Self {
            rig_id: host.id.clone(),
            name: host.name.clone(),
            region: host.region.clone(),
            status: host.status,
            mode: host.mode,
            active_users,
            max_users,
            available_users,
            saturation_pct,
            accepting_users: host.status.is_online()
                && host.mode == HostMode::Active
                && available_users > 0,
            stream_health: host.stream_health.clone(),
        }
    }
}

/// Aggregate fleet snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
    pub rigs_total: usize,
    pub active_users: u32,
    pub max_users: u32,
    pub available_users: u32,
    pub saturated_rigs: usize,
    pub queue_depth: usize,
    pub rigs: Vec<RigSummary>,
}

impl SchedulerState {
    /// Per-rig and aggregate saturation snapshot.
    #[must_use]
    pub fn fleet_summary(&self) -> FleetSummary {
        let rigs: Vec<RigSummary> = self.hosts.iter().map(RigSummary::from_host).collect();

        FleetSummary {
            rigs_total: rigs.len(),
            active_users: rigs.iter().map(|r| r.active_users).sum(),
            max_users: rigs.iter().map(|r| r.max_users).sum(),
            available_users: rigs.iter().map(|r| r.available_users).sum(),
            saturated_rigs: rigs.iter().filter(|r| r.available_users == 0).count(),
            queue_depth: self.queue.len(),
            rigs,
        }
    }

    /// Computes the autoscale recommendation from queue depth and free
    /// capacity on online, active hosts.
    #[must_use]
    pub fn capacity_report(&self) -> CapacityReport {
        let online_active: Vec<&Host> = self
            .hosts
            .iter()
            .filter(|h| h.status.is_online() && h.mode == HostMode::Active)
            .collect();

        let queue_depth = self.queue.len();
        let occupied = self
            .sessions
            .iter()
            .filter(|s| s.status.is_live())
            .count();
        let occupied_u32 = u32::try_from(occupied).unwrap_or(u32::MAX);
        let total_capacity: u32 = online_active.iter().map(|h| h.capacity).sum();

        let desired_spare_capacity = ((total_capacity * 15).div_ceil(100)).max(1);
        let free_slots = total_capacity.saturating_sub(occupied_u32);
        let queue_depth_u32 = u32::try_from(queue_depth).unwrap_or(u32::MAX);
        let shortfall = (queue_depth_u32 + desired_spare_capacity).saturating_sub(free_slots);

        let default_host_capacity = if online_active.is_empty() {
            1
        } else {
            let count = u32::try_from(online_active.len()).unwrap_or(1);
            (total_capacity / count).max(1)
        };
        let recommended_additional_hosts = shortfall.div_ceil(default_host_capacity);

        CapacityReport {
            queue_depth,
            active_or_disconnected_sessions: occupied,
            online_active_hosts: online_active.len(),
            total_capacity,
            free_slots,
            desired_spare_capacity,
            shortfall,
            recommended_additional_hosts,
            default_host_capacity,
            recommendation: if recommended_additional_hosts > 0 {
                ScalingRecommendation::ScaleUp
            } else {
                ScalingRecommendation::Stable
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HostSpec;
    use chrono::Utc;

    fn register(state: &mut SchedulerState, id: &str, capacity: u32) {
        state
            .register_host(
                HostSpec {
                    host_id: id.to_owned(),
                    name: format!("Rig {id}"),
                    region: None,
                    capacity: Some(capacity),
                    mode: None,
                    capabilities: None,
                    slot_policy: None,
                    stream_health: None,
                },
                40,
                Utc::now(),
            )
            .unwrap();
    }

    #[test]
    fn stable_with_spare_capacity() {
        let now = Utc::now();
        let mut state = SchedulerState::new(now);
        register(&mut state, "h1", 20);

        let report = state.capacity_report();
        assert_eq!(report.total_capacity, 20);
        assert_eq!(report.free_slots, 20);
        assert_eq!(report.recommendation, ScalingRecommendation::Stable);
    }

    #[test]
    fn empty_fleet_with_queue_recommends_scale_up() {
        let now = Utc::now();
        let mut state = SchedulerState::new(now);
        // No hosts at all; any queued demand is a shortfall.
        state.queue.push(crate::state::QueueEntry {
            session_id: "s1".to_owned(),
            user_id: "u1".to_owned(),
            plan: playgrid_core::Plan::Free,
            game_slug: "fortnite".to_owned(),
            requested_at: now,
            preferred_region: None,
        });

        let report = state.capacity_report();
        assert_eq!(report.recommendation, ScalingRecommendation::ScaleUp);
        assert!(report.recommended_additional_hosts >= 1);
    }

    #[test]
    fn rig_summary_saturation() {
        let now = Utc::now();
        let mut state = SchedulerState::new(now);
        register(&mut state, "h1", 4);
        state.host_mut("h1").unwrap().active_sessions = 3;

        let summary = state.fleet_summary();
        assert_eq!(summary.rigs_total, 1);
        assert_eq!(summary.rigs[0].saturation_pct, 75);
        assert!(summary.rigs[0].accepting_users);

        state.host_mut("h1").unwrap().active_sessions = 4;
        let summary = state.fleet_summary();
        assert_eq!(summary.saturated_rigs, 1);
        assert!(!summary.rigs[0].accepting_users);
    }
}
