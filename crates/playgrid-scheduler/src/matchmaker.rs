//! The matchmaker: one atomic pass over the scheduling state.
//!
//! Tick order is fixed: enforce session durations, reconcile hosts and
//! sessions, score and sort the queue, then promote until a full pass makes
//! no assignment. Expiry is evaluated lazily here, never via per-session
//! timers, so the maximum drift equals the tick interval.

use chrono::{DateTime, Utc};
use playgrid_core::{EndReason, HostMode, HostStatus, Plan, SessionStatus};
use serde::Serialize;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::SchedulerConfig;
use crate::events::EventKind;
use crate::policy::SchedulerPolicy;
use crate::state::{Host, QueueEntry, SchedulerState, Session};

/// What one tick did.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TickReport {
    /// Whether any state changed.
    pub changed: bool,
    /// Sessions promoted from the queue to a host.
    pub promoted: u32,
    /// Sessions ended by the plan duration cap.
    pub timed_out: u32,
    pub queue_depth: usize,
    pub active_sessions: usize,
    pub online_hosts: usize,
}

/// The placement-relevant slice of a session request.
#[derive(Debug, Clone)]
pub(crate) struct Placement {
    pub plan: Plan,
    pub game_slug: String,
    pub preferred_region: Option<String>,
    pub latency_ms_by_region: Option<BTreeMap<String, u32>>,
}

impl From<&Session> for Placement {
    fn from(session: &Session) -> Self {
        Self {
            plan: session.plan,
            game_slug: session.game_slug.clone(),
            preferred_region: session.preferred_region.clone(),
            latency_ms_by_region: session.client_latency_ms_by_region.clone(),
        }
    }
}

/// Priority score of a queue entry.
///
/// `plan_rank × 1000` keeps strict plan priority; the aging term lets a
/// long-waiting lower tier eventually cross over. Ties break FIFO on
/// `requested_at`.
pub(crate) fn queue_score(policy: &SchedulerPolicy, entry: &QueueEntry, now: DateTime<Utc>) -> i64 {
    let base = i64::from(entry.plan.rank()) * 1000;
    let waited_minutes = (now - entry.requested_at).num_minutes().max(0);
    let steps = waited_minutes / i64::from(policy.aging_boost_minutes.max(1));
    base + steps * i64::from(policy.aging_boost_per_step)
}

fn assignment_reason(host: &Host, placement: &Placement) -> String {
    let load = host.load_ratio();
    let region_label = match placement.preferred_region.as_deref() {
        Some(preferred) if host.region == preferred => "region_match",
        Some(_) => "region_fallback",
        None => "no_region_pref",
    };
    format!("{region_label}+load_{load:.2}+capability")
}

impl SchedulerState {
    /// Runs one full matchmaker pass.
    pub fn run_tick(&mut self, config: &SchedulerConfig, now: DateTime<Utc>) -> TickReport {
        let (duration_changed, timed_out) = self.enforce_session_durations(now);
        let reconcile_changed =
            self.reconcile_hosts_and_sessions(config.heartbeat_timeout_chrono(), now);
        self.sort_queue(now);
        let (promote_changed, promoted) =
            self.promote_queue(config.require_stream_health, now);

        TickReport {
            changed: duration_changed || reconcile_changed || promote_changed,
            promoted,
            timed_out,
            queue_depth: self.queue.len(),
            active_sessions: self
                .sessions
                .iter()
                .filter(|s| s.status == SessionStatus::Active)
                .count(),
            online_hosts: self.hosts.iter().filter(|h| h.status.is_online()).count(),
        }
    }

    /// Ends sessions past their plan duration cap, then disconnected
    /// sessions past their reconnect window.
    fn enforce_session_durations(&mut self, now: DateTime<Utc>) -> (bool, u32) {
        let mut changed = false;
        let mut timed_out = 0u32;
        let mut timeout_details = Vec::new();
        let mut reconnect_details = Vec::new();

        for session in &mut self.sessions {
            if !session.status.is_live() || session.started_at.is_none() {
                continue;
            }
            if session.remaining(now) > chrono::Duration::zero() {
                continue;
            }
            timeout_details.push(json!({
                "session_id": session.id,
                "user_id": session.user_id,
                "plan": session.plan,
                "host_id": session.host_id,
            }));
            session.end(EndReason::SessionTimeout, now);
            changed = true;
            timed_out += 1;
        }

        for session in &mut self.sessions {
            if session.status != SessionStatus::Disconnected {
                continue;
            }
            let expired = session
                .reconnect_expires_at
                .is_some_and(|expires| expires <= now);
            if !expired {
                continue;
            }
            reconnect_details.push(json!({
                "session_id": session.id,
                "user_id": session.user_id,
            }));
            session.end(EndReason::ReconnectTimeout, now);
            changed = true;
        }

        for details in timeout_details {
            self.metrics.record_timeout(now);
            self.record_event(EventKind::SessionTimeout, details, now);
        }
        for details in reconnect_details {
            self.record_event(EventKind::SessionReconnectTimeout, details, now);
        }

        (changed, timed_out)
    }

    /// Normalises host fields, derives status from freshness, and recounts
    /// occupancy from the sessions that actually point at each host. Any
    /// live session bound to a host that is not online ends with
    /// `host_offline`. This is the failure cascade for crashed hosts.
    fn reconcile_hosts_and_sessions(
        &mut self,
        heartbeat_timeout: chrono::Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;

        for host in &mut self.hosts {
            if host.capacity == 0 {
                host.capacity = 1;
                changed = true;
            }
            host.capabilities.normalise();
            host.stream_health.normalise();

            let previous_status = host.status;
            if !host.is_fresh(heartbeat_timeout, now) {
                host.status = HostStatus::Offline;
            }
            if host.mode == HostMode::Maintenance {
                host.status = HostStatus::Offline;
            }
            if host.status != previous_status {
                changed = true;
            }

            if host.active_sessions != 0 {
                changed = true;
            }
            host.active_sessions = 0;
        }

        let mut cascade_details = Vec::new();
        for index in 0..self.sessions.len() {
            if !self.sessions[index].status.is_live() {
                continue;
            }

            let host_id = self.sessions[index].host_id.clone();
            let host_online = host_id
                .as_deref()
                .and_then(|id| self.host(id))
                .is_some_and(|h| h.status.is_online());

            if host_online {
                if let Some(id) = host_id.as_deref() {
                    if let Some(host) = self.host_mut(id) {
                        host.active_sessions += 1;
                    }
                }
            } else {
                cascade_details.push(json!({
                    "session_id": self.sessions[index].id,
                    "user_id": self.sessions[index].user_id,
                    "host_id": host_id,
                    "end_reason": EndReason::HostOffline,
                }));
                self.sessions[index].end(EndReason::HostOffline, now);
                changed = true;
            }
        }

        for details in cascade_details {
            self.record_event(EventKind::SessionEnded, details, now);
        }

        changed
    }

    /// Sorts the queue by descending priority score, FIFO within a score.
    fn sort_queue(&mut self, now: DateTime<Utc>) {
        let policy = self.policy;
        self.queue.sort_by(|left, right| {
            queue_score(&policy, right, now)
                .cmp(&queue_score(&policy, left, now))
                .then_with(|| left.requested_at.cmp(&right.requested_at))
        });
    }

    /// Repeatedly scans the sorted queue, assigning the first entry with a
    /// compatible host, until one full pass makes no assignment.
    fn promote_queue(&mut self, require_stream_health: bool, now: DateTime<Utc>) -> (bool, u32) {
        let mut changed = false;
        let mut promoted = 0u32;

        loop {
            let mut assigned_in_pass = false;
            let mut index = 0;

            while index < self.queue.len() {
                let session_index = self
                    .sessions
                    .iter()
                    .position(|s| s.id == self.queue[index].session_id);

                let Some(s_idx) = session_index else {
                    self.queue.remove(index);
                    changed = true;
                    continue;
                };
                if self.sessions[s_idx].status != SessionStatus::Queued {
                    self.queue.remove(index);
                    changed = true;
                    continue;
                }

                let placement = Placement::from(&self.sessions[s_idx]);
                let Some(h_idx) = self.find_available_host(&placement, require_stream_health)
                else {
                    index += 1;
                    continue;
                };

                self.queue.remove(index);
                self.assign_session_to_host(s_idx, h_idx, now);
                changed = true;
                promoted += 1;
                assigned_in_pass = true;
                break;
            }

            if !assigned_in_pass {
                break;
            }
        }

        (changed, promoted)
    }

    /// Binds a queued session to a host and records the assignment.
    pub(crate) fn assign_session_to_host(
        &mut self,
        session_index: usize,
        host_index: usize,
        now: DateTime<Utc>,
    ) {
        let placement = Placement::from(&self.sessions[session_index]);
        let reason = assignment_reason(&self.hosts[host_index], &placement);

        let (host_id, stream_snapshot) = {
            let host = &mut self.hosts[host_index];
            host.active_sessions += 1;
            (host.id.clone(), host.stream_health.clone())
        };

        let wait_sec;
        let (session_id, user_id, plan) = {
            let session = &mut self.sessions[session_index];
            session.status = SessionStatus::Active;
            session.host_id = Some(host_id.clone());
            session.started_at = Some(now);
            session.assigned_by = Some(reason.clone());
            session.stream_health = Some(stream_snapshot);
            wait_sec = u64::try_from((now - session.requested_at).num_seconds().max(0))
                .unwrap_or(0);
            (session.id.clone(), session.user_id.clone(), session.plan)
        };

        self.metrics.record_assignment(plan, wait_sec, now);
        self.record_event(
            EventKind::Assignment,
            json!({
                "session_id": session_id,
                "user_id": user_id,
                "host_id": host_id,
                "plan": plan,
                "assigned_by": reason,
            }),
            now,
        );
    }

    /// Finds the best compatible host for a placement, if any.
    pub(crate) fn find_available_host(
        &self,
        placement: &Placement,
        require_stream_health: bool,
    ) -> Option<usize> {
        let mut candidates: Vec<usize> = (0..self.hosts.len())
            .filter(|&i| self.is_host_compatible(&self.hosts[i], placement, require_stream_health))
            .collect();

        candidates.sort_by(|&left, &right| {
            compare_hosts(&self.hosts[left], &self.hosts[right], placement)
        });
        candidates.first().copied()
    }

    fn is_host_compatible(
        &self,
        host: &Host,
        placement: &Placement,
        require_stream_health: bool,
    ) -> bool {
        host.status.is_online()
            && host.mode == HostMode::Active
            && (!require_stream_health || host.stream_health.is_stream_ready())
            && host.active_sessions < host.capacity
            && host.capabilities.gpu_tier.meets(placement.plan.required_gpu_tier())
            && host.capabilities.max_fps >= placement.plan.min_fps()
            && host.capabilities.supports_game(&placement.game_slug)
            && self.can_host_accept_plan(host, placement.plan)
    }

    /// The slot-reservation check: granting a slot to `plan` must leave
    /// enough free capacity to cover the unmet reservation for strictly
    /// higher tiers on this host.
    fn can_host_accept_plan(&self, host: &Host, plan: Plan) -> bool {
        let active_higher = self
            .sessions
            .iter()
            .filter(|s| {
                s.status == SessionStatus::Active
                    && s.host_id.as_deref() == Some(host.id.as_str())
                    && s.plan.rank() > plan.rank()
            })
            .count();
        let active_higher = u32::try_from(active_higher).unwrap_or(u32::MAX);

        let reserved = host.slot_policy.reserved_above(plan);
        let remaining_need = reserved.saturating_sub(active_higher);
        host.available_slots() > remaining_need
    }
}

/// Host preference: lower reported latency, then preferred region, then
/// lower load ratio, then freshest heartbeat.
fn compare_hosts(left: &Host, right: &Host, placement: &Placement) -> Ordering {
    let latency_of = |host: &Host| {
        placement
            .latency_ms_by_region
            .as_ref()
            .and_then(|map| map.get(&host.region))
            .copied()
    };

    match (latency_of(left), latency_of(right)) {
        (Some(l), Some(r)) if l != r => return l.cmp(&r),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        _ => {}
    }

    if let Some(preferred) = placement.preferred_region.as_deref() {
        let left_match = left.region == preferred;
        let right_match = right.region == preferred;
        if left_match != right_match {
            return if left_match { Ordering::Less } else { Ordering::Greater };
        }
    }

    let left_load = left.load_ratio();
    let right_load = right.load_ratio();
    if (left_load - right_load).abs() > f64::EPSILON {
        return left_load.partial_cmp(&right_load).unwrap_or(Ordering::Equal);
    }

    right.last_heartbeat_at.cmp(&left.last_heartbeat_at)
}
