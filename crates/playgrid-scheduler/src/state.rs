//! The scheduling state: hosts, sessions, queue, policy, metrics, events,
//! tickets and linked provider accounts.
//!
//! All of it lives in one struct mutated under a single lock held by
//! [`crate::scheduler::Scheduler`]; nothing in this module synchronises on
//! its own. Every mutating method takes an explicit `now` so tests can
//! drive a synthetic clock.

use chrono::{DateTime, Utc};
use playgrid_core::{
    default_catalog, default_providers, EndReason, Game, HostCapabilities, HostMode, HostStatus,
    Plan, Provider, SessionStatus, SlotPolicy, StreamHealth,
};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::events::{EventKind, EventLog};
use crate::metrics::SchedulerMetrics;
use crate::policy::SchedulerPolicy;
use crate::ticket::LaunchTicket;

/// A registered compute host (rig).
#[derive(Debug, Clone, Serialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    pub region: String,
    /// Total session slots. Always at least one.
    pub capacity: u32,
    /// Derived occupancy, recomputed from sessions every tick.
    pub active_sessions: u32,
    pub status: HostStatus,
    pub mode: HostMode,
    pub capabilities: HostCapabilities,
    pub slot_policy: SlotPolicy,
    pub stream_health: StreamHealth,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl Host {
    /// Heartbeat freshness: online, and either never heartbeated or within
    /// the timeout window.
    #[must_use]
    pub fn is_fresh(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> bool {
        if !self.status.is_online() {
            return false;
        }
        match self.last_heartbeat_at {
            None => true,
            Some(at) => now - at <= timeout,
        }
    }

    /// Occupancy as a fraction of capacity.
    #[must_use]
    pub fn load_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        f64::from(self.active_sessions) / f64::from(self.capacity)
    }

    /// Slots not currently occupied.
    #[must_use]
    pub const fn available_slots(&self) -> u32 {
        self.capacity.saturating_sub(self.active_sessions)
    }
}

/// A play session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub game_slug: String,
    pub game_title: String,
    pub plan: Plan,
    pub preferred_region: Option<String>,
    pub client_latency_ms_by_region: Option<BTreeMap<String, u32>>,
    pub status: SessionStatus,
    pub host_id: Option<String>,
    /// Human-readable reason the matchmaker picked the host.
    pub assigned_by: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub reconnect_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reconnect_token: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
    /// Stream health snapshot taken from the host at assignment.
    pub stream_health: Option<StreamHealth>,
}

impl Session {
    /// Time remaining before the plan's duration cap, if the session has
    /// started. A session that never started has its full allowance left.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        let allowance = self.plan.max_session_duration();
        match self.started_at {
            None => allowance,
            Some(started) => {
                let elapsed = (now - started).max(chrono::Duration::zero());
                (allowance - elapsed).max(chrono::Duration::zero())
            }
        }
    }

    /// Clears all reconnect bookkeeping.
    pub fn clear_reconnect_state(&mut self) {
        self.disconnected_at = None;
        self.reconnect_expires_at = None;
        self.reconnect_token = None;
    }

    /// Marks the session ended.
    pub fn end(&mut self, reason: EndReason, now: DateTime<Utc>) {
        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);
        self.end_reason = Some(reason);
        self.host_id = None;
        self.clear_reconnect_state();
    }
}

/// Thin queue-ordering projection of a queued session.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub session_id: String,
    pub user_id: String,
    pub plan: Plan,
    pub game_slug: String,
    pub requested_at: DateTime<Utc>,
    pub preferred_region: Option<String>,
}

/// A linked external launch-provider account.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedAccount {
    pub provider: String,
    pub account_id: String,
    pub display_name: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// All mutable scheduling state.
#[derive(Debug)]
pub struct SchedulerState {
    pub hosts: Vec<Host>,
    pub sessions: Vec<Session>,
    pub queue: Vec<QueueEntry>,
    pub policy: SchedulerPolicy,
    pub metrics: SchedulerMetrics,
    pub events: EventLog,
    pub tickets: Vec<LaunchTicket>,
    /// user id → provider id → account.
    pub linked_accounts: HashMap<String, HashMap<String, LinkedAccount>>,
    pub catalog: Vec<Game>,
    pub providers: Vec<Provider>,
}

impl SchedulerState {
    /// Empty state with the built-in catalog.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            hosts: Vec::new(),
            sessions: Vec::new(),
            queue: Vec::new(),
            policy: SchedulerPolicy::default(),
            metrics: SchedulerMetrics::new(now),
            events: EventLog::new(),
            tickets: Vec::new(),
            linked_accounts: HashMap::new(),
            catalog: default_catalog(),
            providers: default_providers(),
        }
    }

    /// Looks up a host by id.
    #[must_use]
    pub fn host(&self, host_id: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.id == host_id)
    }

    pub(crate) fn host_mut(&mut self, host_id: &str) -> Option<&mut Host> {
        self.hosts.iter_mut().find(|h| h.id == host_id)
    }

    /// Looks up a session owned by `user_id`.
    #[must_use]
    pub fn session_for_user(&self, user_id: &str, session_id: &str) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == user_id)
    }

    pub(crate) fn session_for_user_mut(
        &mut self,
        user_id: &str,
        session_id: &str,
    ) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user_id)
    }

    /// Looks up a game in the catalog.
    #[must_use]
    pub fn game(&self, slug: &str) -> Option<&Game> {
        self.catalog.iter().find(|g| g.slug == slug)
    }

    /// Looks up a launch provider.
    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// 1-based position of a session in the queue, if queued.
    #[must_use]
    pub fn queue_position(&self, session_id: &str) -> Option<usize> {
        self.queue
            .iter()
            .position(|entry| entry.session_id == session_id)
            .map(|index| index + 1)
    }

    /// Appends an event under the current retention policy.
    pub(crate) fn record_event(
        &mut self,
        kind: EventKind,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) {
        let limit = self.policy.event_retention_limit;
        self.events.record(kind, details, now, limit);
    }
}

/// Generates a prefixed id: millisecond timestamp plus a random suffix.
pub(crate) fn generate_id(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{prefix}_{}_{suffix}", now.timestamp_millis())
}

/// Generates a random hex token of `bytes` entropy bytes.
pub(crate) fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(buf.as_mut_slice());
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_host(id: &str) -> Host {
        Host {
            id: id.to_owned(),
            name: format!("Rig {id}"),
            region: "eu-west".to_owned(),
            capacity: 4,
            active_sessions: 0,
            status: HostStatus::Online,
            mode: HostMode::Active,
            capabilities: HostCapabilities::default(),
            slot_policy: SlotPolicy::default(),
            stream_health: StreamHealth::default(),
            last_heartbeat_at: None,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn freshness_without_heartbeat() {
        let host = make_host("h1");
        assert!(host.is_fresh(chrono::Duration::seconds(45), Utc::now()));
    }

    #[test]
    fn freshness_expires() {
        let now = Utc::now();
        let mut host = make_host("h1");
        host.last_heartbeat_at = Some(now - chrono::Duration::seconds(60));
        assert!(!host.is_fresh(chrono::Duration::seconds(45), now));

        host.last_heartbeat_at = Some(now - chrono::Duration::seconds(30));
        assert!(host.is_fresh(chrono::Duration::seconds(45), now));
    }

    #[test]
    fn offline_host_is_never_fresh() {
        let mut host = make_host("h1");
        host.status = HostStatus::Offline;
        assert!(!host.is_fresh(chrono::Duration::seconds(45), Utc::now()));
    }

    #[test]
    fn load_ratio_and_slots() {
        let mut host = make_host("h1");
        host.active_sessions = 3;
        assert!((host.load_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(host.available_slots(), 1);
    }

    #[test]
    fn generated_ids_carry_prefix() {
        let id = generate_id("sess", Utc::now());
        assert!(id.starts_with("sess_"));
    }

    #[test]
    fn random_tokens_differ() {
        assert_ne!(random_token(20), random_token(20));
        assert_eq!(random_token(20).len(), 40);
    }
}
