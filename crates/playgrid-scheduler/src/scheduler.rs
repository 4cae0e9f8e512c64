//! The scheduler facade: one lock around all scheduling state, a
//! non-blocking tick guard, and the public operation surface the HTTP
//! layer calls.
//!
//! Every mutation goes through this type, so concurrent API handlers and
//! the tick driver cannot race each other. The tick guard is deliberately
//! skip-if-busy rather than queueing: a tick that finds another in flight
//! returns immediately to bound tail latency.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use playgrid_core::{Game, HostCapabilities, HostMode, SlotPolicy, StreamHealth};
use serde::Serialize;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::events::{EventKind, SchedulerEvent};
use crate::matchmaker::TickReport;
use crate::metrics::SchedulerMetrics;
use crate::policy::{PolicyUpdate, SchedulerPolicy};
use crate::registry::HostSpec;
use crate::scaling::{CapacityReport, FleetSummary};
use crate::sessions::{
    BootstrapInfo, DisconnectOutcome, RequestOutcome, SessionRequest, SessionRuntime,
};
use crate::state::{Host, LinkedAccount, SchedulerState, Session};
use crate::ticket::{LaunchTicket, TicketService, TicketVerification};

/// Result of asking for a tick.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "report")]
pub enum TickOutcome {
    /// The tick ran.
    Completed(TickReport),
    /// Another tick was already in flight; this one was skipped, not queued.
    Skipped,
}

/// Matchmaker bookkeeping exposed on the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct MatchmakerStatus {
    pub started_at: DateTime<Utc>,
    pub total_ticks: u64,
    pub changed_ticks: u64,
    pub skipped_ticks: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_duration_ms: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Control-surface snapshot: policy, metrics and depth counters.
#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub policy: SchedulerPolicy,
    pub metrics: SchedulerMetrics,
    pub queue_depth: usize,
    pub active_sessions: usize,
    pub events_stored: usize,
}

/// The capacity-aware session scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    tickets: TicketService,
    state: Mutex<SchedulerState>,
    status: Mutex<MatchmakerStatus>,
    tick_running: AtomicBool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("tick_running", &self.tick_running.load(Ordering::SeqCst))
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler with empty state.
    #[must_use]
    pub fn new(config: SchedulerConfig, now: DateTime<Utc>) -> Self {
        let tickets = TicketService::new(
            &config.ticket_signing_key,
            config.ticket_ttl_chrono(),
            config.ticket_retention_limit,
        );
        Self {
            tickets,
            state: Mutex::new(SchedulerState::new(now)),
            status: Mutex::new(MatchmakerStatus {
                started_at: now,
                total_ticks: 0,
                changed_ticks: 0,
                skipped_ticks: 0,
                last_tick_at: None,
                last_duration_ms: 0,
                last_error: None,
                last_error_at: None,
            }),
            tick_running: AtomicBool::new(false),
            config,
        }
    }

    /// The static configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Tick driver
    // ---------------------------------------------------------------------

    /// Runs one matchmaker tick, unless one is already in flight.
    ///
    /// A failing tick is caught and recorded on the status; the previously
    /// committed state stays valid and the driver keeps running.
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        if self
            .tick_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.status.lock().skipped_ticks += 1;
            return TickOutcome::Skipped;
        }

        let started = std::time::Instant::now();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut state = self.state.lock();
            state.run_tick(&self.config, now)
        }));
        self.tick_running.store(false, Ordering::SeqCst);

        let mut status = self.status.lock();
        status.total_ticks += 1;
        status.last_tick_at = Some(now);
        status.last_duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(report) => {
                if report.changed {
                    status.changed_ticks += 1;
                }
                status.last_error = None;
                status.last_error_at = None;
                TickOutcome::Completed(report)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tick panicked".to_owned());
                tracing::error!(error = %message, "matchmaker tick failed");
                status.last_error = Some(message);
                status.last_error_at = Some(now);
                TickOutcome::Skipped
            }
        }
    }

    /// Matchmaker status snapshot.
    #[must_use]
    pub fn status(&self) -> MatchmakerStatus {
        self.status.lock().clone()
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Requests a session, then promotes the queue in the same critical
    /// section so the response reflects fresh state.
    pub fn request_session(
        &self,
        request: SessionRequest,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        let mut state = self.state.lock();
        let outcome =
            state.request_session(request, self.config.require_stream_health, now)?;
        state.run_tick(&self.config, now);

        // The promotion pass may have assigned the session already.
        let session = state
            .session_for_user(&outcome.session.user_id, &outcome.session.id)
            .cloned()
            .unwrap_or(outcome.session);
        let queue_position = state.queue_position(&session.id);
        Ok(RequestOutcome {
            session,
            queue_position,
        })
    }

    /// The caller's live sessions, hydrated with runtime fields.
    #[must_use]
    pub fn my_sessions(&self, user_id: &str, now: DateTime<Utc>) -> Vec<SessionRuntime> {
        let mut state = self.state.lock();
        state.run_tick(&self.config, now);
        state.live_sessions_for_user(user_id, now)
    }

    /// Marks a session disconnected and issues a reconnect token.
    pub fn disconnect_session(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DisconnectOutcome> {
        self.state.lock().disconnect_session(
            user_id,
            session_id,
            self.config.reconnect_grace_chrono(),
            now,
        )
    }

    /// Resumes a disconnected session.
    pub fn reconnect_session(
        &self,
        user_id: &str,
        session_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        self.state
            .lock()
            .reconnect_session(user_id, session_id, token, now)
    }

    /// Ends a session and promotes the queue into the freed slot.
    pub fn end_session(&self, user_id: &str, session_id: &str, now: DateTime<Utc>) -> Result<Session> {
        let mut state = self.state.lock();
        let session = state.end_session(user_id, session_id, now)?;
        state.run_tick(&self.config, now);
        Ok(session)
    }

    /// Stream bootstrap payload for an assigned session.
    pub fn bootstrap(&self, user_id: &str, session_id: &str) -> Result<BootstrapInfo> {
        self.state.lock().bootstrap(user_id, session_id)
    }

    // ---------------------------------------------------------------------
    // Host registry
    // ---------------------------------------------------------------------

    /// Registers or updates a host, then promotes the queue onto it.
    pub fn register_host(&self, spec: HostSpec, now: DateTime<Utc>) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.register_host(spec, self.config.default_host_capacity, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Host heartbeat with an optional stream-health report.
    pub fn heartbeat_host(
        &self,
        host_id: &str,
        stream_health: Option<StreamHealth>,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.heartbeat_host(host_id, stream_health, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Graceful host shutdown.
    pub fn set_host_offline(&self, host_id: &str, now: DateTime<Utc>) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.set_host_offline(host_id, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Sets a host's administrative mode.
    pub fn set_host_mode(&self, host_id: &str, mode: HostMode, now: DateTime<Utc>) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.set_host_mode(host_id, mode, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Admin mutation of a host's capability profile; re-scores the queue
    /// immediately since eligibility may have changed.
    pub fn set_host_capabilities(
        &self,
        host_id: &str,
        capabilities: HostCapabilities,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.set_host_capabilities(host_id, capabilities, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Admin mutation of a host's slot-reservation policy.
    pub fn set_host_slot_policy(
        &self,
        host_id: &str,
        slot_policy: SlotPolicy,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.set_host_slot_policy(host_id, slot_policy, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Admin mutation of a host's capacity.
    pub fn set_host_capacity(&self, host_id: &str, capacity: u32, now: DateTime<Utc>) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.set_host_capacity(host_id, capacity, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Replaces a host's stream-health report.
    pub fn set_host_stream_health(
        &self,
        host_id: &str,
        health: StreamHealth,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let mut state = self.state.lock();
        let host = state.set_host_stream_health(host_id, health, now)?;
        state.run_tick(&self.config, now);
        Ok(host)
    }

    /// Fleet listing, fresh after a promotion pass.
    #[must_use]
    pub fn hosts(&self, now: DateTime<Utc>) -> Vec<Host> {
        let mut state = self.state.lock();
        state.run_tick(&self.config, now);
        state.hosts.clone()
    }

    /// Per-rig and aggregate saturation snapshot.
    #[must_use]
    pub fn fleet_summary(&self, now: DateTime<Utc>) -> FleetSummary {
        let mut state = self.state.lock();
        state.run_tick(&self.config, now);
        state.fleet_summary()
    }

    // ---------------------------------------------------------------------
    // Launch tickets and provider accounts
    // ---------------------------------------------------------------------

    /// Issues a signed launch ticket for the caller's active session.
    pub fn issue_ticket(
        &self,
        user_id: &str,
        game_slug: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LaunchTicket> {
        self.state
            .lock()
            .issue_ticket(&self.tickets, user_id, game_slug, session_id, now)
    }

    /// Verifies (and optionally consumes) a launch ticket.
    pub fn verify_ticket(
        &self,
        user_id: &str,
        ticket_id: &str,
        signature: &str,
        consume: bool,
        now: DateTime<Utc>,
    ) -> Result<TicketVerification> {
        self.state
            .lock()
            .verify_ticket(&self.tickets, user_id, ticket_id, signature, consume, now)
    }

    /// Links an external provider account.
    pub fn link_account(
        &self,
        user_id: &str,
        provider_id: &str,
        account_id: &str,
        display_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LinkedAccount> {
        self.state
            .lock()
            .link_account(user_id, provider_id, account_id, display_name, now)
    }

    /// Unlinks an external provider account.
    pub fn unlink_account(&self, user_id: &str, provider_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.state.lock().unlink_account(user_id, provider_id, now)
    }

    /// The caller's linked provider accounts.
    #[must_use]
    pub fn accounts_for_user(&self, user_id: &str) -> Vec<LinkedAccount> {
        self.state.lock().accounts_for_user(user_id)
    }

    // ---------------------------------------------------------------------
    // Policy, metrics, events
    // ---------------------------------------------------------------------

    /// Control-surface snapshot.
    #[must_use]
    pub fn control_snapshot(&self) -> ControlSnapshot {
        let state = self.state.lock();
        ControlSnapshot {
            policy: state.policy,
            metrics: state.metrics.clone(),
            queue_depth: state.queue.len(),
            active_sessions: state
                .sessions
                .iter()
                .filter(|s| s.status == playgrid_core::SessionStatus::Active)
                .count(),
            events_stored: state.events.len(),
        }
    }

    /// Merges a policy update, clamps it, and re-scores the queue.
    pub fn update_policy(&self, update: PolicyUpdate, now: DateTime<Utc>) -> SchedulerPolicy {
        let mut state = self.state.lock();
        state.policy = state.policy.merged(update);
        let policy = state.policy;
        state.record_event(
            EventKind::PolicyUpdated,
            json!({ "policy": policy }),
            now,
        );
        state.run_tick(&self.config, now);
        policy
    }

    /// Resets metrics to zero. Explicit admin action only.
    #[must_use]
    pub fn reset_metrics(&self, now: DateTime<Utc>) -> SchedulerMetrics {
        let mut state = self.state.lock();
        state.metrics = SchedulerMetrics::new(now);
        state.record_event(EventKind::MetricsReset, json!({}), now);
        state.metrics.clone()
    }

    /// The most recent events, newest first.
    #[must_use]
    pub fn events(&self, limit: usize) -> Vec<SchedulerEvent> {
        self.state.lock().events.recent(limit)
    }

    /// Autoscale advisor output.
    #[must_use]
    pub fn capacity_report(&self) -> CapacityReport {
        self.state.lock().capacity_report()
    }

    /// The game catalog.
    #[must_use]
    pub fn games(&self) -> Vec<Game> {
        self.state.lock().catalog.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playgrid_core::Plan;

    fn make_scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default(), Utc::now())
    }

    #[test]
    fn tick_guard_skips_when_busy() {
        let scheduler = make_scheduler();
        scheduler.tick_running.store(true, Ordering::SeqCst);

        let outcome = scheduler.tick_at(Utc::now());
        assert!(matches!(outcome, TickOutcome::Skipped));
        assert_eq!(scheduler.status().skipped_ticks, 1);
        assert_eq!(scheduler.status().total_ticks, 0);

        scheduler.tick_running.store(false, Ordering::SeqCst);
        let outcome = scheduler.tick_at(Utc::now());
        assert!(matches!(outcome, TickOutcome::Completed(_)));
        assert_eq!(scheduler.status().total_ticks, 1);
    }

    #[test]
    fn tick_updates_status() {
        let scheduler = make_scheduler();
        let now = Utc::now();
        scheduler.tick_at(now);

        let status = scheduler.status();
        assert_eq!(status.total_ticks, 1);
        assert_eq!(status.last_tick_at, Some(now));
        assert!(status.last_error.is_none());
    }

    #[test]
    fn control_snapshot_reflects_queue() {
        let scheduler = make_scheduler();
        let now = Utc::now();
        scheduler
            .request_session(
                SessionRequest {
                    user_id: "u1".to_owned(),
                    plan: Plan::Free,
                    game_slug: "fortnite".to_owned(),
                    preferred_region: None,
                    client_latency_ms_by_region: None,
                },
                now,
            )
            .unwrap();

        let snapshot = scheduler.control_snapshot();
        assert_eq!(snapshot.queue_depth, 1);
        assert_eq!(snapshot.metrics.queued_total, 1);
        assert!(snapshot.events_stored > 0);
    }

    #[test]
    fn policy_update_applies_immediately() {
        let scheduler = make_scheduler();
        let policy = scheduler.update_policy(
            PolicyUpdate {
                max_queued_sessions_per_user: Some(3),
                ..PolicyUpdate::default()
            },
            Utc::now(),
        );
        assert_eq!(policy.max_queued_sessions_per_user, 3);
        assert_eq!(
            scheduler.control_snapshot().policy.max_queued_sessions_per_user,
            3
        );
    }
}
