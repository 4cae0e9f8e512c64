//! Scheduler metrics: monotonic counters plus per-plan wait aggregates.

use chrono::{DateTime, Utc};
use playgrid_core::Plan;
use serde::Serialize;
use std::collections::BTreeMap;

/// Reasons a session request can be rejected or deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Per-user active/queued cap hit.
    ConcurrencyLimit,
    /// Caller's plan is below the game's minimum.
    PlanRestricted,
    /// No compatible host at request time; the session was queued.
    NoCapacity,
}

impl RejectReason {
    /// Reason identifier as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::PlanRestricted => "plan_restricted",
            Self::NoCapacity => "no_capacity",
        }
    }
}

/// Rejection counters by reason.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RejectionCounts {
    pub concurrency_limit: u64,
    pub plan_restricted: u64,
    pub no_capacity: u64,
}

impl RejectionCounts {
    fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::ConcurrencyLimit => self.concurrency_limit += 1,
            RejectReason::PlanRestricted => self.plan_restricted += 1,
            RejectReason::NoCapacity => self.no_capacity += 1,
        }
    }
}

/// Wait-time aggregate for one plan tier, in whole seconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WaitStats {
    pub count: u64,
    pub total_sec: u64,
    pub max_sec: u64,
}

impl WaitStats {
    fn record(&mut self, wait_sec: u64) {
        self.count += 1;
        self.total_sec += wait_sec;
        self.max_sec = self.max_sec.max(wait_sec);
    }
}

/// Monotonic scheduler counters. Reset only by explicit admin action.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    pub since: DateTime<Utc>,
    pub queued_total: u64,
    pub assignments_total: u64,
    pub timed_out_total: u64,
    pub rejections: RejectionCounts,
    pub wait_by_plan_sec: BTreeMap<Plan, WaitStats>,
    pub last_queue_at: Option<DateTime<Utc>>,
    pub last_assignment_at: Option<DateTime<Utc>>,
    pub last_timeout_at: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Fresh metrics starting at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            since: now,
            queued_total: 0,
            assignments_total: 0,
            timed_out_total: 0,
            rejections: RejectionCounts::default(),
            wait_by_plan_sec: Plan::ALL
                .into_iter()
                .map(|plan| (plan, WaitStats::default()))
                .collect(),
            last_queue_at: None,
            last_assignment_at: None,
            last_timeout_at: None,
        }
    }

    /// Records a session joining the queue.
    pub fn record_queue_join(&mut self, now: DateTime<Utc>) {
        self.queued_total += 1;
        self.last_queue_at = Some(now);
    }

    /// Records an assignment and the wait it took.
    pub fn record_assignment(&mut self, plan: Plan, wait_sec: u64, now: DateTime<Utc>) {
        self.assignments_total += 1;
        self.last_assignment_at = Some(now);
        self.wait_by_plan_sec.entry(plan).or_default().record(wait_sec);
    }

    /// Records a session ended by duration timeout.
    pub fn record_timeout(&mut self, now: DateTime<Utc>) {
        self.timed_out_total += 1;
        self.last_timeout_at = Some(now);
    }

    /// Records a rejection.
    pub fn record_rejection(&mut self, reason: RejectReason) {
        self.rejections.record(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_aggregates_track_count_total_max() {
        let now = Utc::now();
        let mut metrics = SchedulerMetrics::new(now);

        metrics.record_assignment(Plan::Free, 10, now);
        metrics.record_assignment(Plan::Free, 30, now);
        metrics.record_assignment(Plan::Ultimate, 2, now);

        let free = &metrics.wait_by_plan_sec[&Plan::Free];
        assert_eq!(free.count, 2);
        assert_eq!(free.total_sec, 40);
        assert_eq!(free.max_sec, 30);
        assert_eq!(metrics.wait_by_plan_sec[&Plan::Ultimate].count, 1);
        assert_eq!(metrics.assignments_total, 3);
    }

    #[test]
    fn rejection_counters_by_reason() {
        let mut metrics = SchedulerMetrics::new(Utc::now());
        metrics.record_rejection(RejectReason::NoCapacity);
        metrics.record_rejection(RejectReason::NoCapacity);
        metrics.record_rejection(RejectReason::PlanRestricted);

        assert_eq!(metrics.rejections.no_capacity, 2);
        assert_eq!(metrics.rejections.plan_restricted, 1);
        assert_eq!(metrics.rejections.concurrency_limit, 0);
    }

    #[test]
    fn all_plans_present_from_start() {
        let metrics = SchedulerMetrics::new(Utc::now());
        for plan in Plan::ALL {
            assert!(metrics.wait_by_plan_sec.contains_key(&plan));
        }
    }
}
