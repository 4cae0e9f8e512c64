//! Append-only, bounded scheduler event log.
//!
//! Every state transition the scheduler performs is recorded here for audit
//! and debugging. The log is a fixed-capacity ring: once the retention limit
//! is reached the oldest events are dropped deterministically. It is never
//! used for replay or recovery.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Rejection,
    QueueJoin,
    Assignment,
    SessionTimeout,
    SessionReconnectTimeout,
    SessionDisconnected,
    SessionReconnected,
    SessionEnded,
    HostRegister,
    HostOffline,
    HostModeUpdated,
    HostCapabilitiesUpdated,
    HostSlotPolicyUpdated,
    HostCapacityUpdated,
    HostStreamHealthUpdated,
    PolicyUpdated,
    MetricsReset,
    TicketIssued,
    TicketRejected,
    IntegrationLinked,
    IntegrationUnlinked,
}

/// One recorded scheduler transition.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerEvent {
    pub id: String,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub details: serde_json::Value,
}

/// Bounded ring buffer of scheduler events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<SchedulerEvent>,
    next_seq: u64,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event, dropping the oldest beyond `retention_limit`.
    pub fn record(
        &mut self,
        kind: EventKind,
        details: serde_json::Value,
        now: DateTime<Utc>,
        retention_limit: usize,
    ) {
        self.next_seq += 1;
        self.events.push_back(SchedulerEvent {
            id: format!("evt_{}", self.next_seq),
            at: now,
            kind,
            details,
        });

        while self.events.len() > retention_limit.max(1) {
            self.events.pop_front();
        }
    }

    /// The most recent `limit` events, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<SchedulerEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut log = EventLog::new();
        let now = Utc::now();

        for i in 0..60 {
            log.record(EventKind::QueueJoin, json!({ "i": i }), now, 50);
        }

        assert_eq!(log.len(), 50);
        let recent = log.recent(50);
        // Newest first; the oldest ten were dropped.
        assert_eq!(recent[0].details["i"], 59);
        assert_eq!(recent[49].details["i"], 10);
    }

    #[test]
    fn event_ids_are_unique_and_ordered() {
        let mut log = EventLog::new();
        let now = Utc::now();
        log.record(EventKind::Assignment, json!({}), now, 10);
        log.record(EventKind::SessionEnded, json!({}), now, 10);

        let recent = log.recent(10);
        assert_eq!(recent[0].id, "evt_2");
        assert_eq!(recent[1].id, "evt_1");
    }

    #[test]
    fn recent_respects_limit() {
        let mut log = EventLog::new();
        let now = Utc::now();
        for _ in 0..5 {
            log.record(EventKind::QueueJoin, json!({}), now, 50);
        }
        assert_eq!(log.recent(2).len(), 2);
    }
}
