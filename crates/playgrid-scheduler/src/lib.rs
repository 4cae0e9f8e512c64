//! PlayGrid session scheduler - host registry, matchmaking, launch tickets.
//!
//! The scheduler is responsible for:
//!
//! - **Host registry**: tracking compute hosts, their capacity, capability
//!   profile, slot reservations and heartbeat-derived liveness
//! - **Session lifecycle**: the queued → active → disconnected → ended state
//!   machine, with per-plan duration caps and reconnect grace windows
//! - **Matchmaking**: priority-queue promotion with fairness aging,
//!   multi-criteria host compatibility and slot reservations under
//!   contention
//! - **Launch tickets**: signed, replay-bounded capability grants for
//!   external launch actions
//! - **Policy & telemetry**: runtime-tunable policy, monotonic metrics and
//!   a bounded event log
//!
//! # Architecture
//!
//! All scheduling state sits behind a single lock inside [`Scheduler`]; a
//! tick is one atomic read-modify-write pass over that state. Concurrent
//! tick invocations are serialised by a non-blocking guard that skips
//! rather than queues. Session and reconnect expiry are evaluated lazily
//! at tick time, so the maximum drift equals the tick interval.

pub mod config;
pub mod error;
pub mod events;
pub mod matchmaker;
pub mod metrics;
pub mod policy;
pub mod registry;
pub mod scaling;
pub mod scheduler;
pub mod sessions;
pub mod state;
pub mod ticket;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use events::{EventKind, SchedulerEvent};
pub use matchmaker::TickReport;
pub use metrics::{RejectReason, SchedulerMetrics};
pub use policy::{PolicyUpdate, SchedulerPolicy};
pub use registry::HostSpec;
pub use scaling::{CapacityReport, FleetSummary, RigSummary, ScalingRecommendation};
pub use scheduler::{ControlSnapshot, MatchmakerStatus, Scheduler, TickOutcome};
pub use sessions::{
    BootstrapInfo, DisconnectOutcome, RequestOutcome, SessionRequest, SessionRuntime,
};
pub use state::{Host, LinkedAccount, QueueEntry, SchedulerState, Session};
pub use ticket::{LaunchTicket, TicketService, TicketVerification};
