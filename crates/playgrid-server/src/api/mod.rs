//! HTTP API: router assembly and shared application state.

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use playgrid_scheduler::{Scheduler, TickOutcome};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AuthConfig;

pub mod control;
pub mod hosts;
pub mod launch;
pub mod sessions;

/// Last-seen state of the external orchestrator.
#[derive(Debug, Default)]
pub struct OrchestratorHealth {
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<TickOutcome>,
}

/// Tick driver state shared with the handlers.
#[derive(Debug)]
pub struct WorkerState {
    /// Whether the in-process tick loop is running.
    pub embedded: bool,
    pub orchestrator: Mutex<OrchestratorHealth>,
}

/// Shared application state.
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub auth: AuthConfig,
    pub worker: WorkerState,
}

impl AppState {
    /// Builds application state.
    #[must_use]
    pub fn new(scheduler: Arc<Scheduler>, auth: AuthConfig, embedded: bool) -> Self {
        Self {
            scheduler,
            auth,
            worker: WorkerState {
                embedded,
                orchestrator: Mutex::new(OrchestratorHealth::default()),
            },
        }
    }
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/games", get(control::list_games))
        // Sessions
        .route("/api/sessions/request", post(sessions::request_session))
        .route("/api/sessions/me", get(sessions::my_sessions))
        .route("/api/sessions/{id}/disconnect", post(sessions::disconnect_session))
        .route("/api/sessions/{id}/reconnect", post(sessions::reconnect_session))
        .route("/api/sessions/{id}/end", post(sessions::end_session))
        .route("/api/sessions/{id}/bootstrap", get(sessions::bootstrap))
        // Host agent surface
        .route("/api/hosts", get(hosts::list_hosts))
        .route("/api/hosts/register", post(hosts::register_host))
        .route("/api/hosts/{id}/heartbeat", post(hosts::heartbeat))
        .route("/api/hosts/{id}/offline", post(hosts::set_offline))
        .route("/api/hosts/{id}/mode", put(hosts::set_mode))
        .route("/api/hosts/{id}/capabilities", put(hosts::set_capabilities))
        .route("/api/hosts/{id}/policy", put(hosts::set_slot_policy))
        .route("/api/hosts/{id}/capacity", put(hosts::set_capacity))
        .route("/api/hosts/{id}/stream-health", put(hosts::set_stream_health))
        .route("/api/fleet/summary", get(hosts::fleet_summary))
        // Launch tickets and provider accounts
        .route("/api/launch/ticket", post(launch::issue_ticket))
        .route("/api/launch/ticket/verify", post(launch::verify_ticket))
        .route("/api/integrations/accounts", get(launch::linked_accounts))
        .route("/api/integrations/{provider}/link", post(launch::link_account))
        .route("/api/integrations/{provider}/unlink", delete(launch::unlink_account))
        // Control surface
        .route("/api/control/scheduler", get(control::scheduler_snapshot))
        .route("/api/control/scheduler/policy", put(control::update_policy))
        .route("/api/control/scheduler/events", get(control::recent_events))
        .route(
            "/api/control/scheduler/metrics/reset",
            post(control::reset_metrics),
        )
        .route("/api/control/autoscale", get(control::autoscale))
        .route("/api/control/worker", get(control::worker_status))
        .route("/api/control/worker/tick", post(control::force_tick))
        // Internal orchestrator surface
        .route("/internal/orchestrator/health", get(control::orchestrator_health))
        .route("/internal/orchestrator/tick", post(control::orchestrator_tick))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Liveness probe.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
