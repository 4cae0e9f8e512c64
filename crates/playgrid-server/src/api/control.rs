//! Control surface: policy, metrics, events, autoscale, and the tick
//! driver endpoints.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use playgrid_core::Game;
use playgrid_scheduler::{
    CapacityReport, ControlSnapshot, MatchmakerStatus, PolicyUpdate, SchedulerEvent,
    SchedulerMetrics, SchedulerPolicy, TickOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::auth::{Identity, OrchestratorAuth};
use crate::error::ApiError;

/// Query parameters for `GET /api/control/scheduler/events`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Worker/orchestrator status response.
#[derive(Debug, Serialize)]
pub struct WorkerResponse {
    pub status: MatchmakerStatus,
    pub tick_interval_secs: u64,
    pub orchestrator: OrchestratorInfo,
}

/// Orchestrator half of the worker status.
#[derive(Debug, Serialize)]
pub struct OrchestratorInfo {
    pub embedded: bool,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub grace_secs: u64,
}

/// Response of a forced tick.
#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub status: MatchmakerStatus,
    pub outcome: TickOutcome,
}

fn orchestrator_info(state: &AppState) -> OrchestratorInfo {
    OrchestratorInfo {
        embedded: state.worker.embedded,
        last_tick_at: state.worker.orchestrator.lock().last_tick_at,
        grace_secs: state.scheduler.config().scheduler_grace.as_secs(),
    }
}

pub async fn scheduler_snapshot(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Json<ControlSnapshot> {
    Json(state.scheduler.control_snapshot())
}

pub async fn update_policy(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Json(update): Json<PolicyUpdate>,
) -> Json<SchedulerPolicy> {
    Json(state.scheduler.update_policy(update, Utc::now()))
}

pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<SchedulerEvent>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Json(state.scheduler.events(limit))
}

pub async fn reset_metrics(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Json<SchedulerMetrics> {
    Json(state.scheduler.reset_metrics(Utc::now()))
}

pub async fn autoscale(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Json<CapacityReport> {
    Json(state.scheduler.capacity_report())
}

pub async fn worker_status(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Json<WorkerResponse> {
    Json(WorkerResponse {
        status: state.scheduler.status(),
        tick_interval_secs: state.scheduler.config().tick_interval.as_secs(),
        orchestrator: orchestrator_info(&state),
    })
}

pub async fn force_tick(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Json<TickResponse> {
    let outcome = state.scheduler.tick_at(Utc::now());
    Json(TickResponse {
        status: state.scheduler.status(),
        outcome,
    })
}

pub async fn orchestrator_health(
    State(state): State<Arc<AppState>>,
    _auth: OrchestratorAuth,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "embedded": state.worker.embedded,
    }))
}

pub async fn orchestrator_tick(
    State(state): State<Arc<AppState>>,
    _auth: OrchestratorAuth,
) -> Json<TickResponse> {
    let now = Utc::now();
    let outcome = state.scheduler.tick_at(now);
    {
        let mut orchestrator = state.worker.orchestrator.lock();
        orchestrator.last_tick_at = Some(now);
        orchestrator.last_outcome = Some(outcome);
    }
    Json(TickResponse {
        status: state.scheduler.status(),
        outcome,
    })
}

pub async fn list_games(State(state): State<Arc<AppState>>) -> Json<Vec<Game>> {
    Json(state.scheduler.games())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::config::AuthConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use playgrid_scheduler::{Scheduler, SchedulerConfig};
    use tower::ServiceExt;

    fn make_state(embedded: bool) -> Arc<AppState> {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), Utc::now()));
        Arc::new(AppState::new(scheduler, AuthConfig::default(), embedded))
    }

    #[tokio::test]
    async fn games_are_public() {
        let app = router(make_state(true));
        let response = app
            .oneshot(Request::builder().uri("/api/games").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn control_surface_requires_identity() {
        let app = router(make_state(true));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/control/scheduler")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forced_tick_reports_outcome() {
        let app = router(make_state(true));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/control/worker/tick")
                    .header("x-user-id", "admin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn orchestrator_tick_requires_key() {
        let app = router(make_state(false));
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/internal/orchestrator/tick")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/internal/orchestrator/tick")
                    .header("x-orchestrator-key", "playgrid-orchestrator-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn orchestrator_tick_restores_availability() {
        let state = make_state(false);
        let app = router(state.clone());

        // Stale orchestrator: session reads refuse service.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/sessions/me")
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // One orchestrator tick makes the scheduler fresh again.
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/internal/orchestrator/tick")
                    .header("x-orchestrator-key", "playgrid-orchestrator-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/sessions/me")
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
