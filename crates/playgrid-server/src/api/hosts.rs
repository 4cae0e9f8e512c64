//! Host-agent and fleet endpoints. All mutations require the host
//! credential and trigger an immediate promotion pass.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use playgrid_core::{HostCapabilities, HostMode, SlotPolicy, StreamHealth};
use playgrid_scheduler::{FleetSummary, Host, HostSpec};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::auth::{ensure_scheduler_available, HostAuth, Identity};
use crate::error::ApiError;

/// Request body for `POST /api/hosts/{id}/heartbeat`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HeartbeatBody {
    pub stream_health: Option<StreamHealth>,
}

/// Request body for `PUT /api/hosts/{id}/mode`.
#[derive(Debug, Deserialize)]
pub struct ModeBody {
    pub mode: HostMode,
}

/// Request body for `PUT /api/hosts/{id}/capacity`.
#[derive(Debug, Deserialize)]
pub struct CapacityBody {
    pub capacity: u32,
}

pub async fn register_host(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Json(spec): Json<HostSpec>,
) -> Result<Json<Host>, ApiError> {
    let host = state.scheduler.register_host(spec, Utc::now())?;
    Ok(Json(host))
}

pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
    Json(body): Json<HeartbeatBody>,
) -> Result<Json<Host>, ApiError> {
    let host = state
        .scheduler
        .heartbeat_host(&host_id, body.stream_health, Utc::now())?;
    Ok(Json(host))
}

pub async fn set_offline(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
) -> Result<Json<Host>, ApiError> {
    let host = state.scheduler.set_host_offline(&host_id, Utc::now())?;
    Ok(Json(host))
}

pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
    Json(body): Json<ModeBody>,
) -> Result<Json<Host>, ApiError> {
    let host = state
        .scheduler
        .set_host_mode(&host_id, body.mode, Utc::now())?;
    Ok(Json(host))
}

pub async fn set_capabilities(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
    Json(capabilities): Json<HostCapabilities>,
) -> Result<Json<Host>, ApiError> {
    let host = state
        .scheduler
        .set_host_capabilities(&host_id, capabilities, Utc::now())?;
    Ok(Json(host))
}

pub async fn set_slot_policy(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
    Json(slot_policy): Json<SlotPolicy>,
) -> Result<Json<Host>, ApiError> {
    let host = state
        .scheduler
        .set_host_slot_policy(&host_id, slot_policy, Utc::now())?;
    Ok(Json(host))
}

pub async fn set_capacity(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
    Json(body): Json<CapacityBody>,
) -> Result<Json<Host>, ApiError> {
    let host = state
        .scheduler
        .set_host_capacity(&host_id, body.capacity, Utc::now())?;
    Ok(Json(host))
}

pub async fn set_stream_health(
    State(state): State<Arc<AppState>>,
    _auth: HostAuth,
    Path(host_id): Path<String>,
    Json(health): Json<StreamHealth>,
) -> Result<Json<Host>, ApiError> {
    let host = state
        .scheduler
        .set_host_stream_health(&host_id, health, Utc::now())?;
    Ok(Json(host))
}

pub async fn list_hosts(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<Vec<Host>>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;
    Ok(Json(state.scheduler.hosts(now)))
}

pub async fn fleet_summary(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
) -> Result<Json<FleetSummary>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;
    Ok(Json(state.scheduler.fleet_summary(now)))
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

    fn make_state() -> Arc<AppState> {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), Utc::now()));
        Arc::new(AppState::new(scheduler, AuthConfig::default(), true))
    }

    fn host_request(uri: &str, method: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-host-key", "playgrid-host-key")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_requires_host_key() {
        let app = router(make_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/hosts/register")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"host_id": "h1", "name": "Rig"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_and_heartbeat() {
        let app = router(make_state());
        let response = app
            .clone()
            .oneshot(host_request(
                "/api/hosts/register",
                "POST",
                serde_json::json!({ "host_id": "h1", "name": "Rig h1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(host_request(
                "/api/hosts/h1/heartbeat",
                "POST",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn heartbeat_of_unknown_host_is_not_found() {
        let app = router(make_state());
        let response = app
            .oneshot(host_request(
                "/api/hosts/ghost/heartbeat",
                "POST",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fleet_summary_requires_identity() {
        let app = router(make_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/fleet/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
