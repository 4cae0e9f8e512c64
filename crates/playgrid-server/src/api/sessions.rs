//! Session lifecycle endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use playgrid_scheduler::{
    BootstrapInfo, DisconnectOutcome, RequestOutcome, Session, SessionRequest, SessionRuntime,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::AppState;
use crate::auth::{ensure_scheduler_available, Identity};
use crate::error::ApiError;

/// Request body for `POST /api/sessions/request`.
#[derive(Debug, Deserialize)]
pub struct RequestSessionBody {
    pub game_slug: String,
    #[serde(default)]
    pub preferred_region: Option<String>,
    #[serde(default)]
    pub client_latency_ms_by_region: Option<BTreeMap<String, u32>>,
}

/// Request body for `POST /api/sessions/{id}/reconnect`.
#[derive(Debug, Deserialize)]
pub struct ReconnectBody {
    #[serde(default)]
    pub reconnect_token: String,
}

pub async fn request_session(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(body): Json<RequestSessionBody>,
) -> Result<Json<RequestOutcome>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;

    let outcome = state.scheduler.request_session(
        SessionRequest {
            user_id: identity.user_id,
            plan: identity.plan,
            game_slug: body.game_slug,
            preferred_region: body.preferred_region,
            client_latency_ms_by_region: body.client_latency_ms_by_region,
        },
        now,
    )?;
    Ok(Json(outcome))
}

pub async fn my_sessions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<SessionRuntime>>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;
    Ok(Json(state.scheduler.my_sessions(&identity.user_id, now)))
}

pub async fn disconnect_session(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<String>,
) -> Result<Json<DisconnectOutcome>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;
    let outcome = state
        .scheduler
        .disconnect_session(&identity.user_id, &session_id, now)?;
    Ok(Json(outcome))
}

pub async fn reconnect_session(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<String>,
    Json(body): Json<ReconnectBody>,
) -> Result<Json<Session>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;
    let session = state.scheduler.reconnect_session(
        &identity.user_id,
        &session_id,
        &body.reconnect_token,
        now,
    )?;
    Ok(Json(session))
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let now = Utc::now();
    let session = state
        .scheduler
        .end_session(&identity.user_id, &session_id, now)?;
    Ok(Json(session))
}

pub async fn bootstrap(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<String>,
) -> Result<Json<BootstrapInfo>, ApiError> {
    let now = Utc::now();
    ensure_scheduler_available(&state, now)?;
    let info = state.scheduler.bootstrap(&identity.user_id, &session_id)?;
    Ok(Json(info))
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

    fn user_request(uri: &str, method: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", "u1")
            .header("x-user-plan", "free")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn request_without_identity_is_unauthorized() {
        let app = router(make_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions/request")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"game_slug": "fortnite"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_queues_when_fleet_is_empty() {
        let app = router(make_state());
        let response = app
            .oneshot(user_request(
                "/api/sessions/request",
                "POST",
                serde_json::json!({ "game_slug": "fortnite" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn plan_restriction_is_forbidden() {
        let app = router(make_state());
        let response = app
            .oneshot(user_request(
                "/api/sessions/request",
                "POST",
                serde_json::json!({ "game_slug": "rocket-league" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn my_sessions_lists_for_caller() {
        let state = make_state();
        let app = router(state.clone());
        app.clone()
            .oneshot(user_request(
                "/api/sessions/request",
                "POST",
                serde_json::json!({ "game_slug": "fortnite" }),
            ))
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

    #[tokio::test]
    async fn disconnect_of_queued_session_conflicts() {
        let state = make_state();
        let now = Utc::now();
        let outcome = state
            .scheduler
            .request_session(
                SessionRequest {
                    user_id: "u1".to_owned(),
                    plan: playgrid_core::Plan::Free,
                    game_slug: "fortnite".to_owned(),
                    preferred_region: None,
                    client_latency_ms_by_region: None,
                },
                now,
            )
            .unwrap();

        let app = router(state);
        let response = app
            .oneshot(user_request(
                &format!("/api/sessions/{}/disconnect", outcome.session.id),
                "POST",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn stale_external_orchestrator_means_unavailable() {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), Utc::now()));
        let state = Arc::new(AppState::new(scheduler, AuthConfig::default(), false));
        let app = router(state);

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
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
