//! Request authentication.
//!
//! User authentication itself is an external collaborator: the upstream
//! proxy resolves the caller and forwards `x-user-id` / `x-user-plan`
//! headers. Host agents and the orchestrator authenticate with shared
//! keys.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use playgrid_core::Plan;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::ApiError;

/// The resolved caller identity.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub plan: Plan,
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or(ApiError::Unauthorized)?;

        let plan = parts
            .headers
            .get("x-user-plan")
            .and_then(|value| value.to_str().ok())
            .and_then(Plan::parse)
            .unwrap_or_default();

        Ok(Self { user_id, plan })
    }
}

/// Marker extractor proving the request carried the host credential.
#[derive(Debug, Clone, Copy)]
pub struct HostAuth;

impl FromRequestParts<Arc<AppState>> for HostAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get("x-host-key")
            .and_then(|value| value.to_str().ok());
        if presented == Some(state.auth.host_key.as_str()) {
            Ok(Self)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Marker extractor proving the request carried the orchestrator credential.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorAuth;

impl FromRequestParts<Arc<AppState>> for OrchestratorAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get("x-orchestrator-key")
            .and_then(|value| value.to_str().ok());
        if presented == Some(state.auth.orchestrator_key.as_str()) {
            Ok(Self)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Refuses session-facing requests when the external orchestrator's ticks
/// have gone stale. A no-op while the embedded tick driver runs.
pub fn ensure_scheduler_available(state: &AppState, now: DateTime<Utc>) -> Result<(), ApiError> {
    if state.worker.embedded {
        return Ok(());
    }

    let grace = state.scheduler.config().scheduler_grace;
    let grace_chrono =
        chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::seconds(15));
    let last_tick_at = state.worker.orchestrator.lock().last_tick_at;

    let fresh = last_tick_at.is_some_and(|at| now - at <= grace_chrono);
    if fresh {
        Ok(())
    } else {
        Err(ApiError::SchedulerUnavailable {
            last_tick_at,
            grace_secs: grace.as_secs(),
        })
    }
}
