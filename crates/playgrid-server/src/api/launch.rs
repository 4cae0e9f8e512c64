//! Launch ticket and provider account endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use playgrid_scheduler::{LaunchTicket, LinkedAccount, TicketVerification};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::auth::Identity;
use crate::error::ApiError;

/// Request body for `POST /api/launch/ticket`.
#[derive(Debug, Deserialize)]
pub struct IssueTicketBody {
    pub game_slug: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request body for `POST /api/launch/ticket/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyTicketBody {
    pub ticket_id: String,
    pub signature: String,
    #[serde(default)]
    pub consume: bool,
}

/// Request body for `POST /api/integrations/{provider}/link`.
#[derive(Debug, Deserialize)]
pub struct LinkAccountBody {
    pub account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub async fn issue_ticket(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(body): Json<IssueTicketBody>,
) -> Result<Json<LaunchTicket>, ApiError> {
    let ticket = state.scheduler.issue_ticket(
        &identity.user_id,
        &body.game_slug,
        body.session_id.as_deref(),
        Utc::now(),
    )?;
    Ok(Json(ticket))
}

pub async fn verify_ticket(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(body): Json<VerifyTicketBody>,
) -> Result<Json<TicketVerification>, ApiError> {
    let verification = state.scheduler.verify_ticket(
        &identity.user_id,
        &body.ticket_id,
        &body.signature,
        body.consume,
        Utc::now(),
    )?;
    Ok(Json(verification))
}

pub async fn link_account(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(provider): Path<String>,
    Json(body): Json<LinkAccountBody>,
) -> Result<Json<LinkedAccount>, ApiError> {
    let account = state.scheduler.link_account(
        &identity.user_id,
        &provider,
        &body.account_id,
        body.display_name,
        Utc::now(),
    )?;
    Ok(Json(account))
}

pub async fn unlink_account(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(provider): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .scheduler
        .unlink_account(&identity.user_id, &provider, Utc::now())?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn linked_accounts(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<LinkedAccount>>, ApiError> {
    Ok(Json(state.scheduler.accounts_for_user(&identity.user_id)))
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
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn ticket_without_session_is_not_found() {
        let state = make_state();
        state
            .scheduler
            .link_account("u1", "epic", "acct", None, Utc::now())
            .unwrap();
        let app = router(state);

        let response = app
            .oneshot(user_request(
                "/api/launch/ticket",
                "POST",
                serde_json::json!({ "game_slug": "fortnite" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ticket_without_linked_provider_is_forbidden() {
        let app = router(make_state());
        let response = app
            .oneshot(user_request(
                "/api/launch/ticket",
                "POST",
                serde_json::json!({ "game_slug": "fortnite" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn link_unknown_provider_is_bad_request() {
        let app = router(make_state());
        let response = app
            .oneshot(user_request(
                "/api/integrations/steam/link",
                "POST",
                serde_json::json!({ "account_id": "acct" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_unknown_ticket_is_not_found() {
        let app = router(make_state());
        let response = app
            .oneshot(user_request(
                "/api/launch/ticket/verify",
                "POST",
                serde_json::json!({ "ticket_id": "lt_missing", "signature": "00" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
