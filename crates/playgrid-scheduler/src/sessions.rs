//! Session lifecycle: request, disconnect, reconnect, end, and the hydrated
//! runtime view served to clients.

use chrono::{DateTime, Utc};
use playgrid_core::{EndReason, SessionStatus, StreamHealth};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{Result, SchedulerError};
use crate::events::EventKind;
use crate::matchmaker::Placement;
use crate::metrics::RejectReason;
use crate::state::{generate_id, random_token, QueueEntry, SchedulerState, Session};

/// A session request, with caller identity already resolved upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub user_id: String,
    pub plan: playgrid_core::Plan,
    pub game_slug: String,
    #[serde(default)]
    pub preferred_region: Option<String>,
    #[serde(default)]
    pub client_latency_ms_by_region: Option<BTreeMap<String, u32>>,
}

/// Result of a session request: assigned immediately or queued.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub session: Session,
    pub queue_position: Option<usize>,
}

/// Result of a disconnect: the reconnect token is only returned once.
#[derive(Debug, Clone, Serialize)]
pub struct DisconnectOutcome {
    pub session: Session,
    pub reconnect_token: Option<String>,
    pub reconnect_expires_at: Option<DateTime<Utc>>,
}

/// A session hydrated with runtime fields for clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRuntime {
    #[serde(flatten)]
    pub session: Session,
    pub max_duration_sec: i64,
    pub remaining_sec: Option<i64>,
    pub reconnect_remaining_sec: Option<i64>,
    pub queue_position: Option<usize>,
}

/// Stream bootstrap payload for an assigned session.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapInfo {
    pub session_id: String,
    pub game_slug: String,
    pub game_title: String,
    pub status: SessionStatus,
    pub host: BootstrapHost,
    pub stream: StreamHealth,
}

/// The host half of a bootstrap payload.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapHost {
    pub id: String,
    pub name: String,
    pub region: String,
}

fn normalise_latency_map(map: Option<BTreeMap<String, u32>>) -> Option<BTreeMap<String, u32>> {
    let map: BTreeMap<String, u32> = map?
        .into_iter()
        .filter_map(|(region, latency)| {
            let region = region.trim().to_owned();
            (!region.is_empty() && latency > 0).then_some((region, latency))
        })
        .collect();
    (!map.is_empty()).then_some(map)
}

impl SchedulerState {
    /// Requests a session: entitlement check, per-user concurrency caps,
    /// then immediate assignment if a compatible host exists, else enqueue.
    pub fn request_session(
        &mut self,
        request: SessionRequest,
        require_stream_health: bool,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        let game_slug = request.game_slug.trim().to_owned();
        if game_slug.is_empty() {
            return Err(SchedulerError::Validation("game_slug is required".to_owned()));
        }
        let game = self
            .game(&game_slug)
            .ok_or_else(|| SchedulerError::GameNotFound(game_slug.clone()))?
            .clone();

        if !request.plan.can_access(game.min_plan) {
            self.metrics.record_rejection(RejectReason::PlanRestricted);
            self.record_event(
                EventKind::Rejection,
                json!({
                    "reason": "plan_restricted",
                    "user_id": request.user_id,
                    "game_slug": game.slug,
                    "selected_plan": request.plan,
                    "required_plan": game.min_plan,
                }),
                now,
            );
            return Err(SchedulerError::PlanRestricted {
                selected: request.plan,
                required: game.min_plan,
            });
        }

        let active_count = self
            .sessions
            .iter()
            .filter(|s| s.user_id == request.user_id && s.status == SessionStatus::Active)
            .count();
        if active_count >= self.policy.max_active_sessions_per_user as usize {
            let limit = self.policy.max_active_sessions_per_user;
            self.metrics.record_rejection(RejectReason::ConcurrencyLimit);
            self.record_event(
                EventKind::Rejection,
                json!({
                    "reason": "concurrency_limit",
                    "kind": "active_limit",
                    "user_id": request.user_id,
                    "limit": limit,
                }),
                now,
            );
            return Err(SchedulerError::ActiveSessionLimit { limit });
        }

        let queued_count = self
            .sessions
            .iter()
            .filter(|s| s.user_id == request.user_id && s.status == SessionStatus::Queued)
            .count();
        if queued_count >= self.policy.max_queued_sessions_per_user as usize {
            let limit = self.policy.max_queued_sessions_per_user;
            self.metrics.record_rejection(RejectReason::ConcurrencyLimit);
            self.record_event(
                EventKind::Rejection,
                json!({
                    "reason": "concurrency_limit",
                    "kind": "queue_limit",
                    "user_id": request.user_id,
                    "limit": limit,
                }),
                now,
            );
            return Err(SchedulerError::QueuedSessionLimit { limit });
        }

        let preferred_region = request
            .preferred_region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned);
        let latency = normalise_latency_map(request.client_latency_ms_by_region);

        let session = Session {
            id: generate_id("sess", now),
            user_id: request.user_id.clone(),
            game_slug: game.slug.clone(),
            game_title: game.title.clone(),
            plan: request.plan,
            preferred_region: preferred_region.clone(),
            client_latency_ms_by_region: latency.clone(),
            status: SessionStatus::Queued,
            host_id: None,
            assigned_by: None,
            requested_at: now,
            started_at: None,
            disconnected_at: None,
            reconnect_expires_at: None,
            reconnect_token: None,
            ended_at: None,
            end_reason: None,
            stream_health: None,
        };

        let placement = Placement {
            plan: request.plan,
            game_slug: game.slug.clone(),
            preferred_region,
            latency_ms_by_region: latency,
        };

        self.sessions.push(session);
        let session_index = self.sessions.len() - 1;

        if let Some(host_index) = self.find_available_host(&placement, require_stream_health) {
            self.assign_session_to_host(session_index, host_index, now);
            return Ok(RequestOutcome {
                session: self.sessions[session_index].clone(),
                queue_position: None,
            });
        }

        let session = self.sessions[session_index].clone();
        self.queue.push(QueueEntry {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            plan: session.plan,
            game_slug: session.game_slug.clone(),
            requested_at: session.requested_at,
            preferred_region: session.preferred_region.clone(),
        });
        self.metrics.record_queue_join(now);
        self.record_event(
            EventKind::QueueJoin,
            json!({
                "session_id": session.id,
                "user_id": session.user_id,
                "plan": session.plan,
                "game_slug": session.game_slug,
            }),
            now,
        );
        self.metrics.record_rejection(RejectReason::NoCapacity);
        self.record_event(
            EventKind::Rejection,
            json!({
                "reason": "no_capacity",
                "session_id": session.id,
                "user_id": session.user_id,
                "plan": session.plan,
                "game_slug": session.game_slug,
            }),
            now,
        );

        let queue_position = self.queue_position(&session.id);
        Ok(RequestOutcome {
            session,
            queue_position,
        })
    }

    /// Marks an active session disconnected, issuing a fresh reconnect
    /// token valid for the grace window. The host slot stays occupied.
    /// Disconnecting an already-disconnected session is an idempotent
    /// success that does not rotate the token.
    pub fn disconnect_session(
        &mut self,
        user_id: &str,
        session_id: &str,
        grace: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<DisconnectOutcome> {
        let session = self
            .session_for_user_mut(user_id, session_id)
            .ok_or_else(|| SchedulerError::SessionNotFound(session_id.to_owned()))?;

        match session.status {
            SessionStatus::Disconnected => {
                return Ok(DisconnectOutcome {
                    session: session.clone(),
                    reconnect_token: None,
                    reconnect_expires_at: session.reconnect_expires_at,
                });
            }
            SessionStatus::Active => {}
            status => {
                return Err(SchedulerError::InvalidSessionState {
                    id: session_id.to_owned(),
                    status,
                    expected: "active",
                });
            }
        }

        session.status = SessionStatus::Disconnected;
        session.disconnected_at = Some(now);
        session.reconnect_expires_at = Some(now + grace);
        let token = random_token(20);
        session.reconnect_token = Some(token.clone());
        let snapshot = session.clone();

        self.record_event(
            EventKind::SessionDisconnected,
            json!({
                "session_id": snapshot.id,
                "user_id": snapshot.user_id,
                "reconnect_expires_at": snapshot.reconnect_expires_at,
            }),
            now,
        );

        Ok(DisconnectOutcome {
            reconnect_expires_at: snapshot.reconnect_expires_at,
            session: snapshot,
            reconnect_token: Some(token),
        })
    }

    /// Resumes a disconnected session on its original host.
    ///
    /// Requires the matching reconnect token, an unexpired window, and the
    /// original host still online; the failing cases end the session with
    /// `reconnect_timeout` or `host_offline` respectively.
    pub fn reconnect_session(
        &mut self,
        user_id: &str,
        session_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let (token_matches, window_open, host_id) = {
            let session = self
                .session_for_user(user_id, session_id)
                .ok_or_else(|| SchedulerError::SessionNotFound(session_id.to_owned()))?;

            match session.status {
                SessionStatus::Active => return Ok(session.clone()),
                SessionStatus::Disconnected => {}
                status => {
                    return Err(SchedulerError::InvalidSessionState {
                        id: session_id.to_owned(),
                        status,
                        expected: "disconnected",
                    });
                }
            }

            (
                !token.is_empty() && session.reconnect_token.as_deref() == Some(token),
                session
                    .reconnect_expires_at
                    .is_some_and(|expires| expires > now),
                session.host_id.clone(),
            )
        };

        if !token_matches {
            return Err(SchedulerError::ReconnectTokenMismatch);
        }

        if !window_open {
            if let Some(session) = self.session_for_user_mut(user_id, session_id) {
                session.end(EndReason::ReconnectTimeout, now);
            }
            return Err(SchedulerError::ReconnectWindowExpired);
        }

        let host_online = host_id
            .as_deref()
            .and_then(|id| self.host(id))
            .is_some_and(|h| h.status.is_online());
        if !host_online {
            if let Some(session) = self.session_for_user_mut(user_id, session_id) {
                session.end(EndReason::HostOffline, now);
            }
            return Err(SchedulerError::HostUnavailable);
        }

        let snapshot = {
            // Rechecked above; the session is still disconnected.
            let Some(session) = self.session_for_user_mut(user_id, session_id) else {
                return Err(SchedulerError::SessionNotFound(session_id.to_owned()));
            };
            session.status = SessionStatus::Active;
            session.clear_reconnect_state();
            session.clone()
        };

        self.record_event(
            EventKind::SessionReconnected,
            json!({
                "session_id": snapshot.id,
                "user_id": snapshot.user_id,
                "host_id": snapshot.host_id,
            }),
            now,
        );

        Ok(snapshot)
    }

    /// Terminates a session from any non-ended state, freeing the host's
    /// derived occupancy and removing any queue entry. Ending an ended
    /// session is an idempotent success.
    pub fn end_session(&mut self, user_id: &str, session_id: &str, now: DateTime<Utc>) -> Result<Session> {
        let session = self
            .session_for_user(user_id, session_id)
            .ok_or_else(|| SchedulerError::SessionNotFound(session_id.to_owned()))?;

        if session.status == SessionStatus::Ended {
            return Ok(session.clone());
        }

        let was_queued = session.status == SessionStatus::Queued;
        let host_id = session.status.is_live().then(|| session.host_id.clone()).flatten();

        if let Some(host_id) = host_id {
            if let Some(host) = self.host_mut(&host_id) {
                host.active_sessions = host.active_sessions.saturating_sub(1);
            }
        }
        if was_queued {
            self.queue.retain(|entry| entry.session_id != session_id);
        }

        let snapshot = {
            let Some(session) = self.session_for_user_mut(user_id, session_id) else {
                return Err(SchedulerError::SessionNotFound(session_id.to_owned()));
            };
            session.end(EndReason::UserEnded, now);
            session.clone()
        };

        self.record_event(
            EventKind::SessionEnded,
            json!({
                "session_id": snapshot.id,
                "user_id": snapshot.user_id,
                "ended_by": "user",
            }),
            now,
        );

        Ok(snapshot)
    }

    /// The caller's queued/active/disconnected sessions, hydrated.
    #[must_use]
    pub fn live_sessions_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Vec<SessionRuntime> {
        self.sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.status != SessionStatus::Ended)
            .map(|s| self.runtime_view(s, now))
            .collect()
    }

    /// Hydrates one session with runtime fields.
    #[must_use]
    pub fn runtime_view(&self, session: &Session, now: DateTime<Utc>) -> SessionRuntime {
        let max_duration_sec = session.plan.max_session_duration().num_seconds();
        let remaining_sec = session
            .status
            .is_live()
            .then(|| session.remaining(now).num_seconds());
        let reconnect_remaining_sec = session
            .reconnect_expires_at
            .map(|expires| (expires - now).num_seconds().max(0));
        let queue_position = (session.status == SessionStatus::Queued)
            .then(|| self.queue_position(&session.id))
            .flatten();

        SessionRuntime {
            session: session.clone(),
            max_duration_sec,
            remaining_sec,
            reconnect_remaining_sec,
            queue_position,
        }
    }

    /// Stream bootstrap payload for an assigned session.
    pub fn bootstrap(&self, user_id: &str, session_id: &str) -> Result<BootstrapInfo> {
        let session = self
            .session_for_user(user_id, session_id)
            .ok_or_else(|| SchedulerError::SessionNotFound(session_id.to_owned()))?;

        if !session.status.is_live() {
            return Err(SchedulerError::InvalidSessionState {
                id: session_id.to_owned(),
                status: session.status,
                expected: "active or disconnected",
            });
        }

        let host = session
            .host_id
            .as_deref()
            .and_then(|id| self.host(id))
            .ok_or(SchedulerError::HostUnavailable)?;

        Ok(BootstrapInfo {
            session_id: session.id.clone(),
            game_slug: session.game_slug.clone(),
            game_title: session.game_title.clone(),
            status: session.status,
            host: BootstrapHost {
                id: host.id.clone(),
                name: host.name.clone(),
                region: host.region.clone(),
            },
            stream: host.stream_health.clone(),
        })
    }
}
