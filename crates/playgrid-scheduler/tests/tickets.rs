//! Launch ticket flows end to end: issuance requirements, signature
//! integrity, expiry, and one-time consumption.

use chrono::{Duration, Utc};
use playgrid_core::{GpuTier, HostCapabilities, Plan};
use playgrid_scheduler::{HostSpec, Scheduler, SchedulerConfig, SessionRequest};

fn scheduler_with_active_session() -> (Scheduler, chrono::DateTime<Utc>, String) {
    let now = Utc::now();
    let scheduler = Scheduler::new(SchedulerConfig::default(), now);

    scheduler
        .register_host(
            HostSpec {
                host_id: "h1".to_owned(),
                name: "Rig h1".to_owned(),
                region: Some("eu-west".to_owned()),
                capacity: Some(4),
                mode: None,
                capabilities: Some(HostCapabilities {
                    supported_games: Vec::new(),
                    gpu_tier: GpuTier::Ultimate,
                    max_fps: 144,
                }),
                slot_policy: None,
                stream_health: None,
            },
            now,
        )
        .unwrap();

    let outcome = scheduler
        .request_session(
            SessionRequest {
                user_id: "u1".to_owned(),
                plan: Plan::Free,
                game_slug: "fortnite".to_owned(),
                preferred_region: None,
                client_latency_ms_by_region: None,
            },
            now,
        )
        .unwrap();

    let session_id = outcome.session.id;
    (scheduler, now, session_id)
}

#[test]
fn issue_requires_linked_provider_account() {
    let (scheduler, now, _session) = scheduler_with_active_session();

    let err = scheduler
        .issue_ticket("u1", "fortnite", None, now)
        .unwrap_err();
    assert_eq!(err.code(), "provider_not_linked");

    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    let ticket = scheduler.issue_ticket("u1", "fortnite", None, now).unwrap();
    assert_eq!(ticket.provider.as_deref(), Some("epic"));
    assert_eq!(ticket.provider_account_id.as_deref(), Some("epic-acct-1"));
    assert!(ticket.launch_url.starts_with("https://launcher.epicgames.com"));
}

#[test]
fn issue_requires_an_active_session_for_the_game() {
    let now = Utc::now();
    let scheduler = Scheduler::new(SchedulerConfig::default(), now);
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();

    let err = scheduler
        .issue_ticket("u1", "fortnite", None, now)
        .unwrap_err();
    assert_eq!(err.code(), "no_active_session");
}

#[test]
fn verify_succeeds_with_the_issued_signature() {
    let (scheduler, now, session_id) = scheduler_with_active_session();
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    let ticket = scheduler
        .issue_ticket("u1", "fortnite", Some(&session_id), now)
        .unwrap();

    let verification = scheduler
        .verify_ticket("u1", &ticket.id, &ticket.signature, false, now)
        .unwrap();
    assert!(verification.valid);
    assert_eq!(verification.ticket_id, ticket.id);
    assert!(verification.consumed_at.is_none());
}

#[test]
fn verify_rejects_a_tampered_signature() {
    let (scheduler, now, _session) = scheduler_with_active_session();
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    let ticket = scheduler.issue_ticket("u1", "fortnite", None, now).unwrap();

    let mut forged: Vec<char> = ticket.signature.chars().collect();
    forged[0] = if forged[0] == 'a' { 'b' } else { 'a' };
    let forged: String = forged.into_iter().collect();

    let err = scheduler
        .verify_ticket("u1", &ticket.id, &forged, false, now)
        .unwrap_err();
    assert_eq!(err.code(), "invalid_signature");
}

#[test]
fn verify_rejects_the_wrong_owner() {
    let (scheduler, now, _session) = scheduler_with_active_session();
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    let ticket = scheduler.issue_ticket("u1", "fortnite", None, now).unwrap();

    let err = scheduler
        .verify_ticket("someone-else", &ticket.id, &ticket.signature, false, now)
        .unwrap_err();
    assert_eq!(err.code(), "ticket_ownership");
}

#[test]
fn verify_rejects_an_expired_ticket() {
    let (scheduler, now, _session) = scheduler_with_active_session();
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    let ticket = scheduler.issue_ticket("u1", "fortnite", None, now).unwrap();

    // Default TTL is 300 seconds.
    let too_late = now + Duration::seconds(301);
    let err = scheduler
        .verify_ticket("u1", &ticket.id, &ticket.signature, false, too_late)
        .unwrap_err();
    assert_eq!(err.code(), "ticket_expired");
}

#[test]
fn consume_is_exactly_once_and_idempotent() {
    let (scheduler, now, _session) = scheduler_with_active_session();
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    let ticket = scheduler.issue_ticket("u1", "fortnite", None, now).unwrap();

    let first = scheduler
        .verify_ticket("u1", &ticket.id, &ticket.signature, true, now)
        .unwrap();
    let consumed_at = first.consumed_at;
    assert!(consumed_at.is_some());

    // The second consume is a no-op success, not an error, and keeps the
    // original consumption timestamp.
    let later = now + Duration::seconds(30);
    let second = scheduler
        .verify_ticket("u1", &ticket.id, &ticket.signature, true, later)
        .unwrap();
    assert!(second.valid);
    assert_eq!(second.consumed_at, consumed_at);
}

#[test]
fn unknown_ticket_is_not_found() {
    let (scheduler, now, _session) = scheduler_with_active_session();
    let err = scheduler
        .verify_ticket("u1", "lt_missing", "00", false, now)
        .unwrap_err();
    assert_eq!(err.code(), "ticket_not_found");
}

#[test]
fn games_without_a_provider_issue_local_tickets() {
    let now = Utc::now();
    let scheduler = Scheduler::new(SchedulerConfig::default(), now);
    scheduler
        .register_host(
            HostSpec {
                host_id: "h1".to_owned(),
                name: "Rig h1".to_owned(),
                region: None,
                capacity: Some(4),
                mode: None,
                capabilities: Some(HostCapabilities {
                    supported_games: Vec::new(),
                    gpu_tier: GpuTier::Ultimate,
                    max_fps: 144,
                }),
                slot_policy: None,
                stream_health: None,
            },
            now,
        )
        .unwrap();
    scheduler
        .request_session(
            SessionRequest {
                user_id: "u1".to_owned(),
                plan: Plan::Performance,
                game_slug: "rocket-league".to_owned(),
                preferred_region: None,
                client_latency_ms_by_region: None,
            },
            now,
        )
        .unwrap();

    // No provider linked and none required.
    let ticket = scheduler
        .issue_ticket("u1", "rocket-league", None, now)
        .unwrap();
    assert_eq!(ticket.provider, None);
    assert_eq!(ticket.launch_url, "/play?game=rocket-league");
}

#[test]
fn unlinking_revokes_future_issuance() {
    let (scheduler, now, _session) = scheduler_with_active_session();
    scheduler
        .link_account("u1", "epic", "epic-acct-1", None, now)
        .unwrap();
    scheduler.issue_ticket("u1", "fortnite", None, now).unwrap();

    scheduler.unlink_account("u1", "epic", now).unwrap();
    let err = scheduler
        .issue_ticket("u1", "fortnite", None, now)
        .unwrap_err();
    assert_eq!(err.code(), "provider_not_linked");
}
