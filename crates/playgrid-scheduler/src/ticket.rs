//! Launch tickets: short-lived, signed capability grants binding a
//! user/session/game to an external launch action.
//!
//! Tickets are signed with HMAC-SHA256 over a canonical JSON payload and
//! verified against the stored copy, never the caller's. Signature
//! comparison is constant-time; consumption is one-time and idempotent.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Result, SchedulerError};
use crate::events::EventKind;
use crate::state::{generate_id, random_token, LinkedAccount, SchedulerState};
use playgrid_core::SessionStatus;

type HmacSha256 = Hmac<Sha256>;

/// A signed launch capability.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchTicket {
    pub id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: String,
    pub user_id: String,
    pub session_id: String,
    pub game_slug: String,
    pub provider: Option<String>,
    pub provider_account_id: Option<String>,
    pub launch_url: String,
    pub signature: String,
    pub consumed_at: Option<DateTime<Utc>>,
}

/// The canonical fields covered by the signature, in fixed order.
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    id: &'a str,
    issued_at: &'a DateTime<Utc>,
    expires_at: &'a DateTime<Utc>,
    user_id: &'a str,
    session_id: &'a str,
    game_slug: &'a str,
    provider: &'a Option<String>,
    provider_account_id: &'a Option<String>,
    launch_url: &'a str,
    nonce: &'a str,
}

/// Signs and verifies launch tickets under a server secret.
#[derive(Debug, Clone)]
pub struct TicketService {
    signing_key: Vec<u8>,
    ttl: chrono::Duration,
    retention_limit: usize,
}

impl TicketService {
    /// Creates a ticket service.
    #[must_use]
    pub fn new(signing_key: &str, ttl: chrono::Duration, retention_limit: usize) -> Self {
        Self {
            signing_key: signing_key.as_bytes().to_vec(),
            ttl,
            retention_limit: retention_limit.max(1),
        }
    }

    /// Ticket time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    fn signature_for(&self, ticket: &LaunchTicket) -> Result<String> {
        let payload = serde_json::to_vec(&CanonicalPayload {
            id: &ticket.id,
            issued_at: &ticket.issued_at,
            expires_at: &ticket.expires_at,
            user_id: &ticket.user_id,
            session_id: &ticket.session_id,
            game_slug: &ticket.game_slug,
            provider: &ticket.provider,
            provider_account_id: &ticket.provider_account_id,
            launch_url: &ticket.launch_url,
            nonce: &ticket.nonce,
        })
        .map_err(|e| SchedulerError::internal(format!("ticket serialisation: {e}")))?;

        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| SchedulerError::internal(format!("ticket signing key: {e}")))?;
        mac.update(&payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Builds and signs a ticket.
    pub fn issue(
        &self,
        user_id: &str,
        session_id: &str,
        game_slug: &str,
        provider: Option<String>,
        provider_account_id: Option<String>,
        launch_url: String,
        now: DateTime<Utc>,
    ) -> Result<LaunchTicket> {
        let mut ticket = LaunchTicket {
            id: generate_id("lt", now),
            issued_at: now,
            expires_at: now + self.ttl,
            nonce: random_token(16),
            user_id: user_id.to_owned(),
            session_id: session_id.to_owned(),
            game_slug: game_slug.to_owned(),
            provider,
            provider_account_id,
            launch_url,
            signature: String::new(),
            consumed_at: None,
        };
        ticket.signature = self.signature_for(&ticket)?;
        Ok(ticket)
    }

    /// Constant-time check of a presented signature against the one
    /// recomputed from the stored ticket fields.
    pub fn verify_signature(&self, ticket: &LaunchTicket, presented: &str) -> Result<bool> {
        let expected = self.signature_for(ticket)?;

        let Ok(expected_bytes) = hex::decode(&expected) else {
            return Ok(false);
        };
        let Ok(presented_bytes) = hex::decode(presented) else {
            return Ok(false);
        };
        if expected_bytes.len() != presented_bytes.len() {
            return Ok(false);
        }
        Ok(expected_bytes.ct_eq(&presented_bytes).into())
    }
}

/// Successful verification response.
#[derive(Debug, Clone, Serialize)]
pub struct TicketVerification {
    pub valid: bool,
    pub ticket_id: String,
    pub expires_at: DateTime<Utc>,
    pub launch_url: String,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl SchedulerState {
    /// Issues a launch ticket for the caller's active session on a game.
    ///
    /// Games with an external provider require a linked account; the ticket
    /// then points at the provider's launcher, otherwise at the built-in
    /// player page.
    pub fn issue_ticket(
        &mut self,
        service: &TicketService,
        user_id: &str,
        game_slug: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<LaunchTicket> {
        let game = self
            .game(game_slug)
            .ok_or_else(|| SchedulerError::GameNotFound(game_slug.to_owned()))?
            .clone();

        let provider = game.provider.clone();
        let account = provider.as_deref().and_then(|p| {
            self.linked_accounts
                .get(user_id)
                .and_then(|accounts| accounts.get(p))
                .cloned()
        });

        if let Some(provider_id) = provider.as_deref() {
            if account.is_none() {
                self.record_event(
                    EventKind::TicketRejected,
                    json!({
                        "user_id": user_id,
                        "game_slug": game.slug,
                        "reason": "provider_not_linked",
                        "provider": provider_id,
                    }),
                    now,
                );
                return Err(SchedulerError::ProviderNotLinked(provider_id.to_owned()));
            }
        }

        let session = self
            .sessions
            .iter()
            .find(|s| {
                s.user_id == user_id
                    && s.status == SessionStatus::Active
                    && s.game_slug == game.slug
                    && session_id.is_none_or(|id| s.id == id)
            })
            .ok_or_else(|| SchedulerError::NoActiveSession(game.slug.clone()))?;

        let launch_url = match provider.as_deref().and_then(|p| self.provider(p)) {
            Some(p) => format!("{}?ticket={}", p.launch_url_template, session.id),
            None => format!("/play?game={}", game.slug),
        };

        let ticket = service.issue(
            user_id,
            &session.id,
            &game.slug,
            provider,
            account.map(|a| a.account_id),
            launch_url,
            now,
        )?;

        self.tickets.push(ticket.clone());
        let overflow = self.tickets.len().saturating_sub(service.retention_limit);
        if overflow > 0 {
            self.tickets.drain(..overflow);
        }

        self.record_event(
            EventKind::TicketIssued,
            json!({
                "user_id": user_id,
                "session_id": ticket.session_id,
                "game_slug": ticket.game_slug,
                "provider": ticket.provider,
            }),
            now,
        );

        Ok(ticket)
    }

    /// Verifies a ticket by id against its stored copy, optionally
    /// consuming it. A second consume is a no-op, not an error.
    pub fn verify_ticket(
        &mut self,
        service: &TicketService,
        user_id: &str,
        ticket_id: &str,
        signature: &str,
        consume: bool,
        now: DateTime<Utc>,
    ) -> Result<TicketVerification> {
        let index = self
            .tickets
            .iter()
            .position(|t| t.id == ticket_id)
            .ok_or_else(|| SchedulerError::TicketNotFound(ticket_id.to_owned()))?;

        if self.tickets[index].user_id != user_id {
            return Err(SchedulerError::TicketOwnershipMismatch);
        }

        if !service.verify_signature(&self.tickets[index], signature)? {
            return Err(SchedulerError::TicketSignatureMismatch);
        }

        if self.tickets[index].expires_at <= now {
            return Err(SchedulerError::TicketExpired);
        }

        if consume && self.tickets[index].consumed_at.is_none() {
            self.tickets[index].consumed_at = Some(now);
        }

        let ticket = &self.tickets[index];
        Ok(TicketVerification {
            valid: true,
            ticket_id: ticket.id.clone(),
            expires_at: ticket.expires_at,
            launch_url: ticket.launch_url.clone(),
            consumed_at: ticket.consumed_at,
        })
    }

    /// Links an external provider account for a user.
    pub fn link_account(
        &mut self,
        user_id: &str,
        provider_id: &str,
        account_id: &str,
        display_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LinkedAccount> {
        if self.provider(provider_id).is_none() {
            return Err(SchedulerError::UnknownProvider(provider_id.to_owned()));
        }
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return Err(SchedulerError::Validation("account_id is required".to_owned()));
        }

        let account = LinkedAccount {
            provider: provider_id.to_owned(),
            account_id: account_id.to_owned(),
            display_name: display_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned),
            linked_at: now,
        };
        self.linked_accounts
            .entry(user_id.to_owned())
            .or_default()
            .insert(provider_id.to_owned(), account.clone());

        self.record_event(
            EventKind::IntegrationLinked,
            json!({ "user_id": user_id, "provider": provider_id }),
            now,
        );
        Ok(account)
    }

    /// Removes a linked provider account.
    pub fn unlink_account(&mut self, user_id: &str, provider_id: &str, now: DateTime<Utc>) -> Result<()> {
        if self.provider(provider_id).is_none() {
            return Err(SchedulerError::UnknownProvider(provider_id.to_owned()));
        }
        if let Some(accounts) = self.linked_accounts.get_mut(user_id) {
            accounts.remove(provider_id);
        }

        self.record_event(
            EventKind::IntegrationUnlinked,
            json!({ "user_id": user_id, "provider": provider_id }),
            now,
        );
        Ok(())
    }

    /// The caller's linked accounts by provider.
    #[must_use]
    pub fn accounts_for_user(&self, user_id: &str) -> Vec<LinkedAccount> {
        self.linked_accounts
            .get(user_id)
            .map(|accounts| accounts.values().cloned().collect())
            .unwrap_or_default()
    }
}
