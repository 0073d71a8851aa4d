//! Test doubles for the loto workspace.
//!
//! - [`MemoryStore`]: a `LotoStore` whose every operation runs under one
//!   async mutex, which gives the same serialization the Postgres store gets
//!   from its advisory lock. State is re-read on every call.
//! - [`StaticVerifier`]: maps fixed bearer tokens to canned claims so HTTP
//!   tests never contact an identity provider.
//!
//! MUST NOT be used from production crates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use loto_auth::{AuthError, Claims, OneOrMany, TokenVerifier};
use loto_core::round::{decide_close, decide_open, ensure_accepting_tickets, ensure_results_storable};
use loto_core::{
    CloseDecision, CloseOutcome, DrawnNumbers, LotoError, LotoResult, LotoStore, OpenDecision,
    OpenOutcome, Round, Ticket, TicketDraft, TicketStatus,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemState {
    /// Creation order; the last element is the latest round.
    rounds: Vec<Round>,
    tickets: HashMap<Uuid, Ticket>,
}

impl MemState {
    fn active(&self) -> Option<&Round> {
        self.rounds.iter().rev().find(|r| r.is_open())
    }

    fn latest(&self) -> Option<&Round> {
        self.rounds.last()
    }

    fn count_for(&self, round_id: Uuid) -> i64 {
        self.tickets
            .values()
            .filter(|t| t.round_id == round_id)
            .count() as i64
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds with `closed = false` (invariant: 0 or 1).
    pub async fn open_round_count(&self) -> usize {
        self.state
            .lock()
            .await
            .rounds
            .iter()
            .filter(|r| r.is_open())
            .count()
    }

    pub async fn round_count(&self) -> usize {
        self.state.lock().await.rounds.len()
    }
}

#[async_trait]
impl LotoStore for MemoryStore {
    async fn open_round(&self) -> LotoResult<OpenOutcome> {
        let mut st = self.state.lock().await;
        match decide_open(st.active()) {
            OpenDecision::AlreadyOpen(id) => Ok(OpenOutcome::AlreadyOpen(id)),
            OpenDecision::Create => {
                let round = Round::new_open(Utc::now());
                let id = round.id;
                st.rounds.push(round);
                Ok(OpenOutcome::Opened(id))
            }
        }
    }

    async fn close_round(&self) -> LotoResult<CloseOutcome> {
        let mut st = self.state.lock().await;
        match decide_close(st.active()) {
            CloseDecision::NothingOpen => Ok(CloseOutcome::NothingOpen),
            CloseDecision::Close(id) => {
                let round = st
                    .rounds
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or_else(|| LotoError::Store(format!("round {id} vanished")))?;
                round.closed = true;
                Ok(CloseOutcome::Closed(id))
            }
        }
    }

    async fn store_results(&self, drawn: &DrawnNumbers) -> LotoResult<Uuid> {
        let mut st = self.state.lock().await;
        let id = ensure_results_storable(st.latest())?;
        if let Some(round) = st.rounds.last_mut() {
            round.results = Some(drawn.clone());
        }
        Ok(id)
    }

    async fn insert_ticket(&self, draft: TicketDraft) -> LotoResult<Ticket> {
        let mut st = self.state.lock().await;
        let round = ensure_accepting_tickets(st.active())?;
        let ticket = draft.bind(round, Utc::now());
        st.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn ticket_status(&self) -> LotoResult<TicketStatus> {
        let st = self.state.lock().await;
        let round = st.active().or_else(|| st.latest());
        let count = round.map(|r| st.count_for(r.id)).unwrap_or(0);
        Ok(TicketStatus::summarize(round, count))
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> LotoResult<Option<(Ticket, Round)>> {
        let st = self.state.lock().await;
        let Some(ticket) = st.tickets.get(&ticket_id) else {
            return Ok(None);
        };
        let round = st
            .rounds
            .iter()
            .find(|r| r.id == ticket.round_id)
            .ok_or_else(|| LotoError::Store(format!("ticket {ticket_id} has no round")))?;
        Ok(Some((ticket.clone(), round.clone())))
    }
}

// ---------------------------------------------------------------------------
// StaticVerifier
// ---------------------------------------------------------------------------

/// Well-known tokens accepted by [`StaticVerifier::standard`].
pub const ADMIN_TOKEN: &str = "admin-token";
pub const BETTOR_TOKEN: &str = "bettor-token";

#[derive(Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, Claims>,
    unavailable: bool,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ADMIN_TOKEN` carries `manage:rounds` + `write:results`;
    /// `BETTOR_TOKEN` is authenticated with no capabilities.
    pub fn standard() -> Self {
        Self::new()
            .with_token(
                ADMIN_TOKEN,
                claims("auth0|admin", &["manage:rounds", "write:results"]),
            )
            .with_token(BETTOR_TOKEN, claims("auth0|bettor", &[]))
    }

    pub fn with_token(mut self, token: &str, claims: Claims) -> Self {
        self.tokens.insert(token.to_string(), claims);
        self
    }

    /// Every verification fails as if the key set could not be fetched.
    pub fn unavailable() -> Self {
        Self {
            tokens: HashMap::new(),
            unavailable: true,
        }
    }
}

/// Claims for `sub` carrying `permissions`.
pub fn claims(sub: &str, permissions: &[&str]) -> Claims {
    Claims {
        sub: Some(sub.to_string()),
        aud: OneOrMany::One("https://loto-api".to_string()),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        ..Claims::default()
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if self.unavailable {
            return Err(AuthError::KeySetUnavailable("timeout".to_string()));
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown test token".to_string()))
    }
}
