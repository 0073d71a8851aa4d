//! Round/ticket data model and lifecycle rules.
//!
//! # State diagram
//!
//! ```text
//!   open_round()        close_round()          store_results(drawn)
//!   ──────────►  Open ───────────────► Closed ─────────────────────► Resulted (term.)
//! ```
//!
//! System-wide rule: at most one round is `Open`. The rules below are pure
//! decisions over rows a store has just read **inside its transaction**; the
//! store applies the decision before committing. Nothing here caches "the
//! active round" between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LotoError, LotoResult};
use crate::numbers::{DrawnNumbers, OwnerId, TicketNumbers};

// ---------------------------------------------------------------------------
// RoundState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// Accepting tickets. At most one system-wide.
    Open,
    /// Betting over; awaiting results.
    Closed,
    /// Drawn numbers attached. **Terminal.**
    Resulted,
}

// ---------------------------------------------------------------------------
// Round / Ticket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub closed: bool,
    pub results: Option<DrawnNumbers>,
}

impl Round {
    /// A fresh round: open, no results.
    pub fn new_open(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            closed: false,
            results: None,
        }
    }

    pub fn state(&self) -> RoundState {
        match (self.closed, &self.results) {
            (false, _) => RoundState::Open,
            (true, None) => RoundState::Closed,
            (true, Some(_)) => RoundState::Resulted,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Random v4 UUID; doubles as the public lookup key.
    pub id: Uuid,
    pub round_id: Uuid,
    pub owner_id: OwnerId,
    pub numbers: TicketNumbers,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(
        round: &Round,
        owner_id: OwnerId,
        numbers: TicketNumbers,
        created_at: DateTime<Utc>,
    ) -> Self {
        TicketDraft::new(owner_id, numbers).bind(round, created_at)
    }
}

/// A validated ticket whose id is fixed before any round is chosen, so the
/// lookup URL exists before the row does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub numbers: TicketNumbers,
}

impl TicketDraft {
    pub fn new(owner_id: OwnerId, numbers: TicketNumbers) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            numbers,
        }
    }

    /// Attach the draft to the round that was open when it was persisted.
    pub fn bind(self, round: &Round, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: self.id,
            round_id: round.id,
            owner_id: self.owner_id,
            numbers: self.numbers,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Transition decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDecision {
    /// An open round already exists; opening again is a no-op.
    AlreadyOpen(Uuid),
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// No open round; closing is a no-op.
    NothingOpen,
    Close(Uuid),
}

/// What `open_round` reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(Uuid),
    AlreadyOpen(Uuid),
}

impl OpenOutcome {
    pub fn round_id(&self) -> Uuid {
        match self {
            OpenOutcome::Opened(id) | OpenOutcome::AlreadyOpen(id) => *id,
        }
    }
}

/// What `close_round` reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed(Uuid),
    NothingOpen,
}

/// `active` is the newest round with `closed = false`, if any.
pub fn decide_open(active: Option<&Round>) -> OpenDecision {
    match active {
        Some(r) => OpenDecision::AlreadyOpen(r.id),
        None => OpenDecision::Create,
    }
}

pub fn decide_close(active: Option<&Round>) -> CloseDecision {
    match active {
        Some(r) => CloseDecision::Close(r.id),
        None => CloseDecision::NothingOpen,
    }
}

/// Results attach only to the most recently created round overall, and only
/// when it is closed and still result-less.
pub fn ensure_results_storable(latest: Option<&Round>) -> LotoResult<Uuid> {
    let Some(round) = latest else {
        return Err(LotoError::InvalidState {
            round_id: None,
            reason: "no round exists",
        });
    };
    match round.state() {
        RoundState::Closed => Ok(round.id),
        RoundState::Open => Err(LotoError::InvalidState {
            round_id: Some(round.id),
            reason: "latest round is still open",
        }),
        RoundState::Resulted => Err(LotoError::InvalidState {
            round_id: Some(round.id),
            reason: "latest round already has results",
        }),
    }
}

/// Tickets bind only to the open round.
pub fn ensure_accepting_tickets(active: Option<&Round>) -> LotoResult<&Round> {
    match active {
        Some(r) if r.is_open() => Ok(r),
        _ => Err(LotoError::NoActiveRound),
    }
}

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRoundSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub closed: bool,
}

/// Read-only summary behind `GET /ticket-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatus {
    pub active_round: Option<ActiveRoundSummary>,
    pub ticket_count: i64,
    pub results: Option<DrawnNumbers>,
}

impl TicketStatus {
    /// No round has ever existed.
    pub fn empty() -> Self {
        Self {
            active_round: None,
            ticket_count: 0,
            results: None,
        }
    }

    /// `round` is the open round when one exists, otherwise the latest round.
    /// `ticket_count` counts tickets bound to that same round.
    pub fn summarize(round: Option<&Round>, ticket_count: i64) -> Self {
        match round {
            None => Self::empty(),
            Some(r) if r.is_open() => Self {
                active_round: Some(ActiveRoundSummary {
                    id: r.id,
                    started_at: r.started_at,
                    closed: r.closed,
                }),
                ticket_count,
                results: None,
            },
            Some(r) => Self {
                active_round: None,
                ticket_count,
                results: r.results.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
