//! Persistence boundary for rounds and tickets.
//!
//! # Contract
//! Every method is **one atomic unit of work** against the backing store:
//! - Read the rows the decision depends on, decide with the rules in
//!   [`crate::round`], apply, commit. On any error, nothing is applied.
//! - `open_round`, `close_round` and `store_results` are serialized against
//!   each other system-wide (Postgres: transaction-scoped advisory lock), so
//!   two concurrent callers can never both observe "no open round" or both
//!   pass the "closed and result-less" precondition.
//! - `insert_ticket` must hold the open round against a concurrent close
//!   until the ticket row is committed.
//! - Every wait on the store is bounded; exceeding it yields
//!   [`LotoError::Unavailable`](crate::LotoError::Unavailable).
//!
//! Implementations: `loto_db::PgStore` (production) and
//! `loto_testkit::MemoryStore` (tests).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LotoResult;
use crate::numbers::DrawnNumbers;
use crate::round::{CloseOutcome, OpenOutcome, Round, Ticket, TicketDraft, TicketStatus};

#[async_trait]
pub trait LotoStore: Send + Sync {
    /// Create an open round unless one exists (then no-op).
    async fn open_round(&self) -> LotoResult<OpenOutcome>;

    /// Close the open round, if any. Irreversible.
    async fn close_round(&self) -> LotoResult<CloseOutcome>;

    /// Attach `drawn` to the latest round; returns that round's id.
    async fn store_results(&self, drawn: &DrawnNumbers) -> LotoResult<Uuid>;

    /// Persist `draft` bound to the open round, keeping the draft's id.
    async fn insert_ticket(&self, draft: TicketDraft) -> LotoResult<Ticket>;

    async fn ticket_status(&self) -> LotoResult<TicketStatus>;

    /// Ticket plus its owning round, or `None` for an unknown id.
    async fn find_ticket(&self, ticket_id: Uuid) -> LotoResult<Option<(Ticket, Round)>>;
}
