//! Round lifecycle and ticket registry operations.
//!
//! `LotoService` is what the HTTP layer and the CLI call. It validates raw
//! input, delegates the atomic read-decide-write to the [`LotoStore`], and
//! logs each transition. It holds no round state of its own.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{LotoError, LotoResult};
use crate::numbers::{DrawnNumbers, OwnerId, RawNumbers};
use crate::reconcile::TicketView;
use crate::round::{CloseOutcome, OpenOutcome, Round, Ticket, TicketDraft, TicketStatus};
use crate::store::LotoStore;

/// A freshly issued ticket plus the public URL its holder uses to check it.
#[derive(Debug, Clone)]
pub struct TicketReceipt {
    pub ticket: Ticket,
    pub lookup_url: String,
}

#[derive(Clone)]
pub struct LotoService {
    store: Arc<dyn LotoStore>,
    public_base_url: String,
}

impl LotoService {
    pub fn new(store: Arc<dyn LotoStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn lookup_url(&self, ticket_id: Uuid) -> String {
        format!("{}/ticket/{}", self.public_base_url, ticket_id)
    }

    // -----------------------------------------------------------------------
    // Round lifecycle
    // -----------------------------------------------------------------------

    pub async fn open_round(&self) -> LotoResult<OpenOutcome> {
        let out = self.store.open_round().await?;
        match out {
            OpenOutcome::Opened(id) => info!(round_id = %id, "round opened"),
            OpenOutcome::AlreadyOpen(id) => {
                info!(round_id = %id, "open_round: round already open, no-op")
            }
        }
        Ok(out)
    }

    pub async fn close_round(&self) -> LotoResult<CloseOutcome> {
        let out = self.store.close_round().await?;
        match out {
            CloseOutcome::Closed(id) => info!(round_id = %id, "round closed"),
            CloseOutcome::NothingOpen => info!("close_round: no open round, no-op"),
        }
        Ok(out)
    }

    pub async fn store_results(&self, raw: &[i64]) -> LotoResult<Uuid> {
        let drawn = DrawnNumbers::from_list(raw)?;
        match self.store.store_results(&drawn).await {
            Ok(id) => {
                info!(round_id = %id, drawn = ?drawn.as_slice(), "results stored");
                Ok(id)
            }
            Err(e @ LotoError::InvalidState { .. }) => {
                warn!(error = %e, "store_results refused");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Ticket registry
    // -----------------------------------------------------------------------

    /// Validate a ticket request and fix its id. Nothing is persisted, so a
    /// caller can prepare everything derived from the lookup URL first and
    /// drop the draft if that fails.
    pub fn draft_ticket(&self, owner_id: &str, raw: &RawNumbers) -> LotoResult<TicketDraft> {
        let owner_id = OwnerId::new(owner_id)?;
        let numbers = raw.validate()?;
        Ok(TicketDraft::new(owner_id, numbers))
    }

    /// Persist a draft against the open round.
    pub async fn issue_ticket(&self, draft: TicketDraft) -> LotoResult<TicketReceipt> {
        let ticket = match self.store.insert_ticket(draft).await {
            Ok(t) => t,
            Err(e @ LotoError::NoActiveRound) => {
                warn!("ticket refused: no active round");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        info!(
            ticket_id = %ticket.id,
            round_id = %ticket.round_id,
            picks = ticket.numbers.len(),
            "ticket issued"
        );
        Ok(TicketReceipt {
            lookup_url: self.lookup_url(ticket.id),
            ticket,
        })
    }

    pub async fn submit_ticket(&self, owner_id: &str, raw: &RawNumbers) -> LotoResult<TicketReceipt> {
        let draft = self.draft_ticket(owner_id, raw)?;
        self.issue_ticket(draft).await
    }

    pub async fn ticket_status(&self) -> LotoResult<TicketStatus> {
        self.store.ticket_status().await
    }

    /// Unparseable ids are reported exactly like unknown ones.
    pub async fn lookup_ticket(&self, ticket_id: &str) -> LotoResult<(Ticket, Round)> {
        let not_found = || LotoError::NotFound {
            ticket_id: ticket_id.to_string(),
        };
        let id = Uuid::parse_str(ticket_id.trim()).map_err(|_| not_found())?;
        self.store.find_ticket(id).await?.ok_or_else(not_found)
    }

    pub async fn ticket_view(&self, ticket_id: &str) -> LotoResult<TicketView> {
        let (ticket, round) = self.lookup_ticket(ticket_id).await?;
        Ok(TicketView::reconcile(&ticket, &round))
    }
}
