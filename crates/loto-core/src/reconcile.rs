//! Reconciliation of a ticket against its round's drawn numbers.
//!
//! Pure computation over already-validated sets; no store access.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::round::{Round, Ticket};

/// One ticket number, flagged when it was also drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedNumber {
    pub value: u8,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrawOutcome {
    /// The round has no drawn numbers yet.
    Pending,
    Drawn {
        /// Sorted ascending.
        drawn: Vec<u8>,
        /// `ticket ∩ drawn`, sorted ascending.
        matches: Vec<u8>,
        match_count: usize,
    },
}

/// Everything the ticket page needs, independent of how it is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    pub ticket_id: Uuid,
    pub round_id: Uuid,
    pub owner_id: String,
    /// Ticket numbers sorted ascending.
    pub numbers: Vec<MarkedNumber>,
    pub outcome: DrawOutcome,
}

impl TicketView {
    pub fn reconcile(ticket: &Ticket, round: &Round) -> Self {
        let outcome = match &round.results {
            None => DrawOutcome::Pending,
            Some(drawn) => {
                let matches: Vec<u8> = ticket
                    .numbers
                    .as_slice()
                    .iter()
                    .copied()
                    .filter(|n| drawn.contains(*n))
                    .collect();
                DrawOutcome::Drawn {
                    drawn: drawn.as_slice().to_vec(),
                    match_count: matches.len(),
                    matches,
                }
            }
        };

        let numbers = ticket
            .numbers
            .as_slice()
            .iter()
            .map(|&value| MarkedNumber {
                value,
                matched: match &outcome {
                    DrawOutcome::Drawn { matches, .. } => matches.binary_search(&value).is_ok(),
                    DrawOutcome::Pending => false,
                },
            })
            .collect();

        Self {
            ticket_id: ticket.id,
            round_id: round.id,
            owner_id: ticket.owner_id.as_str().to_string(),
            numbers,
            outcome,
        }
    }

    /// `None` while the draw is pending.
    pub fn match_count(&self) -> Option<usize> {
        match &self.outcome {
            DrawOutcome::Pending => None,
            DrawOutcome::Drawn { match_count, .. } => Some(*match_count),
        }
    }
}
