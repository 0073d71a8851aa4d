//! Round/ticket lifecycle core.
//!
//! - [`numbers`]: ticket and draw validation.
//! - [`round`]: data model and transition rules.
//! - [`store`]: atomic persistence boundary.
//! - [`service`]: the operations callers invoke.
//! - [`reconcile`]: ticket vs. drawn-number comparison.

pub mod error;
pub mod numbers;
pub mod reconcile;
pub mod round;
pub mod service;
pub mod store;

pub use error::{LotoError, LotoResult, ValidationError};
pub use numbers::{DrawnNumbers, OwnerId, RawNumbers, TicketNumbers};
pub use reconcile::{DrawOutcome, MarkedNumber, TicketView};
pub use round::{
    ActiveRoundSummary, CloseDecision, CloseOutcome, OpenDecision, OpenOutcome, Round, RoundState,
    Ticket, TicketDraft, TicketStatus,
};
pub use service::{LotoService, TicketReceipt};
pub use store::LotoStore;
