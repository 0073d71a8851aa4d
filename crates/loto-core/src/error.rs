//! Error taxonomy for the round/ticket core.
//!
//! Every variant is terminal for the request that triggered it. Stores must
//! return these only after rolling back, so no error leaves a partially
//! mutated round or ticket behind.

use thiserror::Error;
use uuid::Uuid;

/// Which ticket/draw input rule was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{token}' is not a whole number")]
    NotANumber { token: String },
    #[error("you must pick {min} to {max} numbers, got {found}")]
    Count { found: usize, min: usize, max: usize },
    #[error("duplicate number {value}")]
    Duplicate { value: i64 },
    #[error("number {value} is outside {min}..={max}")]
    OutOfRange { value: i64, min: u8, max: u8 },
    #[error("owner id must be 1 to {max} characters, got {found}")]
    OwnerId { found: usize, max: usize },
    #[error("drawn numbers must not be empty")]
    EmptyDraw,
}

impl ValidationError {
    /// Stable machine-readable rule name.
    pub fn rule(&self) -> &'static str {
        match self {
            ValidationError::NotANumber { .. } => "not_a_number",
            ValidationError::Count { .. } => "count",
            ValidationError::Duplicate { .. } => "duplicate",
            ValidationError::OutOfRange { .. } => "out_of_range",
            ValidationError::OwnerId { .. } => "owner_id",
            ValidationError::EmptyDraw => "empty_draw",
        }
    }
}

#[derive(Debug, Error)]
pub enum LotoError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("no active round for betting")]
    NoActiveRound,

    #[error("invalid round state: {reason}")]
    InvalidState {
        round_id: Option<Uuid>,
        reason: &'static str,
    },

    #[error("ticket {ticket_id} not found")]
    NotFound { ticket_id: String },

    /// The store could not be reached within its bounded wait.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl LotoError {
    /// Stable machine-readable error code surfaced at the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            LotoError::Validation(_) => "VALIDATION",
            LotoError::NoActiveRound => "NO_ACTIVE_ROUND",
            LotoError::InvalidState { .. } => "INVALID_STATE",
            LotoError::NotFound { .. } => "NOT_FOUND",
            LotoError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            LotoError::Store(_) => "STORE_FAILURE",
        }
    }
}

pub type LotoResult<T> = Result<T, LotoError>;
