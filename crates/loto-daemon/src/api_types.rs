//! Request and response types for the loto-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use loto_core::RawNumbers;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /protected
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResponse {
    pub message: String,
    /// Token subject; absent when the provider omits `sub`.
    pub user: Option<String>,
}

// ---------------------------------------------------------------------------
// /store-results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResultsRequest {
    pub numbers: Vec<i64>,
}

// ---------------------------------------------------------------------------
// /tickets
// ---------------------------------------------------------------------------

/// `numbers` accepts `"3,7,12,19,25,40"` or `[3, 7, 12, 19, 25, 40]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRequest {
    pub owner_id: String,
    pub numbers: RawNumbers,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `NO_ACTIVE_ROUND`.
    pub error: String,
    pub detail: String,
}
