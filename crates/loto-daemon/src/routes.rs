//! Axum router and all HTTP handlers for loto-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: authenticate, decode, call
//! `LotoService`, encode. Every failure leaves through [`ApiError`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use loto_auth::{bearer_token, Capability, Claims};
use loto_core::TicketStatus;
use tracing::{info, warn};

use crate::{
    api_types::{HealthResponse, ProtectedResponse, StoreResultsRequest, TicketRequest},
    error::ApiError,
    state::AppState,
};

/// Response header carrying the id of a freshly issued ticket.
pub const TICKET_ID_HEADER: HeaderName = HeaderName::from_static("x-ticket-id");

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/protected", get(protected))
        .route("/new-round", post(new_round))
        .route("/close", post(close_round))
        .route("/store-results", post(store_results))
        .route("/tickets", post(create_ticket))
        .route("/ticket-status", get(ticket_status))
        .route("/ticket/:ticket_id", get(ticket_page))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Auth helpers
// ---------------------------------------------------------------------------

async fn authenticate(st: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(raw)?;
    match st.verifier.verify(token).await {
        Ok(claims) => Ok(claims),
        Err(e) => {
            warn!(error = %e, "bearer token rejected");
            Err(e.into())
        }
    }
}

async fn authorize(st: &AppState, headers: &HeaderMap, cap: Capability) -> Result<Claims, ApiError> {
    let claims = authenticate(st, headers).await?;
    if let Err(e) = claims.require(cap) {
        warn!(sub = ?claims.sub, required = cap.as_str(), "capability missing");
        return Err(e.into());
    }
    Ok(claims)
}

/// Syntax and shape errors are validation failures (422); a missing JSON
/// content type or an unreadable body keeps axum's own status.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|rej| match rej {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            ApiError::BadBody(rej.body_text())
        }
        other => ApiError::UnreadableBody(other.status(), other.body_text()),
    })
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /protected
// ---------------------------------------------------------------------------

pub(crate) async fn protected(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProtectedResponse>, ApiError> {
    let claims = authenticate(&st, &headers).await?;
    Ok(Json(ProtectedResponse {
        message: "Authorized!".to_string(),
        user: claims.sub,
    }))
}

// ---------------------------------------------------------------------------
// Round lifecycle (manage:rounds)
// ---------------------------------------------------------------------------

pub(crate) async fn new_round(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&st, &headers, Capability::ManageRounds).await?;
    st.service.open_round().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn close_round(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&st, &headers, Capability::ManageRounds).await?;
    st.service.close_round().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn store_results(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<StoreResultsRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    authorize(&st, &headers, Capability::ManageRounds).await?;
    let req = body(payload)?;
    st.service.store_results(&req.numbers).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /tickets
// ---------------------------------------------------------------------------

/// Issue a ticket in the open round and answer with its scannable code.
///
/// The code is encoded before the ticket is persisted, so an encoding
/// failure leaves no orphan row behind.
pub(crate) async fn create_ticket(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    authenticate(&st, &headers).await?;
    let req = body(payload)?;

    let draft = st.service.draft_ticket(&req.owner_id, &req.numbers)?;
    let ticket_id = draft.id;
    let image = st
        .encoder
        .encode(&st.service.lookup_url(ticket_id))
        .map_err(|e| ApiError::Internal(format!("ticket {ticket_id}: {e:#}")))?;

    let receipt = st.service.issue_ticket(draft).await?;
    info!(ticket_id = %receipt.ticket.id, bytes = image.len(), "ticket code encoded");

    let mut resp = ([(header::CONTENT_TYPE, st.encoder.content_type())], image).into_response();
    if let Ok(v) = HeaderValue::from_str(&receipt.ticket.id.to_string()) {
        resp.headers_mut().insert(TICKET_ID_HEADER, v);
    }
    Ok(resp)
}

// ---------------------------------------------------------------------------
// GET /ticket-status
// ---------------------------------------------------------------------------

pub(crate) async fn ticket_status(
    State(st): State<Arc<AppState>>,
) -> Result<Json<TicketStatus>, ApiError> {
    Ok(Json(st.service.ticket_status().await?))
}

// ---------------------------------------------------------------------------
// GET /ticket/:ticket_id
// ---------------------------------------------------------------------------

/// Public: the unguessable ticket id is the only credential.
pub(crate) async fn ticket_page(
    State(st): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let view = st.service.ticket_view(&ticket_id).await?;
    Ok(Html(st.renderer.render(&view)))
}
