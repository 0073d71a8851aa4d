//! HTTP mapping for domain and authentication failures.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use loto_auth::AuthError;
use loto_core::LotoError;
use tracing::error;

use crate::api_types::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    Loto(LotoError),
    Auth(AuthError),
    /// Request body could not be decoded into the expected shape.
    BadBody(String),
    /// Request body was refused before decoding (wrong content type, unreadable).
    UnreadableBody(StatusCode, String),
    Internal(String),
}

impl From<LotoError> for ApiError {
    fn from(e: LotoError) -> Self {
        ApiError::Loto(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Loto(e) => match e {
                LotoError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LotoError::NoActiveRound | LotoError::InvalidState { .. } => {
                    StatusCode::BAD_REQUEST
                }
                LotoError::NotFound { .. } => StatusCode::NOT_FOUND,
                LotoError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                LotoError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth(e) => match e {
                AuthError::InsufficientScope { .. } => StatusCode::FORBIDDEN,
                AuthError::KeySetUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::UNAUTHORIZED,
            },
            ApiError::BadBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UnreadableBody(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (code, detail) = match self {
            ApiError::Loto(e @ LotoError::Store(_)) => (e.code(), "internal store failure".to_string()),
            ApiError::Loto(e) => (e.code(), e.to_string()),
            ApiError::Auth(e) => (e.code(), e.to_string()),
            ApiError::BadBody(msg) => ("VALIDATION", msg.clone()),
            ApiError::UnreadableBody(status, msg) => match *status {
                StatusCode::UNSUPPORTED_MEDIA_TYPE => ("UNSUPPORTED_MEDIA_TYPE", msg.clone()),
                _ => ("BAD_REQUEST", msg.clone()),
            },
            ApiError::Internal(_) => ("INTERNAL", "internal error".to_string()),
        };
        ErrorResponse {
            error: code.to_string(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(msg) = &self {
            error!(%msg, "request failed");
        }

        let mut resp = (status, Json(self.body())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            resp.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}
