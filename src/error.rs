//! Error taxonomy shared by every fallible core operation.
//!
//! Every provider call, filter parse, rank, and facet computation returns
//! `Result<T, GatewayError>` (or `anyhow::Result<T>` at provider boundaries,
//! downcast back into a `GatewayError` kind by the manager). The taxonomy is
//! deliberately small: it exists to decide what the federator recovers from
//! locally versus what aborts the request, and what HTTP status a kind maps
//! to, not to describe every possible failure in detail.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use crate::filter::FieldError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid provider configuration. Fatal for that provider
    /// only; the request proceeds with the remaining providers.
    #[error("provider config error ({provider}): {message}")]
    Config { provider: String, message: String },

    /// Provider credentials rejected. The provider is marked disconnected.
    #[error("provider auth error ({provider}): {message}")]
    Auth { provider: String, message: String },

    /// Malformed request. Aborts the whole request before fan-out.
    #[error("validation failed")]
    Validation { details: Vec<FieldError> },

    /// Entity or type not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Per-provider deadline exceeded. Recorded in status, not fatal.
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// Network or upstream 5xx from a provider. Surfaced as `hasErrors`.
    #[error("transient error from {provider}: {message}")]
    Transient { provider: String, message: String },

    /// Ranker or external index failure; caller should fall back to the
    /// in-memory ranking strategy.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(details: Vec<FieldError>) -> Self {
        GatewayError::Validation { details }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        GatewayError::NotFound(what.into())
    }

    /// Whether this error is recoverable by continuing the request with
    /// partial results (everything except malformed input).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GatewayError::Validation { .. })
    }
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Validation { details } => (
                StatusCode::BAD_REQUEST,
                Json(crate::http_types::ValidationErrorResponse::new(details)),
            )
                .into_response(),
            GatewayError::NotFound(ref what) => (
                StatusCode::NOT_FOUND,
                Json(crate::http_types::ErrorResponse::not_found(what.clone())),
            )
                .into_response(),
            GatewayError::Auth { .. } => (
                StatusCode::UNAUTHORIZED,
                Json(crate::http_types::ErrorResponse::from(&self)),
            )
                .into_response(),
            GatewayError::Config { .. } | GatewayError::Transient { .. } => (
                StatusCode::BAD_GATEWAY,
                Json(crate::http_types::ErrorResponse::from(&self)),
            )
                .into_response(),
            GatewayError::Timeout(_) | GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(crate::http_types::ErrorResponse::from(&self)),
            )
                .into_response(),
        }
    }
}
