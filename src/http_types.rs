//! Shared HTTP DTOs used by the axum surface: error payloads, the search
//! request/response envelopes, and the federated per-provider breakdown.

use crate::error::GatewayError;
use crate::facets::FilterDescriptor;
use crate::federator::PerProviderResult;
use crate::filter::FieldError;
use crate::types::Entity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard error response for endpoints that fail outright (404, 5xx).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new("internal_server_error", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }
}

/// Error response for request validation failures: every failed filter is
/// reported, not just the first one.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub details: Vec<FieldError>,
}

impl ValidationErrorResponse {
    pub fn new(details: Vec<FieldError>) -> Self {
        Self {
            error: "validation_failed".to_string(),
            details,
        }
    }
}

impl From<&GatewayError> for ErrorResponse {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::NotFound(_) => ErrorResponse::not_found(err.to_string()),
            GatewayError::Validation { .. } => ErrorResponse::bad_request(err.to_string()),
            _ => ErrorResponse::internal_server_error(err.to_string()),
        }
    }
}

/// `POST /search` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[serde(default)]
    pub type_weights: HashMap<String, f64>,
    #[serde(default)]
    pub include_related: bool,
    pub max_depth: Option<u32>,
}

/// `POST /search` response body.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub entities: Vec<Entity>,
    pub total_count: usize,
    pub type_counts: HashMap<String, usize>,
    pub filters: FilterDescriptor,
    pub duration_ms: u128,
    pub has_errors: bool,
}

/// `POST /search/federated` response body: same query, broken down per
/// provider so a caller can see which provider contributed what and why.
#[derive(Debug, Clone, Serialize)]
pub struct FederatedSearchResponse {
    pub entities: Vec<Entity>,
    pub total_count: usize,
    pub type_counts: HashMap<String, usize>,
    pub filters: FilterDescriptor,
    pub per_provider: Vec<PerProviderResult>,
    pub duration_ms: u128,
    pub has_errors: bool,
}
