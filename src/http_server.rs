// Minimal HTTP surface: wiring only, exposing the handful of endpoints
// needed to exercise the core end-to-end. Route-table completeness (auth,
// static assets, a thumbnail proxy, the MCP wrapper) is out of scope.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::ValueCache;
use crate::error::GatewayError;
use crate::facets::FacetEngine;
use crate::federator::{paginate, Federator};
use crate::filter::parse_filters;
use crate::http_types::{ErrorResponse, FederatedSearchResponse, SearchRequest, SearchResponse};
use crate::provider_manager::{ProviderManager, ProviderStatus};
use crate::query::QueryBuilder;
use crate::registry::TypeRegistry;
use crate::relationships::RelationshipTraversal;
use crate::types::EntityId;

pub struct AppState {
    pub manager: Arc<ProviderManager>,
    pub registry: Arc<TypeRegistry>,
    pub cache: Arc<ValueCache>,
    pub federator: Arc<Federator>,
    pub facets: Arc<FacetEngine>,
    pub max_page_size: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/search/federated", post(search_federated))
        .route("/entity/:id", get(get_entity))
        .route("/entity/:id/expand", get(expand_entity))
        .route("/entity/:id/related", get(get_related))
        .route("/types", get(list_types))
        .route("/types/:name", get(get_type))
        .route("/providers", get(list_providers))
        .route("/providers/status", get(provider_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn assemble_query(
    state: &AppState,
    request: &SearchRequest,
) -> Result<crate::query::SearchQuery, GatewayError> {
    let attributes = match &request.entity_type {
        Some(t) => state.registry.attributes_of(t),
        None => state.registry.all_attributes(),
    };
    let (filters, errors) = parse_filters(&request.filters, &attributes);
    if !errors.is_empty() {
        return Err(GatewayError::validation(errors.into_details()));
    }

    QueryBuilder::new(state.max_page_size)
        .text(request.query.clone())
        .filters(filters)
        .entity_type(request.entity_type.clone())
        .limit(request.limit)
        .offset(request.offset)
        .type_weights(request.type_weights.clone())
        .include_related(request.include_related, request.max_depth)
        .build()
        .map_err(|err| GatewayError::Internal(err.to_string()))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, GatewayError> {
    let start = Instant::now();
    let query = assemble_query(&state, &request)?;
    let response = state.federator.search(&query).await;
    let entities = paginate(&response.ranked_entities, query.offset.get(), query.limit.get());
    let capabilities = state.manager.filter_capabilities().await;
    let is_blank = request.query.is_empty() && request.entity_type.is_none();
    let filters = state
        .facets
        .compute(&entities, &capabilities, &response.type_counts, is_blank)
        .await;

    Ok(Json(SearchResponse {
        entities,
        total_count: response.ranked_entities.len(),
        type_counts: response.type_counts,
        filters,
        duration_ms: start.elapsed().as_millis(),
        has_errors: response.has_errors,
    }))
}

async fn search_federated(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<FederatedSearchResponse>, GatewayError> {
    let start = Instant::now();
    let query = assemble_query(&state, &request)?;
    let response = state.federator.search(&query).await;
    let entities = paginate(&response.ranked_entities, query.offset.get(), query.limit.get());
    let capabilities = state.manager.filter_capabilities().await;
    let is_blank = request.query.is_empty() && request.entity_type.is_none();
    let filters = state
        .facets
        .compute(&entities, &capabilities, &response.type_counts, is_blank)
        .await;

    Ok(Json(FederatedSearchResponse {
        entities,
        total_count: response.ranked_entities.len(),
        type_counts: response.type_counts,
        filters,
        per_provider: response.per_provider,
        duration_ms: start.elapsed().as_millis(),
        has_errors: response.has_errors,
    }))
}

async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let entity_id = EntityId::parse(&id).map_err(|err| GatewayError::validation(vec![crate::filter::FieldError {
        field: "id".to_string(),
        reason: err.to_string(),
    }]))?;
    state
        .manager
        .hydrate(&entity_id)
        .await
        .map(Json)
        .map_err(|err| GatewayError::not_found(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct ExpandQuery {
    depth: Option<u32>,
}

async fn expand_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ExpandQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let entity_id = EntityId::parse(&id).map_err(|err| GatewayError::not_found(err.to_string()))?;
    let traversal = RelationshipTraversal::new(Arc::clone(&state.manager));
    let expanded = traversal
        .expand(&entity_id, params.depth.unwrap_or(1))
        .await
        .map_err(|err| GatewayError::not_found(err.to_string()))?;

    Ok(Json(serde_json::json!({
        "entity": expanded.entity,
        "related": expanded.related,
    })))
}

#[derive(Debug, Deserialize)]
struct RelatedQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    limit: Option<usize>,
}

async fn get_related(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RelatedQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let entity_id = EntityId::parse(&id).map_err(|err| GatewayError::not_found(err.to_string()))?;
    let mut related = state
        .manager
        .get_related(&entity_id, params.kind.as_deref())
        .await
        .map_err(|err| GatewayError::not_found(err.to_string()))?;
    if let Some(limit) = params.limit {
        related.truncate(limit);
    }
    Ok(Json(related))
}

async fn list_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let types: Vec<serde_json::Value> = state
        .registry
        .list()
        .into_iter()
        .map(|def| serde_json::json!({ "name": def.name, "parent": def.parent }))
        .collect();
    Json(types)
}

async fn get_type(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .registry
        .get(&name)
        .map(|def| Json(serde_json::json!({ "name": def.name, "parent": def.parent })))
        .ok_or_else(|| GatewayError::not_found(format!("type \"{name}\"")))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let names: Vec<String> = state.manager.list().iter().map(|p| p.name().to_string()).collect();
    Json(names)
}

async fn provider_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status: HashMap<String, ProviderStatus> = state.manager.status();
    Json(
        status
            .into_iter()
            .map(|(name, s)| {
                (
                    name,
                    serde_json::json!({
                        "connected": s.connected,
                        "lastError": s.last_error,
                        "lastDiscovery": s.last_discovery,
                        "entityCount": s.entity_count,
                        "supportsIncremental": s.supports_incremental,
                    }),
                )
            })
            .collect::<HashMap<_, _>>(),
    )
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

impl From<GatewayError> for ErrorResponse {
    fn from(err: GatewayError) -> Self {
        ErrorResponse::from(&err)
    }
}
