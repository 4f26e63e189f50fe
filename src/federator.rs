// Federator: concurrent fan-out to every connected provider, with
// per-provider timeout, capability-aware relevance gating, and isolated
// partial failure.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::attribute::FilterOp;
use crate::filter::FilterValue;
use crate::provider_manager::ProviderManager;
use crate::query::SearchQuery;
use crate::ranker::{Ranker, RankedEntity};
use crate::types::Entity;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct PerProviderResult {
    pub provider: String,
    pub entity_count: usize,
    pub duration_ms: u128,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct FederatedResponse {
    pub per_provider: Vec<PerProviderResult>,
    pub ranked_entities: Vec<RankedEntity>,
    pub type_counts: HashMap<String, usize>,
    pub duration: Duration,
    pub has_errors: bool,
}

pub struct Federator {
    manager: Arc<ProviderManager>,
    ranker: Arc<dyn Ranker>,
    timeout: Duration,
}

impl Federator {
    pub fn new(manager: Arc<ProviderManager>, ranker: Arc<dyn Ranker>, timeout: Duration) -> Self {
        Self { manager, ranker, timeout }
    }

    pub async fn search(&self, query: &SearchQuery) -> FederatedResponse {
        let start = std::time::Instant::now();
        let providers = self.manager.list();

        let mut handles = Vec::with_capacity(providers.len());
        for provider in providers {
            let query = query.clone();
            let timeout = self.timeout;
            handles.push(tokio::spawn(async move {
                let task_start = std::time::Instant::now();
                // A provider's own empty capability set is legitimate (it
                // supports zero filterable attributes) and must not be
                // papered over with the union of every other provider's
                // capabilities. Only an outright error falls back to empty.
                let capabilities = provider.filter_capabilities().await.unwrap_or_default();

                let relevant = relevant_filters(&query.filters, &capabilities);

                // Relevance gate: a non-empty filter set with no overlap
                // means this provider has nothing useful to say.
                if !query.filters.is_empty() && relevant.is_empty() {
                    return (
                        provider.name().to_string(),
                        PerProviderResult {
                            provider: provider.name().to_string(),
                            entity_count: 0,
                            duration_ms: task_start.elapsed().as_millis(),
                            error: None,
                        },
                        Vec::new(),
                    );
                }

                let scoped_query = query.with_filters(relevant);
                let search_future = provider.search(&scoped_query);

                match tokio::time::timeout(timeout, search_future).await {
                    Ok(Ok(entities)) => (
                        provider.name().to_string(),
                        PerProviderResult {
                            provider: provider.name().to_string(),
                            entity_count: entities.len(),
                            duration_ms: task_start.elapsed().as_millis(),
                            error: None,
                        },
                        entities,
                    ),
                    Ok(Err(err)) => (
                        provider.name().to_string(),
                        PerProviderResult {
                            provider: provider.name().to_string(),
                            entity_count: 0,
                            duration_ms: task_start.elapsed().as_millis(),
                            error: Some(err.to_string()),
                        },
                        Vec::new(),
                    ),
                    Err(_elapsed) => (
                        provider.name().to_string(),
                        PerProviderResult {
                            provider: provider.name().to_string(),
                            entity_count: 0,
                            duration_ms: task_start.elapsed().as_millis(),
                            error: Some("deadline exceeded".to_string()),
                        },
                        Vec::new(),
                    ),
                }
            }));
        }

        let mut per_provider = Vec::with_capacity(handles.len());
        let mut all_entities = Vec::new();
        let mut has_errors = false;

        for handle in handles {
            match handle.await {
                Ok((_, result, entities)) => {
                    has_errors |= result.error.is_some();
                    per_provider.push(result);
                    all_entities.extend(entities);
                }
                Err(join_err) => {
                    has_errors = true;
                    per_provider.push(PerProviderResult {
                        provider: "unknown".to_string(),
                        entity_count: 0,
                        duration_ms: 0,
                        error: Some(join_err.to_string()),
                    });
                }
            }
        }

        let mut type_counts = HashMap::new();
        for entity in &all_entities {
            *type_counts.entry(entity.entity_type.clone()).or_insert(0) += 1;
        }

        let ranked_entities = if all_entities.is_empty() {
            Vec::new()
        } else {
            match self.ranker.rank(all_entities, query).await {
                Ok(ranked) => ranked,
                Err(err) => {
                    tracing::warn!(error = %err, "ranking failed, returning unsorted union");
                    Vec::new()
                }
            }
        };

        FederatedResponse {
            per_provider,
            ranked_entities,
            type_counts,
            duration: start.elapsed(),
            has_errors,
        }
    }
}

/// Intersects the requested filters with what the provider's capability set
/// actually supports, dropping anything it can't evaluate.
fn relevant_filters(
    filters: &HashMap<String, FilterValue>,
    capabilities: &HashMap<String, crate::attribute::Capability>,
) -> HashMap<String, FilterValue> {
    filters
        .iter()
        .filter(|(name, value)| {
            capabilities.get(*name).map(|cap| capability_supports(cap, value)).unwrap_or(false)
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn capability_supports(capability: &crate::attribute::Capability, value: &FilterValue) -> bool {
    match value.op() {
        Some(FilterOp::Eq) => capability.supports_eq,
        Some(FilterOp::Neq) => capability.supports_neq,
        Some(FilterOp::Gt) | Some(FilterOp::Gte) | Some(FilterOp::Lt) | Some(FilterOp::Lte) => {
            capability.supports_range
        }
        Some(FilterOp::Contains) => capability.supports_contains,
        Some(FilterOp::In) => true,
        None => capability.supports_range,
    }
}

pub fn paginate(ranked: &[RankedEntity], offset: usize, limit: usize) -> Vec<Entity> {
    ranked
        .iter()
        .skip(offset)
        .take(limit)
        .map(|r| r.entity.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Capability;
    use crate::query::QueryBuilder;
    use crate::ranker::RankedEntity;
    use crate::types::{AttributeType, EntityId};

    fn capability(supports_eq: bool) -> Capability {
        Capability {
            attribute_type: AttributeType::String,
            supports_eq,
            supports_neq: false,
            supports_range: false,
            supports_contains: false,
            options: None,
            min: None,
            max: None,
            description: None,
        }
    }

    fn filter_value() -> FilterValue {
        FilterValue::StringFilter {
            op: FilterOp::Eq,
            value: "x".to_string(),
        }
    }

    #[test]
    fn relevant_filters_keeps_only_supported_attributes() {
        let mut filters = HashMap::new();
        filters.insert("person".to_string(), filter_value());
        filters.insert("color".to_string(), filter_value());

        let mut capabilities = HashMap::new();
        capabilities.insert("person".to_string(), capability(true));

        let relevant = relevant_filters(&filters, &capabilities);
        assert_eq!(relevant.len(), 1);
        assert!(relevant.contains_key("person"));
    }

    #[test]
    fn pagination_slices_past_the_end_to_empty() {
        let ranked = vec![RankedEntity {
            entity: fake_entity("a"),
            score: 1.0,
            provider: "fs".to_string(),
        }];
        assert!(paginate(&ranked, 100, 10).is_empty());
        assert_eq!(paginate(&ranked, 0, 10).len(), 1);
    }

    fn fake_entity(id: &str) -> Entity {
        Entity {
            id: EntityId::new("fs", "default", id).unwrap(),
            entity_type: "item".to_string(),
            provider: "fs".to_string(),
            title: id.to_string(),
            description: String::new(),
            attributes: HashMap::new(),
            relationships: Vec::new(),
            search_tokens: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn query_builder_smoke() {
        let _ = QueryBuilder::new(200).build().unwrap();
    }
}
