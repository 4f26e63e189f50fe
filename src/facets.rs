// Facet Engine: computes the dynamic filter descriptor returned to the UI,
// combining result-derived values, provider-enumerated values, and hybrid
// sourcing per attribute policy.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::attribute::{AttributeDef, Capability, ValueSource};
use crate::cache::ValueCache;
use crate::provider::FilterValueOption;
use crate::provider_manager::ProviderManager;
use crate::registry::TypeRegistry;
use crate::types::Entity;

/// Bound on how long a cache-miss provider fetch may run before the facet
/// call gives up on that attribute rather than stalling the whole response.
const PROVIDER_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterDescriptor {
    pub capabilities: HashMap<String, Capability>,
    pub filters: Vec<String>,
    pub values: HashMap<String, Vec<FacetOption>>,
    pub attributes: HashMap<String, AttributeDef>,
}

pub struct FacetEngine {
    manager: Arc<ProviderManager>,
    registry: Arc<TypeRegistry>,
    cache: Arc<ValueCache>,
}

impl FacetEngine {
    pub fn new(manager: Arc<ProviderManager>, registry: Arc<TypeRegistry>, cache: Arc<ValueCache>) -> Self {
        Self { manager, registry, cache }
    }

    pub async fn compute(
        &self,
        entities: &[Entity],
        capabilities: &HashMap<String, Capability>,
        type_counts: &HashMap<String, usize>,
        is_blank_search: bool,
    ) -> FilterDescriptor {
        let attributes = self.registry.all_attributes();
        let mut values = HashMap::new();

        for (name, def) in &attributes {
            if !def.filterable {
                continue;
            }
            let Some(filter_cfg) = &def.filter else { continue };
            let options = self
                .options_for(name, def, filter_cfg.value_source, filter_cfg.cache_ttl_seconds, entities, is_blank_search)
                .await;
            let options = if filter_cfg.show_zero_count {
                options
            } else {
                options.into_iter().filter(|o| o.count > 0).collect()
            };
            let mut options = options;
            options.sort_by(|a, b| a.label.cmp(&b.label));
            values.insert(name.clone(), options);
        }

        // The entity-type facet is always emitted, sourced from the Type
        // Registry, independent of whether any provider capability
        // advertises "type" as filterable.
        values.insert("type".to_string(), type_facet(type_counts));

        FilterDescriptor {
            capabilities: capabilities.clone(),
            filters: attributes.keys().cloned().collect(),
            values,
            attributes,
        }
    }

    async fn options_for(
        &self,
        name: &str,
        _def: &AttributeDef,
        source: ValueSource,
        cache_ttl: Option<u64>,
        entities: &[Entity],
        is_blank_search: bool,
    ) -> Vec<FacetOption> {
        match source {
            ValueSource::FromEntities => {
                if is_blank_search {
                    return Vec::new();
                }
                from_entities(entities, name)
            }
            ValueSource::FromProvider => {
                let provider_values = self.provider_values(name, cache_ttl).await;
                provider_values
                    .into_iter()
                    .map(|opt| FacetOption {
                        value: opt.value,
                        label: opt.label,
                        count: opt.count,
                        has_more: false,
                    })
                    .collect()
            }
            ValueSource::Hybrid => {
                let provider_values = self.provider_values(name, cache_ttl).await;
                if is_blank_search {
                    return provider_values
                        .into_iter()
                        .map(|opt| FacetOption {
                            value: opt.value,
                            label: opt.label,
                            count: opt.count,
                            has_more: false,
                        })
                        .collect();
                }
                let result_counts = count_by_value(entities, name);
                provider_values
                    .into_iter()
                    .map(|opt| {
                        let result_count = result_counts.get(&opt.value).copied().unwrap_or(0);
                        FacetOption {
                            has_more: result_count > 0 && result_count < opt.count,
                            value: opt.value,
                            label: opt.label,
                            count: result_count,
                        }
                    })
                    .collect()
            }
        }
    }

    async fn provider_values(&self, name: &str, cache_ttl: Option<u64>) -> Vec<FilterValueOption> {
        if let Some(cached) = self.cache.get(name) {
            return cached;
        }
        let manager = Arc::clone(&self.manager);
        let attribute = name.to_string();
        let fetch = tokio::spawn(async move { manager.get_filter_values(&attribute).await });
        let values = match tokio::time::timeout(PROVIDER_FETCH_TIMEOUT, fetch).await {
            Ok(Ok(Ok(values))) => values,
            _ => Vec::new(),
        };
        self.cache.set(name, values.clone(), cache_ttl);
        values
    }
}

fn from_entities(entities: &[Entity], attribute: &str) -> Vec<FacetOption> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for entity in entities {
        if let Some(value) = entity.attribute(attribute) {
            *counts.entry(value.as_searchable_text()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|(value, count)| FacetOption {
            label: value.clone(),
            value,
            count,
            has_more: false,
        })
        .collect()
}

fn count_by_value(entities: &[Entity], attribute: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for entity in entities {
        if let Some(value) = entity.attribute(attribute) {
            *counts.entry(value.as_searchable_text()).or_insert(0) += 1;
        }
    }
    counts
}

fn type_facet(type_counts: &HashMap<String, usize>) -> Vec<FacetOption> {
    let seen: HashSet<&String> = type_counts.keys().collect();
    seen.into_iter()
        .map(|entity_type| FacetOption {
            value: entity_type.clone(),
            label: entity_type.clone(),
            count: type_counts.get(entity_type).copied().unwrap_or(0),
            has_more: false,
        })
        .collect()
}
