// Ranker: scores, deduplicates, and orders the merged candidate set.
// Strategies are interchangeable behind one trait; the external BM25
// strategy (feature `bm25-ranker`) falls back to the in-memory strategy on
// any failure, which in turn never fails.

mod scoring;

#[cfg(feature = "bm25-ranker")]
pub mod bm25;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

use crate::query::SearchQuery;
use crate::types::Entity;

#[derive(Debug, Clone)]
pub struct RankedEntity {
    pub entity: Entity,
    pub score: f64,
    pub provider: String,
}

#[derive(Debug, Clone, Default)]
pub struct RankerConfig {
    pub config_type_weights: HashMap<String, f64>,
    pub provider_weights: HashMap<String, f64>,
}

#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(&self, entities: Vec<Entity>, query: &SearchQuery) -> anyhow::Result<Vec<RankedEntity>>;
}

/// Heuristic scoring entirely in-process: no external dependency, so this
/// strategy is the fallback of last resort everywhere else in the chain.
pub struct InMemoryRanker {
    config: RankerConfig,
}

impl InMemoryRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Ranker for InMemoryRanker {
    async fn rank(&self, entities: Vec<Entity>, query: &SearchQuery) -> anyhow::Result<Vec<RankedEntity>> {
        Ok(rank_in_memory(entities, query, &self.config))
    }
}

/// Pure entry point so the dedup+sort behavior can be exercised without an
/// async runtime.
pub fn rank_in_memory(entities: Vec<Entity>, query: &SearchQuery, config: &RankerConfig) -> Vec<RankedEntity> {
    let now = Utc::now();
    let mut best: HashMap<String, RankedEntity> = HashMap::new();

    for entity in entities {
        let score = scoring::score_entity(
            &entity,
            &query.text,
            &query.type_weights,
            &config.config_type_weights,
            &config.provider_weights,
            now,
        );
        let id = entity.id.to_string();
        let provider = entity.provider.clone();
        let candidate = RankedEntity { entity, score, provider };

        best.entry(id)
            .and_modify(|existing| {
                if candidate.score > existing.score {
                    *existing = candidate.clone();
                }
            })
            .or_insert(candidate);
    }

    let mut ranked: Vec<RankedEntity> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.entity.timestamp.cmp(&a.entity.timestamp))
    });
    ranked
}

/// Last-resort strategy: preserves input order with a flat score. Used when
/// even the in-memory strategy's scoring inputs are unavailable (never
/// happens in practice today, but keeps the fallback chain total).
pub fn rank_input_order(entities: Vec<Entity>) -> Vec<RankedEntity> {
    entities
        .into_iter()
        .map(|entity| {
            let provider = entity.provider.clone();
            RankedEntity {
                entity,
                score: 0.5,
                provider,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use crate::types::EntityId;
    use std::collections::HashMap as Map;

    fn entity(id: &str, provider: &str, title: &str) -> Entity {
        Entity {
            id: EntityId::new(provider, "default", id).unwrap(),
            entity_type: "item.file".to_string(),
            provider: provider.to_string(),
            title: title.to_string(),
            description: String::new(),
            attributes: Map::new(),
            relationships: Vec::new(),
            search_tokens: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn dedup_keeps_the_higher_scored_copy() {
        let query = QueryBuilder::new(200).text("report").build().unwrap();
        let low = entity("z", "fs", "unrelated");
        let mut high = entity("z", "fs", "report");
        high.id = low.id.clone();
        let ranked = rank_in_memory(vec![low, high], &query, &RankerConfig::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].entity.title, "report");
    }

    #[test]
    fn sort_is_descending_by_score() {
        let query = QueryBuilder::new(200).text("budget").build().unwrap();
        let a = entity("a", "fs", "budget report");
        let b = entity("b", "fs", "unrelated document");
        let ranked = rank_in_memory(vec![b, a], &query, &RankerConfig::default());
        assert_eq!(ranked[0].entity.id.resource_id(), "a");
    }

    #[test]
    fn input_order_fallback_assigns_flat_score() {
        let ranked = rank_input_order(vec![entity("a", "fs", "x"), entity("b", "fs", "y")]);
        assert!(ranked.iter().all(|r| r.score == 0.5));
        assert_eq!(ranked[0].entity.id.resource_id(), "a");
    }
}
