// Pure scoring functions for the in-memory ranker. Kept free of any state
// or I/O so they can be unit tested directly, the same split the rest of
// this crate uses between stateful wrappers and their pure cores.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::Entity;

const TEXT_RELEVANCE_WEIGHT: f64 = 1.0;
const TYPE_BOOST_COEFFICIENT: f64 = 0.5;
const RECENCY_WEIGHT: f64 = 1.0;
const RECENCY_HALF_LIFE_SECONDS: f64 = 30.0 * 24.0 * 60.0 * 60.0;

/// Case-insensitive text relevance against title, description, search
/// tokens, and attribute key/value pairs, capped and normalized to [0, 1].
pub fn text_relevance(entity: &Entity, query_text: &str) -> f64 {
    if query_text.is_empty() {
        return 0.5;
    }
    let needle = query_text.to_lowercase();
    let mut score = 0.0;

    let title = entity.title.to_lowercase();
    if title == needle {
        score += 2.0;
    } else if title.starts_with(&needle) {
        score += 1.5;
    } else if title.contains(&needle) {
        score += 1.0;
    }

    if entity.description.to_lowercase().contains(&needle) {
        score += 0.5;
    }

    for token in &entity.search_tokens {
        if token.to_lowercase().contains(&needle) {
            score += 0.3;
        }
    }

    for (key, value) in &entity.attributes {
        if key.to_lowercase().contains(&needle) || value.as_searchable_text().to_lowercase().contains(&needle) {
            score += 0.2;
        }
    }

    (score.min(3.0)) / 3.0
}

pub fn type_boost(entity_type: &str, type_weights: &HashMap<String, f64>, config_weights: &HashMap<String, f64>) -> f64 {
    let weight = type_weights
        .get(entity_type)
        .or_else(|| config_weights.get(entity_type))
        .copied()
        .unwrap_or(0.0);
    weight * TYPE_BOOST_COEFFICIENT
}

pub fn provider_boost(provider: &str, provider_weights: &HashMap<String, f64>) -> f64 {
    provider_weights.get(provider).copied().unwrap_or(0.0)
}

pub fn recency_score(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(timestamp) = timestamp else {
        return 0.0;
    };
    let age_seconds = (now - timestamp).num_seconds().max(0) as f64;
    1.0 / (1.0 + age_seconds / RECENCY_HALF_LIFE_SECONDS)
}

pub fn score_entity(
    entity: &Entity,
    query_text: &str,
    type_weights: &HashMap<String, f64>,
    config_type_weights: &HashMap<String, f64>,
    provider_weights: &HashMap<String, f64>,
    now: DateTime<Utc>,
) -> f64 {
    text_relevance(entity, query_text) * TEXT_RELEVANCE_WEIGHT
        + type_boost(&entity.entity_type, type_weights, config_type_weights)
        + provider_boost(&entity.provider, provider_weights)
        + recency_score(entity.timestamp, now) * RECENCY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;
    use std::collections::HashMap as Map;

    fn entity(title: &str, description: &str) -> Entity {
        Entity {
            id: EntityId::new("fs", "default", "a").unwrap(),
            entity_type: "item.file".to_string(),
            provider: "filesystem".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            attributes: Map::new(),
            relationships: Vec::new(),
            search_tokens: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn empty_query_yields_baseline_relevance() {
        assert_eq!(text_relevance(&entity("anything", ""), ""), 0.5);
    }

    #[test]
    fn exact_title_match_outranks_contains_match() {
        let exact = text_relevance(&entity("budget report", ""), "budget report");
        let contains = text_relevance(&entity("q3 budget report final", ""), "budget report");
        assert!(exact > contains);
    }

    #[test]
    fn recency_decays_toward_zero_with_age() {
        let now = Utc::now();
        let fresh = recency_score(Some(now), now);
        let old = recency_score(Some(now - chrono::Duration::days(365)), now);
        assert!(fresh > old);
        assert_eq!(recency_score(None, now), 0.0);
    }

    #[test]
    fn type_boost_falls_back_to_config_weights() {
        let mut config_weights = Map::new();
        config_weights.insert("item.file".to_string(), 2.0);
        let boost = type_boost("item.file", &Map::new(), &config_weights);
        assert_eq!(boost, 1.0);
    }
}
