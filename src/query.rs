// Query Assembly: builds the canonical internal SearchQuery from a parsed,
// validated request, and carries the pagination policy (sliced after
// ranking, never forwarded to providers).

use anyhow::Result;
use std::collections::HashMap;

use crate::filter::FilterValue;
use crate::types::{ValidatedLimit, ValidatedOffset};

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub filters: HashMap<String, FilterValue>,
    pub entity_type: Option<String>,
    pub limit: ValidatedLimit,
    pub offset: ValidatedOffset,
    pub type_weights: HashMap<String, f64>,
    pub include_related: bool,
    pub max_depth: u32,
}

impl SearchQuery {
    /// A query scoped to a subset of filters, used by the federator to hand
    /// each provider only the filters it can evaluate. Pagination is
    /// irrelevant to providers (it's applied centrally after ranking) but
    /// kept so a provider-level search call can still short-circuit.
    pub fn with_filters(&self, filters: HashMap<String, FilterValue>) -> Self {
        Self {
            text: self.text.clone(),
            filters,
            entity_type: self.entity_type.clone(),
            limit: self.limit,
            offset: self.offset,
            type_weights: self.type_weights.clone(),
            include_related: self.include_related,
            max_depth: self.max_depth,
        }
    }
}

/// Fluent builder mirroring the construction style used elsewhere in this
/// crate: each setter is infallible, `build()` performs the one validation
/// step (limit bounds) that can actually fail.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    text: String,
    filters: HashMap<String, FilterValue>,
    entity_type: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    type_weights: HashMap<String, f64>,
    include_related: bool,
    max_depth: u32,
    max_page_size: usize,
}

impl QueryBuilder {
    pub fn new(max_page_size: usize) -> Self {
        Self {
            max_page_size,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn filters(mut self, filters: HashMap<String, FilterValue>) -> Self {
        self.filters = filters;
        self
    }

    pub fn entity_type(mut self, entity_type: Option<String>) -> Self {
        self.entity_type = entity_type;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<usize>) -> Self {
        self.offset = offset;
        self
    }

    pub fn type_weights(mut self, weights: HashMap<String, f64>) -> Self {
        self.type_weights = weights;
        self
    }

    pub fn include_related(mut self, include_related: bool, max_depth: Option<u32>) -> Self {
        self.include_related = include_related;
        self.max_depth = max_depth.unwrap_or(1);
        self
    }

    pub fn build(self) -> Result<SearchQuery> {
        Ok(SearchQuery {
            text: self.text,
            filters: self.filters,
            entity_type: self.entity_type,
            limit: ValidatedLimit::new(self.limit, self.max_page_size)?,
            offset: ValidatedOffset::new(self.offset),
            type_weights: self.type_weights,
            include_related: self.include_related,
            max_depth: self.max_depth,
        })
    }
}

/// Matches a type name with prefix semantics: `item.file` matches
/// `item.file.media.image`.
pub fn type_matches(entity_type: &str, requested: &str) -> bool {
    entity_type == requested
        || entity_type
            .strip_prefix(requested)
            .map(|rest| rest.starts_with('.'))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_default_page_size_when_unset() {
        let query = QueryBuilder::new(200).text("photos").build().unwrap();
        assert_eq!(query.limit.get(), 24);
        assert_eq!(query.offset.get(), 0);
    }

    #[test]
    fn builder_rejects_limit_beyond_max_page_size() {
        let result = QueryBuilder::new(200).limit(Some(500)).build();
        assert!(result.is_err());
    }

    #[test]
    fn type_prefix_matching_respects_dot_boundaries() {
        assert!(type_matches("item.file.media.image", "item.file"));
        assert!(!type_matches("item.filesystem", "item.file"));
        assert!(type_matches("item", "item"));
    }
}
