// Provider contract: the interface every concrete backend (filesystem
// index, photo library, code host, …) implements. The core depends only on
// this trait; concrete providers are plug-ins outside this crate's scope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::attribute::{AttributeDef, Capability};
use crate::query::SearchQuery;
use crate::types::Entity;

pub type ProviderConfig = HashMap<String, serde_json::Value>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Globally unique provider-type identifier.
    fn name(&self) -> &str;

    async fn initialize(&self, config: &ProviderConfig) -> anyhow::Result<()>;

    /// Optional bulk enumeration; may return an empty vec if expensive.
    async fn discover(&self) -> anyhow::Result<Vec<Entity>> {
        Ok(Vec::new())
    }

    fn supports_incremental(&self) -> bool {
        false
    }

    async fn discover_since(&self, _since: DateTime<Utc>) -> anyhow::Result<Vec<Entity>> {
        Ok(Vec::new())
    }

    async fn hydrate(&self, resource_id: &str) -> anyhow::Result<Entity>;

    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<Entity>>;

    async fn get_related(&self, resource_id: &str, kind: Option<&str>) -> anyhow::Result<Vec<Entity>>;

    async fn filter_capabilities(&self) -> anyhow::Result<HashMap<String, Capability>>;

    async fn filter_values(&self, attribute: &str) -> anyhow::Result<Vec<FilterValueOption>>;

    /// Attribute-schema overlay registered once at initialization time.
    async fn attribute_extensions(&self) -> anyhow::Result<HashMap<String, AttributeDef>> {
        Ok(HashMap::new())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Optional authenticated asset fetch proxy (e.g. a thumbnail).
    async fn thumbnail(&self, _resource_id: &str) -> anyhow::Result<Option<(Vec<u8>, String)>> {
        Ok(None)
    }
}

/// A single provider-enumerated value, e.g. one person in a photo library.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterValueOption {
    pub value: String,
    pub label: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullProvider;

    #[async_trait]
    impl Provider for NullProvider {
        fn name(&self) -> &str {
            "null"
        }

        async fn initialize(&self, _config: &ProviderConfig) -> anyhow::Result<()> {
            Ok(())
        }

        async fn hydrate(&self, resource_id: &str) -> anyhow::Result<Entity> {
            anyhow::bail!("no entity {resource_id}")
        }

        async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<Entity>> {
            Ok(Vec::new())
        }

        async fn get_related(&self, _resource_id: &str, _kind: Option<&str>) -> anyhow::Result<Vec<Entity>> {
            Ok(Vec::new())
        }

        async fn filter_capabilities(&self) -> anyhow::Result<HashMap<String, Capability>> {
            Ok(HashMap::new())
        }

        async fn filter_values(&self, _attribute: &str) -> anyhow::Result<Vec<FilterValueOption>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn default_trait_methods_are_inert() {
        let provider = NullProvider;
        assert!(!provider.supports_incremental());
        assert!(provider.discover().await.unwrap().is_empty());
        assert!(provider.shutdown().await.is_ok());
        assert!(provider.thumbnail("x").await.unwrap().is_none());
    }
}
