// Provider Manager & Registry: registers provider factories, owns the
// initialized instances, and routes Hydrate/Search/GetRelated/FilterValues
// calls to the provider that owns them.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::attribute::Capability;
use crate::provider::{FilterValueOption, Provider, ProviderConfig};
use crate::query::SearchQuery;
use crate::registry::TypeRegistry;
use crate::types::{Entity, EntityId};

pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn Provider> + Send + Sync>;

/// Maps provider-type name to a factory that produces a fresh instance.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: DashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Provider>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("no provider factory registered for \"{name}\""))?;
        Ok((factory)())
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|e| e.key().clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_discovery: Option<DateTime<Utc>>,
    pub entity_count: usize,
    pub supports_incremental: bool,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self {
            connected: false,
            last_error: None,
            last_discovery: None,
            entity_count: 0,
            supports_incremental: false,
        }
    }
}

/// Owns initialized provider instances, keyed by provider-type name (one
/// instance per type in this release), plus their connection status.
pub struct ProviderManager {
    instances: DashMap<String, Arc<dyn Provider>>,
    status: DashMap<String, ProviderStatus>,
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderManager {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
            status: DashMap::new(),
        }
    }

    pub async fn initialize(
        &self,
        registry: &ProviderRegistry,
        type_registry: &TypeRegistry,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<()> {
        let provider = registry.create(name)?;
        match provider.initialize(config).await {
            Ok(()) => {
                let extensions = provider.attribute_extensions().await.unwrap_or_default();
                type_registry.extend_all_types(&extensions);
                self.status.insert(
                    name.to_string(),
                    ProviderStatus {
                        connected: true,
                        last_error: None,
                        last_discovery: None,
                        entity_count: 0,
                        supports_incremental: provider.supports_incremental(),
                    },
                );
                self.instances.insert(name.to_string(), provider);
                Ok(())
            }
            Err(err) => {
                self.status.insert(
                    name.to_string(),
                    ProviderStatus {
                        connected: false,
                        last_error: Some(err.to_string()),
                        ..ProviderStatus::default()
                    },
                );
                Err(err)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.instances.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn list(&self) -> Vec<Arc<dyn Provider>> {
        self.instances.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn status(&self) -> HashMap<String, ProviderStatus> {
        self.status.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    pub async fn hydrate(&self, id: &EntityId) -> Result<Entity> {
        let provider = self
            .instances
            .get(id.provider_type())
            .ok_or_else(|| anyhow!("no connected provider for type \"{}\"", id.provider_type()))?;
        provider.hydrate(id.resource_id()).await
    }

    pub async fn get_related(&self, id: &EntityId, kind: Option<&str>) -> Result<Vec<Entity>> {
        let provider = self
            .instances
            .get(id.provider_type())
            .ok_or_else(|| anyhow!("no connected provider for type \"{}\"", id.provider_type()))?;
        provider.get_related(id.resource_id(), kind).await
    }

    /// Fans out a raw provider-level search to every connected provider,
    /// independent of relevance gating (that lives in the Federator).
    pub async fn search_all(&self, query: &SearchQuery) -> Vec<(String, Result<Vec<Entity>>)> {
        let mut handles = Vec::new();
        for entry in self.instances.iter() {
            let name = entry.key().clone();
            let provider = Arc::clone(entry.value());
            let query = query.clone();
            handles.push(tokio::spawn(async move {
                let result = provider.search(&query).await;
                (name, result)
            }));
        }
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(pair) => results.push(pair),
                Err(join_err) => results.push(("unknown".to_string(), Err(anyhow!(join_err)))),
            }
        }
        results
    }

    pub async fn filter_capabilities(&self) -> HashMap<String, Capability> {
        let mut union = HashMap::new();
        for provider in self.list() {
            if let Ok(capabilities) = provider.filter_capabilities().await {
                for (name, capability) in capabilities {
                    union.entry(name).or_insert(capability);
                }
            }
        }
        union
    }

    pub async fn get_filter_values(&self, attribute: &str) -> Result<Vec<FilterValueOption>> {
        for provider in self.list() {
            if let Ok(capabilities) = provider.filter_capabilities().await {
                if capabilities.contains_key(attribute) {
                    return provider.filter_values(attribute).await;
                }
            }
        }
        Ok(Vec::new())
    }

    pub async fn shutdown_all(&self) {
        for provider in self.list() {
            if let Err(err) = provider.shutdown().await {
                tracing::warn!(provider = provider.name(), error = %err, "provider shutdown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeDefinition;
    use async_trait::async_trait;

    struct StubProvider {
        id: &'static str,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.id
        }

        async fn initialize(&self, _config: &ProviderConfig) -> anyhow::Result<()> {
            Ok(())
        }

        async fn hydrate(&self, resource_id: &str) -> anyhow::Result<Entity> {
            Ok(Entity {
                id: EntityId::new(self.id, "default", resource_id).unwrap(),
                entity_type: "item".to_string(),
                provider: self.id.to_string(),
                title: resource_id.to_string(),
                description: String::new(),
                attributes: HashMap::new(),
                relationships: Vec::new(),
                search_tokens: Vec::new(),
                timestamp: None,
            })
        }

        async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<Entity>> {
            Ok(vec![self.hydrate("r1").await?])
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
    async fn initialize_registers_instance_and_connected_status() {
        let registry = ProviderRegistry::new();
        registry.register("stub", Arc::new(|| Arc::new(StubProvider { id: "stub" })));
        let type_registry = TypeRegistry::new();
        type_registry.register(TypeDefinition::root("item")).unwrap();
        let manager = ProviderManager::new();

        manager
            .initialize(&registry, &type_registry, "stub", &ProviderConfig::new())
            .await
            .unwrap();

        assert!(manager.get("stub").is_some());
        assert!(manager.status().get("stub").unwrap().connected);
    }

    #[tokio::test]
    async fn hydrate_routes_to_the_owning_provider() {
        let registry = ProviderRegistry::new();
        registry.register("stub", Arc::new(|| Arc::new(StubProvider { id: "stub" })));
        let type_registry = TypeRegistry::new();
        let manager = ProviderManager::new();
        manager
            .initialize(&registry, &type_registry, "stub", &ProviderConfig::new())
            .await
            .unwrap();

        let id = EntityId::new("stub", "default", "r42").unwrap();
        let entity = manager.hydrate(&id).await.unwrap();
        assert_eq!(entity.id, id);
    }

    #[tokio::test]
    async fn hydrate_fails_for_unknown_provider_type() {
        let manager = ProviderManager::new();
        let id = EntityId::new("missing", "default", "r1").unwrap();
        assert!(manager.hydrate(&id).await.is_err());
    }
}
