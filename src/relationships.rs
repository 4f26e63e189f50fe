// Relationship Traversal: expands an entity's outgoing relationships to a
// bounded depth, grouped by kind, with cycle prevention and per-edge
// error isolation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::provider_manager::ProviderManager;
use crate::types::{Entity, EntityId};

#[derive(Debug, Clone)]
pub struct ExpandedEntity {
    pub entity: Entity,
    pub related: HashMap<String, Vec<Entity>>,
}

pub struct RelationshipTraversal {
    manager: Arc<ProviderManager>,
}

impl RelationshipTraversal {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self { manager }
    }

    pub async fn expand(&self, id: &EntityId, max_depth: u32) -> anyhow::Result<ExpandedEntity> {
        let entity = self.manager.hydrate(id).await?;
        if max_depth == 0 {
            return Ok(ExpandedEntity {
                entity,
                related: HashMap::new(),
            });
        }

        let mut visited = HashSet::new();
        visited.insert(id.to_string());
        let related = self.expand_relationships(&entity, max_depth, &mut visited).await;

        Ok(ExpandedEntity { entity, related })
    }

    async fn expand_relationships(
        &self,
        entity: &Entity,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> HashMap<String, Vec<Entity>> {
        let mut grouped: HashMap<String, Vec<Entity>> = HashMap::new();

        for relationship in &entity.relationships {
            if visited.contains(&relationship.target_id) {
                continue;
            }
            // Validates the edge's target id is well-formed before
            // following it; the id itself isn't the argument to
            // get_related, which expands from the entity being expanded.
            if EntityId::parse(&relationship.target_id).is_err() {
                continue;
            }
            visited.insert(relationship.target_id.clone());

            match self.manager.get_related(&entity.id, Some(&relationship.kind.to_string())).await {
                Ok(mut targets) => {
                    if depth > 1 {
                        for target in &targets {
                            // Errors per relationship are logged and
                            // skipped, never fatal to the whole expansion.
                            if let Err(err) = Box::pin(self.expand_nested(target, depth - 1, visited)).await {
                                tracing::warn!(error = %err, "relationship expansion failed for one target");
                            }
                        }
                    }
                    grouped.entry(relationship.kind.to_string()).or_default().append(&mut targets);
                }
                Err(err) => {
                    tracing::warn!(error = %err, kind = %relationship.kind, "failed to fetch related entities");
                }
            }
        }

        grouped
    }

    async fn expand_nested(
        &self,
        entity: &Entity,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> anyhow::Result<()> {
        if depth == 0 {
            return Ok(());
        }
        self.expand_relationships(entity, depth, visited).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Capability;
    use crate::provider::{FilterValueOption, Provider, ProviderConfig};
    use crate::query::SearchQuery;
    use crate::registry::TypeRegistry;
    use crate::types::RelationKind;
    use async_trait::async_trait;

    struct GraphProvider;

    #[async_trait]
    impl Provider for GraphProvider {
        fn name(&self) -> &str {
            "graph"
        }

        async fn initialize(&self, _config: &ProviderConfig) -> anyhow::Result<()> {
            Ok(())
        }

        async fn hydrate(&self, resource_id: &str) -> anyhow::Result<Entity> {
            let relationships = if resource_id == "root" {
                vec![crate::types::Relationship {
                    kind: RelationKind::Contains,
                    target_id: EntityId::new("graph", "default", "child").unwrap().to_string(),
                }]
            } else {
                Vec::new()
            };
            Ok(Entity {
                id: EntityId::new("graph", "default", resource_id).unwrap(),
                entity_type: "item".to_string(),
                provider: "graph".to_string(),
                title: resource_id.to_string(),
                description: String::new(),
                attributes: HashMap::new(),
                relationships,
                search_tokens: Vec::new(),
                timestamp: None,
            })
        }

        async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<Entity>> {
            Ok(Vec::new())
        }

        async fn get_related(&self, _resource_id: &str, _kind: Option<&str>) -> anyhow::Result<Vec<Entity>> {
            Ok(vec![self.hydrate("child").await?])
        }

        async fn filter_capabilities(&self) -> anyhow::Result<HashMap<String, Capability>> {
            Ok(HashMap::new())
        }

        async fn filter_values(&self, _attribute: &str) -> anyhow::Result<Vec<FilterValueOption>> {
            Ok(Vec::new())
        }
    }

    async fn manager_with_graph() -> Arc<ProviderManager> {
        use crate::provider_manager::ProviderRegistry;

        let provider_registry = ProviderRegistry::new();
        provider_registry.register("graph", Arc::new(|| Arc::new(GraphProvider)));
        let type_registry = TypeRegistry::new();
        let manager = Arc::new(ProviderManager::new());
        manager
            .initialize(&provider_registry, &type_registry, "graph", &ProviderConfig::new())
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn depth_zero_returns_bare_entity() {
        let manager = manager_with_graph().await;
        let traversal = RelationshipTraversal::new(manager);
        let id = EntityId::new("graph", "default", "root").unwrap();
        let expanded = traversal.expand(&id, 0).await.unwrap();
        assert!(expanded.related.is_empty());
    }

    #[tokio::test]
    async fn depth_one_groups_related_entities_by_kind() {
        let manager = manager_with_graph().await;
        let traversal = RelationshipTraversal::new(manager);
        let id = EntityId::new("graph", "default", "root").unwrap();
        let expanded = traversal.expand(&id, 1).await.unwrap();
        assert_eq!(expanded.related.get("contains").unwrap().len(), 1);
    }

    /// Records the resource id it was called with, so a test can assert
    /// `get_related` is invoked for the entity being expanded, not for the
    /// target of the specific relationship edge.
    struct RecordingProvider {
        calls: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "graph"
        }

        async fn initialize(&self, _config: &ProviderConfig) -> anyhow::Result<()> {
            Ok(())
        }

        async fn hydrate(&self, resource_id: &str) -> anyhow::Result<Entity> {
            let relationships = if resource_id == "root" {
                vec![crate::types::Relationship {
                    kind: RelationKind::Contains,
                    target_id: EntityId::new("graph", "default", "child").unwrap().to_string(),
                }]
            } else {
                Vec::new()
            };
            Ok(Entity {
                id: EntityId::new("graph", "default", resource_id).unwrap(),
                entity_type: "item".to_string(),
                provider: "graph".to_string(),
                title: resource_id.to_string(),
                description: String::new(),
                attributes: HashMap::new(),
                relationships,
                search_tokens: Vec::new(),
                timestamp: None,
            })
        }

        async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<Entity>> {
            Ok(Vec::new())
        }

        async fn get_related(&self, resource_id: &str, _kind: Option<&str>) -> anyhow::Result<Vec<Entity>> {
            self.calls.lock().unwrap().push(resource_id.to_string());
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
    async fn get_related_is_called_with_the_expanding_entity_not_the_edge_target() {
        use crate::provider_manager::ProviderRegistry;

        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls_for_factory = Arc::clone(&calls);
        let provider_registry = ProviderRegistry::new();
        provider_registry.register(
            "graph",
            Arc::new(move || {
                Arc::new(RecordingProvider {
                    calls: Arc::clone(&calls_for_factory),
                }) as Arc<dyn Provider>
            }),
        );
        let type_registry = TypeRegistry::new();
        let manager = Arc::new(ProviderManager::new());
        manager
            .initialize(&provider_registry, &type_registry, "graph", &ProviderConfig::new())
            .await
            .unwrap();

        let traversal = RelationshipTraversal::new(manager);
        let id = EntityId::new("graph", "default", "root").unwrap();
        traversal.expand(&id, 1).await.unwrap();

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            ["root"],
            "get_related must be called with the expanding entity's own id, not the edge's target id"
        );
    }
}
