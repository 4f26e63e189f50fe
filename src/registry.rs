// Type Registry: the single-rooted forest of entity type definitions and
// their effective (ancestor-overlaid) attribute sets.

use anyhow::{ensure, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::attribute::AttributeDef;

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub parent: Option<String>,
    pub attributes: HashMap<String, AttributeDef>,
}

impl TypeDefinition {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            attributes: HashMap::new(),
        }
    }

    pub fn child_of(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, def: AttributeDef) -> Self {
        self.attributes.insert(def.name.clone(), def);
        self
    }
}

/// Registers entity types and their attribute schemas. Reads (ancestry
/// lookups, attribute resolution) vastly outnumber writes (registration
/// happens once, at provider initialization), hence the reader-preferring
/// lock.
pub struct TypeRegistry {
    types: RwLock<HashMap<String, TypeDefinition>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, def: TypeDefinition) -> Result<()> {
        let mut types = self.types.write();
        ensure!(
            !types.contains_key(&def.name),
            "type \"{}\" is already registered",
            def.name
        );
        if let Some(parent) = &def.parent {
            ensure!(
                types.contains_key(parent),
                "type \"{}\" declares unknown parent \"{}\"",
                def.name,
                parent
            );
        }
        types.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<TypeDefinition> {
        self.types.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Every registered type, in no particular order. Backs the `/types`
    /// listing endpoint.
    pub fn list(&self) -> Vec<TypeDefinition> {
        self.types.read().values().cloned().collect()
    }

    /// Root-first chain of ancestors, not including `name` itself.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let types = self.types.read();
        let mut chain = Vec::new();
        let mut current = types.get(name).and_then(|t| t.parent.clone());
        while let Some(parent_name) = current {
            chain.push(parent_name.clone());
            current = types.get(&parent_name).and_then(|t| t.parent.clone());
        }
        chain.reverse();
        chain
    }

    pub fn descendants(&self, name: &str) -> Vec<String> {
        let types = self.types.read();
        types
            .values()
            .filter(|t| self.is_type_of_locked(&types, &t.name, name) && t.name != name)
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn is_type_of(&self, name: &str, ancestor: &str) -> bool {
        let types = self.types.read();
        self.is_type_of_locked(&types, name, ancestor)
    }

    fn is_type_of_locked(
        &self,
        types: &HashMap<String, TypeDefinition>,
        name: &str,
        ancestor: &str,
    ) -> bool {
        if name == ancestor {
            return true;
        }
        let mut current = types.get(name).and_then(|t| t.parent.clone());
        while let Some(parent_name) = current {
            if parent_name == ancestor {
                return true;
            }
            current = types.get(&parent_name).and_then(|t| t.parent.clone());
        }
        false
    }

    /// Flattens every registered type's attributes into one mapping,
    /// last-write-wins on name collisions. Used to drive generic facet
    /// rendering across all types at once (e.g. a blank search).
    pub fn all_attributes(&self) -> HashMap<String, AttributeDef> {
        let types = self.types.read();
        let mut flattened = HashMap::new();
        for def in types.values() {
            for (name, attr) in &def.attributes {
                flattened.insert(name.clone(), attr.clone());
            }
        }
        flattened
    }

    /// The effective attribute set for a type: ancestors' attributes first,
    /// overlaid by the type's own.
    pub fn attributes_of(&self, type_name: &str) -> HashMap<String, AttributeDef> {
        let types = self.types.read();
        let mut effective = HashMap::new();
        let mut chain = self.ancestors(type_name);
        chain.push(type_name.to_string());
        for name in chain {
            if let Some(def) = types.get(&name) {
                for (attr_name, attr) in &def.attributes {
                    effective.insert(attr_name.clone(), attr.clone());
                }
            }
        }
        effective
    }

    /// Checks that every `required` attribute in the type's effective set is
    /// present on the entity.
    pub fn validate_entity(&self, entity_type: &str, present: &[String]) -> Result<()> {
        let effective = self.attributes_of(entity_type);
        let missing: Vec<&str> = effective
            .values()
            .filter(|def| def.required && !present.iter().any(|p| p == &def.name))
            .map(|def| def.name.as_str())
            .collect();
        ensure!(
            missing.is_empty(),
            "entity of type \"{entity_type}\" is missing required attributes: {}",
            missing.join(", ")
        );
        Ok(())
    }

    /// Registers an attribute-extension overlay contributed by a provider at
    /// initialization time; applied once, not per request.
    pub fn extend_attributes(&self, type_name: &str, extensions: HashMap<String, AttributeDef>) -> Result<()> {
        let mut types = self.types.write();
        let def = types
            .get_mut(type_name)
            .ok_or_else(|| anyhow::anyhow!("cannot extend unknown type \"{type_name}\""))?;
        def.attributes.extend(extensions);
        Ok(())
    }

    /// Overlays a provider's attribute extensions onto every registered
    /// type. The `Provider::attribute_extensions` contract is not itself
    /// type-scoped, so a provider's extra attributes (e.g. a photo
    /// provider's `person` facet) are offered everywhere and simply go
    /// unused by types whose entities never populate them.
    pub fn extend_all_types(&self, extensions: &HashMap<String, AttributeDef>) {
        if extensions.is_empty() {
            return;
        }
        let mut types = self.types.write();
        for def in types.values_mut() {
            def.attributes.extend(extensions.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::FilterConfig;
    use crate::attribute::ValueSource;
    use crate::types::AttributeType;

    fn sample_registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(TypeDefinition::root("item")).unwrap();
        registry
            .register(TypeDefinition::child_of("item.file", "item"))
            .unwrap();
        registry
            .register(
                TypeDefinition::child_of("item.file.media.image", "item.file")
                    .with_attribute(AttributeDef::new("width", AttributeType::Int)),
            )
            .unwrap();
        registry
    }

    #[test]
    fn registration_rejects_unknown_parent_and_duplicates() {
        let registry = TypeRegistry::new();
        assert!(registry
            .register(TypeDefinition::child_of("orphan", "missing"))
            .is_err());
        registry.register(TypeDefinition::root("item")).unwrap();
        assert!(registry.register(TypeDefinition::root("item")).is_err());
    }

    #[test]
    fn ancestry_and_descendants_resolve_through_the_chain() {
        let registry = sample_registry();
        assert_eq!(
            registry.ancestors("item.file.media.image"),
            vec!["item".to_string(), "item.file".to_string()]
        );
        assert!(registry.is_type_of("item.file.media.image", "item"));
        assert!(!registry.is_type_of("item", "item.file"));
        assert!(registry
            .descendants("item")
            .contains(&"item.file.media.image".to_string()));
    }

    #[test]
    fn attributes_of_overlays_ancestor_attributes() {
        let registry = sample_registry();
        let effective = registry.attributes_of("item.file.media.image");
        assert!(effective.contains_key("width"));
    }

    #[test]
    fn extend_attributes_overlays_provider_extensions_once() {
        let registry = sample_registry();
        let mut extensions = HashMap::new();
        extensions.insert(
            "person".to_string(),
            AttributeDef::new("person", AttributeType::StringSlice).filterable_with(FilterConfig {
                ops: vec![],
                cacheable: true,
                cache_ttl_seconds: Some(3600),
                provider_level: false,
                value_source: ValueSource::FromProvider,
                show_zero_count: true,
            }),
        );
        registry
            .extend_attributes("item.file.media.image", extensions)
            .unwrap();
        assert!(registry
            .attributes_of("item.file.media.image")
            .contains_key("person"));
    }

    #[test]
    fn list_returns_every_registered_type() {
        let registry = sample_registry();
        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"item.file.media.image".to_string()));
    }

    #[test]
    fn validate_entity_flags_missing_required_attributes() {
        let registry = TypeRegistry::new();
        registry
            .register(
                TypeDefinition::root("item").with_attribute(AttributeDef::new("title", AttributeType::String).required()),
            )
            .unwrap();
        assert!(registry.validate_entity("item", &[]).is_err());
        assert!(registry
            .validate_entity("item", &["title".to_string()])
            .is_ok());
    }
}
