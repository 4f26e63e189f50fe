// Core data model: the normalized Entity, its typed attributes, and the
// validated newtypes that enforce invariants at construction time instead
// of scattering checks across the pipeline.

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kinds of outgoing relationship an entity can declare. Providers are free
/// to invent their own via `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Contains,
    ContainedBy,
    References,
    TaggedWith,
    SimilarTo,
    Custom(String),
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Contains => write!(f, "contains"),
            RelationKind::ContainedBy => write!(f, "contained_by"),
            RelationKind::References => write!(f, "references"),
            RelationKind::TaggedWith => write!(f, "tagged_with"),
            RelationKind::SimilarTo => write!(f, "similar_to"),
            RelationKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// The declared semantic type of an attribute value. Deserialization of
/// provider data is directed by this, rather than by runtime type
/// inspection of an opaque value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Int,
    Int64,
    Float,
    Float64,
    Bool,
    Time,
    Gps,
    StringSlice,
}

/// A single typed attribute value, tagged by `AttributeType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AttributeValue {
    String(String),
    Int(i32),
    Int64(i64),
    Float(f32),
    Float64(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Gps { lat: f64, lon: f64 },
    StringSlice(Vec<String>),
}

impl AttributeValue {
    pub fn type_of(&self) -> AttributeType {
        match self {
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::Int64(_) => AttributeType::Int64,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::Float64(_) => AttributeType::Float64,
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Time(_) => AttributeType::Time,
            AttributeValue::Gps { .. } => AttributeType::Gps,
            AttributeValue::StringSlice(_) => AttributeType::StringSlice,
        }
    }

    /// Flatten to a comparable string, used by the in-memory ranker's text
    /// match scoring and by the external index upsert.
    pub fn as_searchable_text(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Int(v) => v.to_string(),
            AttributeValue::Int64(v) => v.to_string(),
            AttributeValue::Float(v) => v.to_string(),
            AttributeValue::Float64(v) => v.to_string(),
            AttributeValue::Bool(v) => v.to_string(),
            AttributeValue::Time(v) => v.to_rfc3339(),
            AttributeValue::Gps { lat, lon } => format!("{lat},{lon}"),
            AttributeValue::StringSlice(values) => values.join(", "),
        }
    }
}

/// A provider-qualified, globally unique entity identifier of the form
/// `providerType:instanceID:resourceID`. Providers only ever see
/// `resourceID`; the core adds the prefix on the way out and strips it on
/// the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EntityId {
    provider_type: String,
    instance_id: String,
    resource_id: String,
}

impl EntityId {
    pub fn new(
        provider_type: impl Into<String>,
        instance_id: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Result<Self> {
        let provider_type = provider_type.into();
        let instance_id = instance_id.into();
        let resource_id = resource_id.into();

        ensure!(!provider_type.is_empty(), "entity id provider type is empty");
        ensure!(!instance_id.is_empty(), "entity id instance id is empty");
        ensure!(!resource_id.is_empty(), "entity id resource id is empty");
        ensure!(
            !provider_type.contains(':') && !instance_id.contains(':'),
            "entity id provider type and instance id must not contain ':'"
        );

        Ok(Self {
            provider_type,
            instance_id,
            resource_id,
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let provider_type = parts.next().unwrap_or_default();
        let instance_id = parts.next().ok_or_else(|| {
            anyhow::anyhow!("entity id \"{raw}\" is missing the instance id segment")
        })?;
        let resource_id = parts.next().ok_or_else(|| {
            anyhow::anyhow!("entity id \"{raw}\" is missing the resource id segment")
        })?;
        Self::new(provider_type, instance_id, resource_id)
    }

    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider_type, self.instance_id, self.resource_id)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for EntityId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

/// An outgoing relationship from one entity to another, as declared by the
/// owning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationKind,
    pub target_id: String,
}

/// The normalized record every provider response is mapped into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub provider: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub search_tokens: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Entity {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// A validated page size, bounded by a configured maximum so a caller can't
/// force the gateway to rank and return an unbounded result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatedLimit {
    inner: usize,
}

impl ValidatedLimit {
    pub const DEFAULT: usize = 24;

    pub fn new(requested: Option<usize>, max: usize) -> Result<Self> {
        let value = requested.unwrap_or(Self::DEFAULT);
        ensure!(value > 0, "limit must be greater than zero");
        ensure!(value <= max, "limit {value} exceeds maximum of {max}");
        Ok(Self { inner: value })
    }

    pub fn get(&self) -> usize {
        self.inner
    }
}

/// A validated pagination offset; any non-negative value is legal, it is the
/// caller's problem if it lands past the end (that returns an empty page,
/// not an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ValidatedOffset {
    inner: usize,
}

impl ValidatedOffset {
    pub fn new(requested: Option<usize>) -> Self {
        Self {
            inner: requested.unwrap_or(0),
        }
    }

    pub fn get(&self) -> usize {
        self.inner
    }
}
