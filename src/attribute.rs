// Attribute definitions: the semantic type plus the filter/facet policy
// attached to every registered attribute name.

use serde::{Deserialize, Serialize};

use crate::types::AttributeType;

/// A single filterable operation an attribute supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

/// Where the facet engine should source an attribute's option list from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    /// Distinct values observed in the current result set.
    FromEntities,
    /// The provider's own enumeration (person lists, album lists, …).
    FromProvider,
    /// Provider's enumeration, counted against the current result set.
    Hybrid,
}

/// Filter policy for one attribute: which operations are legal, whether the
/// provider evaluates the filter itself, and how facet values are sourced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub ops: Vec<FilterOp>,
    #[serde(default)]
    pub cacheable: bool,
    pub cache_ttl_seconds: Option<u64>,
    /// If true, the provider resolves this filter server-side; the core
    /// must not re-evaluate it against entity attributes.
    #[serde(default)]
    pub provider_level: bool,
    pub value_source: ValueSource,
    #[serde(default)]
    pub show_zero_count: bool,
}

impl FilterConfig {
    pub fn supports(&self, op: FilterOp) -> bool {
        self.ops.contains(&op)
    }
}

/// UI hints are opaque to the core; they pass through to the client
/// verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiHints {
    pub widget: Option<String>,
    pub icon: Option<String>,
    pub group: Option<String>,
    pub label: Option<String>,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub always_visible: bool,
    #[serde(default)]
    pub ui: UiHints,
    pub filter: Option<FilterConfig>,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            required: false,
            filterable: false,
            always_visible: false,
            ui: UiHints::default(),
            filter: None,
        }
    }

    pub fn filterable_with(mut self, filter: FilterConfig) -> Self {
        self.filterable = true;
        self.filter = Some(filter);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn always_visible(mut self) -> Self {
        self.always_visible = true;
        self
    }
}

/// A provider's self-description of what it supports for one attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    pub supports_eq: bool,
    pub supports_neq: bool,
    pub supports_range: bool,
    pub supports_contains: bool,
    pub options: Option<Vec<String>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub description: Option<String>,
}
