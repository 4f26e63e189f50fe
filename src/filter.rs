// Filter Parser & Validator: turns the untyped `{ attribute -> spec }`
// object from a request into a typed `FilterValue` map, against the
// attribute definitions in the Type Registry. Errors never short-circuit:
// every attribute is attempted and every failure is collected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::attribute::{AttributeDef, FilterOp};
use crate::types::AttributeType;

/// One failed filter, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// All filter-parsing failures for one request. Never short-circuits:
/// every input attribute is attempted independently.
#[derive(Debug, Clone, Default, thiserror::Error)]
#[error("filter validation failed: {0:?}")]
pub struct MultiValidationError(pub Vec<FieldError>);

impl MultiValidationError {
    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_details(self) -> Vec<FieldError> {
        self.0
    }
}

/// A typed, validated filter ready to be matched against entity attributes
/// or routed to a provider for server-side evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterValue {
    StringFilter { op: FilterOp, value: String },
    IntFilter { op: FilterOp, value: i64 },
    FloatFilter { op: FilterOp, value: f64 },
    BoolFilter { op: FilterOp, value: bool },
    TimeFilter { op: FilterOp, value: DateTime<Utc> },
    StringSliceFilter { op: FilterOp, values: Vec<String> },
    RangeFilter { min: Option<f64>, max: Option<f64> },
    DateRangeFilter {
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    },
}

impl FilterValue {
    pub fn op(&self) -> Option<FilterOp> {
        match self {
            FilterValue::StringFilter { op, .. }
            | FilterValue::IntFilter { op, .. }
            | FilterValue::FloatFilter { op, .. }
            | FilterValue::BoolFilter { op, .. }
            | FilterValue::TimeFilter { op, .. }
            | FilterValue::StringSliceFilter { op, .. } => Some(*op),
            FilterValue::RangeFilter { .. } | FilterValue::DateRangeFilter { .. } => None,
        }
    }

    /// Checks type compatibility with `def` and that `def.filter` advertises
    /// the requested operation.
    pub fn validate(&self, def: &AttributeDef) -> Result<(), String> {
        let filter_cfg = def
            .filter
            .as_ref()
            .ok_or_else(|| format!("attribute \"{}\" is not filterable", def.name))?;

        if let Some(op) = self.op() {
            if !filter_cfg.supports(op) {
                return Err(format!(
                    "attribute \"{}\" does not support operation {op:?}",
                    def.name
                ));
            }
        }

        let type_matches = matches!(
            (self, def.attribute_type),
            (FilterValue::StringFilter { .. }, AttributeType::String)
                | (
                    FilterValue::IntFilter { .. },
                    AttributeType::Int | AttributeType::Int64
                )
                | (
                    FilterValue::FloatFilter { .. },
                    AttributeType::Float | AttributeType::Float64
                )
                | (FilterValue::BoolFilter { .. }, AttributeType::Bool)
                | (FilterValue::TimeFilter { .. }, AttributeType::Time)
                | (FilterValue::StringSliceFilter { .. }, AttributeType::StringSlice)
                | (
                    FilterValue::RangeFilter { .. },
                    AttributeType::Int | AttributeType::Int64 | AttributeType::Float | AttributeType::Float64
                )
                | (FilterValue::DateRangeFilter { .. }, AttributeType::Time)
        );
        if !type_matches {
            return Err(format!(
                "attribute \"{}\" is {:?}, incompatible with the given filter",
                def.name, def.attribute_type
            ));
        }

        if let FilterValue::RangeFilter { min, max } = self {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err("range min cannot be greater than max".to_string());
                }
            }
        }
        if let FilterValue::DateRangeFilter { min, max } = self {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err("range min cannot be greater than max".to_string());
                }
            }
        }

        Ok(())
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn coerce_string_slice(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

fn build_scalar(def: &AttributeDef, op: FilterOp, value: &Value, field: &str) -> Result<FilterValue, String> {
    match def.attribute_type {
        AttributeType::String => value
            .as_str()
            .map(|s| FilterValue::StringFilter { op, value: s.to_string() })
            .ok_or_else(|| format!("expected string value for {op:?}, got {value}")),
        AttributeType::Int | AttributeType::Int64 => coerce_number(value)
            .map(|n| FilterValue::IntFilter { op, value: n as i64 })
            .ok_or_else(|| format!("expected numeric value for {op:?}, got {value}")),
        AttributeType::Float | AttributeType::Float64 => coerce_number(value)
            .map(|n| FilterValue::FloatFilter { op, value: n })
            .ok_or_else(|| format!("expected numeric value for {op:?}, got {value}")),
        AttributeType::Bool => value
            .as_bool()
            .map(|b| FilterValue::BoolFilter { op, value: b })
            .ok_or_else(|| format!("expected boolean value for {op:?}, got {value}")),
        AttributeType::Time => coerce_time(value)
            .map(|t| FilterValue::TimeFilter { op, value: t })
            .ok_or_else(|| format!("expected RFC3339 timestamp for {op:?}, got {value}")),
        AttributeType::StringSlice => coerce_string_slice(value)
            .map(|values| FilterValue::StringSliceFilter { op, values })
            .ok_or_else(|| format!("expected array of strings for {op:?}, got {value}")),
        AttributeType::Gps => Err(format!("attribute \"{field}\" (gps) does not support scalar filters")),
    }
}

fn op_key(key: &str) -> Option<FilterOp> {
    match key {
        "eq" => Some(FilterOp::Eq),
        "neq" => Some(FilterOp::Neq),
        "gt" => Some(FilterOp::Gt),
        "gte" => Some(FilterOp::Gte),
        "lt" => Some(FilterOp::Lt),
        "lte" => Some(FilterOp::Lte),
        "contains" => Some(FilterOp::Contains),
        "in" => Some(FilterOp::In),
        _ => None,
    }
}

fn parse_one(field: &str, spec: &Value, def: &AttributeDef) -> Result<FilterValue, String> {
    match spec {
        Value::Object(map) => {
            let has_range_bounds = map.contains_key("min") || map.contains_key("max");
            if has_range_bounds {
                let min_val = map.get("min");
                let max_val = map.get("max");
                if min_val.is_none() && max_val.is_none() {
                    return Err("range filter requires at least one of min or max".to_string());
                }
                return match def.attribute_type {
                    AttributeType::Time => {
                        let min = min_val.map(coerce_time).transpose().flatten_or_err(field, "min")?;
                        let max = max_val.map(coerce_time).transpose().flatten_or_err(field, "max")?;
                        Ok(FilterValue::DateRangeFilter { min, max })
                    }
                    _ => {
                        let min = min_val.map(coerce_number).transpose().flatten_or_err(field, "min")?;
                        let max = max_val.map(coerce_number).transpose().flatten_or_err(field, "max")?;
                        Ok(FilterValue::RangeFilter { min, max })
                    }
                };
            }

            for (key, value) in map {
                if key == "in" {
                    let values = coerce_string_slice(value)
                        .ok_or_else(|| format!("expected array for \"in\", got {value}"))?;
                    return Ok(FilterValue::StringSliceFilter {
                        op: FilterOp::In,
                        values,
                    });
                }
                if let Some(op) = op_key(key) {
                    return build_scalar(def, op, value, field);
                }
            }
            Err(format!("no recognized filter operation in {spec}"))
        }
        scalar => build_scalar(def, FilterOp::Eq, scalar, field),
    }
}

/// Helper trait to turn `Option<Option<T>>` with a parse failure into a
/// field-scoped error without hand-rolled matching at each call site.
trait FlattenOrErr<T> {
    fn flatten_or_err(self, field: &str, bound: &str) -> Result<Option<T>, String>;
}

impl<T> FlattenOrErr<T> for Option<Option<T>> {
    fn flatten_or_err(self, field: &str, bound: &str) -> Result<Option<T>, String> {
        match self {
            None => Ok(None),
            Some(None) => Err(format!("could not parse \"{bound}\" bound for attribute \"{field}\"")),
            Some(Some(v)) => Ok(Some(v)),
        }
    }
}

/// Parses and validates an entire request filter object. Every attribute is
/// attempted; failures accumulate in the returned `MultiValidationError`
/// rather than aborting early.
pub fn parse_filters(
    raw: &HashMap<String, Value>,
    attributes: &HashMap<String, AttributeDef>,
) -> (HashMap<String, FilterValue>, MultiValidationError) {
    let mut parsed = HashMap::new();
    let mut errors = MultiValidationError::default();

    for (field, spec) in raw {
        let def = match attributes.get(field) {
            Some(def) if def.filterable => def,
            Some(_) => {
                errors.push(field, format!("attribute \"{field}\" is not filterable"));
                continue;
            }
            None => {
                errors.push(field, format!("unknown attribute: \"{field}\""));
                continue;
            }
        };

        match parse_one(field, spec, def) {
            Ok(value) => match value.validate(def) {
                Ok(()) => {
                    parsed.insert(field.clone(), value);
                }
                Err(reason) => errors.push(field, reason),
            },
            Err(reason) => errors.push(field, reason),
        }
    }

    (parsed, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{FilterConfig, ValueSource};
    use serde_json::json;

    fn int_attr() -> AttributeDef {
        AttributeDef::new("size", AttributeType::Int64).filterable_with(FilterConfig {
            ops: vec![FilterOp::Eq, FilterOp::Gte, FilterOp::Lte],
            cacheable: false,
            cache_ttl_seconds: None,
            provider_level: false,
            value_source: ValueSource::FromEntities,
            show_zero_count: false,
        })
    }

    fn string_slice_attr() -> AttributeDef {
        AttributeDef::new("person", AttributeType::StringSlice).filterable_with(FilterConfig {
            ops: vec![FilterOp::In],
            cacheable: true,
            cache_ttl_seconds: Some(3600),
            provider_level: true,
            value_source: ValueSource::FromProvider,
            show_zero_count: true,
        })
    }

    #[test]
    fn scalar_spec_builds_an_eq_filter() {
        let mut attributes = HashMap::new();
        attributes.insert("size".to_string(), int_attr());
        let mut raw = HashMap::new();
        raw.insert("size".to_string(), json!(42));

        let (parsed, errors) = parse_filters(&raw, &attributes);
        assert!(errors.is_empty());
        assert_eq!(
            parsed.get("size"),
            Some(&FilterValue::IntFilter {
                op: FilterOp::Eq,
                value: 42
            })
        );
    }

    #[test]
    fn in_spec_accepts_bare_string_as_single_element_array() {
        let mut attributes = HashMap::new();
        attributes.insert("person".to_string(), string_slice_attr());
        let mut raw = HashMap::new();
        raw.insert("person".to_string(), json!({"in": "p1"}));

        let (parsed, errors) = parse_filters(&raw, &attributes);
        assert!(errors.is_empty());
        assert_eq!(
            parsed.get("person"),
            Some(&FilterValue::StringSliceFilter {
                op: FilterOp::In,
                values: vec!["p1".to_string()]
            })
        );
    }

    #[test]
    fn unknown_attribute_and_type_mismatch_both_collect_without_short_circuiting() {
        let mut attributes = HashMap::new();
        attributes.insert("size".to_string(), int_attr());
        let mut raw = HashMap::new();
        raw.insert("size".to_string(), json!({"gte": "big"}));
        raw.insert("color".to_string(), json!({"eq": "red"}));

        let (parsed, errors) = parse_filters(&raw, &attributes);
        assert!(parsed.is_empty());
        assert_eq!(errors.0.len(), 2);
        assert!(errors.0.iter().any(|e| e.field == "size"));
        assert!(errors.0.iter().any(|e| e.field == "color" && e.reason.contains("unknown attribute")));
    }

    #[test]
    fn range_filter_rejects_min_greater_than_max() {
        let mut attributes = HashMap::new();
        attributes.insert("size".to_string(), int_attr());
        let mut raw = HashMap::new();
        raw.insert("size".to_string(), json!({"min": 100, "max": 10}));

        let (parsed, errors) = parse_filters(&raw, &attributes);
        assert!(parsed.is_empty());
        assert_eq!(errors.0[0].reason, "range min cannot be greater than max");
    }

    #[test]
    fn time_filter_coerces_a_numeric_epoch_operand() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "createdAt".to_string(),
            AttributeDef::new("createdAt", AttributeType::Time).filterable_with(FilterConfig {
                ops: vec![FilterOp::Gte],
                cacheable: false,
                cache_ttl_seconds: None,
                provider_level: false,
                value_source: ValueSource::FromEntities,
                show_zero_count: false,
            }),
        );
        let mut raw = HashMap::new();
        raw.insert("createdAt".to_string(), json!({"gte": 1_700_000_000}));

        let (parsed, errors) = parse_filters(&raw, &attributes);
        assert!(errors.is_empty());
        assert_eq!(
            parsed.get("createdAt"),
            Some(&FilterValue::TimeFilter {
                op: FilterOp::Gte,
                value: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            })
        );
    }

    #[test]
    fn non_filterable_attribute_is_reported() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "title".to_string(),
            AttributeDef::new("title", AttributeType::String),
        );
        let mut raw = HashMap::new();
        raw.insert("title".to_string(), json!("hello"));

        let (parsed, errors) = parse_filters(&raw, &attributes);
        assert!(parsed.is_empty());
        assert!(errors.0[0].reason.contains("not filterable"));
    }
}
