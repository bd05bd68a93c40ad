//! Conversions between yrs values and the JSON-based types used by records

use super::delta::{normalize, Attributes, Content, Delta};
use serde_json::{Number, Value};
use std::sync::Arc;
use yrs::types::{Attrs, Delta as YDelta};
use yrs::{Any, Out};

pub(crate) fn any_to_json(any: &Any) -> Value {
    match any {
        Any::Null | Any::Undefined => Value::Null,
        Any::Bool(value) => Value::Bool(*value),
        Any::Number(value) => number_to_json(*value),
        Any::BigInt(value) => Value::from(*value),
        Any::String(value) => Value::String(value.to_string()),
        Any::Buffer(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        Any::Array(items) => Value::Array(items.iter().map(any_to_json).collect()),
        Any::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), any_to_json(value)))
                .collect(),
        ),
    }
}

/// Whole numbers come back as JSON integers, like JavaScript prints them
fn number_to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

pub(crate) fn json_to_any(value: &Value) -> Any {
    match value {
        Value::Null => Any::Null,
        Value::Bool(value) => Any::Bool(*value),
        Value::Number(value) => Any::Number(value.as_f64().unwrap_or_default()),
        Value::String(value) => Any::String(Arc::from(value.as_str())),
        Value::Array(items) => Any::Array(items.iter().map(json_to_any).collect()),
        Value::Object(entries) => Any::Map(Arc::new(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), json_to_any(value)))
                .collect(),
        )),
    }
}

pub(crate) fn attrs_from_json(attributes: &Attributes) -> Attrs {
    attributes
        .iter()
        .map(|(key, value)| (Arc::from(key.as_str()), json_to_any(value)))
        .collect()
}

fn attrs_to_json(attrs: &Attrs) -> Option<Attributes> {
    if attrs.is_empty() {
        return None;
    }
    Some(
        attrs
            .iter()
            .map(|(key, value)| (key.to_string(), any_to_json(value)))
            .collect(),
    )
}

fn content_from_out(value: &Out) -> Content {
    match value {
        Out::Any(Any::String(text)) => Content::Text(text.to_string()),
        Out::Any(any) => Content::Embed(any_to_json(any)),
        // Nested shared types have no JSON form of their own
        _ => Content::Embed(Value::Null),
    }
}

/// Translate a yrs event delta into a normalized [`Delta`] list
pub(crate) fn delta_from_yrs(delta: &[YDelta]) -> Vec<Delta> {
    normalize(delta.iter().map(|entry| match entry {
        YDelta::Inserted(value, attrs) => Delta::Insert {
            content: content_from_out(value),
            attributes: attrs.as_deref().and_then(attrs_to_json),
        },
        YDelta::Deleted(len) => Delta::Delete(*len as usize),
        YDelta::Retain(len, attrs) => Delta::Retain {
            len: *len as usize,
            attributes: attrs.as_deref().and_then(attrs_to_json),
        },
    }))
}
