//! Field normalization of raw lead payloads.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::mapping::{sanitize_value, scalar_to_string};
use crate::payload::RawLeadPayload;

/// Lower-cased field name -> single string value.
///
/// Built once per lead by [`FieldNormalizer::normalize`] and read-only after
/// that. Iteration order is the sorted key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedFields(BTreeMap<String, String>);

impl NormalizedFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for NormalizedFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        )
    }
}

/// Flattens a lead payload into [`NormalizedFields`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldNormalizer;

impl FieldNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a lead payload.
    ///
    /// Each `field_data` entry contributes `lowercase(name) -> values[0]`;
    /// entries without a name or with an empty first value are skipped, and
    /// a later entry with the same name replaces an earlier one. Top-level
    /// scalar keys are then added only where the key is not already present.
    pub fn normalize(&self, payload: &RawLeadPayload) -> NormalizedFields {
        let mut fields = BTreeMap::new();

        for entry in payload.field_data() {
            let Some(name) = entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
            else {
                continue;
            };

            let Some(value) = entry.get("values").and_then(first_value) else {
                continue;
            };

            fields.insert(name.to_lowercase(), value);
        }

        for (key, value) in payload.as_map() {
            if key == "field_data" {
                continue;
            }
            let key = key.to_lowercase();
            if fields.contains_key(&key) {
                continue;
            }
            if let Some(value) = scalar_to_string(value) {
                fields.insert(key, value);
            }
        }

        NormalizedFields(fields)
    }
}

/// First element of a `values` array (or a bare scalar), if non-empty.
fn first_value(values: &Value) -> Option<String> {
    let first = match values {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let rendered = match first {
        Value::Array(_) => sanitize_value(first),
        other => scalar_to_string(other)?,
    };

    (!rendered.is_empty()).then_some(rendered)
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
