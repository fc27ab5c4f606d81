//! Field mapping from normalized form fields onto contact attributes.
//!
//! A [`FieldMapping`] has two tables. The `standard` table maps a form field
//! onto a contact attribute (`phone_number -> phone`); the `custom` table maps
//! a form field onto a metadata key stored alongside the contact. Values are
//! sanitized on the way through and a missing first/last name is derived
//! from a full name when the form only collected that.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::normalizer::NormalizedFields;

/// Default form field to contact attribute table.
const DEFAULT_STANDARD_MAPPING: &[(&str, &str)] = &[
    ("full_name", "full_name"),
    ("first_name", "first_name"),
    ("last_name", "last_name"),
    ("name", "full_name"),
    ("email", "email"),
    ("phone_number", "phone"),
    ("phone", "phone"),
    ("mobile", "phone"),
    ("city", "city"),
    ("state", "state"),
    ("zip", "postal_code"),
    ("postal_code", "postal_code"),
    ("country", "country"),
    ("address", "address_line_1"),
    ("address_line_1", "address_line_1"),
    ("company_name", "company"),
    ("company", "company"),
    ("job_title", "job_title"),
];

/// The default standard mapping table.
pub fn default_standard_mapping() -> BTreeMap<String, String> {
    DEFAULT_STANDARD_MAPPING
        .iter()
        .map(|(source, target)| (source.to_string(), target.to_string()))
        .collect()
}

/// Parse the textual mapping format, one `source=target` pair per line.
///
/// Blank lines, lines without `=` and pairs with an empty side are ignored.
/// Source names are lower-cased to match normalized field keys; a later line
/// for the same source wins.
///
/// ```
/// use lead_relay_core::mapping::parse_mapping_lines;
///
/// let table = parse_mapping_lines("Budget = lead_budget\n\nbroken line\nsource=");
/// assert_eq!(table.len(), 1);
/// assert_eq!(table["budget"], "lead_budget");
/// ```
pub fn parse_mapping_lines(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .filter_map(|(source, target)| {
            let source = sanitize_text(source).to_lowercase();
            let target = sanitize_text(target);
            (!source.is_empty() && !target.is_empty()).then_some((source, target))
        })
        .collect()
}

/// Form field to contact attribute and metadata key tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Form field -> contact attribute
    #[serde(deserialize_with = "mapping_table")]
    pub standard: BTreeMap<String, String>,

    /// Form field -> contact metadata key
    #[serde(deserialize_with = "mapping_table")]
    pub custom: BTreeMap<String, String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            standard: default_standard_mapping(),
            custom: BTreeMap::new(),
        }
    }
}

impl FieldMapping {
    /// Create a mapping from explicit tables, lower-casing source names
    pub fn new(standard: BTreeMap<String, String>, custom: BTreeMap<String, String>) -> Self {
        Self {
            standard: lowercase_sources(standard),
            custom: lowercase_sources(custom),
        }
    }
}

fn lowercase_sources(table: BTreeMap<String, String>) -> BTreeMap<String, String> {
    table
        .into_iter()
        .map(|(source, target)| (source.trim().to_lowercase(), target.trim().to_string()))
        .filter(|(source, target)| !source.is_empty() && !target.is_empty())
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MappingTableInput {
    Table(BTreeMap<String, String>),
    Lines(String),
}

fn mapping_table<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match MappingTableInput::deserialize(deserializer)? {
        MappingTableInput::Table(table) => lowercase_sources(table),
        MappingTableInput::Lines(text) => parse_mapping_lines(&text),
    })
}

/// Contact data produced by the mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappedContactData {
    /// Contact attribute -> value
    pub fields: BTreeMap<String, String>,

    /// Metadata key -> value
    pub custom: BTreeMap<String, String>,
}

impl MappedContactData {
    /// Get a mapped attribute, treating empty values as absent
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.fields
            .get(attribute)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.get("email")
    }

    pub fn phone(&self) -> Option<&str> {
        self.get("phone")
    }

    /// Check whether the lead carries at least one contact identifier
    pub fn has_identifier(&self) -> bool {
        self.email().is_some() || self.phone().is_some()
    }
}

/// Applies a [`FieldMapping`] to normalized fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapper;

impl FieldMapper {
    pub fn new() -> Self {
        Self
    }

    /// Map normalized fields onto contact attributes and metadata.
    ///
    /// The result depends only on `fields` and `mapping`. When neither a
    /// first nor a last name was mapped, both are derived from `full_name`
    /// (mapped first, then normalized) or the normalized `name` field.
    pub fn map(&self, fields: &NormalizedFields, mapping: &FieldMapping) -> MappedContactData {
        let mut mapped = MappedContactData::default();

        for (key, value) in fields.iter() {
            if let Some(target) = mapping.standard.get(key) {
                insert_value(&mut mapped.fields, target, sanitize_text(value));
            } else if let Some(meta_key) = mapping.custom.get(key) {
                insert_value(&mut mapped.custom, meta_key, sanitize_text(value));
            }
        }

        if mapped.get("first_name").is_none() && mapped.get("last_name").is_none() {
            let full_name = mapped
                .get("full_name")
                .map(str::to_string)
                .or_else(|| non_empty(fields.get("full_name")))
                .or_else(|| non_empty(fields.get("name")));

            if let Some(full_name) = full_name {
                let (first, last) = split_name(&sanitize_text(&full_name));
                if !first.is_empty() {
                    mapped.fields.insert("first_name".to_string(), first);
                    mapped.fields.insert("last_name".to_string(), last);
                }
            }
        }

        mapped
    }
}

/// Several source fields may share a target; an empty value never
/// replaces a non-empty one.
fn insert_value(target: &mut BTreeMap<String, String>, key: &str, value: String) {
    if value.is_empty() && target.get(key).is_some_and(|existing| !existing.is_empty()) {
        return;
    }
    target.insert(key.to_string(), value);
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split a full name into `(first, rest)` on whitespace.
///
/// The remainder is re-joined with single spaces and is empty for a
/// one-word name.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>")
            .expect("script pattern is a valid literal")
    })
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is a valid literal"))
}

/// Sanitize a single text value.
///
/// Removes markup tags (and the body of script/style elements), drops
/// control characters including NUL, collapses whitespace runs to one space
/// and trims both ends.
///
/// ```
/// use lead_relay_core::mapping::sanitize_text;
///
/// assert_eq!(sanitize_text("  <b>Jane</b>\t\tDoe\u{0}  "), "Jane Doe");
/// ```
pub fn sanitize_text(input: &str) -> String {
    let without_scripts = script_pattern().replace_all(input, "");
    let without_tags = tag_pattern().replace_all(&without_scripts, "");
    let printable: String = without_tags
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    printable.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sanitize a JSON value into a single string.
///
/// Arrays are rendered as their sanitized scalar elements joined with `", "`.
/// Objects and nulls render as an empty string.
pub fn sanitize_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .map(|item| sanitize_text(&item))
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar_to_string(other)
            .map(|s| sanitize_text(&s))
            .unwrap_or_default(),
    }
}

/// Render a JSON scalar as a string; `None` for null, arrays and objects.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
