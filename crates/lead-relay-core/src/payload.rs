//! Raw payload validation and webhook envelope parsing.
//!
//! Two JSON shapes enter the system:
//!
//! - a **lead** object, either fetched from Graph or pushed directly, with a
//!   `field_data` array plus arbitrary top-level keys;
//! - a Graph **webhook envelope** announcing new leads:
//!
//! ```json
//! {
//!   "object": "page",
//!   "entry": [
//!     {"id": "153125381133", "time": 1438292065,
//!      "changes": [{"field": "leadgen", "value": {
//!        "leadgen_id": "123123123123", "page_id": "153125381133",
//!        "form_id": "567567567567", "created_time": 1438292065}}]}
//!   ]
//! }
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{FormId, LeadError, LeadId, PageId, Timestamp};

/// The `changes[].field` value carrying lead notifications.
pub const LEADGEN_FIELD: &str = "leadgen";

/// A lead payload whose shape has been checked.
///
/// Guarantees the payload is a JSON object and that `field_data`, when
/// present, is an array. Nothing else about the content is assumed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLeadPayload(Map<String, Value>);

impl RawLeadPayload {
    /// Parse and validate a payload from raw JSON bytes.
    pub fn parse(body: &[u8]) -> Result<Self, LeadError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| LeadError::MalformedPayload {
                message: format!("invalid JSON: {}", e),
            })?;
        Self::from_value(value)
    }

    /// Validate an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, LeadError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(LeadError::MalformedPayload {
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Validate a decoded JSON object.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, LeadError> {
        match map.get("field_data") {
            None | Some(Value::Array(_)) => Ok(Self(map)),
            Some(other) => Err(LeadError::MalformedPayload {
                message: format!("field_data must be an array, got {}", json_kind(other)),
            }),
        }
    }

    /// The `field_data` entries, empty when absent
    pub fn field_data(&self) -> &[Value] {
        match self.0.get("field_data") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// All top-level keys and values
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// One lead announced by a Graph webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadgenNotification {
    pub leadgen_id: LeadId,
    pub page_id: Option<PageId>,
    pub form_id: Option<FormId>,
    pub created_time: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    entry: Vec<EnvelopeEntry>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeEntry {
    #[serde(default)]
    changes: Vec<EnvelopeChange>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeChange {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: Value,
}

/// Check whether a POST body is a subscription challenge echo.
///
/// Graph never sends these on the notification channel, but some proxies
/// forward the handshake parameters as a JSON body.
pub fn is_subscription_challenge(body: &Value) -> bool {
    let has = |names: [&str; 2]| names.iter().any(|name| body.get(*name).is_some());
    has(["hub.challenge", "hub_challenge"]) && has(["hub.verify_token", "hub_verify_token"])
}

/// Extract leadgen notifications from a webhook envelope.
///
/// Returns notifications in envelope order. Changes for other fields and
/// changes without a valid `leadgen_id` are skipped with a warning. A
/// subscription challenge body yields no notifications.
///
/// # Errors
///
/// Returns [`LeadError::MalformedPayload`] when the body is not JSON or not
/// shaped like an envelope.
pub fn parse_notifications(body: &[u8]) -> Result<Vec<LeadgenNotification>, LeadError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| LeadError::MalformedPayload {
        message: format!("invalid JSON: {}", e),
    })?;

    if !value.is_object() {
        return Err(LeadError::MalformedPayload {
            message: format!("expected a JSON object, got {}", json_kind(&value)),
        });
    }

    if is_subscription_challenge(&value) {
        return Ok(Vec::new());
    }

    let envelope: WebhookEnvelope =
        serde_json::from_value(value).map_err(|e| LeadError::MalformedPayload {
            message: format!("unexpected webhook envelope: {}", e),
        })?;

    if let Some(object) = envelope.object.as_deref() {
        if object != "page" {
            warn!(object = %object, "Webhook envelope for unexpected object type");
        }
    }

    let mut notifications = Vec::new();
    for change in envelope.entry.into_iter().flat_map(|entry| entry.changes) {
        if change.field != LEADGEN_FIELD {
            continue;
        }

        match notification_from_value(&change.value) {
            Some(notification) => notifications.push(notification),
            None => warn!("Leadgen change without a valid leadgen_id"),
        }
    }

    Ok(notifications)
}

fn notification_from_value(value: &Value) -> Option<LeadgenNotification> {
    let leadgen_id = id_string(value.get("leadgen_id")).and_then(|id| LeadId::new(id).ok())?;

    Some(LeadgenNotification {
        leadgen_id,
        page_id: id_string(value.get("page_id")).and_then(|id| PageId::new(id).ok()),
        form_id: id_string(value.get("form_id")).and_then(|id| FormId::new(id).ok()),
        created_time: value
            .get("created_time")
            .and_then(Value::as_i64)
            .and_then(Timestamp::from_unix_seconds),
    })
}

/// Graph sends IDs as strings but some tools emit them as numbers.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n.as_u64().map(|n| n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
