//! Lead detail retrieval.

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::client::{AccessToken, GraphClient};
use crate::error::ApiError;

impl GraphClient {
    /// Fetch the full detail of a lead by its leadgen ID.
    ///
    /// Returns the lead object as delivered by Graph, e.g.
    /// `{"id": "...", "created_time": "...", "field_data": [...]}`.
    ///
    /// Returns `Ok(None)` when Graph answers successfully but the body carries
    /// no `field_data`; that happens for leads the token may see but not read.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::AuthenticationFailed`] for an empty token without
    /// contacting Graph, and the usual [`ApiError`] variants for HTTP and
    /// decoding failures.
    #[instrument(skip(self, token), fields(lead_id = %lead_id))]
    pub async fn fetch_lead(
        &self,
        lead_id: &str,
        token: &AccessToken,
    ) -> Result<Option<Map<String, Value>>, ApiError> {
        if token.is_empty() {
            return Err(ApiError::AuthenticationFailed {
                message: "access token is empty".to_string(),
            });
        }

        let url = self.endpoint(&[lead_id], &[("access_token", token.expose())])?;
        let body: Value = self.send_json(Method::GET, url, None).await?;

        match body {
            Value::Object(lead) if lead.contains_key("field_data") => Ok(Some(lead)),
            Value::Object(_) => {
                warn!("Graph lead response has no field_data");
                Ok(None)
            }
            other => Err(ApiError::UnexpectedResponse {
                message: format!("expected a JSON object for lead, got {}", json_kind(&other)),
            }),
        }
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
