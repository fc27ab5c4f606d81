//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use lead_relay_core::{LeadError, SkipReason};
use tracing::{error, warn};

/// Request handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: permanent client errors (empty or malformed
///   payloads, leads that cannot produce a contact)
/// - `401 Unauthorized`: missing or wrong shared secret on the direct
///   intake endpoint
/// - `403 Forbidden`: bad webhook signature or subscription verify token
/// - `500 Internal Server Error`: contact store failures and unexpected
///   server failures
/// - `503 Service Unavailable`: transient Graph failures that should be
///   retried
///
/// Messages for server-side failures are replaced with a generic text; the
/// detail is logged.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Request body was empty
    #[error("Request body is empty")]
    EmptyPayload,

    /// Subscription handshake with a wrong or missing verify token
    ///
    /// Maps to: `403 Forbidden`
    #[error("Invalid verify token")]
    InvalidVerifyToken,

    /// Direct intake request without a valid shared secret
    ///
    /// Maps to: `401 Unauthorized`
    #[error("Unauthorized")]
    Unauthorized,

    /// Lead was well-formed but could not produce a contact
    ///
    /// Maps to: `400 Bad Request`
    #[error("Lead skipped: {reason}")]
    LeadSkipped { reason: SkipReason },

    /// Lead processing failure
    ///
    /// Status depends on the underlying [`LeadError`]; a bad webhook
    /// signature is [`LeadError::InvalidSignature`].
    #[error(transparent)]
    Lead(#[from] LeadError),

    /// Unexpected internal server error
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl WebhookHandlerError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyPayload => StatusCode::BAD_REQUEST,
            Self::InvalidVerifyToken => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::LeadSkipped { .. } => StatusCode::BAD_REQUEST,
            Self::Lead(e) => match e {
                LeadError::InvalidSignature => StatusCode::FORBIDDEN,
                LeadError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
                LeadError::Fetch {
                    transient: true, ..
                } => StatusCode::SERVICE_UNAVAILABLE,
                LeadError::Fetch { .. } | LeadError::PersistenceFailure(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Log detailed error server-side but return generic message to client
            error!(error = %self, status = %status, "Request failed with server error");
            "Internal server error occurred. Please try again later.".to_string()
        } else {
            warn!(error = %self, status = %status, "Request rejected");
            self.to_string()
        };

        let retry_after = (status == StatusCode::SERVICE_UNAVAILABLE).then_some(60u64);

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Health check failed: {message}")]
    HealthCheckFailed { message: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
