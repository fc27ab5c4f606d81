//! Error types for Graph API operations.
//!
//! Errors carry enough classification for callers to decide whether a
//! failed call is worth repeating.

use serde::Deserialize;
use thiserror::Error;

/// Graph API operation errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP error response from the Graph API that has no more specific variant.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Application or user request limit reached.
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// Request to the Graph API timed out.
    #[error("Request timeout")]
    Timeout,

    /// The access token was rejected (expired, revoked or malformed).
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The token is valid but lacks a permission the call needs.
    #[error("Authorization failed: {message}")]
    AuthorizationFailed { message: String },

    /// The requested object does not exist or is not visible to the token.
    #[error("Resource not found")]
    NotFound,

    /// The response body was not what the endpoint documents.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// Client configuration is unusable (bad base URL, TLS init failure).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Failed to parse JSON response.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error (network, TLS, etc.). Never carries the request URL.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[source] reqwest::Error),
}

impl ApiError {
    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient conditions include:
    /// - Server errors (5xx)
    /// - Rate limiting
    /// - Request timeouts
    /// - Network/transport errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::RateLimitExceeded { .. } => true,
            Self::Timeout => true,
            Self::AuthenticationFailed { .. } => false,
            Self::AuthorizationFailed { .. } => false,
            Self::NotFound => false,
            Self::UnexpectedResponse { .. } => false,
            Self::Configuration { .. } => false,
            Self::JsonError(_) => false,
            Self::HttpClientError(e) => !e.is_builder(),
        }
    }

    /// Build an error from a non-success Graph response.
    ///
    /// Graph errors arrive as `{"error": {"message", "type", "code"}}`. The
    /// numeric code takes precedence over the HTTP status because Graph
    /// reports some throttling and token problems with a plain 400.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<GraphErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error);

        let message = detail
            .as_ref()
            .map(|d| d.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string());
        let code = detail.as_ref().and_then(|d| d.code);

        match (status, code) {
            (_, Some(4 | 17 | 32 | 613)) | (429, _) => Self::RateLimitExceeded { message },
            (_, Some(102 | 190)) | (401, _) => Self::AuthenticationFailed { message },
            (_, Some(10 | 200..=299)) | (403, _) => Self::AuthorizationFailed { message },
            (404, _) => Self::NotFound,
            _ => Self::HttpError { status, message },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
