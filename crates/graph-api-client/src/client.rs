//! Graph API client and its configuration.
//!
//! [`GraphClient`] owns a pooled `reqwest::Client` and knows how to build
//! versioned Graph URLs and turn Graph error envelopes into [`ApiError`]s.
//! Endpoint-specific operations live in the sibling `leads`, `pages` and
//! `token` modules.

use std::time::Duration;

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ApiError;

/// Default Graph API version used by the Lead Ads integration.
pub const DEFAULT_GRAPH_VERSION: &str = "v20.0";

/// Configuration for Graph API client behaviour.
///
/// # Examples
///
/// ```
/// use graph_api_client::GraphClientConfig;
/// use std::time::Duration;
///
/// let config = GraphClientConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_version("v19.0");
/// assert_eq!(config.version, "v19.0");
/// ```
#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    /// User agent string sent with every request
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// Graph API base URL without version segment
    pub base_url: String,
    /// Graph API version segment, e.g. `v20.0`
    pub version: String,
}

impl Default for GraphClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "lead-relay/0.1.0".to_string(),
            timeout: Duration::from_secs(30),
            base_url: "https://graph.facebook.com".to_string(),
            version: DEFAULT_GRAPH_VERSION.to_string(),
        }
    }
}

impl GraphClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> GraphClientConfigBuilder {
        GraphClientConfigBuilder::new()
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the Graph API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the Graph API version segment.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Builder for constructing `GraphClientConfig` instances.
#[derive(Debug)]
pub struct GraphClientConfigBuilder {
    config: GraphClientConfig,
}

impl GraphClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self {
            config: GraphClientConfig::default(),
        }
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the Graph API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the Graph API version segment.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> GraphClientConfig {
        self.config
    }
}

impl Default for GraphClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Graph access token (user, long-lived user, or page token).
///
/// The value is zeroed on drop and never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the token for immediate use in a request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check whether the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"<REDACTED>").finish()
    }
}

/// Facebook Graph API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http_client: reqwest::Client,
    config: GraphClientConfig,
}

impl GraphClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when the base URL does not parse
    /// or the HTTP client cannot be initialised.
    pub fn new(config: GraphClientConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url).map_err(|e| ApiError::Configuration {
            message: format!("invalid Graph base URL '{}': {}", config.base_url, e),
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &GraphClientConfig {
        &self.config
    }

    /// Build a versioned Graph URL for `path` with query parameters.
    ///
    /// Each segment of `path` is percent-encoded, so object IDs supplied by a
    /// webhook cannot alter the request path.
    pub(crate) fn endpoint(&self, path: &[&str], query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| ApiError::Configuration {
            message: format!("invalid Graph base URL: {}", e),
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|_| ApiError::Configuration {
                message: "Graph base URL cannot carry a path".to_string(),
            })?;
            segments.pop_if_empty();
            segments.push(&self.config.version);
            for segment in path {
                segments.push(segment);
            }
        }

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }

        Ok(url)
    }

    /// Send a request and decode a successful JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        form: Option<&[(&str, &str)]>,
    ) -> Result<T, ApiError> {
        debug!(method = %method, path = %url.path(), "Sending Graph API request");

        let mut request = self.http_client.request(method, url);
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let response = check_status(response).await?;
        let body = response.text().await.map_err(map_transport_error)?;

        Ok(serde_json::from_str(&body)?)
    }
}

/// Tokens travel in the query string, so the URL is stripped before the
/// error can reach logs or response bodies.
fn map_transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::HttpClientError(error.without_url())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    Err(ApiError::from_response(status, &body))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
