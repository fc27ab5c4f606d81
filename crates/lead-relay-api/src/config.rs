//! Configuration types for the HTTP service

use lead_relay_core::LeadSettings;
use serde::Deserialize;

use crate::errors::ConfigError;

/// Service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook and direct intake settings
    pub webhooks: WebhookConfig,

    /// Contact store settings
    pub storage: StorageConfig,

    /// Graph API client settings
    pub graph: GraphConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Lead authentication, mapping and contact settings
    pub leads: LeadSettings,
}

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values and
    /// [`ConfigError::Missing`] when signature checks are required but no
    /// app secret is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "server.timeout_seconds must be greater than zero".to_string(),
            });
        }

        for (key, path) in [
            ("webhooks.endpoint_path", &self.webhooks.endpoint_path),
            ("webhooks.direct_path", &self.webhooks.direct_path),
        ] {
            if !path.starts_with('/') || path.len() < 2 {
                return Err(ConfigError::Invalid {
                    message: format!("{} must be an absolute path, got '{}'", key, path),
                });
            }
        }

        if self.webhooks.endpoint_path == self.webhooks.direct_path {
            return Err(ConfigError::Invalid {
                message: "webhooks.endpoint_path and webhooks.direct_path must differ".to_string(),
            });
        }

        if self.webhooks.require_signature && self.leads.app_secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "leads.app_secret".to_string(),
            });
        }

        if self.storage.contacts_path.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "storage.contacts_path".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: false,
            enable_compression: true,
        }
    }
}

/// Webhook and direct intake configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Graph webhook endpoint path (GET handshake, POST notifications)
    pub endpoint_path: String,

    /// Direct lead push endpoint path
    pub direct_path: String,

    /// Require a valid `X-Hub-Signature(-256)` on notifications
    pub require_signature: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhook".to_string(),
            direct_path: "/leads".to_string(),
            require_signature: true,
        }
    }
}

/// Contact store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the contact document
    pub contacts_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            contacts_path: "./data/contacts".to_string(),
        }
    }
}

/// Graph API client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Graph base URL without version segment
    pub base_url: String,

    /// Graph API version segment
    pub version: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            version: "v20.0".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,

    /// JSON-lines diagnostic log file, written when `leads.logging_enabled`
    pub diagnostic_log_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            diagnostic_log_path: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
