//! Configuration loading and dependency wiring for the service binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use graph_api_client::{GraphClient, GraphClientConfig};
use lead_relay_api::{HealthChecker, ServiceConfig, StoreHealthChecker};
use lead_relay_core::{
    ContactStore, DiagnosticLog, FilesystemContactStore, GraphLeadFetcher,
    JsonLinesDiagnosticLog, LeadPipeline, TracingDiagnosticLog,
};
use tracing::info;

/// System-wide configuration file, extension resolved by the `config` crate
pub const SYSTEM_CONFIG_FILE: &str = "/etc/lead-relay/service";

/// Deployment-local configuration file, relative to the working directory
pub const LOCAL_CONFIG_FILE: &str = "config/service";

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "LR_CONFIG_FILE";

/// Prefix of configuration environment variables, e.g. `LR__SERVER__PORT`
pub const ENV_PREFIX: &str = "LR";

/// Errors raised while preparing the service
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] lead_relay_api::ConfigError),

    #[error("Failed to open contact store: {0}")]
    Store(#[from] lead_relay_core::StoreError),

    #[error("Failed to create Graph client: {0}")]
    Graph(#[from] graph_api_client::ApiError),
}

/// Load layered service configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/lead-relay/service.{yaml,toml,json}` (optional)
///  2. `config/service.{yaml,toml,json}` (optional)
///  3. `explicit_path`, normally taken from `LR_CONFIG_FILE` (required when set)
///  4. `LR__` environment variables with `__` as the nesting separator
///
/// Every field has a default, so an empty environment yields a config that
/// only fails [`ServiceConfig::validate`] on the missing secrets.
pub fn load_config(explicit_path: Option<&str>) -> Result<ServiceConfig, BootstrapError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name(SYSTEM_CONFIG_FILE).required(false))
        .add_source(config::File::with_name(LOCAL_CONFIG_FILE).required(false));

    if let Some(path) = explicit_path.filter(|p| !p.is_empty()) {
        info!(path = %path, "Loading configuration from explicit path");
        builder = builder.add_source(config::File::with_name(path).required(true));
    }

    let config: ServiceConfig = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    Ok(config)
}

/// Runtime dependencies handed to the HTTP server
pub struct Components {
    pub pipeline: LeadPipeline,
    pub diagnostics: Arc<dyn DiagnosticLog>,
    pub health_checker: Arc<dyn HealthChecker>,
}

/// Build the store, Graph client, diagnostic log and pipeline from `config`.
pub async fn build_components(config: &ServiceConfig) -> Result<Components, BootstrapError> {
    let store: Arc<dyn ContactStore> = Arc::new(
        FilesystemContactStore::open(PathBuf::from(&config.storage.contacts_path)).await?,
    );

    let graph_config = GraphClientConfig::default()
        .with_base_url(config.graph.base_url.clone())
        .with_version(config.graph.version.clone())
        .with_timeout(Duration::from_secs(config.graph.timeout_seconds));
    let fetcher = Arc::new(GraphLeadFetcher::new(GraphClient::new(graph_config)?));

    let diagnostics = diagnostic_log(config);
    let pipeline = LeadPipeline::new(store.clone(), fetcher, diagnostics.clone());

    Ok(Components {
        pipeline,
        diagnostics,
        health_checker: Arc::new(StoreHealthChecker::new(store)),
    })
}

/// Diagnostic sink: the JSON-lines file when a path is configured, otherwise
/// tracing events.
pub fn diagnostic_log(config: &ServiceConfig) -> Arc<dyn DiagnosticLog> {
    match &config.logging.diagnostic_log_path {
        Some(path) if !path.is_empty() => Arc::new(JsonLinesDiagnosticLog::new(
            PathBuf::from(path),
            config.leads.logging_enabled,
        )),
        _ => Arc::new(TracingDiagnosticLog::new()),
    }
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
