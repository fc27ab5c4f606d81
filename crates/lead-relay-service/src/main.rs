//! # Lead Relay Service
//!
//! Binary entry point for the Lead Relay HTTP service.
//!
//! This executable:
//! - Loads layered configuration from files and `LR__` environment variables
//! - Initializes structured logging
//! - Opens the contact store and creates the Graph client
//! - Starts the HTTP server from lead-relay-api

mod bootstrap;

use lead_relay_api::{start_server, ServiceConfig, ServiceError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bootstrap::{build_components, load_config, BootstrapError, CONFIG_FILE_ENV};

const EXIT_BIND_FAILED: i32 = 1;
const EXIT_SERVER_FAILED: i32 = 2;
const EXIT_CONFIGURATION: i32 = 3;
const EXIT_HEALTH_CHECK: i32 = 4;
const EXIT_STARTUP: i32 = 5;

#[tokio::main]
async fn main() {
    let explicit_path = std::env::var(CONFIG_FILE_ENV).ok();
    let loaded = load_config(explicit_path.as_deref());

    // Logging settings live in the config, so a failed load logs with defaults
    let json_format = loaded
        .as_ref()
        .map(|config| config.logging.json_format)
        .unwrap_or(false);
    let level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level, json_format);

    let config = match loaded.and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    info!(
        host = %config.server.host,
        port = config.server.port,
        webhook_path = %config.webhooks.endpoint_path,
        direct_path = %config.webhooks.direct_path,
        "Starting Lead Relay service"
    );

    if let Err(code) = run(config).await {
        std::process::exit(code);
    }
}

async fn run(config: ServiceConfig) -> Result<(), i32> {
    let components = build_components(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize service dependencies");
        match e {
            BootstrapError::Config(_) | BootstrapError::Invalid(_) => EXIT_CONFIGURATION,
            BootstrapError::Store(_) | BootstrapError::Graph(_) => EXIT_STARTUP,
        }
    })?;

    start_server(
        config,
        components.pipeline,
        components.diagnostics,
        components.health_checker,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "HTTP server failed");
        match e {
            ServiceError::BindFailed { .. } => EXIT_BIND_FAILED,
            ServiceError::ServerFailed { .. } => EXIT_SERVER_FAILED,
            ServiceError::Configuration(_) => EXIT_CONFIGURATION,
            ServiceError::HealthCheckFailed { .. } => EXIT_HEALTH_CHECK,
        }
    })
}

fn init_tracing(level: &str, json_format: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("lead_relay_service={level},lead_relay_api={level},lead_relay_core={level},tower_http=debug").into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
