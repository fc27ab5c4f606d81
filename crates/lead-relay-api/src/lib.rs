//! # Lead Relay HTTP Service
//!
//! HTTP server for receiving Facebook Lead Ads deliveries and relaying them
//! into the contact store.
//!
//! This service provides:
//! - Graph webhook subscription handshake and signed leadgen notifications
//! - Direct lead push endpoint authenticated with a shared secret
//! - Health and readiness endpoints
//! - Prometheus metrics

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod responses;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use lead_relay_core::{
    signature::{
        select_signature_header, SHARED_SECRET_HEADER, SIGNATURE_256_HEADER, SIGNATURE_HEADER,
    },
    CorrelationId, DiagnosticLog, LeadError, LeadOutcome, LeadPipeline, LeadSettings,
    RawLeadPayload, SharedSecretAuthenticator, SignatureVerifier, Timestamp,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

pub use config::{
    GraphConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig, WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use health::{HealthChecker, StoreHealthChecker};
pub use metrics::ServiceMetrics;
pub use responses::{
    HealthCheckResult, HealthResponse, HealthStatus, LeadResponse, LeadSummary,
    NotificationResponse, ReadinessResponse,
};

/// Header carrying the request correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Lead settings shared read-only by every request
    pub settings: Arc<LeadSettings>,

    /// Lead processing pipeline
    pub pipeline: LeadPipeline,

    /// Webhook signature verifier
    pub verifier: SignatureVerifier,

    /// Diagnostic log for rejected requests
    pub diagnostics: Arc<dyn DiagnosticLog>,

    /// Health checker for system monitoring
    pub health_checker: Arc<dyn HealthChecker>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        pipeline: LeadPipeline,
        diagnostics: Arc<dyn DiagnosticLog>,
        health_checker: Arc<dyn HealthChecker>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            settings: Arc::new(config.leads.clone()),
            config: Arc::new(config),
            pipeline,
            verifier: SignatureVerifier::new(diagnostics.clone()),
            diagnostics,
            health_checker,
            metrics,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let intake_routes = Router::new()
        .route(
            &config.webhooks.endpoint_path,
            get(handle_subscription).post(handle_webhook),
        )
        .route(&config.webhooks.direct_path, post(handle_direct_lead));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(intake_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(DefaultBodyLimit::max(config.server.max_body_size));

    if config.server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.timeout_seconds,
                )))
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Refuses to start when the readiness check fails. Runs until SIGINT or
/// SIGTERM, then lets in-flight requests finish.
pub async fn start_server(
    config: ServiceConfig,
    pipeline: LeadPipeline,
    diagnostics: Arc<dyn DiagnosticLog>,
    health_checker: Arc<dyn HealthChecker>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    if !health_checker.check_readiness().await {
        return Err(ServiceError::HealthCheckFailed {
            message: "contact store is not ready".to_string(),
        });
    }

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, pipeline, diagnostics, health_checker, metrics);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Query parameters of the Graph subscription handshake.
///
/// Graph sends `hub.*` names; some proxies rewrite the dots to underscores.
#[derive(Deserialize)]
pub struct SubscriptionParams {
    #[serde(rename = "hub.mode", alias = "hub_mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token", alias = "hub_verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge", alias = "hub_challenge")]
    pub challenge: Option<String>,
}

/// Answer the Graph subscription handshake.
///
/// Echoes `hub.challenge` as plain text when the verify token matches the
/// configured one and the mode, if given, is `subscribe`.
#[instrument(skip(state, params))]
pub async fn handle_subscription(
    State(state): State<AppState>,
    Query(params): Query<SubscriptionParams>,
) -> Result<Response, WebhookHandlerError> {
    let mode_ok = params.mode.as_deref().map_or(true, |mode| mode == "subscribe");
    let authenticator = SharedSecretAuthenticator::new(state.settings.verify_token.clone());
    let token_ok = authenticator.authorize(params.verify_token.as_deref());

    match params.challenge.filter(|c| !c.is_empty()) {
        Some(challenge) if mode_ok && token_ok => {
            info!("Webhook subscription verified");
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                challenge,
            )
                .into_response())
        }
        _ => {
            state.metrics.authentication_failures_total.inc();
            state
                .diagnostics
                .log(
                    "Webhook subscription verification failed",
                    json!({"mode": params.mode, "has_token": params.verify_token.is_some()}),
                )
                .await;
            Err(WebhookHandlerError::InvalidVerifyToken)
        }
    }
}

/// Handle a Graph leadgen notification.
///
/// Every announced lead is fetched and processed. The delivery is answered
/// with `200` and per-lead results unless a lead failed in a way that a
/// redelivery could fix (contact store failure or transient Graph failure),
/// in which case the error status asks Graph to retry.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotificationResponse>, WebhookHandlerError> {
    let start = Instant::now();

    if body.is_empty() {
        state
            .diagnostics
            .log("Webhook empty payload", json!({}))
            .await;
        return Err(WebhookHandlerError::EmptyPayload);
    }

    if state.config.webhooks.require_signature {
        let signature = select_signature_header(
            header_value(&headers, SIGNATURE_256_HEADER),
            header_value(&headers, SIGNATURE_HEADER),
        );
        if !state
            .verifier
            .verify(&body, signature, &state.settings.app_secret)
            .await
        {
            state.metrics.signature_rejections_total.inc();
            return Err(LeadError::InvalidSignature.into());
        }
    }

    let results = state
        .pipeline
        .handle_notification(&body, &state.settings)
        .await
        .inspect_err(|e| state.metrics.record_lead_error(e))?;

    state
        .metrics
        .leads_received_total
        .inc_by(results.len() as u64);
    for result in &results {
        state.metrics.record_lead_result(&result.result);
    }
    state
        .metrics
        .lead_processing_duration
        .observe(start.elapsed().as_secs_f64());

    let leads: Vec<LeadSummary> = results.iter().map(LeadSummary::from).collect();

    if let Some(error) = results
        .into_iter()
        .filter_map(|r| r.result.err())
        .find(requires_redelivery)
    {
        warn!(error = %error, "Webhook delivery needs redelivery");
        return Err(error.into());
    }

    info!(leads = leads.len(), "Webhook delivery processed");
    Ok(Json(NotificationResponse {
        status: "processed".to_string(),
        leads,
    }))
}

fn requires_redelivery(error: &LeadError) -> bool {
    matches!(error, LeadError::PersistenceFailure(_)) || error.is_transient()
}

/// Query parameters of the direct lead push.
#[derive(Deserialize)]
pub struct DirectLeadParams {
    pub secret: Option<String>,
}

/// Handle a lead pushed directly as a Graph lead object.
///
/// The shared secret comes from the `secret` query parameter or, when that
/// is absent, the `X-Facebook-Secret` header.
#[instrument(skip(state, params, headers, body), fields(body_len = body.len()))]
pub async fn handle_direct_lead(
    State(state): State<AppState>,
    Query(params): Query<DirectLeadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LeadResponse>, WebhookHandlerError> {
    let start = Instant::now();

    let provided = params
        .secret
        .filter(|secret| !secret.is_empty())
        .or_else(|| header_value(&headers, SHARED_SECRET_HEADER).map(str::to_string));
    let authenticator = SharedSecretAuthenticator::new(state.settings.webhook_secret.clone());
    if !authenticator.authorize(provided.as_deref()) {
        state.metrics.authentication_failures_total.inc();
        state
            .diagnostics
            .log(
                "Direct lead push rejected",
                json!({"has_secret": provided.is_some()}),
            )
            .await;
        return Err(WebhookHandlerError::Unauthorized);
    }

    if body.is_empty() {
        return Err(WebhookHandlerError::EmptyPayload);
    }

    let raw = RawLeadPayload::parse(&body).inspect_err(|e| state.metrics.record_lead_error(e))?;
    state.metrics.leads_received_total.inc();

    let result = state.pipeline.process_lead(&raw, &state.settings).await;
    state.metrics.record_lead_result(&result);
    state
        .metrics
        .lead_processing_duration
        .observe(start.elapsed().as_secs_f64());

    match result? {
        LeadOutcome::Created { contact_id } => Ok(Json(LeadResponse {
            status: "created".to_string(),
            contact_id,
        })),
        LeadOutcome::Updated { contact_id } => Ok(Json(LeadResponse {
            status: "updated".to_string(),
            contact_id,
        })),
        LeadOutcome::Skipped { reason } => Err(WebhookHandlerError::LeadSkipped { reason }),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Response {
    let status = state.health_checker.check_basic_health().await;

    let response = HealthResponse {
        status: if status.is_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: Timestamp::now(),
        checks: status.checks,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let code = if status.is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response)).into_response()
}

/// Readiness check
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let is_ready = state.health_checker.check_readiness().await;

    if is_ready {
        Ok(Json(ReadinessResponse {
            ready: true,
            timestamp: Timestamp::now(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an incoming `x-correlation-id` or generates one, records it on the
/// span, exposes it to handlers as a request extension and echoes it on the
/// response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<CorrelationId>().ok())
        .unwrap_or_default();

    tracing::Span::current().record("correlation_id", tracing::field::display(&correlation_id));
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis();

    if let Ok(header_value) = correlation_id.as_str().parse() {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(status = %status, duration_ms = %duration_ms, "Request completed with server error");
    } else if status.is_client_error() {
        warn!(status = %status, duration_ms = %duration_ms, "Request completed with client error");
    } else {
        info!(status = %status, duration_ms = %duration_ms, "Request completed");
    }

    response
}

/// Records request count and latency
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;

    state
        .metrics
        .record_http_request(method.as_str(), response.status().as_u16(), start.elapsed());
    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
