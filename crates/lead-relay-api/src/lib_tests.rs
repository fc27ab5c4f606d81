//! Router-level tests for the webhook, direct intake and health endpoints.

use super::*;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
};
use lead_relay_core::{
    adapters::InMemoryContactStore,
    diagnostics::MemoryDiagnosticLog,
    signature::{sign, SignatureAlgorithm},
    ContactStore, LeadFetcher, LeadId, PageId, SecretString,
};
use serde_json::Value;
use std::collections::HashMap;
use tower::ServiceExt;

const APP_SECRET: &str = "app-secret";
const VERIFY_TOKEN: &str = "verify-me";
const WEBHOOK_SECRET: &str = "push-secret";

// ============================================================================
// Test doubles
// ============================================================================

/// Fetcher returning canned Graph lead objects by leadgen ID.
#[derive(Default)]
struct CannedFetcher {
    leads: HashMap<String, Value>,
    transient_failures: Vec<String>,
}

#[async_trait]
impl LeadFetcher for CannedFetcher {
    async fn fetch_lead(
        &self,
        lead_id: &LeadId,
        _page_id: Option<&PageId>,
        _settings: &LeadSettings,
    ) -> Result<Option<RawLeadPayload>, LeadError> {
        if self
            .transient_failures
            .iter()
            .any(|id| id == lead_id.as_str())
        {
            return Err(LeadError::Fetch {
                message: "graph returned 503".to_string(),
                transient: true,
            });
        }
        self.leads
            .get(lead_id.as_str())
            .cloned()
            .map(RawLeadPayload::from_value)
            .transpose()
    }
}

struct UnhealthyChecker;

#[async_trait]
impl HealthChecker for UnhealthyChecker {
    async fn check_basic_health(&self) -> HealthStatus {
        let mut checks = HashMap::new();
        checks.insert(
            "contact_store".to_string(),
            HealthCheckResult {
                healthy: false,
                message: "unreachable".to_string(),
                duration_ms: 0,
            },
        );
        HealthStatus {
            is_healthy: false,
            checks,
        }
    }

    async fn check_readiness(&self) -> bool {
        false
    }
}

struct TestApp {
    router: Router,
    store: InMemoryContactStore,
    log: MemoryDiagnosticLog,
    metrics: Arc<ServiceMetrics>,
}

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.leads.app_secret = SecretString::new(APP_SECRET);
    config.leads.verify_token = SecretString::new(VERIFY_TOKEN);
    config.leads.webhook_secret = SecretString::new(WEBHOOK_SECRET);
    config
}

fn build_app(config: ServiceConfig, fetcher: CannedFetcher) -> TestApp {
    build_app_with_health(config, fetcher, None)
}

fn build_app_with_health(
    config: ServiceConfig,
    fetcher: CannedFetcher,
    health_checker: Option<Arc<dyn HealthChecker>>,
) -> TestApp {
    let store = InMemoryContactStore::new();
    let log = MemoryDiagnosticLog::new();
    let metrics = ServiceMetrics::new().expect("metrics should initialize");
    let pipeline = LeadPipeline::new(
        Arc::new(store.clone()),
        Arc::new(fetcher),
        Arc::new(log.clone()),
    );
    let health_checker = health_checker.unwrap_or_else(|| {
        let store: Arc<dyn ContactStore> = Arc::new(store.clone());
        Arc::new(StoreHealthChecker::new(store))
    });
    let state = AppState::new(
        config,
        pipeline,
        Arc::new(log.clone()),
        health_checker,
        metrics.clone(),
    );

    TestApp {
        router: create_router(state),
        store,
        log,
        metrics,
    }
}

fn lead_fetcher() -> CannedFetcher {
    let mut fetcher = CannedFetcher::default();
    fetcher.leads.insert(
        "444".to_string(),
        serde_json::json!({
            "id": "444",
            "field_data": [
                {"name": "email", "values": ["Jane.Doe@Example.com"]},
                {"name": "full_name", "values": ["Jane Doe"]}
            ]
        }),
    );
    fetcher
}

fn notification_body(leadgen_ids: &[&str]) -> Vec<u8> {
    let changes: Vec<Value> = leadgen_ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "field": "leadgen",
                "value": {"leadgen_id": id, "page_id": "111", "form_id": "222"}
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "object": "page",
        "entry": [{"id": "111", "time": 1700000000, "changes": changes}]
    }))
    .unwrap()
}

fn signed_post(uri: &str, body: Vec<u8>) -> Request<Body> {
    let signature = sign(&body, APP_SECRET.as_bytes(), SignatureAlgorithm::Sha256);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_256_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Subscription handshake
// ============================================================================

mod subscription {
    use super::*;

    #[tokio::test]
    async fn test_valid_token_echoes_challenge() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/plain")));
        assert_eq!(body_text(response).await, "1158201444");
    }

    #[tokio::test]
    async fn test_underscore_parameters_are_accepted() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub_verify_token=verify-me&hub_challenge=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "abc");
    }

    #[tokio::test]
    async fn test_wrong_token_is_forbidden() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(app.log.contains("Webhook subscription verification failed"));
        assert_eq!(app.metrics.authentication_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_mode_is_forbidden() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=unsubscribe&hub.verify_token=verify-me&hub.challenge=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unconfigured_token_rejects_everything() {
        let mut config = test_config();
        config.leads.verify_token = SecretString::default();
        let app = build_app(config, CannedFetcher::default());

        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.verify_token=&hub.challenge=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

// ============================================================================
// Webhook notifications
// ============================================================================

mod webhook {
    use super::*;

    #[tokio::test]
    async fn test_signed_notification_creates_contact() {
        let app = build_app(test_config(), lead_fetcher());

        let response = app
            .router
            .oneshot(signed_post("/webhook", notification_body(&["444"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "processed");
        assert_eq!(body["leads"][0]["leadgen_id"], "444");
        assert_eq!(body["leads"][0]["page_id"], "111");
        assert_eq!(body["leads"][0]["outcome"], "created");

        let contacts = app.store.contacts().await;
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(app.metrics.leads_created_total.get(), 1);
        assert_eq!(app.metrics.leads_received_total.get(), 1);
    }

    #[tokio::test]
    async fn test_bad_signature_is_forbidden() {
        let app = build_app(test_config(), lead_fetcher());
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(SIGNATURE_256_HEADER, "sha256=00ff")
            .body(Body::from(notification_body(&["444"])))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(app.store.is_empty().await);
        assert!(app.log.contains("Webhook signature rejected"));
        assert_eq!(app.metrics.signature_rejections_total.get(), 1);
    }

    #[tokio::test]
    async fn test_missing_signature_is_forbidden() {
        let app = build_app(test_config(), lead_fetcher());
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from(notification_body(&["444"])))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unsigned_notification_accepted_when_signatures_disabled() {
        let mut config = test_config();
        config.webhooks.require_signature = false;
        let app = build_app(config, lead_fetcher());
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from(notification_body(&["444"])))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_bad_request() {
        let app = build_app(test_config(), lead_fetcher());

        let response = app
            .router
            .oneshot(signed_post("/webhook", Vec::new()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.log.contains("Webhook empty payload"));
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_bad_request() {
        let app = build_app(test_config(), lead_fetcher());

        let response = app
            .router
            .oneshot(signed_post("/webhook", b"not json".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_skipped_lead_still_acknowledged() {
        // Unknown lead: the fetcher has no field data for it
        let app = build_app(test_config(), lead_fetcher());

        let response = app
            .router
            .oneshot(signed_post("/webhook", notification_body(&["999"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["leads"][0]["outcome"], "skipped");
        assert_eq!(body["leads"][0]["reason"], "missing_field_data");
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_requests_redelivery() {
        let mut fetcher = lead_fetcher();
        fetcher.transient_failures.push("555".to_string());
        let app = build_app(test_config(), fetcher);

        let response = app
            .router
            .oneshot(signed_post("/webhook", notification_body(&["444", "555"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("retry-after"));
        // The healthy lead in the same delivery was still written
        assert_eq!(app.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_response_carries_correlation_id() {
        let app = build_app(test_config(), lead_fetcher());
        let mut request = signed_post("/webhook", notification_body(&["444"]));
        request.headers_mut().insert(
            CORRELATION_ID_HEADER,
            "6f1c2a9e-3a44-4c1e-9a57-3c1f0c4a8e21".parse().unwrap(),
        );

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("6f1c2a9e-3a44-4c1e-9a57-3c1f0c4a8e21")
        );
    }
}

// ============================================================================
// Direct lead push
// ============================================================================

mod direct {
    use super::*;

    fn direct_lead() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "777",
            "field_data": [
                {"name": "email", "values": ["bob@example.com"]},
                {"name": "phone_number", "values": ["+15550100"]}
            ]
        }))
        .unwrap()
    }

    fn direct_post(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_secret_in_query_creates_contact() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(direct_post("/leads?secret=push-secret", direct_lead()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "created");
        assert_eq!(body["contact_id"], 1);
        assert_eq!(app.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_secret_in_header_is_accepted() {
        let app = build_app(test_config(), CannedFetcher::default());
        let mut request = direct_post("/leads", direct_lead());
        request
            .headers_mut()
            .insert(SHARED_SECRET_HEADER, WEBHOOK_SECRET.parse().unwrap());

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut repeat = direct_post("/leads", direct_lead());
        repeat
            .headers_mut()
            .insert(SHARED_SECRET_HEADER, WEBHOOK_SECRET.parse().unwrap());
        let response = app.router.oneshot(repeat).await.unwrap();

        assert_eq!(body_json(response).await["status"], "updated");
        assert_eq!(app.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_unauthorized() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(direct_post("/leads?secret=guess", direct_lead()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(app.store.is_empty().await);
        assert!(app.log.contains("Direct lead push rejected"));
    }

    #[tokio::test]
    async fn test_missing_secret_is_unauthorized() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(direct_post("/leads", direct_lead()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_lead_without_identifiers_is_bad_request() {
        let app = build_app(test_config(), CannedFetcher::default());
        let body = serde_json::to_vec(&serde_json::json!({
            "field_data": [{"name": "city", "values": ["Lisbon"]}]
        }))
        .unwrap();

        let response = app
            .router
            .oneshot(direct_post("/leads?secret=push-secret", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Lead skipped: missing_identifiers");
    }

    #[tokio::test]
    async fn test_non_object_body_is_bad_request() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(direct_post("/leads?secret=push-secret", b"[1,2]".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// ============================================================================
// Health and metrics
// ============================================================================

mod operational {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_healthy() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"]["contact_store"]["healthy"], true);
    }

    #[tokio::test]
    async fn test_unhealthy_store_returns_503() {
        let app = build_app_with_health(
            test_config(),
            CannedFetcher::default(),
            Some(Arc::new(UnhealthyChecker)),
        );

        let health = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let ready = app
            .router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(health.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ready_when_store_reachable() {
        let app = build_app(test_config(), CannedFetcher::default());

        let response = app
            .router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ready"], true);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_counters() {
        let app = build_app(test_config(), lead_fetcher());

        app.router
            .clone()
            .oneshot(signed_post("/webhook", notification_body(&["444"])))
            .await
            .unwrap();
        let response = app
            .router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.contains("lead_relay_leads_created_total 1"));
        assert!(text.contains("lead_relay_http_requests_total"));
    }

    #[tokio::test]
    async fn test_custom_paths_are_routed() {
        let mut config = test_config();
        config.webhooks.endpoint_path = "/fb/hook".to_string();
        config.webhooks.direct_path = "/fb/push".to_string();
        let app = build_app(config, CannedFetcher::default());

        let moved = app
            .router
            .clone()
            .oneshot(
                Request::get("/fb/hook?hub.verify_token=verify-me&hub.challenge=ok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let old = app
            .router
            .oneshot(
                Request::get("/webhook?hub.verify_token=verify-me&hub.challenge=ok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(moved.status(), StatusCode::OK);
        assert_eq!(old.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_start_server_refuses_unready_store() {
    let pipeline = LeadPipeline::new(
        Arc::new(InMemoryContactStore::new()),
        Arc::new(CannedFetcher::default()),
        Arc::new(MemoryDiagnosticLog::new()),
    );

    let result = start_server(
        test_config(),
        pipeline,
        Arc::new(MemoryDiagnosticLog::new()),
        Arc::new(UnhealthyChecker),
    )
    .await;

    assert!(matches!(result, Err(ServiceError::HealthCheckFailed { .. })));
}
