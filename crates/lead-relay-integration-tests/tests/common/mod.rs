//! Common test utilities for lead-relay integration tests
//!
//! The harness wires the real stack: router, lead pipeline, filesystem
//! contact store, JSON-lines diagnostic log and the Graph client pointed at
//! a wiremock server.

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use graph_api_client::{GraphClient, GraphClientConfig};
use lead_relay_api::{create_router, AppState, ServiceConfig, ServiceMetrics, StoreHealthChecker};
use lead_relay_core::{
    signature::{sign, SignatureAlgorithm, SIGNATURE_256_HEADER},
    Contact, ContactStore, DiagnosticLog, FilesystemContactStore, GraphLeadFetcher,
    JsonLinesDiagnosticLog, LeadPipeline, SecretString,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const APP_SECRET: &str = "integration-app-secret";
pub const VERIFY_TOKEN: &str = "integration-verify";
pub const WEBHOOK_SECRET: &str = "integration-push";
pub const PAGE_ID: &str = "111222";
pub const PAGE_TOKEN: &str = "page-token-111222";

pub struct TestHarness {
    pub router: Router,
    pub graph: MockServer,
    pub contacts_path: PathBuf,
    pub log_path: PathBuf,
    _dir: TempDir,
}

impl TestHarness {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut ServiceConfig)) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let graph = MockServer::start().await;
        let contacts_path = dir.path().join("contacts");
        let log_path = dir.path().join("logs").join("diagnostics.jsonl");

        let mut config = ServiceConfig::default();
        config.storage.contacts_path = contacts_path.to_string_lossy().into_owned();
        config.graph.base_url = graph.uri();
        config.logging.diagnostic_log_path = Some(log_path.to_string_lossy().into_owned());
        config.leads.app_secret = SecretString::new(APP_SECRET);
        config.leads.verify_token = SecretString::new(VERIFY_TOKEN);
        config.leads.webhook_secret = SecretString::new(WEBHOOK_SECRET);
        config.leads.logging_enabled = true;
        config
            .leads
            .page_tokens
            .insert(PAGE_ID.to_string(), SecretString::new(PAGE_TOKEN));
        customize(&mut config);
        config.validate().expect("test config should be valid");

        let store: Arc<dyn ContactStore> = Arc::new(
            FilesystemContactStore::open(contacts_path.clone())
                .await
                .expect("store should open"),
        );
        let client = GraphClient::new(GraphClientConfig::default().with_base_url(graph.uri()))
            .expect("graph client");
        let diagnostics: Arc<dyn DiagnosticLog> =
            Arc::new(JsonLinesDiagnosticLog::new(log_path.clone(), true));
        let pipeline = LeadPipeline::new(
            store.clone(),
            Arc::new(GraphLeadFetcher::new(client)),
            diagnostics.clone(),
        );
        let state = AppState::new(
            config,
            pipeline,
            diagnostics,
            Arc::new(StoreHealthChecker::new(store)),
            ServiceMetrics::new().expect("metrics"),
        );

        Self {
            router: create_router(state),
            graph,
            contacts_path,
            log_path,
            _dir: dir,
        }
    }

    /// Send one request through a clone of the router
    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Contacts persisted on disk, read through a fresh store instance
    pub async fn stored_contacts(&self) -> Vec<Contact> {
        FilesystemContactStore::open(self.contacts_path.clone())
            .await
            .expect("store should reopen")
            .contacts()
            .await
    }

    /// Diagnostic log lines written so far
    pub fn diagnostic_messages(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log_path)
            .unwrap_or_default()
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|record| record["message"].as_str().map(str::to_string))
            .collect()
    }

    /// Serve a Graph lead object for `lead_id`, requiring the page token
    pub async fn mount_lead(&self, lead_id: &str, field_data: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v20.0/{}", lead_id)))
            .and(query_param("access_token", PAGE_TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": lead_id,
                "created_time": "2026-01-05T10:00:00+0000",
                "field_data": field_data
            })))
            .mount(&self.graph)
            .await;
    }

    /// Answer lead fetches for `lead_id` with an error status
    pub async fn mount_lead_error(&self, lead_id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/v20.0/{}", lead_id)))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"message": "upstream failure", "type": "OAuthException", "code": 2}
            })))
            .mount(&self.graph)
            .await;
    }
}

/// Graph leadgen webhook envelope announcing `lead_ids` on the test page
pub fn notification(lead_ids: &[&str]) -> Vec<u8> {
    let changes: Vec<Value> = lead_ids
        .iter()
        .map(|id| {
            json!({
                "field": "leadgen",
                "value": {
                    "leadgen_id": id,
                    "page_id": PAGE_ID,
                    "form_id": "333444",
                    "created_time": 1767607200
                }
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "object": "page",
        "entry": [{"id": PAGE_ID, "time": 1767607200, "changes": changes}]
    }))
    .expect("envelope serializes")
}

/// POST `body` to the webhook endpoint with a valid SHA-256 signature
pub fn signed_webhook(body: Vec<u8>) -> Request<Body> {
    let signature = sign(&body, APP_SECRET.as_bytes(), SignatureAlgorithm::Sha256);
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header(SIGNATURE_256_HEADER, signature)
        .body(Body::from(body))
        .expect("request builds")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}
