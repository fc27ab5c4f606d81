//! Response types for the API.

use std::collections::HashMap;

use lead_relay_core::{ContactId, LeadOutcome, NotificationResult, Timestamp};
use serde::Serialize;

/// Webhook notification response
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub status: String,
    pub leads: Vec<LeadSummary>,
}

/// Per-lead result within a webhook delivery
#[derive(Debug, Serialize)]
pub struct LeadSummary {
    pub leadgen_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(flatten)]
    pub outcome: Option<LeadOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&NotificationResult> for LeadSummary {
    fn from(result: &NotificationResult) -> Self {
        let (outcome, error) = match &result.result {
            Ok(outcome) => (Some(outcome.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            leadgen_id: result.notification.leadgen_id.to_string(),
            page_id: result.notification.page_id.as_ref().map(|id| id.to_string()),
            outcome,
            error,
        }
    }
}

/// Direct lead intake response
#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub status: String,
    pub contact_id: ContactId,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub checks: HashMap<String, HealthCheckResult>,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,
}

/// Health check result for individual components
#[derive(Debug, Serialize, Clone)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Overall health status
#[derive(Debug)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub checks: HashMap<String, HealthCheckResult>,
}
