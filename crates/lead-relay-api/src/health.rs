//! Liveness and readiness checks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use lead_relay_core::ContactStore;

use crate::responses::{HealthCheckResult, HealthStatus};

/// Health checks backing `/health` and `/ready`
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Liveness: the process is able to answer requests
    async fn check_basic_health(&self) -> HealthStatus;

    /// Readiness: dependencies are reachable and traffic can be accepted
    async fn check_readiness(&self) -> bool;
}

/// Health checker that probes the contact store.
pub struct StoreHealthChecker {
    store: Arc<dyn ContactStore>,
}

impl StoreHealthChecker {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthChecker for StoreHealthChecker {
    async fn check_basic_health(&self) -> HealthStatus {
        let start = Instant::now();
        let mut checks = HashMap::new();

        checks.insert(
            "service".to_string(),
            HealthCheckResult {
                healthy: true,
                message: "Service is running".to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
            },
        );

        let store_start = Instant::now();
        let store_check = match self.store.health_check().await {
            Ok(()) => HealthCheckResult {
                healthy: true,
                message: "Contact store reachable".to_string(),
                duration_ms: store_start.elapsed().as_millis() as u64,
            },
            Err(e) => HealthCheckResult {
                healthy: false,
                message: e.to_string(),
                duration_ms: store_start.elapsed().as_millis() as u64,
            },
        };
        checks.insert("contact_store".to_string(), store_check);

        HealthStatus {
            is_healthy: checks.values().all(|check| check.healthy),
            checks,
        }
    }

    async fn check_readiness(&self) -> bool {
        self.store.health_check().await.is_ok()
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
