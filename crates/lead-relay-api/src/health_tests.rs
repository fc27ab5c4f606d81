//! Tests for the store-backed health checker

use super::*;
use lead_relay_core::{FilesystemContactStore, InMemoryContactStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_healthy_store_reports_healthy() {
    let checker = StoreHealthChecker::new(Arc::new(InMemoryContactStore::new()));

    let status = checker.check_basic_health().await;

    assert!(status.is_healthy);
    assert!(status.checks["contact_store"].healthy);
    assert!(checker.check_readiness().await);
}

#[tokio::test]
async fn test_missing_store_directory_is_unhealthy() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("contacts");
    let store = FilesystemContactStore::open(path.clone()).await.unwrap();
    std::fs::remove_dir_all(&path).unwrap();
    let checker = StoreHealthChecker::new(Arc::new(store));

    let status = checker.check_basic_health().await;

    assert!(!status.is_healthy);
    assert!(status.checks["service"].healthy);
    assert!(!status.checks["contact_store"].healthy);
    assert!(!checker.check_readiness().await);
}
