//! P0 Smoke Tests: Cluster Health
//!
//! These tests validate that the proxy, the API server and the backend are
//! available. The propagation run depends on these passing.

#![cfg(feature = "smoke")]

use env_tests::cluster::ClusterConnection;

/// Helper to create a cluster connection for tests.
async fn cluster() -> ClusterConnection {
    ClusterConnection::new()
        .await
        .expect("Failed to connect to cluster - ensure PERF_PROXY_URL is set and the proxy is reachable")
}

#[tokio::test]
async fn test_proxy_answers_unrouted_host() {
    let cluster = cluster().await;

    let status = cluster
        .check_proxy_responds()
        .await
        .expect("Proxy should answer HTTP");

    assert_eq!(
        status, 404,
        "Proxy should not route a host no rule was written for"
    );
}

#[tokio::test]
async fn test_ingress_class_exists() {
    let cluster = cluster().await;

    cluster
        .check_ingress_class()
        .await
        .expect("Configured ingress class should exist");
}

#[tokio::test]
async fn test_backend_service_exists() {
    let cluster = cluster().await;

    cluster
        .check_backend_service()
        .await
        .expect("Backend service should exist in the target namespace");
}
