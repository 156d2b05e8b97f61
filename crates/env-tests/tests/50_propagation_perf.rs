//! P1 Propagation Performance
//!
//! Applies the full rule batch with kubectl and waits for a sample of the
//! rules to become routable through the proxy. Rules are labelled with the
//! run id and deleted afterwards.

#![cfg(feature = "perf")]

use env_tests::cluster::ClusterConnection;
use propagation_harness::{HttpProbe, Probe, PropagationHarness, RuleOptions, RuleSet};
use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

/// Helper to create a cluster connection for tests.
async fn cluster() -> ClusterConnection {
    ClusterConnection::new()
        .await
        .expect("Failed to connect to cluster - ensure PERF_PROXY_URL is set and the proxy is reachable")
}

#[tokio::test]
#[serial]
async fn test_basic_propagation_performance() {
    let cluster = cluster().await;
    let config = &cluster.config;

    let run_id = Uuid::new_v4();
    let rules = RuleSet::generate(config.rule_count, config.rule_options(run_id));
    let harness = PropagationHarness::from_config(config, &rules)
        .expect("Harness should build from configuration");

    let outcome = harness.run(&rules).await;

    // Read back before cleanup so the count reflects this run
    let applied = cluster.count_run_rules(&run_id.to_string()).await;
    cluster
        .delete_run(&run_id.to_string())
        .await
        .expect("Run cleanup should succeed");
    cluster
        .wait_for_run_deleted(&run_id.to_string(), Duration::from_secs(300))
        .await
        .expect("Run rules should be removed");

    let report = outcome.expect("Rule batch should be accepted by the API server");
    assert_eq!(
        applied.expect("Applied rules should be listable"),
        config.rule_count,
        "Every rule in the batch should exist after submission"
    );

    println!(
        "time to apply {} rules: {:?}",
        report.rule_count,
        report.timing.submission_duration()
    );
    println!(
        "time to make {} rules take effect: {:?}",
        report.rule_count,
        report.timing.propagation_latency()
    );

    assert!(
        report.is_success(),
        "Sampled rules did not converge: {:?}",
        report.failed_indices()
    );
    assert!(report.sample.contains(0));
    assert!(report.sample.contains(config.rule_count - 1));
}

#[tokio::test]
#[serial]
async fn test_unapplied_rule_is_not_routed() {
    let cluster = cluster().await;

    // A host prefix no run ever uses, so no rule can exist for it
    let options = RuleOptions {
        host_prefix: format!("unapplied-{}", Uuid::new_v4().simple()),
        ..cluster.config.rule_options(Uuid::new_v4())
    };
    let rules = RuleSet::generate(1, options);
    let probe = HttpProbe::new(
        &cluster.config.proxy_url,
        rules.options().clone(),
        rules.len(),
        cluster.config.probe_timeout,
    )
    .expect("Probe should build");

    let routed = probe.probe(0).await.expect("Proxy should answer");

    assert!(
        !routed,
        "A host with no applied rule must not look propagated"
    );
}
