//! Propagation Harness
//!
//! Applies a batch of routing rules with kubectl, then measures how long a
//! sample of them takes to become routable through the proxy. Exits non-zero
//! if submission fails or any sampled rule does not converge.

use propagation_harness::config::HarnessConfig;
use propagation_harness::timing::duration_ms;
use propagation_harness::{HarnessError, PropagationHarness, RuleSet};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = HarnessConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "propagation_harness=info,propagation=info".into());
    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        proxy_url = %config.proxy_url,
        rule_count = config.rule_count,
        sample_size = config.sample_size,
        poll_interval_ms = duration_ms(config.poll_interval),
        propagation_timeout_secs = config.propagation_timeout.as_secs(),
        "Starting propagation harness"
    );

    let rules = RuleSet::generate(config.rule_count, config.rule_options(run_id));
    let harness = PropagationHarness::from_config(&config, &rules)?;

    let report = match harness.run(&rules).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Rule batch never reached the cluster");
            return Ok(ExitCode::from(2));
        }
    };

    println!("{}", serde_json::to_string_pretty(&report.summary())?);

    info!(
        "time to apply {} rules: {:?}",
        report.rule_count,
        report.timing.submission_duration()
    );
    info!(
        "time to make {} rules take effect: {:?}",
        report.rule_count,
        report.timing.propagation_latency()
    );

    match report.into_result() {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e @ HarnessError::PropagationIncomplete { .. }) => {
            error!(error = %e, "Rules were applied but did not converge in time");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
