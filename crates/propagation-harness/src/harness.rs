//! End-to-end propagation run.
//!
//! Submission completes before any verification task is dispatched. A
//! submission failure aborts the run; verification failures are reported
//! per index in the [`RunReport`].

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::probe::{HttpProbe, Probe};
use crate::rules::RuleSet;
use crate::sample::{self, SampleSet};
use crate::submit::{Applier, BatchSubmitter, KubectlApplier};
use crate::timing::{TimingRecord, TimingSummary};
use crate::verify::{ConcurrentVerifier, VerificationResults, VerifierSettings};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, instrument};

/// Outcome of one complete run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Option<String>,
    pub rule_count: usize,
    pub sample: SampleSet,
    pub timing: TimingRecord,
    pub results: VerificationResults,
}

impl RunReport {
    /// True if every sampled rule became observable.
    pub fn is_success(&self) -> bool {
        self.results.all_succeeded()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.results.failed_indices()
    }

    /// Convert a report with failed indices into an error.
    pub fn into_result(self) -> Result<Self, HarnessError> {
        let failed = self.failed_indices();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(HarnessError::PropagationIncomplete {
                failed,
                sampled: self.sample.len(),
            })
        }
    }

    /// Serializable view for logs and metrics sinks.
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            run_id: self.run_id.as_deref(),
            rule_count: self.rule_count,
            sampled: self.sample.len(),
            succeeded: self.results.succeeded_count(),
            timing: self.timing.summary(),
            results: &self.results,
        }
    }
}

/// JSON shape of a [`RunReport`].
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub run_id: Option<&'a str>,
    pub rule_count: usize,
    pub sampled: usize,
    pub succeeded: usize,
    pub timing: TimingSummary,
    pub results: &'a VerificationResults,
}

/// Submit, sample, verify.
pub struct PropagationHarness<A, P> {
    submitter: BatchSubmitter<A>,
    verifier: ConcurrentVerifier<P>,
    sample_size: usize,
}

impl<A, P> PropagationHarness<A, P>
where
    A: Applier,
    P: Probe + 'static,
{
    pub fn new(applier: A, probe: Arc<P>, settings: VerifierSettings, sample_size: usize) -> Self {
        Self {
            submitter: BatchSubmitter::new(applier),
            verifier: ConcurrentVerifier::new(probe, settings),
            sample_size,
        }
    }

    /// Run one propagation measurement over `rules`.
    ///
    /// Returns `Err` only if submission fails. Use
    /// [`RunReport::into_result`] to also fail on unconverged rules.
    #[instrument(
        skip_all,
        name = "propagation.run",
        fields(rules = rules.len(), run_id = rules.options().run_id().unwrap_or(""))
    )]
    pub async fn run(&self, rules: &RuleSet) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();

        let submission = self.submitter.submit(rules).await.map_err(|e| {
            error!(target: "propagation.run", error = %e, "Rule batch submission failed");
            e
        })?;

        let sample = sample::select(rules.len(), self.sample_size);
        info!(
            target: "propagation.run",
            sampled = sample.len(),
            indices = ?sample,
            "Verifying sampled rules"
        );

        let verification_started = Instant::now();
        let results = self.verifier.verify(&sample).await;
        let verification_finished = Instant::now();

        let timing = TimingRecord {
            started_at,
            submission_started: submission.started,
            submission_finished: submission.finished,
            verification_started,
            verification_finished,
        };

        let report = RunReport {
            run_id: rules.options().run_id().map(str::to_string),
            rule_count: rules.len(),
            sample,
            timing,
            results,
        };

        info!(
            target: "propagation.run",
            rules = report.rule_count,
            sampled = report.sample.len(),
            succeeded = report.results.succeeded_count(),
            submission_ms = report.timing.summary().submission_ms,
            propagation_latency_ms = report.timing.summary().propagation_latency_ms,
            "Propagation run finished"
        );

        Ok(report)
    }
}

impl PropagationHarness<KubectlApplier, HttpProbe> {
    /// Build a harness that applies with kubectl and probes over HTTP.
    pub fn from_config(config: &HarnessConfig, rules: &RuleSet) -> Result<Self, HarnessError> {
        let mut applier = KubectlApplier::new(config.kubectl.clone())
            .with_namespace(config.namespace.clone())
            .with_timeout(config.apply_timeout);
        if let Some(kubeconfig) = &config.kubeconfig {
            applier = applier.with_kubeconfig(kubeconfig.clone());
        }

        let probe = HttpProbe::new(
            &config.proxy_url,
            rules.options().clone(),
            rules.len(),
            config.probe_timeout,
        )
        .map_err(|e| HarnessError::ProbeSetup(e.to_string()))?
        .with_expected_marker(config.expected_marker.clone());

        Ok(Self::new(
            applier,
            Arc::new(probe),
            config.verifier_settings(),
            config.sample_size,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use crate::rules::RuleOptions;
    use crate::submit::SubmitError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct OkApplier;

    #[async_trait]
    impl Applier for OkApplier {
        async fn apply(&self, _manifest: &str) -> Result<(), SubmitError> {
            Ok(())
        }
    }

    struct RejectingApplier;

    #[async_trait]
    impl Applier for RejectingApplier {
        async fn apply(&self, _manifest: &str) -> Result<(), SubmitError> {
            Err(SubmitError::ApplyFailed {
                code: Some(1),
                stderr: "admission webhook denied the request".to_string(),
            })
        }
    }

    /// Counts calls; fails the index given.
    struct CountingProbe {
        calls: AtomicUsize,
        failing: Option<usize>,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        async fn probe(&self, index: usize) -> Result<bool, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(index) != self.failing)
        }
    }

    fn settings() -> VerifierSettings {
        VerifierSettings {
            poll_interval: Duration::from_millis(500),
            deadline: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_success() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            failing: None,
        });
        let harness = PropagationHarness::new(OkApplier, probe.clone(), settings(), 10);
        let rules = RuleSet::generate(10_000, RuleOptions::default());

        let report = harness.run(&rules).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.rule_count, 10_000);
        assert!(report.sample.contains(0) && report.sample.contains(9_999));
        assert!(report.sample.len() <= 12);
        // Only the sample is probed, never the whole batch
        assert_eq!(probe.calls.load(Ordering::SeqCst), report.sample.len());
        assert!(report.timing.verification_started >= report.timing.submission_finished);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_unconverged_index() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            failing: Some(9_999),
        });
        let harness = PropagationHarness::new(OkApplier, probe, settings(), 10);
        let rules = RuleSet::generate(10_000, RuleOptions::default());

        let report = harness.run(&rules).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failed_indices(), vec![9_999]);
        assert!(report.timing.verification_duration() >= Duration::from_secs(5));

        let sampled = report.sample.len();
        match report.into_result() {
            Err(HarnessError::PropagationIncomplete { failed, sampled: s }) => {
                assert_eq!(failed, vec![9_999]);
                assert_eq!(s, sampled);
            }
            other => panic!("expected PropagationIncomplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submission_failure_skips_verification() {
        struct NeverCalledProbe(AtomicBool);

        #[async_trait]
        impl Probe for NeverCalledProbe {
            async fn probe(&self, _index: usize) -> Result<bool, ProbeError> {
                self.0.store(true, Ordering::SeqCst);
                Ok(true)
            }
        }

        let probe = Arc::new(NeverCalledProbe(AtomicBool::new(false)));
        let harness = PropagationHarness::new(RejectingApplier, probe.clone(), settings(), 10);
        let rules = RuleSet::generate(50, RuleOptions::default());

        let err = harness.run(&rules).await.unwrap_err();

        assert!(matches!(err, HarnessError::Submission(_)));
        assert!(!probe.0.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_summary_serializes() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            failing: None,
        });
        let harness = PropagationHarness::new(OkApplier, probe, settings(), 0);
        let run_id = uuid::Uuid::new_v4();
        let rules = RuleSet::generate(5, RuleOptions::default().with_run_id(run_id));

        let report = harness.run(&rules).await.unwrap();
        let json = serde_json::to_value(report.summary()).unwrap();

        assert_eq!(json["run_id"], run_id.to_string());
        assert_eq!(json["rule_count"], 5);
        assert_eq!(json["sampled"], 2);
        assert_eq!(json["succeeded"], 2);
        assert_eq!(json["results"]["0"]["outcome"], "succeeded");
        assert_eq!(json["results"]["4"]["outcome"], "succeeded");
    }
}
