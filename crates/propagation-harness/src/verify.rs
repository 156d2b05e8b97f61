//! Concurrent propagation verification.
//!
//! One task per sampled index, all spawned before any is awaited. Each task
//! polls its own rule at a fixed interval until the probe observes it or the
//! task's deadline (measured from when that task started polling) elapses.
//! The verifier joins every task; one task failing never cancels another.

use crate::eventual::{poll_until, PollOutcome};
use crate::probe::Probe;
use crate::sample::SampleSet;
use crate::timing::duration_ms;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default interval between probe attempts in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default per-task deadline in seconds.
pub const DEFAULT_PROPAGATION_TIMEOUT_SECONDS: u64 = 300;

/// Terminal state of one verification task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The rule became observable.
    Succeeded {
        attempts: u32,
        #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
        elapsed: Duration,
    },

    /// The deadline elapsed; the target answered but never showed the rule.
    TimedOut {
        attempts: u32,
        #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
        elapsed: Duration,
    },

    /// The deadline elapsed and the final attempt failed at transport level.
    RequestError {
        attempts: u32,
        #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
        elapsed: Duration,
        error: String,
    },

    /// The task itself panicked or was aborted.
    Panicked { message: String },
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Succeeded { .. })
    }
}

fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration_ms(*d))
}

/// Per-index outcomes of one verification pass.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct VerificationResults(BTreeMap<usize, VerificationOutcome>);

impl VerificationResults {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VerificationOutcome> {
        self.0.get(&index)
    }

    /// Outcomes in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &VerificationOutcome)> {
        self.0.iter().map(|(i, o)| (*i, o))
    }

    pub fn all_succeeded(&self) -> bool {
        self.0.values().all(VerificationOutcome::is_success)
    }

    pub fn succeeded_count(&self) -> usize {
        self.0.values().filter(|o| o.is_success()).count()
    }

    /// Indices whose task did not observe success, ascending.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(i, _)| *i)
            .collect()
    }
}

/// Polling parameters shared by every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierSettings {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            deadline: Duration::from_secs(DEFAULT_PROPAGATION_TIMEOUT_SECONDS),
        }
    }
}

/// Fans out one polling task per sampled index and joins them all.
pub struct ConcurrentVerifier<P> {
    probe: Arc<P>,
    settings: VerifierSettings,
}

impl<P: Probe + 'static> ConcurrentVerifier<P> {
    pub fn new(probe: Arc<P>, settings: VerifierSettings) -> Self {
        Self { probe, settings }
    }

    pub fn settings(&self) -> VerifierSettings {
        self.settings
    }

    /// Verify every index in `sample`, returning once all tasks resolved.
    #[instrument(skip_all, name = "propagation.verify", fields(sampled = sample.len()))]
    pub async fn verify(&self, sample: &SampleSet) -> VerificationResults {
        let started = Instant::now();

        let handles: Vec<_> = sample
            .iter()
            .map(|index| {
                let probe = Arc::clone(&self.probe);
                let settings = self.settings;
                (index, tokio::spawn(verify_index(probe, index, settings)))
            })
            .collect();

        let (indices, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let results: BTreeMap<usize, VerificationOutcome> = indices
            .into_iter()
            .zip(joined)
            .map(|(index, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    warn!(
                        target: "propagation.verify",
                        index,
                        error = %e,
                        "Verification task did not complete"
                    );
                    VerificationOutcome::Panicked {
                        message: e.to_string(),
                    }
                });
                (index, outcome)
            })
            .collect();

        let results = VerificationResults(results);
        info!(
            target: "propagation.verify",
            sampled = results.len(),
            succeeded = results.succeeded_count(),
            duration_ms = duration_ms(started.elapsed()),
            "Verification finished"
        );
        results
    }
}

#[instrument(skip(probe, settings), name = "propagation.verify.task")]
async fn verify_index<P: Probe>(
    probe: Arc<P>,
    index: usize,
    settings: VerifierSettings,
) -> VerificationOutcome {
    let outcome = poll_until(
        settings.poll_interval,
        settings.deadline,
        || probe.probe(index),
        |attempt, e| {
            warn!(
                target: "propagation.verify",
                index,
                attempt,
                error = %e,
                "Probe attempt failed, retrying"
            );
        },
    )
    .await;

    match outcome {
        PollOutcome::Satisfied { attempts, elapsed } => {
            debug!(
                target: "propagation.verify",
                index,
                attempts,
                elapsed_ms = duration_ms(elapsed),
                "Rule observed"
            );
            VerificationOutcome::Succeeded { attempts, elapsed }
        }
        PollOutcome::Expired {
            attempts,
            elapsed,
            last_error,
        } => {
            warn!(
                target: "propagation.verify",
                index,
                attempts,
                elapsed_ms = duration_ms(elapsed),
                "Rule not observed before deadline"
            );
            match last_error {
                Some(e) => VerificationOutcome::RequestError {
                    attempts,
                    elapsed,
                    error: e.to_string(),
                },
                None => VerificationOutcome::TimedOut { attempts, elapsed },
            }
        }
    }
}
