//! Batch submission through an external apply mechanism.
//!
//! The whole rule set goes out as one payload in one call. The applier is a
//! trait so the harness can run against a fake in tests; production uses
//! `kubectl apply -f -`.

use crate::rules::RuleSet;
use crate::timing::{duration_ms, SubmissionTiming};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Maximum length of captured stderr kept in error messages.
const MAX_STDERR_LEN: usize = 512;

/// Default timeout for the apply call in seconds.
pub const DEFAULT_APPLY_TIMEOUT_SECONDS: u64 = 600;

/// Submission errors. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Failed to render rule manifest: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest to apply stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Apply exited with status {code:?}: {stderr}")]
    ApplyFailed { code: Option<i32>, stderr: String },

    #[error("Apply did not finish within {seconds}s")]
    Timeout { seconds: u64 },
}

/// Applies a serialized batch of rules to the system under test as one unit.
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, manifest: &str) -> Result<(), SubmitError>;
}

/// Applier that pipes the manifest to `kubectl apply -f -`.
#[derive(Debug, Clone)]
pub struct KubectlApplier {
    program: String,
    kubeconfig: Option<PathBuf>,
    namespace: Option<String>,
    timeout: Duration,
}

impl KubectlApplier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            kubeconfig: None,
            namespace: None,
            timeout: Duration::from_secs(DEFAULT_APPLY_TIMEOUT_SECONDS),
        }
    }

    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed to the kubectl binary.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        if let Some(namespace) = &self.namespace {
            args.push("--namespace".to_string());
            args.push(namespace.clone());
        }
        args.extend(["apply", "-f", "-"].map(String::from));
        args
    }

    async fn run(&self, manifest: &str) -> Result<(), SubmitError> {
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SubmitError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(manifest.as_bytes()).await {
                Ok(()) => {}
                // kubectl exited before reading the manifest; its exit
                // status and stderr say why
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(
                        target: "propagation.submit",
                        "kubectl closed stdin before reading the manifest"
                    );
                }
                Err(e) => return Err(SubmitError::Stdin(e)),
            }
            // Dropping stdin closes the pipe so kubectl sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| SubmitError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SubmitError::ApplyFailed {
                code: output.status.code(),
                stderr: truncate(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        debug!(
            target: "propagation.submit",
            stdout_bytes = output.stdout.len(),
            "kubectl apply finished"
        );
        Ok(())
    }
}

#[async_trait]
impl Applier for KubectlApplier {
    async fn apply(&self, manifest: &str) -> Result<(), SubmitError> {
        match tokio::time::timeout(self.timeout, self.run(manifest)).await {
            Ok(result) => result,
            Err(_) => Err(SubmitError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

fn truncate(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_STDERR_LEN) {
        Some((cut, _)) => format!("{}...[truncated]", text.get(..cut).unwrap_or(text)),
        None => text.to_string(),
    }
}

/// Renders a rule set and hands it to the applier in a single call.
pub struct BatchSubmitter<A> {
    applier: A,
}

impl<A: Applier> BatchSubmitter<A> {
    pub fn new(applier: A) -> Self {
        Self { applier }
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Submit `rules` and record when the apply call started and returned.
    ///
    /// Rendering happens before the start timestamp so only the apply call
    /// itself is timed.
    #[instrument(skip_all, name = "propagation.submit", fields(rules = rules.len()))]
    pub async fn submit(&self, rules: &RuleSet) -> Result<SubmissionTiming, SubmitError> {
        let manifest = rules.to_manifest()?;

        info!(
            target: "propagation.submit",
            rules = rules.len(),
            manifest_bytes = manifest.len(),
            "Submitting rule batch"
        );

        let started = Instant::now();
        self.applier.apply(&manifest).await?;
        let finished = Instant::now();

        let timing = SubmissionTiming { started, finished };
        info!(
            target: "propagation.submit",
            rules = rules.len(),
            duration_ms = duration_ms(timing.duration()),
            "Rule batch applied"
        );
        Ok(timing)
    }
}
