//! Run-level error types.
//!
//! A run fails in one of two distinguishable ways: the batch never made it
//! through the apply path, or it did and some sampled rules never became
//! routable inside their window.

use crate::submit::SubmitError;
use thiserror::Error;

/// Errors surfaced to the caller of a propagation run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The external apply call failed; nothing was verified.
    #[error("Submission failed: {0}")]
    Submission(#[from] SubmitError),

    /// Submission completed but some sampled rules did not converge.
    #[error("Propagation did not converge for {} of {sampled} sampled rules: {failed:?}", failed.len())]
    PropagationIncomplete { failed: Vec<usize>, sampled: usize },

    /// Failed to build the HTTP client used for probing.
    #[error("Probe setup failed: {0}")]
    ProbeSetup(String),
}
