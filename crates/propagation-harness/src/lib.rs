//! Bulk-configuration propagation verifier.
//!
//! Submits a large batch of routing rules to a system under test in one
//! apply, samples a bounded subset of the batch, and polls every sampled
//! rule's endpoint concurrently until it becomes routable or its deadline
//! elapses. The resulting [`harness::RunReport`] carries the four phase
//! timestamps and a per-index outcome map.
//!
//! # Flow
//!
//! ```text
//! RuleSet ──► BatchSubmitter ──► sample::select ──► ConcurrentVerifier ──► RunReport
//!             (one apply)         (k + boundaries)   (one task per index)
//! ```
//!
//! # Usage
//!
//! ```bash
//! PERF_PROXY_URL=http://172.18.0.240 \
//! PERF_KUBECONFIG=/tmp/kind.kubeconfig \
//!     cargo run -p propagation-harness
//! ```

pub mod config;
pub mod error;
pub mod eventual;
pub mod harness;
pub mod probe;
pub mod rules;
pub mod sample;
pub mod submit;
pub mod timing;
pub mod verify;

pub use error::HarnessError;
pub use harness::{PropagationHarness, RunReport};
pub use probe::{HttpProbe, Probe};
pub use rules::{RuleOptions, RuleSet};
pub use sample::SampleSet;
pub use submit::{Applier, BatchSubmitter, KubectlApplier};
pub use timing::TimingRecord;
pub use verify::{ConcurrentVerifier, VerificationOutcome};
