//! Phase timestamps for a propagation run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Start and end of the single apply call.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionTiming {
    pub started: Instant,
    pub finished: Instant,
}

impl SubmissionTiming {
    pub fn duration(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }
}

/// The four instants of a run plus the wall-clock time it began.
#[derive(Debug, Clone, Copy)]
pub struct TimingRecord {
    pub started_at: DateTime<Utc>,
    pub submission_started: Instant,
    pub submission_finished: Instant,
    pub verification_started: Instant,
    pub verification_finished: Instant,
}

impl TimingRecord {
    /// Time spent in the apply call.
    pub fn submission_duration(&self) -> Duration {
        self.submission_finished
            .saturating_duration_since(self.submission_started)
    }

    /// Time from first task dispatch to the last task resolving.
    pub fn verification_duration(&self) -> Duration {
        self.verification_finished
            .saturating_duration_since(self.verification_started)
    }

    /// Time from the batch being accepted to every sampled rule resolving.
    pub fn propagation_latency(&self) -> Duration {
        self.verification_finished
            .saturating_duration_since(self.submission_finished)
    }

    /// Durations in milliseconds, for logs and metrics sinks.
    pub fn summary(&self) -> TimingSummary {
        TimingSummary {
            started_at: self.started_at,
            submission_ms: duration_ms(self.submission_duration()),
            verification_ms: duration_ms(self.verification_duration()),
            propagation_latency_ms: duration_ms(self.propagation_latency()),
        }
    }
}

/// Serializable view of a [`TimingRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingSummary {
    pub started_at: DateTime<Utc>,
    pub submission_ms: u64,
    pub verification_ms: u64,
    pub propagation_latency_ms: u64,
}

/// Saturating whole milliseconds.
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
