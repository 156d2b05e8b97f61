//! Fixed-interval polling with a hard deadline.
//!
//! Used by each verification task and by the env tests while waiting on
//! cluster state (e.g. a run's rules being garbage collected).

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<E> {
    /// The condition held on attempt `attempts`.
    Satisfied { attempts: u32, elapsed: Duration },

    /// The deadline passed without the condition holding.
    ///
    /// `last_error` is the error from the final attempt, if that attempt
    /// failed rather than returning `false`.
    Expired {
        attempts: u32,
        elapsed: Duration,
        last_error: Option<E>,
    },
}

impl<E> PollOutcome<E> {
    /// True if the condition was observed.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }
}

/// Poll `condition` every `interval` until it returns `Ok(true)` or `deadline`
/// elapses.
///
/// - The first attempt is issued immediately.
/// - `Err` results are handed to `on_error` and polling continues.
/// - The final sleep is capped at the remaining time, so the loop makes one
///   last attempt at the deadline and never reports expiry early.
/// - An attempt still pending at the deadline is dropped and the outcome
///   carries no error.
pub async fn poll_until<F, Fut, E, H>(
    interval: Duration,
    deadline: Duration,
    mut condition: F,
    mut on_error: H,
) -> PollOutcome<E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    H: FnMut(u32, &E),
{
    let start = Instant::now();
    let expires_at = start + deadline;
    let mut attempts: u32 = 0;
    let mut last_error: Option<E> = None;

    loop {
        attempts = attempts.saturating_add(1);

        match timeout_at(expires_at, condition()).await {
            Ok(Ok(true)) => {
                return PollOutcome::Satisfied {
                    attempts,
                    elapsed: start.elapsed(),
                };
            }
            Ok(Ok(false)) => last_error = None,
            Ok(Err(e)) => {
                on_error(attempts, &e);
                last_error = Some(e);
            }
            // Attempt still in flight at the deadline; an earlier error
            // does not describe it
            Err(_) => {
                return PollOutcome::Expired {
                    attempts,
                    elapsed: start.elapsed(),
                    last_error: None,
                };
            }
        }

        let now = Instant::now();
        if now >= expires_at {
            return PollOutcome::Expired {
                attempts,
                elapsed: now.duration_since(start),
                last_error,
            };
        }

        sleep(interval.min(expires_at - now)).await;
    }
}
