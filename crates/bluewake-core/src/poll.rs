// ── Bounded polling ──
//
// Shared by adapter enable confirmation, WiFi bring-up, and post-strategy
// verification. Each attempt sleeps first, then checks, so a condition is
// never declared satisfied before the first interval has elapsed.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How often to check, and how many times before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// A single check after `delay`.
    pub const fn once_after(delay: Duration) -> Self {
        Self::new(delay, 1)
    }

    /// Upper bound on wall-clock time spent polling.
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// How a [`poll_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { attempts: u32 },
    Exhausted,
    Cancelled,
}

/// Sleep `interval`, evaluate `check`, repeat up to `max_attempts` times.
///
/// Cancellation is observed both while sleeping and after each check: a
/// check that succeeds after the token fired still reports `Cancelled`.
pub async fn poll_until<F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return PollOutcome::Cancelled,
            () = tokio::time::sleep(policy.interval) => {}
        }

        let satisfied = check().await;
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        if satisfied {
            return PollOutcome::Satisfied { attempts: attempt };
        }
    }
    PollOutcome::Exhausted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    const POLICY: RetryPolicy = RetryPolicy::new(Duration::from_millis(100), 30);

    #[tokio::test(start_paused = true)]
    async fn satisfied_on_nth_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let counter = Arc::clone(&calls);
        let outcome = poll_until(POLICY, &CancellationToken::new(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n >= 4 }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Satisfied { attempts: 4 });
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_after_budget() {
        let start = Instant::now();
        let outcome = poll_until(POLICY, &CancellationToken::new(), || async { false }).await;
        assert_eq!(outcome, PollOutcome::Exhausted);
        assert_eq!(start.elapsed(), POLICY.budget());
        assert_eq!(POLICY.budget(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_late_success() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let outcome = poll_until(POLICY, &cancel, move || {
            trigger.cancel();
            async { true }
        })
        .await;
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_sleeping() {
        let cancel = CancellationToken::new();
        let mut poll = tokio_test::task::spawn(poll_until(POLICY, &cancel, || async { true }));
        tokio_test::assert_pending!(poll.poll());
        cancel.cancel();
        assert!(poll.is_woken());
        assert_eq!(
            tokio_test::assert_ready!(poll.poll()),
            PollOutcome::Cancelled
        );
    }
}
