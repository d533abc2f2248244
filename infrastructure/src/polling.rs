//! Interval-driven polling with a budget (spec §9: "Polling loops for
//! state transitions... expressed as interval-driven loops with a budget;
//! each iteration is cancellable"). Adapted from the teacher's generic
//! `sync::timer` helper, extended with a deadline and a cancellation token
//! so every iteration is a suspension point that a caller can interrupt.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Done(T),
    DeadlineExceeded,
    Cancelled,
}

/// Calls `f` on every `interval` tick until it returns
/// `ControlFlow::Break`, the cumulative wall time exceeds `budget`, or
/// `cancel` fires — whichever comes first.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    budget: Duration,
    cancel: &CancellationToken,
    mut f: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<T>>,
{
    let deadline = Instant::now() + budget;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = ticker.tick() => {
                if let ControlFlow::Break(value) = f().await {
                    return PollOutcome::Done(value);
                }
                if Instant::now() >= deadline {
                    return PollOutcome::DeadlineExceeded;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_as_soon_as_condition_met() {
        let mut n = 0;
        let cancel = CancellationToken::new();
        let outcome = poll_until(Duration::from_millis(5), Duration::from_secs(1), &cancel, || {
            n += 1;
            async move {
                if n >= 3 {
                    ControlFlow::Break(n)
                } else {
                    ControlFlow::Continue(())
                }
            }
        })
        .await;
        assert_eq!(outcome, PollOutcome::Done(3));
    }

    #[tokio::test]
    async fn exceeding_budget_reports_deadline() {
        let cancel = CancellationToken::new();
        let outcome: PollOutcome<()> = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(30),
            &cancel,
            || async { ControlFlow::Continue(()) },
        )
        .await;
        assert_eq!(outcome, PollOutcome::DeadlineExceeded);
    }

    #[tokio::test]
    async fn cancellation_wins_over_continued_polling() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome: PollOutcome<()> = poll_until(
            Duration::from_millis(5),
            Duration::from_secs(1),
            &cancel,
            || async { ControlFlow::Continue(()) },
        )
        .await;
        assert_eq!(outcome, PollOutcome::Cancelled);
    }
}
