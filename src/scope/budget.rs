//! Wait budgets for suspending assertions.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;

use super::TimeSource;
use crate::error::AssertionFailure;

/// How long an observer may suspend waiting on its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitBudget {
    /// Wait forever. A producer that never signals hangs the test.
    Unbounded,
    /// Give up after the duration and fail with
    /// [`AssertionFailure::Timeout`].
    Bounded(Duration),
}

impl WaitBudget {
    /// The budget used unless configured otherwise.
    pub const DEFAULT: Self = Self::Bounded(Duration::from_secs(5));

    /// Race `future` against this budget on `time`'s clock.
    pub fn apply<'a, T, F>(
        self,
        time: &'a T,
        waiting_for: &'static str,
        future: F,
    ) -> Budgeted<'a, F>
    where
        T: TimeSource,
        F: Future,
    {
        let started = time.now();
        let deadline = match self {
            Self::Unbounded => None,
            Self::Bounded(limit) => Some(time.sleep(limit)),
        };
        Budgeted {
            inner: future,
            deadline,
            time,
            started,
            waiting_for,
        }
    }
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pin_project! {
    /// Future returned by [`WaitBudget::apply`].
    pub struct Budgeted<'a, F> {
        #[pin]
        inner: F,
        deadline: Option<Pin<Box<dyn Future<Output = ()> + Send + 'a>>>,
        time: &'a dyn TimeSource,
        started: Duration,
        waiting_for: &'static str,
    }
}

impl<F: Future> Future for Budgeted<'_, F> {
    type Output = Result<F::Output, AssertionFailure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(output) = this.inner.poll(cx) {
            return Poll::Ready(Ok(output));
        }

        match this.deadline.as_mut() {
            Some(deadline) => match deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    let waited = this.time.now().saturating_sub(*this.started);
                    tracing::warn!(
                        waiting_for = *this.waiting_for,
                        ?waited,
                        "wait budget exhausted"
                    );
                    Poll::Ready(Err(AssertionFailure::timeout(*this.waiting_for, waited)))
                }
                Poll::Pending => Poll::Pending,
            },
            None => Poll::Pending,
        }
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use super::*;
    use crate::scope::TokioScope;

    #[test]
    fn test_default_budget_is_bounded() {
        assert_eq!(
            WaitBudget::default(),
            WaitBudget::Bounded(Duration::from_secs(5))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_budget_times_out() {
        let scope = TokioScope::current();
        let result = WaitBudget::Bounded(Duration::from_secs(2))
            .apply(&scope, "nothing", std::future::pending::<()>())
            .await;

        match result {
            Err(AssertionFailure::Timeout {
                waiting_for,
                waited,
            }) => {
                assert_eq!(waiting_for, "nothing");
                assert!(waited >= Duration::from_secs(2));
                assert!(waited < Duration::from_secs(3));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_budget_passes_output_through() {
        let scope = TokioScope::current();
        let result = WaitBudget::Bounded(Duration::from_secs(2))
            .apply(&scope, "value", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                42
            })
            .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_budget_never_times_out() {
        let scope = TokioScope::current();
        let wait = WaitBudget::Unbounded.apply(&scope, "nothing", std::future::pending::<()>());
        let outcome = tokio::time::timeout(Duration::from_secs(3600), wait).await;
        assert!(outcome.is_err(), "an unbounded wait must still be pending");
    }
}
