//! Waiting on recorder state.
//!
//! Waiters park their wakers on the recorder; every mutation of the recorder
//! releases all of them and each one re-checks its own condition.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::{Recorder, RecorderState};

/// A future that resolves once a condition over the recorder holds.
///
/// Resolves to `false` instead if the recorder is disposed first.
pub(crate) struct WaitUntil<'a, T, F> {
    recorder: &'a Recorder<T>,
    condition: F,
}

impl<'a, T, F> WaitUntil<'a, T, F> {
    pub(crate) fn new(recorder: &'a Recorder<T>, condition: F) -> Self {
        Self {
            recorder,
            condition,
        }
    }
}

// Nothing inside is ever pinned in place.
impl<T, F> Unpin for WaitUntil<'_, T, F> {}

impl<T, F> Future for WaitUntil<'_, T, F>
where
    F: FnMut(&RecorderState<T>) -> bool,
{
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut state = this.recorder.state.lock();

        if (this.condition)(&state) {
            return Poll::Ready(true);
        }
        if state.disposed {
            return Poll::Ready(false);
        }

        // Checked and registered under the same lock, so no wake-up is lost.
        if !state.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            state.waiters.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;

    #[test]
    fn test_ready_when_condition_holds() {
        let recorder = Recorder::new();
        recorder.push(1);
        let ready = recorder.wait_until(|s| s.values.len() == 1).now_or_never();
        assert_eq!(ready, Some(true));
    }

    #[test]
    fn test_pending_registers_one_waker() {
        let recorder: Recorder<i32> = Recorder::new();
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut wait = recorder.wait_until(|s| !s.values.is_empty());

        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        assert_eq!(recorder.state.lock().waiters.len(), 1);
    }

    #[test]
    fn test_dispose_resolves_false() {
        let recorder: Recorder<i32> = Recorder::new();
        recorder.dispose(false);
        let ready = recorder.wait_until(|s| s.values.len() == 10).now_or_never();
        assert_eq!(ready, Some(false));
    }

    #[tokio::test]
    async fn test_woken_by_push_from_another_task() {
        let recorder = Arc::new(Recorder::new());
        let producer = Arc::clone(&recorder);

        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            producer.push("late");
        });

        assert!(recorder.wait_until(|s| s.values.len() == 1).await);
        handle.await.unwrap();
        assert_eq!(recorder.values(), vec!["late"]);
    }
}
