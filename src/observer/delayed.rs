//! Assertions that run as their own task.

use std::fmt;
use std::future::Future;

use super::stream::{StreamObserverConfig, StreamTestObserver};
use crate::producer::StreamProducer;
use crate::scope::{JoinFailure, Scope, Spawner, TaskJoinHandle};

/// How a finished [`AssertionTask`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every assertion passed.
    Passed,
    /// The task was cancelled before it finished.
    Cancelled,
}

/// Handle to a block of assertions launched by [`test_delayed`].
#[must_use = "a failing assertion only surfaces when the task is joined"]
pub struct AssertionTask<H> {
    handle: H,
}

impl<H> AssertionTask<H>
where
    H: TaskJoinHandle<Output = ()>,
{
    /// Cancel the assertions. The observer they own is disposed with them.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Check if the assertions have finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the assertions to finish.
    ///
    /// # Panics
    ///
    /// Re-raises the panic of a failed assertion on the caller's task.
    pub async fn join(self) -> TaskOutcome {
        match self.handle.join().await {
            Ok(()) => TaskOutcome::Passed,
            Err(JoinFailure::Cancelled) => TaskOutcome::Cancelled,
            Err(JoinFailure::Panicked(payload)) => std::panic::resume_unwind(payload),
        }
    }
}

impl<H> fmt::Debug for AssertionTask<H>
where
    H: TaskJoinHandle<Output = ()>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionTask")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// Observe `producer` and run `assertions` against it on a task of `scope`.
///
/// The observer is created inside the task, so a lazily configured producer
/// starts on the same task that waits for it. Nothing fails in the caller
/// until the returned handle is [joined](AssertionTask::join).
///
/// # Example
///
/// ```rust,ignore
/// let config = StreamObserverConfig::new().wait_for_delay();
/// let task = test_delayed(producer, scope, config, |observer| async move {
///     observer.await_terminal().await.assert_value_count(2).await;
/// });
/// assert_eq!(task.join().await, TaskOutcome::Passed);
/// ```
pub fn test_delayed<P, S, F, Fut>(
    producer: P,
    scope: S,
    config: StreamObserverConfig,
    assertions: F,
) -> AssertionTask<S::JoinHandle<()>>
where
    P: StreamProducer,
    S: Scope + Clone + 'static,
    F: FnOnce(StreamTestObserver<P::Item, S>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let launcher = scope.clone();
    let handle = launcher.spawn_named("delayed-assertions", async move {
        let observer = StreamTestObserver::launch(producer, scope, config);
        assertions(observer).await;
    });
    AssertionTask { handle }
}
