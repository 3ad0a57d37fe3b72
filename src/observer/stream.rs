//! Test observer for asynchronous stream producers.

use std::error::Error as StdError;
use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{AssertionFailure, OrRaise};
use crate::producer::{StreamCollector, StreamProducer};
use crate::recorder::{CapturedError, Recorder, TerminalState};
use crate::scope::{Scope, Spawner, TaskJoinHandle, WaitBudget};

const TASK_NAME: &str = "stream-test-observer";

fn expect_count(count: isize) -> usize {
    usize::try_from(count).unwrap_or_else(|_| {
        AssertionFailure::invalid_argument(format!("count must be >= 0, got {count}")).raise()
    })
}

/// Configuration for a [`StreamTestObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamObserverConfig {
    /// Defer the producer until the first assertion, and make that
    /// assertion wait for the producer's start signal.
    pub wait_for_delay: bool,
    /// How long suspending calls may wait on the producer.
    pub budget: WaitBudget,
}

impl StreamObserverConfig {
    /// Create a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer the producer until the first assertion.
    #[must_use]
    pub fn wait_for_delay(mut self) -> Self {
        self.wait_for_delay = true;
        self
    }

    /// Set the wait budget.
    #[must_use]
    pub fn budget(mut self, budget: WaitBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Give up waiting after `limit`.
    #[must_use]
    pub fn wait_at_most(self, limit: Duration) -> Self {
        self.budget(WaitBudget::Bounded(limit))
    }

    /// Wait on the producer without any limit.
    #[must_use]
    pub fn unbounded_wait(self) -> Self {
        self.budget(WaitBudget::Unbounded)
    }
}

/// Where the observer is in bringing up its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    /// The producer has not been launched.
    NotStarted,
    /// The producer was launched but has not been polled yet.
    Starting,
    /// The producer is running or has finished.
    Started,
}

type ProducerTask = Pin<Box<dyn Future<Output = ()> + Send>>;

enum Launch<H> {
    Deferred(ProducerTask),
    Running(Option<H>),
    Disposed { launched: bool },
}

impl<H> Launch<H> {
    fn take_deferred(&mut self) -> Option<ProducerTask> {
        match std::mem::replace(self, Self::Running(None)) {
            Self::Deferred(task) => Some(task),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Records everything a [`StreamProducer`] emits.
///
/// Created by [`observe_stream`](crate::observe_stream). Assertions are
/// async and chain through `.await`:
///
/// ```rust,ignore
/// observer
///     .assert_value_count(3).await
///     .assert_no_errors().await
///     .assert_complete().await;
/// ```
///
/// With the default configuration the producer starts at construction and is
/// driven inline up to its first suspension point, so values that are ready
/// right away are already recorded when the constructor returns. With
/// [`wait_for_delay`](StreamObserverConfig::wait_for_delay) nothing runs
/// until the first assertion, which then waits for the producer to start.
pub struct StreamTestObserver<T, S: Scope> {
    scope: S,
    config: StreamObserverConfig,
    recorder: Arc<Recorder<T>>,
    launch: Mutex<Launch<S::JoinHandle<()>>>,
}

impl<T, S> StreamTestObserver<T, S>
where
    T: Send + 'static,
    S: Scope,
{
    pub(crate) fn launch<P>(producer: P, scope: S, config: StreamObserverConfig) -> Self
    where
        P: StreamProducer<Item = T>,
    {
        let recorder = Arc::new(Recorder::new());
        let run = producer.run(StreamCollector::new(Arc::clone(&recorder)));
        let signal = Arc::clone(&recorder);
        // The observer owns the start signal: it fires on the first poll.
        let task: ProducerTask = Box::pin(async move {
            signal.mark_started();
            run.await;
        });
        let observer = Self {
            scope,
            config,
            recorder,
            launch: Mutex::new(Launch::Deferred(task)),
        };
        if !config.wait_for_delay {
            observer.start_inline();
        }
        observer
    }

    /// Drive the producer until it first suspends, then hand it to the scope.
    fn start_inline(&self) {
        let mut launch = self.launch.lock();
        let Some(mut task) = launch.take_deferred() else {
            return;
        };
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        let handle = match task.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                tracing::trace!("producer finished inline");
                None
            }
            Poll::Pending => Some(self.scope.spawn_named(TASK_NAME, task)),
        };
        *launch = Launch::Running(handle);
    }

    fn reject_negative_index(&self, index: isize) {
        if index < 0 {
            AssertionFailure::IndexOutOfRange {
                index,
                len: self.recorder.len(),
            }
            .raise();
        }
    }

    async fn ensure_initialized(&self) {
        if !self.config.wait_for_delay {
            return;
        }
        {
            let mut launch = self.launch.lock();
            if let Some(task) = launch.take_deferred() {
                tracing::trace!("launching deferred producer");
                *launch = Launch::Running(Some(self.scope.spawn_named(TASK_NAME, task)));
            }
        }
        let started = self
            .recorder
            .wait_until(|state| state.started || !state.terminal.is_active());
        if let Err(failure) = self
            .config
            .budget
            .apply(&self.scope, "the producer to start", started)
            .await
        {
            failure.raise();
        }
    }

    /// Assert that no values were emitted.
    ///
    /// # Panics
    ///
    /// Panics if any value was emitted.
    pub async fn assert_no_value(&self) -> &Self {
        self.ensure_initialized().await;
        self.recorder.check_no_values().or_raise();
        self
    }

    /// Assert that exactly `count` values were emitted.
    ///
    /// # Panics
    ///
    /// Panics if `count` is negative or differs from the number emitted.
    pub async fn assert_value_count(&self, count: isize) -> &Self {
        expect_count(count);
        self.ensure_initialized().await;
        self.recorder.check_value_count(count).or_raise();
        self
    }

    /// Assert the emitted values, as a whole, match a predicate.
    ///
    /// # Panics
    ///
    /// Panics if the predicate returns `false`.
    pub async fn assert_values<F>(&self, predicate: F) -> &Self
    where
        F: FnOnce(&[T]) -> bool,
        T: Debug,
    {
        self.ensure_initialized().await;
        self.recorder.check_values(predicate).or_raise();
        self
    }

    /// Assert the emitted values equal `expected`, pairwise in order.
    ///
    /// # Panics
    ///
    /// Panics on a length difference or the first unequal pair.
    pub async fn assert_values_eq(&self, expected: impl AsRef<[T]>) -> &Self
    where
        T: PartialEq + Debug,
    {
        self.ensure_initialized().await;
        self.recorder.check_values_eq(expected.as_ref()).or_raise();
        self
    }

    /// Assert the first value matches a predicate.
    ///
    /// # Panics
    ///
    /// Panics if nothing was emitted or the predicate returns `false`.
    pub async fn assert_value<F>(&self, predicate: F) -> &Self
    where
        F: FnOnce(&T) -> bool,
        T: Debug,
    {
        self.assert_value_at(0, predicate).await
    }

    /// Assert the value at `index` matches a predicate.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the emitted values or the predicate
    /// returns `false`.
    pub async fn assert_value_at<F>(&self, index: isize, predicate: F) -> &Self
    where
        F: FnOnce(&T) -> bool,
        T: Debug,
    {
        self.reject_negative_index(index);
        self.ensure_initialized().await;
        self.recorder.check_value_at(index, predicate).or_raise();
        self
    }

    /// Assert the value at `index` equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the emitted values or the value differs.
    pub async fn assert_value_at_eq(&self, index: isize, expected: T) -> &Self
    where
        T: PartialEq + Debug,
    {
        self.reject_negative_index(index);
        self.ensure_initialized().await;
        self.recorder.check_value_at_eq(index, &expected).or_raise();
        self
    }

    /// Assert the producer failed with an error of the same type and message
    /// as `expected`.
    ///
    /// # Panics
    ///
    /// Panics if no error was captured or it differs.
    pub async fn assert_error_eq<E>(&self, expected: &E) -> &Self
    where
        E: StdError + 'static,
    {
        self.ensure_initialized().await;
        self.recorder.check_error_eq(expected).or_raise();
        self
    }

    /// Assert the producer failed with an error of type `E`.
    ///
    /// # Panics
    ///
    /// Panics if no error was captured or it has another type.
    pub async fn assert_error_type<E>(&self) -> &Self
    where
        E: StdError + 'static,
    {
        self.ensure_initialized().await;
        self.recorder.check_error_type::<E>().or_raise();
        self
    }

    /// Assert the captured error matches a predicate.
    ///
    /// # Panics
    ///
    /// Panics if no error was captured or the predicate returns `false`.
    pub async fn assert_error<F>(&self, predicate: F) -> &Self
    where
        F: FnOnce(&(dyn StdError + Send + Sync + 'static)) -> bool,
    {
        self.ensure_initialized().await;
        self.recorder.check_error(predicate).or_raise();
        self
    }

    /// Assert the producer has not failed.
    ///
    /// # Panics
    ///
    /// Panics if an error was captured.
    pub async fn assert_no_errors(&self) -> &Self {
        self.ensure_initialized().await;
        self.recorder.check_no_errors().or_raise();
        self
    }

    /// Assert the producer completed normally.
    ///
    /// # Panics
    ///
    /// Panics if the producer is still active or failed.
    pub async fn assert_complete(&self) -> &Self {
        self.ensure_initialized().await;
        self.recorder.check_complete().or_raise();
        self
    }

    /// Assert the producer has not completed normally.
    ///
    /// # Panics
    ///
    /// Panics if the producer completed.
    pub async fn assert_not_complete(&self) -> &Self {
        self.ensure_initialized().await;
        self.recorder.check_not_complete().or_raise();
        self
    }

    /// Wait until at least `count` values were emitted.
    ///
    /// # Panics
    ///
    /// Panics if `count` is negative, the wait budget runs out, or the
    /// producer terminates with fewer values.
    pub async fn await_value_count(&self, count: isize) -> &Self {
        let target = expect_count(count);
        self.ensure_initialized().await;
        let reached = self
            .recorder
            .wait_until(move |state| state.values.len() >= target || !state.terminal.is_active());
        if let Err(failure) = self.config.budget.apply(&self.scope, "values", reached).await {
            failure.raise();
        }
        let actual = self.recorder.len();
        if actual < target {
            AssertionFailure::CountMismatch {
                expected: target,
                actual,
            }
            .raise();
        }
        self
    }

    /// Wait until the producer completes or fails.
    ///
    /// # Panics
    ///
    /// Panics if the wait budget runs out.
    pub async fn await_terminal(&self) -> &Self {
        self.ensure_initialized().await;
        let terminated = self
            .recorder
            .wait_until(|state| !state.terminal.is_active());
        if let Err(failure) = self
            .config
            .budget
            .apply(&self.scope, "a terminal signal", terminated)
            .await
        {
            failure.raise();
        }
        self
    }

    /// Snapshot of the emitted values in order.
    pub async fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.ensure_initialized().await;
        self.recorder.values()
    }

    /// The captured error, if the producer failed.
    #[must_use]
    pub fn error(&self) -> Option<CapturedError> {
        self.recorder.error()
    }

    /// Current terminal state.
    #[must_use]
    pub fn terminal_state(&self) -> TerminalState {
        self.recorder.terminal_state()
    }

    /// Where the observer is in bringing up its producer.
    #[must_use]
    pub fn initialization_state(&self) -> InitializationState {
        match &*self.launch.lock() {
            Launch::Deferred(_) | Launch::Disposed { launched: false } => {
                InitializationState::NotStarted
            }
            _ if self.recorder.has_started() => InitializationState::Started,
            _ => InitializationState::Starting,
        }
    }

    /// The recorder behind this observer, for non-panicking checks.
    ///
    /// Reading the recorder does not launch a deferred producer: with
    /// [`wait_for_delay`](StreamObserverConfig::wait_for_delay) it stays
    /// empty until the first `assert_*` or `await_*` call.
    #[must_use]
    pub fn recorder(&self) -> &Recorder<T> {
        &self.recorder
    }

    /// The configuration this observer was created with.
    #[must_use]
    pub fn config(&self) -> StreamObserverConfig {
        self.config
    }
}

impl<T, S: Scope> StreamTestObserver<T, S> {
    /// Cancel the producer.
    ///
    /// Unlike [`ValueTestObserver::dispose`](crate::ValueTestObserver::dispose),
    /// the recorded values are kept. Anything the producer emits afterwards is
    /// dropped. Calling it again is a no-op.
    pub fn dispose(&self) {
        self.recorder.dispose(false);
        let mut launch = self.launch.lock();
        let launched = match std::mem::replace(&mut *launch, Launch::Disposed { launched: false }) {
            Launch::Deferred(_) => false,
            Launch::Running(handle) => {
                if let Some(handle) = handle {
                    handle.abort();
                }
                tracing::trace!("stream observer disposed");
                true
            }
            Launch::Disposed { launched } => launched,
        };
        *launch = Launch::Disposed { launched };
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(*self.launch.lock(), Launch::Disposed { .. })
    }
}

impl<T, S: Scope> Drop for StreamTestObserver<T, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Debug, S: Scope> Debug for StreamTestObserver<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTestObserver")
            .field("config", &self.config)
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}
