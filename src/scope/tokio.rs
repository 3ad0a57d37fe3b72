//! Tokio-backed concurrency scope.
//!
//! [`TokioScope`] launches tasks on a captured runtime handle and keeps time
//! with `tokio::time`, so a test started with `start_paused = true` drives
//! both delayed producers and wait budgets with virtual time.
//!
//! # Example
//!
//! ```rust,ignore
//! use testkit_observe::scope::TokioScope;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_with_paused_time() {
//!     let scope = TokioScope::current();
//!     // launch observers on `scope`, then:
//!     scope.cancel();
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ::tokio::runtime::Handle;
use ::tokio::task::{AbortHandle, JoinHandle};
use ::tokio::time::Instant;
use parking_lot::Mutex;

use super::{JoinFailure, Spawner, TaskJoinHandle, TimeSource};

/// A concurrency scope bound to a Tokio runtime.
///
/// Clones share the same task set: cancelling one cancels every task
/// launched through any of them.
#[derive(Debug, Clone)]
pub struct TokioScope {
    handle: Handle,
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
    epoch: Instant,
}

impl TokioScope {
    /// Create a scope on the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::from_handle(Handle::current())
    }

    /// Create a scope on an explicit runtime handle.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        let epoch = {
            let _guard = handle.enter();
            Instant::now()
        };
        Self {
            handle,
            tasks: Arc::new(Mutex::new(Vec::new())),
            epoch,
        }
    }

    /// Cancel every task launched through this scope that is still running.
    ///
    /// Returns the number of tasks cancelled.
    pub fn cancel(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let mut cancelled = 0;
        for task in tasks {
            if !task.is_finished() {
                task.abort();
                cancelled += 1;
            }
        }
        tracing::debug!(cancelled, "scope cancelled");
        cancelled
    }

    /// Number of launched tasks that have not finished yet.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    fn track(&self, abort: AbortHandle) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(abort);
    }
}

impl TimeSource for TokioScope {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.epoch)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(::tokio::time::sleep(duration))
    }
}

/// Join handle for tasks launched on a [`TokioScope`].
pub struct TokioJoinHandle<T> {
    inner: JoinHandle<T>,
}

impl<T: Send + 'static> TaskJoinHandle for TokioJoinHandle<T> {
    type Output = T;

    fn join(self) -> Pin<Box<dyn Future<Output = Result<Self::Output, JoinFailure>> + Send>> {
        Box::pin(async move {
            self.inner.await.map_err(|err| {
                if err.is_panic() {
                    JoinFailure::Panicked(err.into_panic())
                } else {
                    JoinFailure::Cancelled
                }
            })
        })
    }

    fn abort(&self) {
        self.inner.abort();
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Spawner for TokioScope {
    type JoinHandle<T: Send + 'static> = TokioJoinHandle<T>;

    fn spawn<F, T>(&self, future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.handle.spawn(future);
        self.track(inner.abort_handle());
        TokioJoinHandle { inner }
    }

    fn spawn_named<F, T>(&self, name: &str, future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        // Named tasks need tokio_unstable; the name only goes to the log.
        tracing::trace!(task = name, "launching task");
        self.spawn(future)
    }
}
