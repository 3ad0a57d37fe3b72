//! Explicit concurrency scopes for stream observers.
//!
//! A stream observer never reaches for an ambient runtime. Every constructor
//! takes a [`Scope`]: something that can launch tasks ([`Spawner`]) and tell
//! time ([`TimeSource`]). Cancellation of a launched task goes through its
//! [`TaskJoinHandle`].
//!
//! # Core Traits
//!
//! - [`TimeSource`] - Time operations (now, sleep) used for wait budgets
//! - [`Spawner`] - Task launching
//! - [`Scope`] - Both of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use testkit_observe::scope::TokioScope;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let scope = TokioScope::current();
//!     let observer = observe_stream(producer, scope.clone(), Default::default());
//!     // ...
//!     scope.cancel();
//! }
//! ```

mod budget;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use budget::{Budgeted, WaitBudget};

/// A source of time for wait budgets.
pub trait TimeSource: Send + Sync {
    /// Get the current time as a duration since an epoch.
    fn now(&self) -> Duration;

    /// Create a future that completes after the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Why a task did not produce its output.
pub enum JoinFailure {
    /// The task was cancelled before it finished.
    Cancelled,
    /// The task panicked; carries the panic payload.
    Panicked(Box<dyn Any + Send + 'static>),
}

impl fmt::Debug for JoinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Panicked(_) => f.write_str("Panicked(..)"),
        }
    }
}

/// A handle to a launched task.
pub trait TaskJoinHandle: Send {
    /// The output type of the task.
    type Output;

    /// Wait for the task to finish.
    fn join(self) -> Pin<Box<dyn Future<Output = Result<Self::Output, JoinFailure>> + Send>>;

    /// Cancel the task.
    fn abort(&self);

    /// Check if the task is finished.
    fn is_finished(&self) -> bool;
}

/// A launcher for async tasks.
pub trait Spawner: Send + Sync {
    /// The join handle type for launched tasks.
    type JoinHandle<T: Send + 'static>: TaskJoinHandle<Output = T> + Send;

    /// Launch a new task.
    fn spawn<F, T>(&self, future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static;

    /// Launch a new task with a name (for debugging).
    fn spawn_named<F, T>(&self, name: &str, future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let _ = name; // Default implementation ignores name
        self.spawn(future)
    }
}

/// A concurrency scope: launches tasks and keeps time.
pub trait Scope: TimeSource + Spawner {}

impl<S: TimeSource + Spawner + ?Sized> Scope for S {}

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(feature = "tokio")]
pub use self::tokio::{TokioJoinHandle, TokioScope};
