//! The shared recording core behind every test observer.
//!
//! A [`Recorder`] is an append-only buffer of received values plus the
//! terminal state of the producer feeding it. Producers write into it through
//! the observers' callbacks; assertions read from it through the `check_*`
//! methods, which return an [`AssertionFailure`] instead of panicking.
//!
//! # Example
//!
//! ```rust
//! use testkit_observe::recorder::Recorder;
//!
//! let recorder = Recorder::new();
//! recorder.push(1);
//! recorder.push(2);
//! recorder.complete();
//!
//! assert!(recorder.check_value_count(2).is_ok());
//! assert!(recorder.check_complete().is_ok());
//! assert!(recorder.check_value_count(-1).is_err());
//! ```

mod wait;

use std::error::Error as StdError;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::task::Waker;

use parking_lot::Mutex;

use crate::error::{AssertionFailure, Result};

pub(crate) use wait::WaitUntil;

/// An error captured from a producer.
///
/// Kept behind an `Arc` so it can be handed out of the recorder and still
/// downcast to its concrete type.
pub type CapturedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Terminal state of a producer, as seen by an observer.
#[derive(Clone)]
pub enum TerminalState {
    /// No terminal signal received yet.
    Active,
    /// The producer completed normally.
    Completed,
    /// The producer failed with an error.
    Failed(CapturedError),
}

impl TerminalState {
    /// Returns `true` while no terminal signal has been received.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if the producer completed normally.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if the producer failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The captured error, if the producer failed.
    #[must_use]
    pub fn error(&self) -> Option<&CapturedError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Active => "still active".to_string(),
            Self::Completed => "completed".to_string(),
            Self::Failed(err) => format!("failed with \"{err}\""),
        }
    }
}

impl Debug for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Completed => f.write_str("Completed"),
            Self::Failed(err) => f.debug_tuple("Failed").field(&err.to_string()).finish(),
        }
    }
}

pub(crate) struct RecorderState<T> {
    pub(crate) values: Vec<T>,
    pub(crate) terminal: TerminalState,
    pub(crate) started: bool,
    pub(crate) disposed: bool,
    waiters: Vec<Waker>,
}

impl<T> RecorderState<T> {
    fn take_waiters(&mut self) -> Vec<Waker> {
        std::mem::take(&mut self.waiters)
    }
}

/// Append-only record of everything a producer emitted.
///
/// All state lives behind one lock, so producers may signal from any thread
/// while assertions run. Predicates passed to the `check_*` methods run under
/// that lock and must not call back into the same recorder.
pub struct Recorder<T> {
    state: Mutex<RecorderState<T>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    /// Create an empty, active recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                values: Vec::new(),
                terminal: TerminalState::Active,
                started: false,
                disposed: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Append a value.
    ///
    /// Returns `false` if the value was dropped because the recorder was
    /// disposed or the producer already terminated.
    pub fn push(&self, value: T) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            if state.disposed {
                tracing::debug!("dropping value emitted after dispose");
                return false;
            }
            if !state.terminal.is_active() {
                tracing::debug!(
                    terminal = ?state.terminal,
                    "ignoring value emitted after terminal signal"
                );
                return false;
            }
            state.values.push(value);
            tracing::trace!(count = state.values.len(), "value recorded");
            state.take_waiters()
        };
        wake_all(waiters);
        true
    }

    /// Record a producer failure.
    ///
    /// Only the first terminal signal is kept; returns `false` if this one
    /// was ignored.
    pub fn fail(&self, error: CapturedError) -> bool {
        self.terminate(TerminalState::Failed(error))
    }

    /// Record normal completion.
    ///
    /// Ignored (returning `false`) if a terminal signal already arrived.
    pub fn complete(&self) -> bool {
        self.terminate(TerminalState::Completed)
    }

    fn terminate(&self, terminal: TerminalState) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            if state.disposed {
                tracing::debug!(signal = ?terminal, "dropping terminal signal after dispose");
                return false;
            }
            if !state.terminal.is_active() {
                tracing::debug!(
                    current = ?state.terminal,
                    ignored = ?terminal,
                    "ignoring second terminal signal"
                );
                return false;
            }
            tracing::trace!(signal = ?terminal, "producer terminated");
            state.terminal = terminal;
            state.take_waiters()
        };
        wake_all(waiters);
        true
    }

    /// Record that the producer signalled start.
    pub fn mark_started(&self) {
        let waiters = {
            let mut state = self.state.lock();
            if state.started || state.disposed {
                return;
            }
            state.started = true;
            state.take_waiters()
        };
        wake_all(waiters);
    }

    /// Whether the producer signalled start.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.state.lock().started
    }

    /// Stop recording. Every later signal is dropped.
    ///
    /// With `clear_values` the buffer is emptied as well.
    pub fn dispose(&self, clear_values: bool) {
        let waiters = {
            let mut state = self.state.lock();
            if clear_values {
                state.values.clear();
            }
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.take_waiters()
        };
        wake_all(waiters);
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    /// Returns `true` if no values are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().values.is_empty()
    }

    /// Snapshot of the buffered values in emission order.
    #[must_use]
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.state.lock().values.clone()
    }

    /// Run `f` over the buffered values without cloning them.
    pub fn with_values<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.state.lock().values)
    }

    /// Current terminal state.
    #[must_use]
    pub fn terminal_state(&self) -> TerminalState {
        self.state.lock().terminal.clone()
    }

    /// The captured error, if the producer failed.
    #[must_use]
    pub fn error(&self) -> Option<CapturedError> {
        self.state.lock().terminal.error().cloned()
    }

    /// A future resolving once `condition` holds or the recorder is disposed.
    ///
    /// Resolves to `true` when the condition was met.
    pub(crate) fn wait_until<F>(&self, condition: F) -> WaitUntil<'_, T, F>
    where
        F: FnMut(&RecorderState<T>) -> bool,
    {
        WaitUntil::new(self, condition)
    }

    /// Check that no values were received.
    pub fn check_no_values(&self) -> Result<()> {
        let actual = self.len();
        if actual == 0 {
            Ok(())
        } else {
            Err(AssertionFailure::CountMismatch {
                expected: 0,
                actual,
            })
        }
    }

    /// Check that exactly `expected` values were received.
    pub fn check_value_count(&self, expected: isize) -> Result<()> {
        let expected = usize::try_from(expected).map_err(|_| {
            AssertionFailure::invalid_argument(format!("count must be >= 0, got {expected}"))
        })?;
        let actual = self.len();
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionFailure::CountMismatch { expected, actual })
        }
    }

    /// Check the whole buffer against a predicate.
    pub fn check_values<F>(&self, predicate: F) -> Result<()>
    where
        F: FnOnce(&[T]) -> bool,
        T: Debug,
    {
        let state = self.state.lock();
        if predicate(&state.values) {
            Ok(())
        } else {
            Err(AssertionFailure::predicate_failed(format!(
                "values {:?} did not match predicate",
                state.values
            )))
        }
    }

    /// Check the buffer equals `expected`, pairwise by index.
    ///
    /// A length difference is reported as a count mismatch before any
    /// element is compared.
    pub fn check_values_eq(&self, expected: &[T]) -> Result<()>
    where
        T: PartialEq + Debug,
    {
        let state = self.state.lock();
        if state.values.len() != expected.len() {
            return Err(AssertionFailure::CountMismatch {
                expected: expected.len(),
                actual: state.values.len(),
            });
        }
        match state
            .values
            .iter()
            .zip(expected)
            .position(|(actual, expected)| actual != expected)
        {
            None => Ok(()),
            Some(index) => Err(AssertionFailure::ValueMismatch {
                index,
                expected: format!("{:?}", expected[index]),
                actual: format!("{:?}", state.values[index]),
            }),
        }
    }

    /// Check the value at `index` against a predicate.
    pub fn check_value_at<F>(&self, index: isize, predicate: F) -> Result<()>
    where
        F: FnOnce(&T) -> bool,
        T: Debug,
    {
        let state = self.state.lock();
        let value = checked_index(index, state.values.len()).map(|i| &state.values[i])?;
        if predicate(value) {
            Ok(())
        } else {
            Err(AssertionFailure::predicate_failed(format!(
                "value at index {index} ({value:?}) did not match predicate"
            )))
        }
    }

    /// Check the value at `index` equals `expected`.
    pub fn check_value_at_eq(&self, index: isize, expected: &T) -> Result<()>
    where
        T: PartialEq + Debug,
    {
        let state = self.state.lock();
        let position = checked_index(index, state.values.len())?;
        let actual = &state.values[position];
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionFailure::ValueMismatch {
                index: position,
                expected: format!("{expected:?}"),
                actual: format!("{actual:?}"),
            })
        }
    }

    /// Check the producer failed with an error of type `E` whose message
    /// equals `expected`'s.
    pub fn check_error_eq<E>(&self, expected: &E) -> Result<()>
    where
        E: StdError + 'static,
    {
        let error = self.captured_error()?;
        let same_type = error.downcast_ref::<E>().is_some();
        let (want, got) = (expected.to_string(), error.to_string());
        if same_type && want == got {
            Ok(())
        } else if same_type {
            Err(AssertionFailure::error_mismatch(format!(
                "expected message \"{want}\", got \"{got}\""
            )))
        } else {
            Err(AssertionFailure::error_mismatch(format!(
                "expected {}(\"{want}\"), got a different error type (\"{got}\")",
                std::any::type_name::<E>()
            )))
        }
    }

    /// Check the producer failed with an error of type `E`.
    pub fn check_error_type<E>(&self) -> Result<()>
    where
        E: StdError + 'static,
    {
        let error = self.captured_error()?;
        if error.downcast_ref::<E>().is_some() {
            Ok(())
        } else {
            Err(AssertionFailure::error_mismatch(format!(
                "expected an error of type {}, got \"{error}\"",
                std::any::type_name::<E>()
            )))
        }
    }

    /// Check the captured error against a predicate.
    pub fn check_error<F>(&self, predicate: F) -> Result<()>
    where
        F: FnOnce(&(dyn StdError + Send + Sync + 'static)) -> bool,
    {
        let error = self.captured_error()?;
        if predicate(&*error) {
            Ok(())
        } else {
            Err(AssertionFailure::error_mismatch(format!(
                "error \"{error}\" did not match predicate"
            )))
        }
    }

    fn captured_error(&self) -> Result<CapturedError> {
        let terminal = self.terminal_state();
        match terminal {
            TerminalState::Failed(error) => Ok(error),
            other => Err(AssertionFailure::NoErrorCaptured(format!(
                " (producer is {})",
                other.describe()
            ))),
        }
    }

    /// Check the producer did not fail.
    pub fn check_no_errors(&self) -> Result<()> {
        match self.terminal_state() {
            TerminalState::Failed(error) => {
                Err(AssertionFailure::UnexpectedError(error.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Check the producer completed normally.
    pub fn check_complete(&self) -> Result<()> {
        let terminal = self.terminal_state();
        if terminal.is_completed() {
            Ok(())
        } else {
            Err(AssertionFailure::NotCompleted(terminal.describe()))
        }
    }

    /// Check the producer has not completed normally.
    pub fn check_not_complete(&self) -> Result<()> {
        if self.terminal_state().is_completed() {
            Err(AssertionFailure::UnexpectedCompletion)
        } else {
            Ok(())
        }
    }
}

impl<T: Debug> Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Recorder")
            .field("values", &state.values)
            .field("terminal", &state.terminal)
            .field("started", &state.started)
            .field("disposed", &state.disposed)
            .finish()
    }
}

fn checked_index(index: isize, len: usize) -> Result<usize> {
    match usize::try_from(index) {
        Ok(position) if position < len => Ok(position),
        _ => Err(AssertionFailure::IndexOutOfRange { index, len }),
    }
}

fn wake_all(waiters: Vec<Waker>) {
    for waker in waiters {
        waker.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct NetworkError(String);

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct ParseError(String);

    fn failed_with(message: &str) -> Recorder<i32> {
        let recorder = Recorder::new();
        recorder.fail(Arc::new(NetworkError(message.to_string())));
        recorder
    }

    #[test]
    fn test_values_keep_emission_order() {
        let recorder = Recorder::new();
        for value in [3, 1, 2, 1] {
            assert!(recorder.push(value));
        }
        assert_eq!(recorder.values(), vec![3, 1, 2, 1]);
        assert_eq!(recorder.values(), recorder.values());
    }

    #[test]
    fn test_value_count() {
        let recorder = Recorder::new();
        recorder.push("a");
        recorder.push("b");

        assert!(recorder.check_value_count(2).is_ok());
        assert_eq!(
            recorder.check_value_count(3),
            Err(AssertionFailure::CountMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(matches!(
            recorder.check_value_count(-1),
            Err(AssertionFailure::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_no_values() {
        let recorder = Recorder::new();
        assert!(recorder.check_no_values().is_ok());
        recorder.push(1);
        assert!(matches!(
            recorder.check_no_values(),
            Err(AssertionFailure::CountMismatch {
                expected: 0,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_values_predicate() {
        let recorder = Recorder::new();
        recorder.push(2);
        recorder.push(4);

        assert!(recorder.check_values(|v| v.iter().all(|x| x % 2 == 0)).is_ok());
        assert!(matches!(
            recorder.check_values(|v| v.len() == 5),
            Err(AssertionFailure::PredicateFailed(_))
        ));
    }

    #[test]
    fn test_values_eq_is_pairwise() {
        let recorder = Recorder::new();
        for value in [1, 2, 3] {
            recorder.push(value);
        }

        assert!(recorder.check_values_eq(&[1, 2, 3]).is_ok());
        // Same elements in another order must not pass.
        assert_eq!(
            recorder.check_values_eq(&[3, 2, 1]),
            Err(AssertionFailure::ValueMismatch {
                index: 0,
                expected: "3".to_string(),
                actual: "1".to_string(),
            })
        );
        assert!(matches!(
            recorder.check_values_eq(&[1, 2]),
            Err(AssertionFailure::CountMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_value_at_bounds() {
        let recorder = Recorder::new();
        for value in [10, 20, 30] {
            recorder.push(value);
        }

        assert!(recorder.check_value_at(2, |v| *v == 30).is_ok());
        assert!(recorder.check_value_at_eq(0, &10).is_ok());
        assert_eq!(
            recorder.check_value_at(3, |_| true),
            Err(AssertionFailure::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            recorder.check_value_at(5, |_| true),
            Err(AssertionFailure::IndexOutOfRange { index: 5, len: 3 })
        );
        assert_eq!(
            recorder.check_value_at_eq(-1, &10),
            Err(AssertionFailure::IndexOutOfRange { index: -1, len: 3 })
        );
        assert!(matches!(
            recorder.check_value_at_eq(1, &21),
            Err(AssertionFailure::ValueMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn test_first_terminal_signal_wins() {
        let recorder: Recorder<i32> = Recorder::new();
        assert!(recorder.fail(Arc::new(NetworkError("boom".into()))));
        assert!(!recorder.complete());
        assert!(!recorder.fail(Arc::new(NetworkError("again".into()))));

        assert!(recorder.terminal_state().is_failed());
        assert_eq!(recorder.error().map(|e| e.to_string()), Some("boom".into()));
        assert!(recorder.check_not_complete().is_ok());
    }

    #[test]
    fn test_complete_then_error_is_ignored() {
        let recorder: Recorder<i32> = Recorder::new();
        assert!(recorder.complete());
        assert!(!recorder.fail(Arc::new(NetworkError("late".into()))));
        assert!(recorder.check_complete().is_ok());
        assert!(recorder.check_no_errors().is_ok());
    }

    #[test]
    fn test_values_after_terminal_are_ignored() {
        let recorder = Recorder::new();
        recorder.push(1);
        recorder.complete();
        assert!(!recorder.push(2));
        assert_eq!(recorder.values(), vec![1]);
    }

    #[test]
    fn test_error_checks_without_error() {
        let recorder: Recorder<i32> = Recorder::new();
        assert!(matches!(
            recorder.check_error(|_| true),
            Err(AssertionFailure::NoErrorCaptured(_))
        ));
        assert!(matches!(
            recorder.check_error_type::<NetworkError>(),
            Err(AssertionFailure::NoErrorCaptured(_))
        ));
        recorder.complete();
        assert!(matches!(
            recorder.check_error_eq(&NetworkError("x".into())),
            Err(AssertionFailure::NoErrorCaptured(_))
        ));
    }

    #[test]
    fn test_error_by_type_and_message() {
        let recorder = failed_with("Network Exception");

        assert!(recorder
            .check_error_eq(&NetworkError("Network Exception".into()))
            .is_ok());
        assert!(matches!(
            recorder.check_error_eq(&NetworkError("Timeout".into())),
            Err(AssertionFailure::ErrorMismatch(_))
        ));
        assert!(matches!(
            recorder.check_error_eq(&ParseError("Network Exception".into())),
            Err(AssertionFailure::ErrorMismatch(_))
        ));
    }

    #[test]
    fn test_error_by_type_and_predicate() {
        let recorder = failed_with("Network Exception");

        assert!(recorder.check_error_type::<NetworkError>().is_ok());
        assert!(recorder.check_error_type::<ParseError>().is_err());
        assert!(recorder
            .check_error(|e| e.to_string() == "Network Exception")
            .is_ok());
        assert!(matches!(
            recorder.check_error(|e| e.to_string().is_empty()),
            Err(AssertionFailure::ErrorMismatch(_))
        ));
    }

    #[test]
    fn test_no_errors_and_completion() {
        let recorder = failed_with("boom");
        assert_eq!(
            recorder.check_no_errors(),
            Err(AssertionFailure::UnexpectedError("boom".to_string()))
        );
        assert!(matches!(
            recorder.check_complete(),
            Err(AssertionFailure::NotCompleted(_))
        ));

        let active: Recorder<i32> = Recorder::new();
        assert!(active.check_no_errors().is_ok());
        assert!(active.check_not_complete().is_ok());
        active.complete();
        assert_eq!(
            active.check_not_complete(),
            Err(AssertionFailure::UnexpectedCompletion)
        );
    }

    #[test]
    fn test_dispose_drops_later_signals() {
        let recorder = Recorder::new();
        recorder.push(1);
        recorder.dispose(false);

        assert!(!recorder.push(2));
        assert!(!recorder.complete());
        assert_eq!(recorder.values(), vec![1]);
        assert!(recorder.terminal_state().is_active());
        assert!(recorder.is_disposed());
    }

    #[test]
    fn test_dispose_with_clear() {
        let recorder = Recorder::new();
        recorder.push(1);
        recorder.dispose(true);
        assert!(recorder.is_empty());

        // A second dispose is a no-op.
        recorder.dispose(true);
        assert!(recorder.is_disposed());
    }

    #[test]
    fn test_mark_started() {
        let recorder: Recorder<i32> = Recorder::new();
        assert!(!recorder.has_started());
        recorder.mark_started();
        recorder.mark_started();
        assert!(recorder.has_started());
    }

    #[test]
    fn test_debug_includes_state() {
        let recorder = Recorder::new();
        recorder.push(7);
        let rendered = format!("{recorder:?}");
        assert!(rendered.contains("values: [7]"));
        assert!(rendered.contains("terminal: Active"));
    }
}
