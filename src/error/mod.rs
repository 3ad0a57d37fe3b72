//! Error definitions
//!
//! This module provides the assertion failure type raised by testkit-observe.

use std::time::Duration;

use thiserror::Error;

/// A violated expectation on an observer.
///
/// Every `check_*` method on [`Recorder`](crate::recorder::Recorder) returns
/// one of these; the fluent `assert_*` methods on the observers panic with
/// its message instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssertionFailure {
    /// A count or index argument was negative.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The number of buffered values differs from the expected count.
    #[error("Expected {expected} values, but received {actual}")]
    CountMismatch {
        /// Expected number of values.
        expected: usize,
        /// Number of values actually buffered.
        actual: usize,
    },

    /// A user predicate rejected the buffered values.
    #[error("Predicate failed: {0}")]
    PredicateFailed(String),

    /// A buffered value differs from the expected one.
    #[error("Value at index {index} differs: expected {expected}, got {actual}")]
    ValueMismatch {
        /// Position of the first differing value.
        index: usize,
        /// Debug rendering of the expected value.
        expected: String,
        /// Debug rendering of the buffered value.
        actual: String,
    },

    /// An index was outside the buffered values.
    #[error("Index {index} is out of range for {len} received values")]
    IndexOutOfRange {
        /// Requested index.
        index: isize,
        /// Number of values buffered.
        len: usize,
    },

    /// An error assertion was made, but the producer never failed.
    #[error("No error was captured{0}")]
    NoErrorCaptured(String),

    /// The captured error differs from the expected one.
    #[error("Error mismatch: {0}")]
    ErrorMismatch(String),

    /// The producer failed although no error was expected.
    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    /// The producer has not completed.
    #[error("Expected completion, but the producer is {0}")]
    NotCompleted(String),

    /// The producer completed although it was expected to be still running.
    #[error("Expected the producer not to be complete, but it completed")]
    UnexpectedCompletion,

    /// Waiting on the producer exceeded the configured budget.
    #[error("Timed out after {waited:?} waiting for {waiting_for}")]
    Timeout {
        /// What the observer was waiting for.
        waiting_for: String,
        /// How long it waited.
        waited: Duration,
    },
}

impl AssertionFailure {
    /// Create an invalid argument failure.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a predicate failure.
    #[must_use]
    pub fn predicate_failed(message: impl Into<String>) -> Self {
        Self::PredicateFailed(message.into())
    }

    /// Create an error mismatch failure.
    #[must_use]
    pub fn error_mismatch(message: impl Into<String>) -> Self {
        Self::ErrorMismatch(message.into())
    }

    /// Create a timeout failure.
    #[must_use]
    pub fn timeout(waiting_for: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            waited,
        }
    }

    /// Raise this failure as a test panic.
    ///
    /// # Panics
    ///
    /// Always.
    #[track_caller]
    pub fn raise(self) -> ! {
        panic!("assertion failed: {self}")
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssertionFailure>;

/// Extension for turning a `check_*` result into a test panic.
pub(crate) trait OrRaise {
    fn or_raise(self);
}

impl OrRaise for Result<()> {
    #[track_caller]
    fn or_raise(self) {
        if let Err(failure) = self {
            failure.raise();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_message() {
        let failure = AssertionFailure::CountMismatch {
            expected: 3,
            actual: 1,
        };
        assert_eq!(failure.to_string(), "Expected 3 values, but received 1");
    }

    #[test]
    fn test_index_message_names_index_and_len() {
        let failure = AssertionFailure::IndexOutOfRange { index: 5, len: 3 };
        assert_eq!(
            failure.to_string(),
            "Index 5 is out of range for 3 received values"
        );
    }

    #[test]
    fn test_timeout_constructor() {
        let failure = AssertionFailure::timeout("producer start", Duration::from_secs(1));
        assert_eq!(
            failure,
            AssertionFailure::Timeout {
                waiting_for: "producer start".to_string(),
                waited: Duration::from_secs(1),
            }
        );
    }

    #[test]
    fn test_or_raise_ok_is_silent() {
        Ok(()).or_raise();
    }

    #[test]
    #[should_panic(expected = "assertion failed: Invalid argument: count must be >= 0")]
    fn test_or_raise_panics_with_message() {
        Err(AssertionFailure::invalid_argument("count must be >= 0")).or_raise();
    }
}
