//! # testkit-observe 🔭
//!
//! > Record what a producer emits, then assert on it
//!
//! **testkit-observe** attaches test observers to value holders and async
//! streams. Every value, error and completion is recorded in order, and a
//! fluent API checks the recording.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use testkit_observe::prelude::*;
//!
//! #[tokio::test]
//! async fn test_stream() {
//!     let (emitter, producer) = MockStream::channel();
//!     let observer = observe_stream(producer, TokioScope::current(), StreamObserverConfig::new());
//!
//!     emitter.emit(1);
//!     emitter.emit(2);
//!     emitter.complete();
//!
//!     observer
//!         .await_terminal().await
//!         .assert_values_eq([1, 2]).await
//!         .assert_complete().await;
//! }
//! ```
//!
//! ## Features
//!
//! - 📦 **Value Observers** - Record every update of a latest-value holder
//! - 🌊 **Stream Observers** - Record values and the terminal signal of a stream
//! - ⏳ **Wait Budgets** - Bounded waits for slow producers
//! - 🧵 **Explicit Scopes** - Producers run on a scope you pass in
//! - 🎭 **Mocks** - Hand-driven producers for tests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mock;
pub mod observer;
pub mod producer;
pub mod recorder;
pub mod scope;

/// Prelude for convenient imports
///
/// ```rust
/// use testkit_observe::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{AssertionFailure, Result};
    pub use crate::mock::{MockEmitter, MockLiveValue, MockStream};
    pub use crate::observer::{
        observe_stream, observe_value, test_delayed, AssertionTask, InitializationState,
        StreamObserverConfig, StreamTestObserver, TaskOutcome, ValueTestObserver,
    };
    pub use crate::producer::{
        from_fn, from_stream, from_values, SingleValueProducer, StreamCollector, StreamProducer,
    };
    pub use crate::recorder::{Recorder, TerminalState};
    pub use crate::scope::{Scope, WaitBudget};

    #[cfg(feature = "tokio")]
    pub use crate::scope::TokioScope;
}

// Re-exports
pub use error::{AssertionFailure, Result};
pub use observer::{
    observe_stream, observe_value, test_delayed, StreamTestObserver, ValueTestObserver,
};
