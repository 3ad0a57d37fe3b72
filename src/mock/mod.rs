//! Test doubles for producers.
//!
//! This module provides producers that tests can drive by hand:
//!
//! - [`MockLiveValue`] - In-memory latest-value holder
//! - [`MockStream`] - Channel-backed stream producer with a test-side
//!   [`MockEmitter`]
//!
//! # Live Values
//!
//! ```rust
//! use testkit_observe::mock::MockLiveValue;
//!
//! let live = MockLiveValue::with_value("idle");
//! live.set("loading");
//!
//! assert_eq!(live.get(), Some("loading"));
//! ```
//!
//! # Mock Streams
//!
//! ```rust
//! use testkit_observe::mock::MockStream;
//!
//! let (emitter, _producer) = MockStream::channel();
//!
//! emitter.emit(1);
//! emitter.complete();
//!
//! assert_eq!(emitter.signals_sent(), 2);
//! ```

mod live_value;
mod stream;

pub use live_value::MockLiveValue;
pub use stream::{MockEmitter, MockStream, MockStreamProducer};
