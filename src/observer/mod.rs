//! Test observers and their entry points.
//!
//! - [`observe_value`] - Subscribe a [`ValueTestObserver`] to a
//!   [`SingleValueProducer`]
//! - [`observe_stream`] - Run a [`StreamProducer`] on a [`Scope`] under a
//!   [`StreamTestObserver`]
//! - [`test_delayed`] - Run a block of stream assertions as its own task

mod delayed;
mod stream;
mod value;

pub use delayed::{test_delayed, AssertionTask, TaskOutcome};
pub use stream::{InitializationState, StreamObserverConfig, StreamTestObserver};
pub use value::ValueTestObserver;

use crate::producer::{SingleValueProducer, StreamProducer};
use crate::scope::Scope;

/// Subscribe a new observer to `producer`.
///
/// If the producer already holds a value it is recorded right away.
pub fn observe_value<T, P>(producer: P) -> ValueTestObserver<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: SingleValueProducer<T>,
{
    ValueTestObserver::subscribe(producer)
}

/// Observe `producer`, launching it on `scope` according to `config`.
pub fn observe_stream<P, S>(
    producer: P,
    scope: S,
    config: StreamObserverConfig,
) -> StreamTestObserver<P::Item, S>
where
    P: StreamProducer,
    S: Scope,
{
    StreamTestObserver::launch(producer, scope, config)
}
