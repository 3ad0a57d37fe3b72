//! Producer contracts the observers attach to.
//!
//! - [`SingleValueProducer`] - a holder of one current value that republishes
//!   every change to its subscribers
//! - [`StreamProducer`] - an asynchronous emitter of zero or more values that
//!   may end with an error or a completion signal
//!
//! Any stream of `Result`s becomes a [`StreamProducer`] through
//! [`from_stream`]; ad-hoc producers can be written with [`from_fn`].
//!
//! # Example
//!
//! ```rust
//! use testkit_observe::producer::{from_fn, from_values};
//!
//! let counted = from_values(futures::stream::iter(vec![1, 2, 3]));
//!
//! let custom = from_fn(|collector| async move {
//!     collector.emit("loading");
//!     collector.emit("done");
//! });
//! ```

mod stream;
mod value;

pub use stream::{
    from_fn, from_stream, from_values, BoxError, FnProducer, StreamCollector, StreamProducer,
    StreamSource,
};
pub use value::{SingleValueProducer, Subscription, ValueObserver};
