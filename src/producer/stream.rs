//! Stream producer contract and adapters.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::{pin, Pin};
use std::sync::Arc;

use futures::StreamExt;
use futures_core::Stream;

use crate::recorder::Recorder;

/// Boxed error accepted from producers.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The callbacks a [`StreamProducer`] signals through.
///
/// A collector forwards every signal to the observer's recorder, which
/// enforces the single-terminal-signal contract: values and terminal signals
/// after the first `error` or `complete` are ignored.
pub struct StreamCollector<T> {
    recorder: Arc<Recorder<T>>,
}

impl<T> StreamCollector<T> {
    pub(crate) fn new(recorder: Arc<Recorder<T>>) -> Self {
        Self { recorder }
    }

    /// Signal that the producer has started.
    pub fn start(&self) {
        self.recorder.mark_started();
    }

    /// Emit a value. Returns `false` if the observer is no longer recording.
    pub fn emit(&self, value: T) -> bool {
        self.recorder.push(value)
    }

    /// Terminate with an error.
    pub fn error(&self, error: impl Into<BoxError>) {
        let error: BoxError = error.into();
        self.recorder.fail(Arc::from(error));
    }

    /// Terminate normally.
    pub fn complete(&self) {
        self.recorder.complete();
    }

    /// Whether further signals would be ignored.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.recorder.is_disposed() || !self.recorder.terminal_state().is_active()
    }
}

impl<T> Clone for StreamCollector<T> {
    fn clone(&self) -> Self {
        Self {
            recorder: Arc::clone(&self.recorder),
        }
    }
}

impl<T> fmt::Debug for StreamCollector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCollector")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An asynchronous emitter of values.
///
/// `run` drives the producer to its end, signalling through the collector.
/// A producer sends at most one terminal signal. The observer marks the
/// producer started when it first polls the future, so calling
/// [`start`](StreamCollector::start) is optional.
pub trait StreamProducer: Send + 'static {
    /// The type of emitted values.
    type Item: Send + 'static;

    /// Build the future that runs this producer.
    fn run(
        self,
        collector: StreamCollector<Self::Item>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Producer over a stream of `Result`s, created by [`from_stream`].
///
/// Signals start on first poll, records every `Ok`, terminates on the first
/// `Err` and completes when the stream ends.
#[derive(Debug)]
pub struct StreamSource<S> {
    stream: S,
}

/// Turn a stream of `Result`s into a producer.
///
/// # Example
///
/// ```rust
/// use testkit_observe::producer::from_stream;
///
/// let producer = from_stream(futures::stream::iter(vec![
///     Ok(1),
///     Err("Network Exception"),
/// ]));
/// ```
pub fn from_stream<S, T, E>(stream: S) -> StreamSource<S>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
{
    StreamSource { stream }
}

/// Turn an infallible stream of values into a producer.
pub fn from_values<S>(
    stream: S,
) -> StreamSource<impl Stream<Item = Result<S::Item, Infallible>> + Send + 'static>
where
    S: Stream + Send + 'static,
{
    StreamSource {
        stream: stream.map(Ok::<_, Infallible>),
    }
}

impl<S, T, E> StreamProducer for StreamSource<S>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    type Item = T;

    fn run(self, collector: StreamCollector<T>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            collector.start();
            let mut stream = pin!(self.stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => {
                        if !collector.emit(value) {
                            return;
                        }
                    }
                    Err(error) => {
                        collector.error(error);
                        return;
                    }
                }
            }
            collector.complete();
        })
    }
}

/// Producer built from a closure, created by [`from_fn`].
pub struct FnProducer<F, T> {
    body: F,
    _item: PhantomData<fn() -> T>,
}

/// Build a producer from an async closure.
///
/// The collector has already signalled start when the closure runs, and the
/// producer completes when the closure's future returns, unless it signalled
/// an error first.
///
/// # Example
///
/// ```rust
/// use testkit_observe::producer::from_fn;
///
/// let producer = from_fn(|collector| async move {
///     collector.emit(1);
///     collector.error("Network Exception");
/// });
/// ```
pub fn from_fn<T, F, Fut>(body: F) -> FnProducer<F, T>
where
    F: FnOnce(StreamCollector<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
{
    FnProducer {
        body,
        _item: PhantomData,
    }
}

impl<F, T> fmt::Debug for FnProducer<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProducer").finish_non_exhaustive()
    }
}

impl<T, F, Fut> StreamProducer for FnProducer<F, T>
where
    F: FnOnce(StreamCollector<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    T: Send + 'static,
{
    type Item = T;

    fn run(self, collector: StreamCollector<T>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            collector.start();
            (self.body)(collector.clone()).await;
            collector.complete();
        })
    }
}
