//! Hand-driven stream producer.
//!
//! [`MockStream::channel`] splits a producer into a [`MockEmitter`], kept by
//! the test, and a [`MockStreamProducer`], handed to the observer. Signals
//! pushed through the emitter reach the observer in order.
//!
//! # Example
//!
//! ```rust,ignore
//! use testkit_observe::mock::MockStream;
//!
//! let (emitter, producer) = MockStream::channel();
//! let observer = observe_stream(producer, scope, Default::default());
//!
//! emitter.emit(1);
//! emitter.complete();
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::channel::mpsc;
use futures::StreamExt;

use crate::producer::{BoxError, StreamCollector, StreamProducer};

/// Namespace for the mock stream constructors.
pub struct MockStream<T> {
    _phantom: PhantomData<T>,
}

enum Signal<T> {
    Value(T),
    Error(BoxError),
    Complete,
}

impl<T: Send + 'static> MockStream<T> {
    /// Create a connected emitter/producer pair.
    ///
    /// Dropping every emitter completes the stream.
    #[must_use]
    pub fn channel() -> (MockEmitter<T>, MockStreamProducer<T>) {
        let (tx, rx) = mpsc::unbounded();
        (
            MockEmitter {
                tx,
                sent: Arc::new(AtomicUsize::new(0)),
            },
            MockStreamProducer { rx },
        )
    }
}

/// Test-side handle of a mock stream.
pub struct MockEmitter<T> {
    tx: mpsc::UnboundedSender<Signal<T>>,
    sent: Arc<AtomicUsize>,
}

impl<T> MockEmitter<T> {
    fn send(&self, signal: Signal<T>) -> bool {
        if self.tx.unbounded_send(signal).is_err() {
            tracing::debug!("mock stream signal sent after the producer went away");
            return false;
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Emit a value.
    ///
    /// Returns `false` if the producer side is gone (observer disposed or
    /// stream already terminated).
    pub fn emit(&self, value: T) -> bool {
        self.send(Signal::Value(value))
    }

    /// Terminate the stream with an error.
    pub fn fail(&self, error: impl Into<BoxError>) -> bool {
        self.send(Signal::Error(error.into()))
    }

    /// Terminate the stream normally.
    pub fn complete(&self) -> bool {
        self.send(Signal::Complete)
    }

    /// Number of signals accepted so far, across all clones.
    #[must_use]
    pub fn signals_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Check if the producer side is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for MockEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            sent: Arc::clone(&self.sent),
        }
    }
}

impl<T> fmt::Debug for MockEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEmitter")
            .field("signals_sent", &self.signals_sent())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Observer-side half of a mock stream.
pub struct MockStreamProducer<T> {
    rx: mpsc::UnboundedReceiver<Signal<T>>,
}

impl<T> fmt::Debug for MockStreamProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockStreamProducer").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> StreamProducer for MockStreamProducer<T> {
    type Item = T;

    fn run(mut self, collector: StreamCollector<T>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            collector.start();
            while let Some(signal) = self.rx.next().await {
                match signal {
                    Signal::Value(value) => {
                        collector.emit(value);
                    }
                    Signal::Error(error) => {
                        collector.error(error);
                        return;
                    }
                    Signal::Complete => {
                        collector.complete();
                        return;
                    }
                }
            }
            collector.complete();
        })
    }
}
