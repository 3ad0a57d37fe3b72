//! In-memory latest-value holder.
//!
//! [`MockLiveValue`] is a [`SingleValueProducer`] for tests: it keeps one
//! current value and republishes every change to its subscribers.
//!
//! # Example
//!
//! ```rust
//! use testkit_observe::mock::MockLiveValue;
//! use testkit_observe::observe_value;
//!
//! let live: MockLiveValue<i32> = MockLiveValue::new();
//! let observer = observe_value(live.clone());
//!
//! live.set(1);
//! live.set(2);
//!
//! observer.assert_value_count(2);
//! assert_eq!(observer.values(), vec![1, 2]);
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::producer::{SingleValueProducer, Subscription, ValueObserver};

/// A mock holder of a single current value.
///
/// Clones share the same value and subscribers. A new subscriber receives
/// the current value immediately if one is set.
pub struct MockLiveValue<T> {
    inner: Arc<LiveInner<T>>,
}

struct LiveInner<T> {
    /// Current value (`None` = unset or cleared).
    value: Mutex<Option<T>>,
    /// Registered observers.
    observers: Mutex<Vec<(Subscription, Arc<dyn ValueObserver<T>>)>>,
    /// Serializes publishing so subscribers see changes in order.
    publish: Mutex<()>,
    /// Next subscription id.
    next_id: AtomicU64,
    /// Number of published changes.
    version: AtomicUsize,
}

impl<T: Clone + Send + Sync + 'static> MockLiveValue<T> {
    /// Create a holder with no current value.
    #[must_use]
    pub fn new() -> Self {
        Self::from_option(None)
    }

    /// Create a holder with an initial value.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self::from_option(Some(value))
    }

    fn from_option(value: Option<T>) -> Self {
        Self {
            inner: Arc::new(LiveInner {
                value: Mutex::new(value),
                observers: Mutex::new(Vec::new()),
                publish: Mutex::new(()),
                next_id: AtomicU64::new(0),
                version: AtomicUsize::new(0),
            }),
        }
    }

    /// Replace the current value and notify every subscriber.
    pub fn set(&self, value: T) {
        self.publish(Some(value));
    }

    /// Clear the current value and notify every subscriber with `None`.
    pub fn reset(&self) {
        self.publish(None);
    }

    fn publish(&self, value: Option<T>) {
        let _publishing = self.inner.publish.lock();
        *self.inner.value.lock() = value.clone();
        self.inner.version.fetch_add(1, Ordering::SeqCst);

        // Notify outside the observer lock so callbacks may unsubscribe.
        let observers: Vec<_> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        tracing::trace!(subscribers = observers.len(), "publishing value");
        for observer in observers {
            observer.on_changed(value.as_ref());
        }
    }

    /// Get the current value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.value.lock().clone()
    }

    /// Number of changes published so far.
    #[must_use]
    pub fn version(&self) -> usize {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    /// Check if anyone is subscribed.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

impl<T: Clone + Send + Sync + 'static> Default for MockLiveValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MockLiveValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleValueProducer<T> for MockLiveValue<T> {
    fn subscribe(&self, observer: Arc<dyn ValueObserver<T>>) -> Subscription {
        let _publishing = self.inner.publish.lock();
        let subscription = Subscription::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner
            .observers
            .lock()
            .push((subscription, Arc::clone(&observer)));

        let current = self.inner.value.lock().clone();
        if let Some(value) = current {
            observer.on_changed(Some(&value));
        }
        subscription
    }

    fn unsubscribe(&self, subscription: Subscription) {
        self.inner
            .observers
            .lock()
            .retain(|(registered, _)| *registered != subscription);
    }
}

impl<T: Debug> Debug for MockLiveValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLiveValue")
            .field("value", &*self.inner.value.lock())
            .field("subscribers", &self.inner.observers.lock().len())
            .field("version", &self.inner.version.load(Ordering::SeqCst))
            .finish()
    }
}
