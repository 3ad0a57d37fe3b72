//! Test observer for single-value producers.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::OrRaise;
use crate::producer::{SingleValueProducer, Subscription, ValueObserver};
use crate::recorder::Recorder;

/// Records every update of a [`SingleValueProducer`].
///
/// Created by [`observe_value`](crate::observe_value). The observer stays
/// subscribed until [`dispose`](Self::dispose) is called or it is dropped.
/// None of its assertions suspend.
///
/// # Example
///
/// ```rust
/// use testkit_observe::mock::MockLiveValue;
/// use testkit_observe::observe_value;
///
/// let live = MockLiveValue::with_value(0);
/// let observer = observe_value(live.clone());
///
/// live.set(1);
///
/// observer
///     .assert_value_count(2)
///     .assert_values_eq([0, 1])
///     .assert_values(|values| values.iter().all(|v| *v >= 0));
/// ```
pub struct ValueTestObserver<T, P>
where
    P: SingleValueProducer<T>,
{
    producer: P,
    recorder: Arc<Recorder<T>>,
    subscription: Mutex<Option<Subscription>>,
}

struct Forwarder<T> {
    recorder: Arc<Recorder<T>>,
}

impl<T: Clone + Send + Sync> ValueObserver<T> for Forwarder<T> {
    fn on_changed(&self, value: Option<&T>) {
        record_update(&self.recorder, value);
    }
}

fn record_update<T: Clone>(recorder: &Recorder<T>, value: Option<&T>) {
    match value {
        Some(value) => {
            recorder.push(value.clone());
        }
        None => tracing::trace!("ignoring cleared value"),
    }
}

impl<T, P> ValueTestObserver<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: SingleValueProducer<T>,
{
    pub(crate) fn subscribe(producer: P) -> Self {
        let recorder = Arc::new(Recorder::new());
        let forwarder = Arc::new(Forwarder {
            recorder: Arc::clone(&recorder),
        });
        let subscription = producer.subscribe(forwarder);
        tracing::trace!(subscription = subscription.id(), "value observer subscribed");
        Self {
            producer,
            recorder,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Record an update the way the producer delivers it.
    ///
    /// `None` (a cleared value) is not recorded.
    pub fn on_receive(&self, value: Option<&T>) {
        record_update(&self.recorder, value);
    }

    /// Assert that no values were received.
    ///
    /// # Panics
    ///
    /// Panics if any value was received.
    #[track_caller]
    pub fn assert_no_values(&self) -> &Self {
        self.recorder.check_no_values().or_raise();
        self
    }

    /// Assert that exactly `count` values were received.
    ///
    /// # Panics
    ///
    /// Panics if `count` is negative or differs from the number received.
    #[track_caller]
    pub fn assert_value_count(&self, count: isize) -> &Self {
        self.recorder.check_value_count(count).or_raise();
        self
    }

    /// Assert the received values, as a whole, match a predicate.
    ///
    /// # Panics
    ///
    /// Panics if the predicate returns `false`.
    #[track_caller]
    pub fn assert_values<F>(&self, predicate: F) -> &Self
    where
        F: FnOnce(&[T]) -> bool,
        T: Debug,
    {
        self.recorder.check_values(predicate).or_raise();
        self
    }

    /// Assert the received values equal `expected`, pairwise in order.
    ///
    /// # Panics
    ///
    /// Panics on a length difference or the first unequal pair.
    #[track_caller]
    pub fn assert_values_eq(&self, expected: impl AsRef<[T]>) -> &Self
    where
        T: PartialEq + Debug,
    {
        self.recorder.check_values_eq(expected.as_ref()).or_raise();
        self
    }

    /// Snapshot of the received values in order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.recorder.values()
    }

    /// Run arbitrary assertions over the received values.
    pub fn with_values<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.recorder.with_values(f)
    }

    /// The recorder behind this observer, for non-panicking checks.
    #[must_use]
    pub fn recorder(&self) -> &Recorder<T> {
        &self.recorder
    }

    /// Whether the observer is still subscribed.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Unsubscribe and clear the received values.
    ///
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        self.recorder.dispose(true);
        if let Some(subscription) = self.subscription.lock().take() {
            self.producer.unsubscribe(subscription);
            tracing::trace!(subscription = subscription.id(), "value observer disposed");
        }
    }
}

impl<T, P> Drop for ValueTestObserver<T, P>
where
    P: SingleValueProducer<T>,
{
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            self.producer.unsubscribe(subscription);
        }
    }
}

impl<T: Debug, P> Debug for ValueTestObserver<T, P>
where
    P: SingleValueProducer<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueTestObserver")
            .field("recorder", &self.recorder)
            .field("subscription", &*self.subscription.lock())
            .finish_non_exhaustive()
    }
}
