//! Single-value producer contract.

use std::sync::Arc;

/// Identifies one observer registration on a [`SingleValueProducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

impl Subscription {
    /// Create a subscription token with the given id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// The id of this subscription.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Receives updates from a [`SingleValueProducer`].
///
/// `None` stands for a cleared (null) current value.
pub trait ValueObserver<T>: Send + Sync {
    /// Called whenever the producer's current value changes.
    fn on_changed(&self, value: Option<&T>);
}

/// A holder of a single current value.
///
/// Implementations call [`ValueObserver::on_changed`] on every subscriber
/// whenever the value changes, in the order the changes happen.
pub trait SingleValueProducer<T>: Send + Sync {
    /// Register `observer` until [`unsubscribe`](Self::unsubscribe) is called.
    fn subscribe(&self, observer: Arc<dyn ValueObserver<T>>) -> Subscription;

    /// Remove a registration. Unknown subscriptions are ignored.
    fn unsubscribe(&self, subscription: Subscription);
}

impl<T, P> SingleValueProducer<T> for Arc<P>
where
    P: SingleValueProducer<T> + ?Sized,
{
    fn subscribe(&self, observer: Arc<dyn ValueObserver<T>>) -> Subscription {
        (**self).subscribe(observer)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        (**self).unsubscribe(subscription);
    }
}
