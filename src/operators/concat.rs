//! Sequential composition of two publishers.

use std::sync::Arc;

use crate::error::Error;
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single, Subscriber};

/// Emits the first publisher's values, then the second's.
///
/// The second publisher is subscribed only once the first completes; if the
/// first fails it is never subscribed.
pub struct ConcatWith<P1, P2> {
    first: P1,
    second: Arc<P2>,
}

impl<P1, P2> ConcatWith<P1, P2> {
    pub(crate) fn new(first: P1, second: P2) -> Self {
        Self {
            first,
            second: Arc::new(second),
        }
    }
}

impl<P1, P2> Publisher for ConcatWith<P1, P2>
where
    P1: Publisher,
    P2: Publisher<Item = P1::Item>,
{
    type Item = P1::Item;

    fn attach(&self, downstream: BoxSubscriber<P1::Item>, subscription: &Subscription) {
        let first = subscription.child();
        let switch: SwitchSubscriber<P1::Item, P1::Item, P2> = SwitchSubscriber {
            downstream: Some(downstream),
            next: self.second.clone(),
            scope: subscription.clone(),
            forward: |downstream, value| downstream.on_next(value),
        };
        self.first.attach(Box::new(switch), &first);
    }
}

/// Waits for the first publisher to complete, discarding its values, then
/// mirrors the second.
pub struct Then<P1, P2> {
    first: P1,
    second: Arc<P2>,
}

impl<P1, P2> Then<P1, P2> {
    pub(crate) fn new(first: P1, second: P2) -> Self {
        Self {
            first,
            second: Arc::new(second),
        }
    }
}

impl<P1, P2> Publisher for Then<P1, P2>
where
    P1: Publisher,
    P2: Publisher,
{
    type Item = P2::Item;

    fn attach(&self, downstream: BoxSubscriber<P2::Item>, subscription: &Subscription) {
        let first = subscription.child();
        let switch: SwitchSubscriber<P1::Item, P2::Item, P2> = SwitchSubscriber {
            downstream: Some(downstream),
            next: self.second.clone(),
            scope: subscription.clone(),
            forward: |_, _| {},
        };
        self.first.attach(Box::new(switch), &first);
    }
}

impl<P1: Publisher, P2: Single> Single for Then<P1, P2> {}

/// Subscriber on the first publisher that hands the downstream over to the
/// second one on completion.
struct SwitchSubscriber<T, U, P> {
    downstream: Option<BoxSubscriber<U>>,
    next: Arc<P>,
    scope: Subscription,
    /// What to do with the first publisher's values
    forward: fn(&mut BoxSubscriber<U>, T),
}

impl<T, U, P> Subscriber<T> for SwitchSubscriber<T, U, P>
where
    P: Publisher<Item = U>,
    U: Send + 'static,
    T: Send,
{
    fn on_next(&mut self, value: T) {
        if let Some(downstream) = self.downstream.as_mut() {
            (self.forward)(downstream, value);
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(mut downstream) = self.downstream.take() {
            downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        let Some(downstream) = self.downstream.take() else {
            return;
        };
        if self.scope.is_cancelled() {
            return;
        }
        let next = self.scope.child();
        self.next.attach(downstream, &next);
    }
}
