//! Continuation of a single value into another publisher.

use std::sync::Arc;

use crate::error::{catch_transform, Error};
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single, Subscriber};

/// Subscribes to the publisher built from the upstream value and mirrors it.
///
/// The upstream is expected to emit at most one value. If it completes
/// empty, the function is never called and the stage completes empty. Only
/// one inner subscription ever exists.
pub struct FlatMap<P, F> {
    upstream: P,
    f: Arc<F>,
}

impl<P, F> FlatMap<P, F> {
    pub(crate) fn new(upstream: P, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
        }
    }
}

impl<P, F, R> Publisher for FlatMap<P, F>
where
    P: Publisher,
    F: Fn(P::Item) -> R + Send + Sync + 'static,
    R: Publisher,
{
    type Item = R::Item;

    fn attach(&self, downstream: BoxSubscriber<R::Item>, subscription: &Subscription) {
        let upstream = subscription.child();
        self.upstream.attach(
            Box::new(FlatMapSubscriber {
                downstream: Some(downstream),
                f: self.f.clone(),
                upstream: upstream.clone(),
                scope: subscription.clone(),
            }),
            &upstream,
        );
    }
}

impl<P, F, R> Single for FlatMap<P, F>
where
    P: Single,
    F: Fn(P::Item) -> R + Send + Sync + 'static,
    R: Single,
{
}

struct FlatMapSubscriber<U, F> {
    /// Taken when the inner publisher starts or a terminal is forwarded
    downstream: Option<BoxSubscriber<U>>,
    f: Arc<F>,
    upstream: Subscription,
    scope: Subscription,
}

impl<T, U, F, R> Subscriber<T> for FlatMapSubscriber<U, F>
where
    F: Fn(T) -> R + Send + Sync,
    R: Publisher<Item = U>,
    U: Send + 'static,
{
    fn on_next(&mut self, value: T) {
        let Some(mut downstream) = self.downstream.take() else {
            return;
        };
        let f = &self.f;
        match catch_transform("flat_map", || (**f)(value)) {
            Ok(inner) => {
                if self.scope.is_cancelled() {
                    return;
                }
                let inner_subscription = self.scope.child();
                inner.attach(downstream, &inner_subscription);
            }
            Err(e) => {
                self.upstream.cancel();
                downstream.on_error(e);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(mut downstream) = self.downstream.take() {
            downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if let Some(mut downstream) = self.downstream.take() {
            downstream.on_complete();
        }
    }
}
