//! Side-effect stages that observe signals without changing them.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::info;

use crate::error::{catch_transform, Error};
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single, Subscriber};

/// Logs every signal passing through under a category, then forwards it.
pub struct Log<P> {
    upstream: P,
    category: Arc<str>,
}

impl<P> Log<P> {
    pub(crate) fn new(upstream: P, category: String) -> Self {
        Self {
            upstream,
            category: category.into(),
        }
    }
}

impl<P> Publisher for Log<P>
where
    P: Publisher,
    P::Item: Debug,
{
    type Item = P::Item;

    fn attach(&self, downstream: BoxSubscriber<P::Item>, subscription: &Subscription) {
        info!(category = %self.category, "onSubscribe");
        let upstream = subscription.child();
        self.upstream.attach(
            Box::new(LogSubscriber {
                downstream,
                category: self.category.clone(),
            }),
            &upstream,
        );
    }
}

impl<P> Single for Log<P>
where
    P: Single,
    P::Item: Debug,
{
}

struct LogSubscriber<T> {
    downstream: BoxSubscriber<T>,
    category: Arc<str>,
}

impl<T: Debug> Subscriber<T> for LogSubscriber<T> {
    fn on_next(&mut self, value: T) {
        info!(category = %self.category, ?value, "onNext");
        self.downstream.on_next(value);
    }

    fn on_error(&mut self, error: Error) {
        info!(category = %self.category, %error, "onError");
        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        info!(category = %self.category, "onComplete");
        self.downstream.on_complete();
    }
}

/// Runs a callback on each value before forwarding it.
///
/// A panicking callback fails the stage with [`Error::Transform`] and
/// cancels the upstream.
pub struct DoOnNext<P, F> {
    upstream: P,
    f: Arc<F>,
}

impl<P, F> DoOnNext<P, F> {
    pub(crate) fn new(upstream: P, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
        }
    }
}

impl<P, F> Publisher for DoOnNext<P, F>
where
    P: Publisher,
    F: Fn(&P::Item) + Send + Sync + 'static,
{
    type Item = P::Item;

    fn attach(&self, downstream: BoxSubscriber<P::Item>, subscription: &Subscription) {
        let upstream = subscription.child();
        self.upstream.attach(
            Box::new(DoOnNextSubscriber {
                downstream,
                f: self.f.clone(),
                upstream: upstream.clone(),
                failed: false,
            }),
            &upstream,
        );
    }
}

impl<P, F> Single for DoOnNext<P, F>
where
    P: Single,
    F: Fn(&P::Item) + Send + Sync + 'static,
{
}

struct DoOnNextSubscriber<T, F> {
    downstream: BoxSubscriber<T>,
    f: Arc<F>,
    upstream: Subscription,
    failed: bool,
}

impl<T, F> Subscriber<T> for DoOnNextSubscriber<T, F>
where
    F: Fn(&T) + Send + Sync,
    T: Send,
{
    fn on_next(&mut self, value: T) {
        if self.failed {
            return;
        }
        let f = &self.f;
        match catch_transform("do_on_next", || (**f)(&value)) {
            Ok(()) => self.downstream.on_next(value),
            Err(e) => {
                self.failed = true;
                self.upstream.cancel();
                self.downstream.on_error(e);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        if !self.failed {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if !self.failed {
            self.downstream.on_complete();
        }
    }
}
