//! One-to-one and filtering stages.

use std::sync::Arc;

use crate::error::{catch_transform, Error};
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single, Subscriber};

/// Applies a function to every value.
pub struct Map<P, F> {
    upstream: P,
    f: Arc<F>,
}

impl<P, F> Map<P, F> {
    pub(crate) fn new(upstream: P, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
        }
    }
}

impl<P, F, U> Publisher for Map<P, F>
where
    P: Publisher,
    F: Fn(P::Item) -> U + Send + Sync + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn attach(&self, downstream: BoxSubscriber<U>, subscription: &Subscription) {
        let upstream = subscription.child();
        self.upstream.attach(
            Box::new(MapSubscriber {
                stage: Stage::new(downstream, upstream.clone()),
                f: self.f.clone(),
            }),
            &upstream,
        );
    }
}

impl<P, F, U> Single for Map<P, F>
where
    P: Single,
    F: Fn(P::Item) -> U + Send + Sync + 'static,
    U: Send + 'static,
{
}

/// Downstream link shared by the stages in this module: forwards signals
/// until the stage fails, then ignores the upstream.
struct Stage<U> {
    downstream: BoxSubscriber<U>,
    upstream: Subscription,
    done: bool,
}

impl<U> Stage<U> {
    fn new(downstream: BoxSubscriber<U>, upstream: Subscription) -> Self {
        Self {
            downstream,
            upstream,
            done: false,
        }
    }

    fn fail(&mut self, error: Error) {
        self.done = true;
        self.upstream.cancel();
        self.downstream.on_error(error);
    }

    fn error(&mut self, error: Error) {
        if !self.done {
            self.done = true;
            self.downstream.on_error(error);
        }
    }

    fn complete(&mut self) {
        if !self.done {
            self.done = true;
            self.downstream.on_complete();
        }
    }
}

struct MapSubscriber<U, F> {
    stage: Stage<U>,
    f: Arc<F>,
}

impl<T, U, F> Subscriber<T> for MapSubscriber<U, F>
where
    F: Fn(T) -> U + Send + Sync,
    U: Send,
{
    fn on_next(&mut self, value: T) {
        if self.stage.done {
            return;
        }
        let f = &self.f;
        match catch_transform("map", || (**f)(value)) {
            Ok(mapped) => self.stage.downstream.on_next(mapped),
            Err(e) => self.stage.fail(e),
        }
    }

    fn on_error(&mut self, error: Error) {
        self.stage.error(error);
    }

    fn on_complete(&mut self) {
        self.stage.complete();
    }
}

/// Applies a fallible function to every value.
pub struct TryMap<P, F> {
    upstream: P,
    f: Arc<F>,
}

impl<P, F> TryMap<P, F> {
    pub(crate) fn new(upstream: P, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
        }
    }
}

impl<P, F, U, E> Publisher for TryMap<P, F>
where
    P: Publisher,
    F: Fn(P::Item) -> std::result::Result<U, E> + Send + Sync + 'static,
    U: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = U;

    fn attach(&self, downstream: BoxSubscriber<U>, subscription: &Subscription) {
        let upstream = subscription.child();
        self.upstream.attach(
            Box::new(TryMapSubscriber {
                stage: Stage::new(downstream, upstream.clone()),
                f: self.f.clone(),
            }),
            &upstream,
        );
    }
}

impl<P, F, U, E> Single for TryMap<P, F>
where
    P: Single,
    F: Fn(P::Item) -> std::result::Result<U, E> + Send + Sync + 'static,
    U: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
}

struct TryMapSubscriber<U, F> {
    stage: Stage<U>,
    f: Arc<F>,
}

impl<T, U, E, F> Subscriber<T> for TryMapSubscriber<U, F>
where
    F: Fn(T) -> std::result::Result<U, E> + Send + Sync,
    U: Send,
    E: std::error::Error + Send + Sync + 'static,
{
    fn on_next(&mut self, value: T) {
        if self.stage.done {
            return;
        }
        let f = &self.f;
        match catch_transform("try_map", || (**f)(value)) {
            Ok(Ok(mapped)) => self.stage.downstream.on_next(mapped),
            Ok(Err(e)) => self.stage.fail(Error::transform(e)),
            Err(e) => self.stage.fail(e),
        }
    }

    fn on_error(&mut self, error: Error) {
        self.stage.error(error);
    }

    fn on_complete(&mut self) {
        self.stage.complete();
    }
}

/// Drops values failing a predicate.
pub struct Filter<P, F> {
    upstream: P,
    predicate: Arc<F>,
}

impl<P, F> Filter<P, F> {
    pub(crate) fn new(upstream: P, predicate: F) -> Self {
        Self {
            upstream,
            predicate: Arc::new(predicate),
        }
    }
}

impl<P, F> Publisher for Filter<P, F>
where
    P: Publisher,
    F: Fn(&P::Item) -> bool + Send + Sync + 'static,
{
    type Item = P::Item;

    fn attach(&self, downstream: BoxSubscriber<P::Item>, subscription: &Subscription) {
        let upstream = subscription.child();
        self.upstream.attach(
            Box::new(FilterSubscriber {
                stage: Stage::new(downstream, upstream.clone()),
                predicate: self.predicate.clone(),
            }),
            &upstream,
        );
    }
}

impl<P, F> Single for Filter<P, F>
where
    P: Single,
    F: Fn(&P::Item) -> bool + Send + Sync + 'static,
{
}

struct FilterSubscriber<T, F> {
    stage: Stage<T>,
    predicate: Arc<F>,
}

impl<T, F> Subscriber<T> for FilterSubscriber<T, F>
where
    F: Fn(&T) -> bool + Send + Sync,
    T: Send,
{
    fn on_next(&mut self, value: T) {
        if self.stage.done {
            return;
        }
        let predicate = &self.predicate;
        match catch_transform("filter", || (**predicate)(&value)) {
            Ok(true) => self.stage.downstream.on_next(value),
            Ok(false) => {}
            Err(e) => self.stage.fail(e),
        }
    }

    fn on_error(&mut self, error: Error) {
        self.stage.error(error);
    }

    fn on_complete(&mut self) {
        self.stage.complete();
    }
}
