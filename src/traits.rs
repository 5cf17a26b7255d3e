//! Core traits for the publisher/subscriber system.
//!
//! This module defines the push-based abstractions every stage is built
//! from: a [`Publisher`] describes a cold computation, a [`Subscriber`]
//! receives the signals of one run of it, and the extension traits compose
//! publishers into operator chains.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::operators::{
    ConcatWith, DelayElements, DoOnNext, Filter, FlatMap, Log, Map, Then, TryMap, Zip2,
};
use crate::scheduler::Scheduler;
use crate::sinks::{subscribe_edge, LambdaSubscriber};
use crate::stream::SignalStream;
use crate::subscription::{SubscribeConfig, Subscription};

/// Receives the signals of one subscription.
///
/// Implementations may be invoked from a different thread than the one that
/// subscribed whenever a scheduler-backed stage sits upstream, hence `Send`.
/// Calls for one subscription are never concurrent.
///
/// # Examples
///
/// ```rust
/// use fluxweld::error::Error;
/// use fluxweld::traits::Subscriber;
///
/// struct PrintSubscriber;
///
/// impl Subscriber<String> for PrintSubscriber {
///     fn on_next(&mut self, value: String) {
///         println!("Data: {}", value);
///     }
///
///     fn on_error(&mut self, error: Error) {
///         println!("Handled error: {}", error);
///     }
///
///     fn on_complete(&mut self) {}
/// }
/// ```
pub trait Subscriber<T>: Send {
    /// A value was produced
    fn on_next(&mut self, value: T);

    /// The sequence failed; nothing follows
    fn on_error(&mut self, error: Error);

    /// The sequence finished; nothing follows
    fn on_complete(&mut self);
}

/// Type-erased subscriber handed between stages
pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_next(&mut self, value: T) {
        (**self).on_next(value)
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }
}

/// A cold description of a signal sequence.
///
/// Publishers are immutable: attaching runs the producing computation anew
/// for that subscription only, so the same publisher may be subscribed any
/// number of times, concurrently.
///
/// # Examples
///
/// ```rust
/// use fluxweld::traits::{BoxSubscriber, Publisher, Subscriber};
/// use fluxweld::subscription::Subscription;
///
/// struct Countdown(u32);
///
/// impl Publisher for Countdown {
///     type Item = u32;
///
///     fn attach(&self, mut subscriber: BoxSubscriber<u32>, subscription: &Subscription) {
///         for n in (1..=self.0).rev() {
///             if subscription.is_cancelled() {
///                 return;
///             }
///             subscriber.on_next(n);
///         }
///         subscriber.on_complete();
///     }
/// }
/// ```
pub trait Publisher: Send + Sync + 'static {
    /// The type of values this publisher emits
    type Item: Send + 'static;

    /// Start one run, delivering its signals to `subscriber`.
    ///
    /// Implementations must stop emitting once `subscription` is cancelled
    /// and must never deliver anything after a terminal signal.
    fn attach(&self, subscriber: BoxSubscriber<Self::Item>, subscription: &Subscription);
}

/// Marker for publishers that emit at most one value.
pub trait Single: Publisher {}

/// Type-erased, shareable publisher
pub type SharedPublisher<T> = Arc<dyn Publisher<Item = T>>;

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    type Item = P::Item;

    fn attach(&self, subscriber: BoxSubscriber<Self::Item>, subscription: &Subscription) {
        (**self).attach(subscriber, subscription)
    }
}

impl<P: Single + ?Sized> Single for Arc<P> {}

/// Operator and subscription methods available on every publisher.
pub trait PublisherExt: Publisher + Sized {
    /// Transform each value; a panic in `f` becomes an error signal
    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Item) -> U + Send + Sync + 'static,
        U: Send + 'static,
    {
        Map::new(self, f)
    }

    /// Transform each value with a fallible function
    fn try_map<F, U, E>(self, f: F) -> TryMap<Self, F>
    where
        F: Fn(Self::Item) -> std::result::Result<U, E> + Send + Sync + 'static,
        U: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        TryMap::new(self, f)
    }

    /// Keep only values matching the predicate
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        Filter::new(self, predicate)
    }

    /// Emit this sequence, then `other`'s
    fn concat_with<P2>(self, other: P2) -> ConcatWith<Self, P2>
    where
        P2: Publisher<Item = Self::Item>,
    {
        ConcatWith::new(self, other)
    }

    /// Ignore this sequence's values, then mirror `other`
    fn then<P2: Publisher>(self, other: P2) -> Then<Self, P2> {
        Then::new(self, other)
    }

    /// Re-emit each value `delay` later on the tokio runtime current at
    /// subscribe time
    fn delay_elements(self, delay: Duration) -> DelayElements<Self> {
        DelayElements::new(self, delay, None)
    }

    /// Re-emit each value `delay` later on the given scheduler
    fn delay_elements_on(self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> DelayElements<Self> {
        DelayElements::new(self, delay, Some(scheduler))
    }

    /// Log every signal through `tracing` under `category`
    fn log<S: Into<String>>(self, category: S) -> Log<Self>
    where
        Self::Item: Debug,
    {
        Log::new(self, category.into())
    }

    /// Run a side effect for each value
    fn do_on_next<F>(self, f: F) -> DoOnNext<Self, F>
    where
        F: Fn(&Self::Item) + Send + Sync + 'static,
    {
        DoOnNext::new(self, f)
    }

    /// Erase the concrete stage type
    fn shared(self) -> SharedPublisher<Self::Item> {
        Arc::new(self)
    }

    /// Subscribe with one callback per signal channel
    fn subscribe<N, E, C>(&self, on_next: N, on_error: E, on_complete: C) -> Subscription
    where
        N: FnMut(Self::Item) + Send + 'static,
        E: FnMut(Error) + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        self.subscribe_with(LambdaSubscriber::new(on_next, on_error, on_complete))
    }

    /// Subscribe to values only; errors are logged and dropped
    fn subscribe_next<N>(&self, on_next: N) -> Subscription
    where
        N: FnMut(Self::Item) + Send + 'static,
    {
        self.subscribe_with(LambdaSubscriber::values(on_next))
    }

    /// Subscribe with a custom subscriber and unbounded demand
    fn subscribe_with<S>(&self, subscriber: S) -> Subscription
    where
        S: Subscriber<Self::Item> + 'static,
    {
        self.subscribe_with_config(subscriber, SubscribeConfig::default())
    }

    /// Subscribe with a custom subscriber and configuration
    fn subscribe_with_config<S>(&self, subscriber: S, config: SubscribeConfig) -> Subscription
    where
        S: Subscriber<Self::Item> + 'static,
    {
        subscribe_edge(self, Box::new(subscriber), config)
    }

    /// Bridge into an async stream of results; dropping the stream cancels
    fn into_stream(&self) -> SignalStream<Self::Item> {
        SignalStream::new(self)
    }
}

impl<P: Publisher> PublisherExt for P {}

/// Operators specific to single-value publishers.
pub trait SingleExt: Single + Sized {
    /// Continue with the single publisher produced from the value
    fn flat_map<F, R>(self, f: F) -> FlatMap<Self, F>
    where
        F: Fn(Self::Item) -> R + Send + Sync + 'static,
        R: Single,
    {
        FlatMap::new(self, f)
    }

    /// Continue with the multi-value publisher produced from the value
    fn flat_map_many<F, R>(self, f: F) -> FlatMap<Self, F>
    where
        F: Fn(Self::Item) -> R + Send + Sync + 'static,
        R: Publisher,
    {
        FlatMap::new(self, f)
    }

    /// Pair this value with `other`'s
    fn zip_with<P2: Single>(self, other: P2) -> Zip2<Self, P2> {
        Zip2::new(self, other)
    }
}

impl<P: Single> SingleExt for P {}
