//! Source publishers.
//!
//! Literal sources deliver synchronously on the subscribing thread. Every
//! source checks its subscription before each signal and goes quiet once it
//! is cancelled.

use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{panic_message, Error, PanicError, Result};
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single};

/// A single-value publisher emitting a literal value
#[derive(Debug, Clone)]
pub struct Just<T> {
    value: T,
}

/// Emit `value`, then complete.
pub fn just<T>(value: T) -> Just<T>
where
    T: Clone + Send + Sync + 'static,
{
    Just { value }
}

impl<T> Publisher for Just<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn attach(&self, mut subscriber: BoxSubscriber<T>, subscription: &Subscription) {
        if subscription.is_cancelled() {
            return;
        }
        subscriber.on_next(self.value.clone());
        if subscription.is_cancelled() {
            return;
        }
        subscriber.on_complete();
    }
}

impl<T> Single for Just<T> where T: Clone + Send + Sync + 'static {}

/// A multi-value publisher replaying a fixed list of values
#[derive(Debug, Clone)]
pub struct JustMany<T> {
    items: Arc<[T]>,
}

/// Emit every value of `items` in order, then complete.
pub fn just_many<T, I>(items: I) -> JustMany<T>
where
    I: IntoIterator<Item = T>,
    T: Clone + Send + Sync + 'static,
{
    JustMany {
        items: items.into_iter().collect(),
    }
}

/// Alias of [`just_many`] for callers holding an iterator
pub fn from_iter<T, I>(items: I) -> JustMany<T>
where
    I: IntoIterator<Item = T>,
    T: Clone + Send + Sync + 'static,
{
    just_many(items)
}

impl<T> JustMany<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Publisher for JustMany<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn attach(&self, mut subscriber: BoxSubscriber<T>, subscription: &Subscription) {
        for item in self.items.iter() {
            if subscription.is_cancelled() {
                return;
            }
            subscriber.on_next(item.clone());
        }
        if !subscription.is_cancelled() {
            subscriber.on_complete();
        }
    }
}

/// A publisher that generates numbers from a range
#[derive(Debug, Clone)]
pub struct RangeSource {
    range: Range<i64>,
}

/// Emit every number of `range`, then complete.
pub fn range(range: Range<i64>) -> RangeSource {
    RangeSource { range }
}

impl Publisher for RangeSource {
    type Item = i64;

    fn attach(&self, mut subscriber: BoxSubscriber<i64>, subscription: &Subscription) {
        for item in self.range.clone() {
            if subscription.is_cancelled() {
                return;
            }
            subscriber.on_next(item);
        }
        if !subscription.is_cancelled() {
            subscriber.on_complete();
        }
    }
}

/// A publisher that fails immediately
#[derive(Debug, Clone)]
pub struct ErrorSource<T> {
    error: Error,
    _phantom: PhantomData<fn() -> T>,
}

/// Emit `error` and nothing else.
///
/// Valid wherever a single or a multi-value publisher is expected.
pub fn error<T: Send + 'static>(error: Error) -> ErrorSource<T> {
    ErrorSource {
        error,
        _phantom: PhantomData,
    }
}

impl<T: Send + 'static> Publisher for ErrorSource<T> {
    type Item = T;

    fn attach(&self, mut subscriber: BoxSubscriber<T>, subscription: &Subscription) {
        if !subscription.is_cancelled() {
            subscriber.on_error(self.error.clone());
        }
    }
}

impl<T: Send + 'static> Single for ErrorSource<T> {}

/// A publisher that completes without emitting
#[derive(Debug, Clone)]
pub struct Empty<T> {
    _phantom: PhantomData<fn() -> T>,
}

/// Complete immediately without a value.
pub fn empty<T: Send + 'static>() -> Empty<T> {
    Empty {
        _phantom: PhantomData,
    }
}

impl<T: Send + 'static> Publisher for Empty<T> {
    type Item = T;

    fn attach(&self, mut subscriber: BoxSubscriber<T>, subscription: &Subscription) {
        if !subscription.is_cancelled() {
            subscriber.on_complete();
        }
    }
}

impl<T: Send + 'static> Single for Empty<T> {}

/// A single-value publisher computing its value per subscription
pub struct FromFn<F> {
    f: Arc<F>,
}

/// Call `f` on every subscription and emit its outcome.
///
/// `Ok(Some(v))` emits `v` then completes, `Ok(None)` completes empty and
/// `Err(e)` emits `e`. A panic inside `f` is reported as
/// [`Error::Upstream`].
pub fn from_fn<F, T>(f: F) -> FromFn<F>
where
    F: Fn() -> Result<Option<T>> + Send + Sync + 'static,
    T: Send + 'static,
{
    FromFn { f: Arc::new(f) }
}

impl<F> Clone for FromFn<F> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<F, T> Publisher for FromFn<F>
where
    F: Fn() -> Result<Option<T>> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Item = T;

    fn attach(&self, mut subscriber: BoxSubscriber<T>, subscription: &Subscription) {
        if subscription.is_cancelled() {
            return;
        }
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (*self.f)()))
            .unwrap_or_else(|payload| {
                Err(Error::upstream(PanicError {
                    stage: "from_fn",
                    message: panic_message(payload.as_ref()),
                }))
            });
        match outcome {
            Ok(Some(value)) => {
                subscriber.on_next(value);
                if !subscription.is_cancelled() {
                    subscriber.on_complete();
                }
            }
            Ok(None) => subscriber.on_complete(),
            Err(e) => subscriber.on_error(e),
        }
    }
}

impl<F, T> Single for FromFn<F>
where
    F: Fn() -> Result<Option<T>> + Send + Sync + 'static,
    T: Send + 'static,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use crate::sinks::CollectSubscriber;
    use crate::traits::PublisherExt;

    #[test]
    fn test_just() {
        let sink = CollectSubscriber::new();
        just("Learn Code").subscribe_with(sink.clone());
        assert_eq!(sink.signals(), vec![Signal::Value("Learn Code"), Signal::Complete]);
    }

    #[test]
    fn test_just_many_in_order() {
        let sink = CollectSubscriber::new();
        just_many(vec![1, 2, 3]).subscribe_with(sink.clone());
        assert_eq!(
            sink.signals(),
            vec![
                Signal::Value(1),
                Signal::Value(2),
                Signal::Value(3),
                Signal::Complete
            ]
        );
    }

    #[test]
    fn test_range() {
        let sink = CollectSubscriber::new();
        range(1..6).subscribe_with(sink.clone());
        assert_eq!(sink.values(), vec![1, 2, 3, 4, 5]);
        assert!(sink.is_completed());
    }

    #[test]
    fn test_error_and_empty() {
        let failed = CollectSubscriber::<i32>::new();
        error::<i32>(Error::custom("Error from mono")).subscribe_with(failed.clone());
        assert_eq!(failed.signals(), vec![Signal::Error(Error::custom("Error from mono"))]);

        let nothing = CollectSubscriber::<i32>::new();
        empty::<i32>().subscribe_with(nothing.clone());
        assert_eq!(nothing.signals(), vec![Signal::Complete]);
    }

    #[test]
    fn test_sources_are_cold() {
        let source = just_many(vec!["a", "b"]);
        let first = CollectSubscriber::new();
        let second = CollectSubscriber::new();
        source.subscribe_with(first.clone());
        source.subscribe_with(second.clone());
        assert_eq!(first.signals(), second.signals());
    }

    #[test]
    fn test_from_fn_runs_per_subscription() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = from_fn(move || Ok(Some(counter.fetch_add(1, Ordering::SeqCst))));

        let sink = CollectSubscriber::new();
        source.subscribe_with(sink.clone());
        source.subscribe_with(sink.clone());
        assert_eq!(sink.values(), vec![0, 1]);
    }

    #[test]
    fn test_from_fn_panic_is_upstream_error() {
        let source = from_fn(|| -> Result<Option<i32>> { panic!("source blew up") });
        let sink = CollectSubscriber::new();
        source.subscribe_with(sink.clone());

        match sink.error() {
            Some(Error::Upstream(inner)) => {
                assert_eq!(inner.to_string(), "panicked in from_fn: source blew up")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_before_attach_emits_nothing() {
        let sub = Subscription::new();
        sub.cancel();
        let sink = CollectSubscriber::new();
        just(1).attach(Box::new(sink.clone()), &sub);
        assert!(sink.signals().is_empty());
    }
}
