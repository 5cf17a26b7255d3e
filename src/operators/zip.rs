//! Combination of several single-value publishers into one value.
//!
//! All inputs are subscribed in argument order. The combined value is
//! emitted, followed by completion, once every input has produced its value.
//! The first input to fail wins: its error is forwarded and every other input
//! is cancelled. An input completing without a value completes the zip
//! empty, also cancelling the others.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single, Subscriber};

struct ZipCore<S, O> {
    slots: S,
    filled: Vec<bool>,
    remaining: usize,
    downstream: Option<BoxSubscriber<O>>,
    inputs: Vec<Subscription>,
    assemble: fn(S) -> Option<O>,
}

type SharedCore<S, O> = Arc<Mutex<ZipCore<S, O>>>;

fn new_core<S, O>(
    slots: S,
    arity: usize,
    downstream: BoxSubscriber<O>,
    subscription: &Subscription,
    assemble: fn(S) -> Option<O>,
) -> SharedCore<S, O> {
    Arc::new(Mutex::new(ZipCore {
        slots,
        filled: vec![false; arity],
        remaining: arity,
        downstream: Some(downstream),
        inputs: (0..arity).map(|_| subscription.child()).collect(),
        assemble,
    }))
}

/// Subscribe input `index` unless the zip already finished.
fn attach_input<P, S, O>(
    input: &P,
    core: &SharedCore<S, O>,
    index: usize,
    store: fn(&mut S, usize, P::Item),
) where
    P: Publisher,
    S: Default + Send + 'static,
    O: Send + 'static,
{
    let subscription = {
        let core = core.lock();
        if core.downstream.is_none() {
            return;
        }
        core.inputs[index].clone()
    };
    input.attach(
        Box::new(ZipInput {
            core: core.clone(),
            index,
            store,
        }),
        &subscription,
    );
}

/// Complete immediately when there is nothing to wait for.
fn finish_if_idle<S, O>(core: &SharedCore<S, O>) {
    let downstream = {
        let mut core = core.lock();
        if core.remaining != 0 {
            return;
        }
        core.downstream.take()
    };
    if let Some(mut downstream) = downstream {
        downstream.on_complete();
    }
}

struct ZipInput<S, O, T> {
    core: SharedCore<S, O>,
    index: usize,
    store: fn(&mut S, usize, T),
}

impl<S, O, T> ZipInput<S, O, T> {
    /// Take the downstream and cancel every input.
    fn finish(&self) -> Option<BoxSubscriber<O>> {
        let (downstream, inputs) = {
            let mut core = self.core.lock();
            (core.downstream.take(), core.inputs.clone())
        };
        if downstream.is_some() {
            for input in &inputs {
                input.cancel();
            }
        }
        downstream
    }
}

impl<S, O, T> Subscriber<T> for ZipInput<S, O, T>
where
    S: Default + Send + 'static,
    O: Send + 'static,
    T: Send + 'static,
{
    fn on_next(&mut self, value: T) {
        let ready = {
            let mut core = self.core.lock();
            if core.downstream.is_none() || core.filled[self.index] {
                return;
            }
            (self.store)(&mut core.slots, self.index, value);
            core.filled[self.index] = true;
            core.remaining -= 1;
            if core.remaining > 0 {
                return;
            }
            let slots = std::mem::take(&mut core.slots);
            core.downstream.take().map(|d| (d, (core.assemble)(slots)))
        };
        if let Some((mut downstream, combined)) = ready {
            if let Some(combined) = combined {
                downstream.on_next(combined);
            }
            downstream.on_complete();
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(mut downstream) = self.finish() {
            debug!(input = self.index, "zip input failed, cancelling siblings");
            downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if self.core.lock().filled[self.index] {
            return;
        }
        if let Some(mut downstream) = self.finish() {
            debug!(input = self.index, "zip input completed empty");
            downstream.on_complete();
        }
    }
}

/// Zips two single-value publishers into a pair.
pub struct Zip2<A, B> {
    a: A,
    b: B,
}

impl<A, B> Zip2<A, B> {
    pub(crate) fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

/// Pair the values of `a` and `b`.
pub fn zip2<A: Single, B: Single>(a: A, b: B) -> Zip2<A, B> {
    Zip2::new(a, b)
}

type Slots2<A, B> = (Option<A>, Option<B>);

impl<A: Single, B: Single> Publisher for Zip2<A, B> {
    type Item = (A::Item, B::Item);

    fn attach(&self, downstream: BoxSubscriber<Self::Item>, subscription: &Subscription) {
        let core = new_core(Slots2::default(), 2, downstream, subscription, |(a, b)| {
            Some((a?, b?))
        });
        attach_input(&self.a, &core, 0, |s: &mut Slots2<A::Item, B::Item>, _, v| s.0 = Some(v));
        attach_input(&self.b, &core, 1, |s: &mut Slots2<A::Item, B::Item>, _, v| s.1 = Some(v));
    }
}

impl<A: Single, B: Single> Single for Zip2<A, B> {}

/// Zips three single-value publishers into a triple.
pub struct Zip3<A, B, C> {
    a: A,
    b: B,
    c: C,
}

/// Combine the values of `a`, `b` and `c`.
pub fn zip3<A: Single, B: Single, C: Single>(a: A, b: B, c: C) -> Zip3<A, B, C> {
    Zip3 { a, b, c }
}

type Slots3<A, B, C> = (Option<A>, Option<B>, Option<C>);

impl<A: Single, B: Single, C: Single> Publisher for Zip3<A, B, C> {
    type Item = (A::Item, B::Item, C::Item);

    fn attach(&self, downstream: BoxSubscriber<Self::Item>, subscription: &Subscription) {
        let core = new_core(Slots3::default(), 3, downstream, subscription, |(a, b, c)| {
            Some((a?, b?, c?))
        });
        attach_input(&self.a, &core, 0, |s: &mut Slots3<A::Item, B::Item, C::Item>, _, v| {
            s.0 = Some(v)
        });
        attach_input(&self.b, &core, 1, |s: &mut Slots3<A::Item, B::Item, C::Item>, _, v| {
            s.1 = Some(v)
        });
        attach_input(&self.c, &core, 2, |s: &mut Slots3<A::Item, B::Item, C::Item>, _, v| {
            s.2 = Some(v)
        });
    }
}

impl<A: Single, B: Single, C: Single> Single for Zip3<A, B, C> {}

/// Zips any number of same-typed single-value publishers into a `Vec`.
pub struct ZipAll<P> {
    inputs: Vec<P>,
}

/// Combine the values of every input, in input order.
///
/// With no inputs the result completes empty.
pub fn zip_all<P: Single>(inputs: Vec<P>) -> ZipAll<P> {
    ZipAll { inputs }
}

impl<P: Single> Publisher for ZipAll<P> {
    type Item = Vec<P::Item>;

    fn attach(&self, downstream: BoxSubscriber<Self::Item>, subscription: &Subscription) {
        let arity = self.inputs.len();
        let slots: Vec<Option<P::Item>> = (0..arity).map(|_| None).collect();
        let core = new_core(slots, arity, downstream, subscription, |slots| {
            slots.into_iter().collect()
        });
        for (index, input) in self.inputs.iter().enumerate() {
            attach_input(input, &core, index, |s: &mut Vec<Option<P::Item>>, i, v| {
                s[i] = Some(v)
            });
        }
        finish_if_idle(&core);
    }
}

impl<P: Single> Single for ZipAll<P> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use crate::sinks::CollectSubscriber;
    use crate::sources::{empty, error, just};
    use crate::subscription::SubscribeConfig;
    use crate::traits::{PublisherExt, SingleExt};

    #[test]
    fn test_zip3_in_input_order() {
        let sink = CollectSubscriber::new();
        zip3(just("Mono m1"), just("Mono m2"), just("Mono m3")).subscribe_with(sink.clone());
        assert_eq!(
            sink.signals(),
            vec![
                Signal::Value(("Mono m1", "Mono m2", "Mono m3")),
                Signal::Complete
            ]
        );
    }

    #[test]
    fn test_zip_with() {
        let sink = CollectSubscriber::new();
        just(1).zip_with(just("one")).subscribe_with(sink.clone());
        assert_eq!(sink.values(), vec![(1, "one")]);
        assert!(sink.is_completed());
    }

    #[test]
    fn test_first_error_wins() {
        let sink = CollectSubscriber::new();
        zip3(
            just(1),
            error::<i32>(Error::custom("first")),
            error::<i32>(Error::custom("second")),
        )
        .subscribe_with(sink.clone());
        assert_eq!(sink.signals(), vec![Signal::Error(Error::custom("first"))]);
    }

    #[test]
    fn test_empty_input_completes_empty() {
        let sink = CollectSubscriber::new();
        zip2(empty::<i32>(), just(2)).subscribe_with(sink.clone());
        assert_eq!(sink.signals(), vec![Signal::Complete]);
    }

    #[test]
    fn test_zip_all() {
        let sink = CollectSubscriber::new();
        zip_all(vec![just(1), just(2), just(3)]).subscribe_with(sink.clone());
        assert_eq!(sink.values(), vec![vec![1, 2, 3]]);

        let none = CollectSubscriber::<Vec<i32>>::new();
        zip_all(Vec::<crate::sources::Just<i32>>::new()).subscribe_with(none.clone());
        assert_eq!(none.signals(), vec![Signal::Complete]);
    }

    #[test]
    fn test_error_cancels_pending_siblings() {
        let scheduler = Arc::new(crate::scheduler::VirtualScheduler::new());
        let slow = just(1).delay_elements_on(std::time::Duration::from_millis(50), scheduler.clone());

        let sink = CollectSubscriber::new();
        zip2(slow, error::<i32>(Error::custom("fast failure")))
            .subscribe_with_config(sink.clone(), SubscribeConfig::default());

        assert_eq!(sink.signals(), vec![Signal::Error(Error::custom("fast failure"))]);

        scheduler.advance(std::time::Duration::from_millis(100));
        assert_eq!(sink.len(), 1);
    }
}
