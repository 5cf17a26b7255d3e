//! Subscriber implementations and the subscription edge.
//!
//! Every `subscribe*` call installs an [`Edge`] between the publisher chain
//! and the caller's subscriber. The edge serializes delivery, honours the
//! subscription's demand with a bounded buffer, drops signals after
//! cancellation and catches signals sent after a terminal signal.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::signal::Signal;
use crate::subscription::{SubscribeConfig, Subscription, UNBOUNDED};
use crate::traits::{BoxSubscriber, Publisher, Subscriber};

/// Attach `publisher` to `subscriber` through a fresh edge.
pub(crate) fn subscribe_edge<P>(
    publisher: &P,
    subscriber: BoxSubscriber<P::Item>,
    config: SubscribeConfig,
) -> Subscription
where
    P: Publisher + ?Sized,
{
    let subscription = Subscription::with_demand(config.initial_demand);
    let edge = Arc::new(Edge::new(subscriber, subscription.clone(), config.buffer_size));

    // Holds the edge until terminal delivery or cancellation so buffered
    // values survive the upstream going away.
    let hook_edge = edge.clone();
    subscription.set_request_hook(Arc::new(move || hook_edge.drain()));

    debug!(demand = config.initial_demand, "subscribe");
    let upstream = subscription.child();
    publisher.attach(Box::new(EdgeSubscriber { edge }), &upstream);
    subscription
}

struct EdgeQueue<T> {
    signals: VecDeque<Signal<T>>,
    values: usize,
    terminal_received: bool,
    overflowed: bool,
}

/// Serializing, protocol-checking gate in front of a user subscriber.
pub(crate) struct Edge<T> {
    queue: Mutex<EdgeQueue<T>>,
    wip: AtomicUsize,
    done: AtomicBool,
    subscriber: Mutex<BoxSubscriber<T>>,
    subscription: Subscription,
    buffer_size: usize,
}

impl<T: Send + 'static> Edge<T> {
    fn new(subscriber: BoxSubscriber<T>, subscription: Subscription, buffer_size: usize) -> Self {
        Self {
            queue: Mutex::new(EdgeQueue {
                signals: VecDeque::new(),
                values: 0,
                terminal_received: false,
                overflowed: false,
            }),
            wip: AtomicUsize::new(0),
            done: AtomicBool::new(false),
            subscriber: Mutex::new(subscriber),
            subscription,
            buffer_size,
        }
    }

    fn push(&self, signal: Signal<T>) {
        {
            let mut queue = self.queue.lock();
            if queue.overflowed {
                return;
            }
            if queue.terminal_received {
                drop(queue);
                self.violation(&signal);
                return;
            }
            if signal.is_terminal() {
                queue.terminal_received = true;
            }
            if self.subscription.is_cancelled() {
                return;
            }
            if let Signal::Value(_) = signal {
                let bounded = self.subscription.demand() != UNBOUNDED;
                if bounded && queue.values >= self.buffer_size {
                    warn!(max = self.buffer_size, "subscriber buffer overflow");
                    queue.terminal_received = true;
                    queue.overflowed = true;
                    queue.signals.clear();
                    queue.values = 0;
                    queue
                        .signals
                        .push_back(Signal::Error(Error::capacity(self.buffer_size, self.buffer_size)));
                    drop(queue);
                    self.subscription.cancel_upstream();
                    self.drain();
                    return;
                }
                queue.values += 1;
            }
            queue.signals.push_back(signal);
        }
        self.drain();
    }

    /// Deliver queued signals while demand allows. Only one thread drains at
    /// a time; callers arriving meanwhile leave their work to it.
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            loop {
                if self.done.load(Ordering::Acquire) {
                    break;
                }
                if self.subscription.is_cancelled() {
                    let mut queue = self.queue.lock();
                    queue.signals.clear();
                    queue.values = 0;
                    break;
                }
                let next = {
                    let mut queue = self.queue.lock();
                    match queue.signals.front() {
                        None => None,
                        Some(Signal::Value(_)) => {
                            if self.subscription.take_demand() {
                                queue.values -= 1;
                                queue.signals.pop_front()
                            } else {
                                None
                            }
                        }
                        Some(_) => queue.signals.pop_front(),
                    }
                };
                match next {
                    Some(signal) => self.deliver(signal),
                    None => break,
                }
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn deliver(&self, signal: Signal<T>) {
        #[cfg(feature = "metrics")]
        metrics::counter!("fluxweld_signals_total", "kind" => signal.kind()).increment(1);

        let mut subscriber = self.subscriber.lock();
        match signal {
            Signal::Value(value) => subscriber.on_next(value),
            Signal::Error(e) => {
                self.done.store(true, Ordering::Release);
                subscriber.on_error(e);
                drop(subscriber);
                self.subscription.release();
            }
            Signal::Complete => {
                self.done.store(true, Ordering::Release);
                subscriber.on_complete();
                drop(subscriber);
                self.subscription.release();
            }
        }
    }

    fn violation(&self, signal: &Signal<T>) {
        let violation = Error::protocol_violation(format!(
            "{} signal after terminal signal",
            signal.kind()
        ));
        error!(error = %violation, "dropping signal");
        if cfg!(debug_assertions) {
            panic!("{violation}");
        }
    }
}

struct EdgeSubscriber<T> {
    edge: Arc<Edge<T>>,
}

impl<T: Send + 'static> Subscriber<T> for EdgeSubscriber<T> {
    fn on_next(&mut self, value: T) {
        self.edge.push(Signal::Value(value));
    }

    fn on_error(&mut self, error: Error) {
        self.edge.push(Signal::Error(error));
    }

    fn on_complete(&mut self) {
        self.edge.push(Signal::Complete);
    }
}

/// A subscriber built from one closure per signal channel
pub struct LambdaSubscriber<N, E, C> {
    on_next: N,
    on_error: E,
    on_complete: C,
}

impl<N, E, C> LambdaSubscriber<N, E, C> {
    pub fn new(on_next: N, on_error: E, on_complete: C) -> Self {
        Self {
            on_next,
            on_error,
            on_complete,
        }
    }
}

fn drop_error(error: Error) {
    warn!(%error, "error dropped: no error callback subscribed");
}

fn ignore_complete() {}

impl<N> LambdaSubscriber<N, fn(Error), fn()> {
    /// Only observe values; errors are logged and dropped
    pub fn values(on_next: N) -> Self {
        Self::new(on_next, drop_error as fn(Error), ignore_complete as fn())
    }
}

impl<T, N, E, C> Subscriber<T> for LambdaSubscriber<N, E, C>
where
    N: FnMut(T) + Send,
    E: FnMut(Error) + Send,
    C: FnMut() + Send,
{
    fn on_next(&mut self, value: T) {
        (self.on_next)(value)
    }

    fn on_error(&mut self, error: Error) {
        (self.on_error)(error)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }
}

/// A subscriber that records every signal with its arrival time.
///
/// Clones share the same record, so one clone can be subscribed while
/// another is inspected.
pub struct CollectSubscriber<T> {
    events: Arc<Mutex<Vec<(Instant, Signal<T>)>>>,
    terminated: Arc<watch::Sender<bool>>,
}

impl<T> CollectSubscriber<T> {
    pub fn new() -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            terminated: Arc::new(terminated),
        }
    }

    /// Number of signals recorded so far
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Whether a terminal signal was recorded
    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    pub fn is_completed(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|(_, s)| matches!(s, Signal::Complete))
    }

    /// The recorded error, if the sequence failed
    pub fn error(&self) -> Option<Error> {
        self.events.lock().iter().find_map(|(_, s)| match s {
            Signal::Error(e) => Some(e.clone()),
            _ => None,
        })
    }

    /// Arrival time of every recorded signal
    pub fn timestamps(&self) -> Vec<Instant> {
        self.events.lock().iter().map(|(at, _)| *at).collect()
    }

    /// Wait until a terminal signal was recorded
    pub async fn wait_terminal(&self) {
        let mut rx = self.terminated.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl<T: Clone> CollectSubscriber<T> {
    /// Every recorded signal, in arrival order
    pub fn signals(&self) -> Vec<Signal<T>> {
        self.events.lock().iter().map(|(_, s)| s.clone()).collect()
    }

    /// Every recorded value, in arrival order
    pub fn values(&self) -> Vec<T> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, s)| s.value().cloned())
            .collect()
    }
}

impl<T> Default for CollectSubscriber<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSubscriber<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            terminated: self.terminated.clone(),
        }
    }
}

impl<T: Send + 'static> CollectSubscriber<T> {
    fn record(&self, signal: Signal<T>) {
        let terminal = signal.is_terminal();
        self.events.lock().push((Instant::now(), signal));
        if terminal {
            self.terminated.send_replace(true);
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for CollectSubscriber<T> {
    fn on_next(&mut self, value: T) {
        self.record(Signal::Value(value));
    }

    fn on_error(&mut self, error: Error) {
        self.record(Signal::Error(error));
    }

    fn on_complete(&mut self) {
        self.record(Signal::Complete);
    }
}
