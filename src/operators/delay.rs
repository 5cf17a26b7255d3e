//! Time shifting of values.
//!
//! Each value is re-emitted `delay` after the later of its own arrival and
//! the emission of the value before it, so values keep their order and stay
//! at least `delay` apart. Completion follows the last delayed value. An
//! upstream error is forwarded at once and values still waiting are dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Error;
use crate::scheduler::{Scheduler, TaskHandle, TokioScheduler};
use crate::subscription::Subscription;
use crate::traits::{BoxSubscriber, Publisher, Single, Subscriber};

/// Values a delay stage holds before failing with a capacity error
pub const DEFAULT_DELAY_BUFFER: usize = 256;

/// Re-emits every upstream value after a fixed delay.
///
/// Without an explicit scheduler the tokio runtime current at subscribe time
/// is used; subscribing outside a runtime fails with [`Error::Scheduler`].
pub struct DelayElements<P> {
    upstream: P,
    delay: Duration,
    scheduler: Option<Arc<dyn Scheduler>>,
    capacity: usize,
}

impl<P> DelayElements<P> {
    pub(crate) fn new(upstream: P, delay: Duration, scheduler: Option<Arc<dyn Scheduler>>) -> Self {
        Self {
            upstream,
            delay,
            scheduler,
            capacity: DEFAULT_DELAY_BUFFER,
        }
    }

    /// Set how many values may wait at once
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

impl<P: Publisher> Publisher for DelayElements<P> {
    type Item = P::Item;

    fn attach(&self, mut downstream: BoxSubscriber<P::Item>, subscription: &Subscription) {
        let scheduler = match &self.scheduler {
            Some(scheduler) => scheduler.clone(),
            None => match TokioScheduler::current() {
                Ok(scheduler) => Arc::new(scheduler),
                Err(e) => {
                    warn!(error = %e, "delay_elements subscribed outside a tokio runtime");
                    downstream.on_error(e);
                    return;
                }
            },
        };

        let upstream = subscription.child();
        let shared = Arc::new(DelayShared {
            state: Mutex::new(DelayState {
                queue: VecDeque::new(),
                downstream: Some(downstream),
                timer: None,
                upstream_done: false,
            }),
            scheduler,
            delay: self.delay,
            capacity: self.capacity,
            scope: subscription.clone(),
            upstream: upstream.clone(),
        });
        self.upstream.attach(Box::new(DelaySubscriber { shared }), &upstream);
    }
}

impl<P: Single> Single for DelayElements<P> {}

struct DelayState<T> {
    queue: VecDeque<T>,
    /// `None` once a terminal signal went out
    downstream: Option<BoxSubscriber<T>>,
    /// Set while the head of `queue` waits on the scheduler
    timer: Option<TaskHandle>,
    upstream_done: bool,
}

impl<T> DelayState<T> {
    /// Drop pending work and hand out the downstream for a final signal.
    fn finish(&mut self) -> Option<BoxSubscriber<T>> {
        self.queue.clear();
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.downstream.take()
    }
}

struct DelayShared<T> {
    state: Mutex<DelayState<T>>,
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    capacity: usize,
    scope: Subscription,
    upstream: Subscription,
}

impl<T: Send + 'static> DelayShared<T> {
    fn schedule(self: &Arc<Self>, state: &mut DelayState<T>) {
        let shared = self.clone();
        let handle = self
            .scheduler
            .schedule_after(self.delay, Box::new(move || shared.fire()));
        self.scope.register_timer(handle.clone());
        state.timer = Some(handle);
    }

    /// Emit the head of the queue and arm the timer for the next value.
    fn fire(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.timer = None;
        if self.scope.is_cancelled() {
            state.queue.clear();
            return;
        }
        let Some(value) = state.queue.pop_front() else {
            return;
        };
        match state.downstream.as_mut() {
            Some(downstream) => downstream.on_next(value),
            None => return,
        }

        if !state.queue.is_empty() {
            if !self.scope.is_cancelled() {
                self.schedule(&mut state);
            }
        } else if state.upstream_done {
            if let Some(mut downstream) = state.downstream.take() {
                downstream.on_complete();
            }
        }
    }
}

struct DelaySubscriber<T> {
    shared: Arc<DelayShared<T>>,
}

impl<T: Send + 'static> Subscriber<T> for DelaySubscriber<T> {
    fn on_next(&mut self, value: T) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.downstream.is_none() {
            return;
        }
        if state.queue.len() >= shared.capacity {
            let pending = state.queue.len();
            warn!(pending, max = shared.capacity, "delay buffer overflow");
            shared.upstream.cancel();
            if let Some(mut downstream) = state.finish() {
                downstream.on_error(Error::capacity(pending + 1, shared.capacity));
            }
            return;
        }
        state.queue.push_back(value);
        if state.timer.is_none() {
            shared.schedule(&mut state);
        }
    }

    fn on_error(&mut self, error: Error) {
        let mut state = self.shared.state.lock();
        let dropped = state.queue.len();
        if let Some(mut downstream) = state.finish() {
            debug!(dropped, "delay stage failed, dropping pending values");
            downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        let mut state = self.shared.state.lock();
        state.upstream_done = true;
        if state.queue.is_empty() {
            if let Some(mut downstream) = state.downstream.take() {
                downstream.on_complete();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::scheduler::VirtualScheduler;
    use crate::signal::Signal;
    use crate::sinks::CollectSubscriber;
    use crate::sources::{error, just, just_many};
    use crate::traits::PublisherExt;

    fn virtual_scheduler() -> (Arc<VirtualScheduler>, Arc<dyn Scheduler>) {
        let scheduler = Arc::new(VirtualScheduler::new());
        let erased: Arc<dyn Scheduler> = scheduler.clone();
        (scheduler, erased)
    }

    #[test]
    fn test_values_are_spaced_by_the_delay() {
        let (clock, scheduler) = virtual_scheduler();
        let sink = CollectSubscriber::new();
        just_many(vec![1, 2, 3])
            .delay_elements_on(Duration::from_millis(100), scheduler)
            .subscribe_with(sink.clone());

        assert!(sink.is_empty());
        clock.advance(Duration::from_millis(99));
        assert!(sink.is_empty());
        clock.advance(Duration::from_millis(1));
        assert_eq!(sink.values(), vec![1]);
        clock.advance(Duration::from_millis(100));
        assert_eq!(sink.values(), vec![1, 2]);
        assert!(!sink.is_terminated());
        clock.advance(Duration::from_millis(100));
        assert_eq!(
            sink.signals(),
            vec![
                Signal::Value(1),
                Signal::Value(2),
                Signal::Value(3),
                Signal::Complete
            ]
        );
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_error_is_not_delayed() {
        let (clock, scheduler) = virtual_scheduler();
        let sink = CollectSubscriber::<i32>::new();
        just(1)
            .concat_with(error(Error::custom("late failure")))
            .delay_elements_on(Duration::from_millis(50), scheduler)
            .subscribe_with(sink.clone());

        assert_eq!(sink.signals(), vec![Signal::Error(Error::custom("late failure"))]);
        clock.advance(Duration::from_millis(100));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_cancel_stops_pending_timers() {
        let (clock, scheduler) = virtual_scheduler();
        let sink = CollectSubscriber::new();
        let subscription = just_many(vec![1, 2])
            .delay_elements_on(Duration::from_millis(10), scheduler)
            .subscribe_with(sink.clone());

        clock.advance(Duration::from_millis(10));
        subscription.cancel();
        clock.advance(Duration::from_millis(100));
        assert_eq!(sink.signals(), vec![Signal::Value(1)]);
    }

    #[test]
    fn test_buffer_overflow() {
        let (clock, scheduler) = virtual_scheduler();
        let sink = CollectSubscriber::new();
        just_many(0..10)
            .delay_elements_on(Duration::from_millis(10), scheduler)
            .with_capacity(4)
            .subscribe_with(sink.clone());

        assert_eq!(
            sink.signals(),
            vec![Signal::Error(Error::capacity(5, 4))]
        );
        clock.advance(Duration::from_millis(100));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_outside_runtime_fails() {
        let sink = CollectSubscriber::new();
        just(1)
            .delay_elements(Duration::from_millis(10))
            .subscribe_with(sink.clone());
        assert!(matches!(sink.error(), Some(Error::Scheduler(_))));
    }

    #[tokio::test]
    async fn test_tokio_delay_timestamps() {
        let delay = Duration::from_millis(20);
        let start = Instant::now();
        let sink = CollectSubscriber::new();
        just_many(vec!["a", "b"])
            .delay_elements(delay)
            .subscribe_with(sink.clone());

        sink.wait_terminal().await;
        assert_eq!(sink.values(), vec!["a", "b"]);
        assert!(sink.is_completed());

        let stamps = sink.timestamps();
        assert!(stamps[0] - start >= delay);
        assert!(stamps[1] - stamps[0] >= delay);
    }
}
