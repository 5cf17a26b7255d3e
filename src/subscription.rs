//! Subscription lifecycle, demand accounting and configuration.
//!
//! A [`Subscription`] is created per `subscribe` call and owns everything
//! live about it: the cancellation flag, the outstanding demand, the
//! upstream links created by operator stages (children), and the scheduler
//! handles registered by time-based stages. Cancelling a subscription
//! cancels its children and its pending timers; cancelling twice is the same
//! as cancelling once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::scheduler::TaskHandle;

/// Demand value meaning "no limit"
pub const UNBOUNDED: u64 = u64::MAX;

/// Default capacity of the buffer in front of a demand-limited subscriber
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Configuration for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscribeConfig {
    /// Values the subscriber accepts before it calls [`Subscription::request`]
    pub initial_demand: u64,
    /// Maximum number of values held while demand is exhausted
    pub buffer_size: usize,
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            initial_demand: UNBOUNDED,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl SubscribeConfig {
    /// Set the initial demand
    pub fn initial_demand(mut self, demand: u64) -> Self {
        self.initial_demand = demand;
        self
    }

    /// Set the buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

type RequestHook = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    cancelled: AtomicBool,
    terminated: AtomicBool,
    demand: AtomicU64,
    children: Mutex<Vec<Subscription>>,
    timers: Mutex<Vec<TaskHandle>>,
    on_request: Mutex<Option<RequestHook>>,
}

/// Live link between one publisher and one subscriber.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .field("terminated", &self.is_terminated())
            .field("demand", &self.demand())
            .finish()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    /// Create a root subscription with unbounded demand
    pub fn new() -> Self {
        Self::with_demand(UNBOUNDED)
    }

    /// Create a root subscription with the given initial demand
    pub fn with_demand(demand: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                demand: AtomicU64::new(demand),
                children: Mutex::new(Vec::new()),
                timers: Mutex::new(Vec::new()),
                on_request: Mutex::new(None),
            }),
        }
    }

    /// Create an upstream link owned by this subscription.
    ///
    /// The child is cancelled with its parent; a child created after the
    /// parent was cancelled starts out cancelled.
    pub fn child(&self) -> Subscription {
        let child = Subscription::new();
        {
            let mut children = self.inner.children.lock();
            if !self.is_cancelled() {
                children.retain(|c| c.is_active());
                children.push(child.clone());
                return child;
            }
        }
        child.cancel();
        child
    }

    /// Cancel this subscription, its upstream links and its pending timers.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("subscription cancelled");
        self.cancel_upstream();
        self.inner.on_request.lock().take();
    }

    /// Cancel upstream links and timers while keeping this subscription open,
    /// so a stage can still deliver its own terminal signal downstream.
    pub fn cancel_upstream(&self) {
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.cancel();
        }
        let timers = std::mem::take(&mut *self.inner.timers.lock());
        for timer in timers {
            timer.cancel();
        }
    }

    /// Mark the subscription as finished after its terminal signal and
    /// release everything it still holds.
    pub fn release(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_upstream();
        self.inner.on_request.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Neither cancelled nor terminated
    pub fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.is_terminated()
    }

    /// Tie a scheduled task to this subscription so cancelling it cancels
    /// the task.
    pub fn register_timer(&self, handle: TaskHandle) {
        {
            let mut timers = self.inner.timers.lock();
            if self.is_active() {
                timers.retain(|t| t.is_active());
                timers.push(handle);
                return;
            }
        }
        handle.cancel();
    }

    /// Outstanding demand, [`UNBOUNDED`] when unlimited
    pub fn demand(&self) -> u64 {
        self.inner.demand.load(Ordering::Acquire)
    }

    /// Ask for `n` more values.
    pub fn request(&self, n: u64) {
        if n == 0 || !self.is_active() {
            return;
        }
        let _ = self
            .inner
            .demand
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == UNBOUNDED {
                    None
                } else {
                    Some(current.saturating_add(n))
                }
            });
        let hook = self.inner.on_request.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Consume one unit of demand; false when none is left.
    pub(crate) fn take_demand(&self) -> bool {
        self.inner
            .demand
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                0 => None,
                UNBOUNDED => Some(UNBOUNDED),
                n => Some(n - 1),
            })
            .is_ok()
    }

    /// Install the callback run after every [`request`](Self::request).
    pub(crate) fn set_request_hook(&self, hook: RequestHook) {
        *self.inner.on_request.lock() = Some(hook);
    }
}
