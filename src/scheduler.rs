//! Schedulers for time-based and thread-hopping stages.
//!
//! A scheduler runs a task after a delay and hands back a [`TaskHandle`]
//! that can prevent it from running. Tasks fire on whatever execution
//! context the scheduler owns: a tokio worker for [`TokioScheduler`], the
//! thread calling [`VirtualScheduler::advance`] for the virtual clock.
//! Subscribers downstream of a scheduled stage must tolerate that.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// A unit of work handed to a scheduler
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks after a delay.
///
/// Implementations must never run a task inline from `schedule_after`;
/// callers may hold locks while scheduling.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed, unless the returned handle is
    /// cancelled first.
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle;
}

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Handle to a scheduled task.
///
/// Cancelling is idempotent. A cancelled task never runs; cancelling a task
/// that already fired has no effect.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevent the task from running if it has not fired yet
    pub fn cancel(&self) {
        if self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.token.cancel();
        }
    }

    /// False once the task fired or was cancelled
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Whether the task was cancelled before it could fire
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Transition to fired; false if the task was cancelled first.
    fn claim(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Create a scheduler spawning onto the given runtime
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler bound to the runtime of the calling thread
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::Scheduler(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let guard = handle.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = guard.token.cancelled() => {
                    debug!(?delay, "scheduled task cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if guard.claim() {
                        task();
                    }
                }
            }
        });
        handle
    }
}

struct VirtualEntry {
    task: Task,
    handle: TaskHandle,
}

#[derive(Default)]
struct VirtualState {
    now: Duration,
    seq: u64,
    queue: BTreeMap<(Duration, u64), VirtualEntry>,
}

/// A manually driven clock for deterministic tests.
///
/// Tasks run on the thread calling [`advance`](Self::advance), in deadline
/// order; tasks sharing a deadline run in scheduling order.
#[derive(Clone, Default)]
pub struct VirtualScheduler {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time, measured from creation
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of tasks waiting to fire, including cancelled ones not yet reaped
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Move the clock forward by `by`, firing every task that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        loop {
            // The lock is released before running a task so it may schedule more.
            let next = {
                let mut state = self.state.lock();
                match state.queue.first_key_value() {
                    Some((&(deadline, _), _)) if deadline <= target => {
                        state.now = deadline;
                        state.queue.pop_first().map(|(_, entry)| entry)
                    }
                    _ => None,
                }
            };
            match next {
                Some(entry) => {
                    if entry.handle.claim() {
                        (entry.task)();
                    }
                }
                None => break,
            }
        }
        self.state.lock().now = target;
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.state.lock();
        let key = (state.now + delay, state.seq);
        state.seq += 1;
        state.queue.insert(
            key,
            VirtualEntry {
                task,
                handle: handle.clone(),
            },
        );
        handle
    }
}
