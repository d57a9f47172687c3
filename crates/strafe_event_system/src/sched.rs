//! Main-thread task scheduler.
//!
//! Worker threads hand closures to the [`TaskQueue`]; the frame handler
//! drains everything due at the start of each host frame and runs it on the
//! host's thread. This is the one sanctioned way for background work to
//! touch host state.
//!
//! Draining is written for a single consumer (the frame handler). Multiple
//! concurrent drainers would not corrupt the queue, but due tasks could
//! interleave across them and the per-frame ordering guarantee is lost.

use crate::error::panic_message;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::error;

/// A closure waiting for its due time.
struct ScheduledTask {
    due: Instant,
    /// Monotonic tie-breaker so tasks with equal due times run in the
    /// order they were enqueued.
    seq: u64,
    job: Box<dyn FnOnce() + Send>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    // Reversed so the max-heap yields the earliest due task first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

/// Cross-thread queue of closures destined for the host's thread.
///
/// Any thread may enqueue at any time. [`drain_once`](Self::drain_once) runs
/// everything whose due time has arrived, one task at a time, with the queue
/// lock released while each task executes so tasks may themselves enqueue.
pub struct TaskQueue {
    tasks: Mutex<BinaryHeap<ScheduledTask>>,
    next_seq: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Enqueues `job` to run on the next drain.
    pub fn defer<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Instant::now(), Box::new(job));
    }

    /// Enqueues `job` to run on the first drain at or after `delay` from now.
    pub fn enqueue<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Instant::now() + delay, Box::new(job));
    }

    fn push(&self, due: Instant, job: Box<dyn FnOnce() + Send>) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.tasks.lock().push(ScheduledTask { due, seq, job });
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Runs every task due as of now. Returns how many ran.
    pub fn drain_once(&self) -> usize {
        self.drain_at(Instant::now())
    }

    /// Runs every task due as of `now`, in due order with ties broken by
    /// enqueue order. A task that panics is logged and does not stop the
    /// drain. Tasks enqueued while draining wait for the next drain, so a
    /// task that immediately re-enqueues itself cannot wedge the frame.
    pub fn drain_at(&self, now: Instant) -> usize {
        let cutoff = self.next_seq.load(AtomicOrdering::Relaxed);
        let mut ran = 0;
        loop {
            let task = {
                let mut tasks = self.tasks.lock();
                match tasks.peek() {
                    Some(next) if next.due <= now && next.seq < cutoff => tasks.pop(),
                    _ => None,
                }
            };
            let Some(task) = task else { break };
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task.job)) {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "scheduled task panicked"
                );
            }
            ran += 1;
        }
        ran
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

static WORKER_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Spawns a named background thread for plugin work.
///
/// Workers must not touch host state directly; they hand results back
/// through the [`TaskQueue`].
pub fn spawn_worker<F>(name: &str, f: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let n = WORKER_COUNT.fetch_add(1, AtomicOrdering::Relaxed);
    std::thread::Builder::new()
        .name(format!("{name}-worker-{n}"))
        .spawn(f)
}
