//! Deferred execution port
//!
//! Every adapter-visible event is dispatched asynchronously, even when the
//! trigger was a synchronous caller action, so observers always see events
//! after the triggering call has returned. The bridges also lean on timers
//! for polling, stall detection, and retry backoff. Both needs go through
//! the [`Scheduler`] trait so the state machine's ordering contract is
//! independent of any concrete timer API: [`TokioScheduler`] drives
//! production, [`ManualScheduler`] drives tests and embedders that want a
//! deterministic clock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A one-shot deferred action
pub type Task = Box<dyn FnOnce() + Send>;

/// A repeating timer action
pub type RepeatingTask = Box<dyn FnMut() + Send>;

/// Handle for cancelling a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Deferred-execution interface used by adapters and bridges
pub trait Scheduler: Send + Sync {
    /// Run `task` once the current call stack has unwound (zero delay)
    fn defer(&self, task: Task);

    /// Run `task` once after `delay`
    fn after(&self, delay: Duration, task: Task) -> TimerId;

    /// Run `task` every `period`, first firing one period from now
    fn every(&self, period: Duration, task: RepeatingTask) -> TimerId;

    /// Cancel a pending timer; unknown or already-fired ids are ignored
    fn cancel(&self, id: TimerId);
}

// =============================================================================
// Tokio-backed scheduler
// =============================================================================

/// Production scheduler backed by a tokio runtime
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
    next_id: AtomicU64,
    active: Arc<Mutex<HashMap<u64, tokio::task::AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind to the ambient runtime. Panics outside a tokio runtime context.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        self.handle.spawn(async move {
            task();
        });
    }

    fn after(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.allocate();
        let active = Arc::clone(&self.active);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
            active.lock().remove(&id);
        });
        self.active.lock().insert(id, join.abort_handle());
        TimerId(id)
    }

    fn every(&self, period: Duration, mut task: RepeatingTask) -> TimerId {
        let id = self.allocate();
        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                task();
            }
        });
        self.active.lock().insert(id, join.abort_handle());
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        if let Some(handle) = self.active.lock().remove(&id.0) {
            handle.abort();
        }
    }
}

// =============================================================================
// Manual scheduler (virtual clock)
// =============================================================================

enum EntryKind {
    Once(Task),
    Repeating { period: Duration, task: RepeatingTask },
}

struct Entry {
    id: u64,
    due: Duration,
    seq: u64,
    kind: EntryKind,
}

struct ManualInner {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    entries: Vec<Entry>,
    cancelled: Vec<u64>,
}

impl ManualInner {
    fn push(&mut self, due: Duration, kind: EntryKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { id, due, seq, kind });
        id
    }

    /// Index of the earliest runnable entry at or before `horizon`
    fn next_due(&self, horizon: Duration) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= horizon)
            .min_by_key(|(_, e)| (e.due, e.seq))
            .map(|(i, _)| i)
    }
}

/// Deterministic scheduler with a virtual clock
///
/// Nothing runs until the embedder pumps it: [`run_until_idle`] drains all
/// zero-delay work, [`advance`] moves the clock and fires due timers in
/// order. Tasks scheduled by running tasks are picked up within the same
/// pump.
///
/// [`run_until_idle`]: ManualScheduler::run_until_idle
/// [`advance`]: ManualScheduler::advance
pub struct ManualScheduler {
    inner: Mutex<ManualInner>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManualInner {
                now: Duration::ZERO,
                next_id: 1,
                next_seq: 0,
                entries: Vec::new(),
                cancelled: Vec::new(),
            }),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Number of scheduled entries still pending
    pub fn pending(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Run every task due at the current virtual time, including tasks they
    /// schedule in turn
    pub fn run_until_idle(&self) {
        self.pump(Duration::ZERO);
    }

    /// Advance the virtual clock by `delta`, firing due timers in order
    pub fn advance(&self, delta: Duration) {
        self.pump(delta);
    }

    fn pump(&self, delta: Duration) {
        let target = {
            let inner = self.inner.lock();
            inner.now + delta
        };

        loop {
            // Pull one due entry out while holding the lock, run it without.
            let (entry, run_at) = {
                let mut inner = self.inner.lock();
                match inner.next_due(target) {
                    Some(idx) => {
                        let entry = inner.entries.swap_remove(idx);
                        let run_at = entry.due.max(inner.now);
                        inner.now = run_at;
                        (entry, run_at)
                    }
                    None => {
                        inner.now = target;
                        return;
                    }
                }
            };

            match entry.kind {
                EntryKind::Once(task) => task(),
                EntryKind::Repeating { period, mut task } => {
                    task();
                    let mut inner = self.inner.lock();
                    if let Some(pos) = inner.cancelled.iter().position(|c| *c == entry.id) {
                        inner.cancelled.swap_remove(pos);
                    } else {
                        let seq = inner.next_seq;
                        inner.next_seq += 1;
                        inner.entries.push(Entry {
                            id: entry.id,
                            due: run_at + period,
                            seq,
                            kind: EntryKind::Repeating { period, task },
                        });
                    }
                }
            }
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        let mut inner = self.inner.lock();
        let now = inner.now;
        inner.push(now, EntryKind::Once(task));
    }

    fn after(&self, delay: Duration, task: Task) -> TimerId {
        let mut inner = self.inner.lock();
        let due = inner.now + delay;
        TimerId(inner.push(due, EntryKind::Once(task)))
    }

    fn every(&self, period: Duration, task: RepeatingTask) -> TimerId {
        let mut inner = self.inner.lock();
        let due = inner.now + period;
        TimerId(inner.push(due, EntryKind::Repeating { period, task }))
    }

    fn cancel(&self, id: TimerId) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.entries.iter().position(|e| e.id == id.0) {
            inner.entries.swap_remove(pos);
        } else {
            // May be a repeating entry currently mid-run; drop it on reinsert.
            inner.cancelled.push(id.0);
        }
    }
}
