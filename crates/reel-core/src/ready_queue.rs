//! Deferred readiness queue
//!
//! Backends initialize asynchronously; callers do not. The queue buffers
//! caller intent until the backend signals readiness, then hands it back in
//! FIFO order exactly once. Idempotent setters pass a key so only the most
//! recent value survives.

/// Dedup key for last-writer-wins scheduling
pub type DeferredKey = &'static str;

/// Outcome of [`ReadyQueue::schedule`]
#[derive(Debug, PartialEq)]
pub enum Scheduled<T> {
    /// Backend is ready; the caller must run the item now
    RunNow(T),
    /// Item queued until the backend becomes ready
    Queued,
}

/// Buffer of pending items, drained exactly once on readiness
#[derive(Debug)]
pub struct ReadyQueue<T> {
    ready: bool,
    pending: Vec<(Option<DeferredKey>, T)>,
}

impl<T> ReadyQueue<T> {
    pub fn new() -> Self {
        Self {
            ready: false,
            pending: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Schedule `item` to run once the backend is ready
    ///
    /// If the backend is already ready the item is returned for immediate
    /// execution. If `key` matches a queued entry, the old entry is removed
    /// before appending, so only the latest keyed value survives.
    pub fn schedule(&mut self, item: T, key: Option<DeferredKey>) -> Scheduled<T> {
        if self.ready {
            return Scheduled::RunNow(item);
        }
        if let Some(key) = key {
            if let Some(pos) = self.pending.iter().position(|(k, _)| *k == Some(key)) {
                self.pending.remove(pos);
            }
        }
        self.pending.push((key, item));
        Scheduled::Queued
    }

    /// Latch ready and drain the pending list in enqueue order
    ///
    /// The queue stays ready (subsequent schedules run immediately) until
    /// [`reset`] is called for a new backend. Draining twice yields nothing.
    ///
    /// [`reset`]: ReadyQueue::reset
    pub fn mark_ready(&mut self) -> Vec<T> {
        self.ready = true;
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(_, item)| item)
            .collect()
    }

    /// Return to the not-ready state and discard anything still pending
    pub fn reset(&mut self) {
        self.ready = false;
        self.pending.clear();
    }
}

impl<T> Default for ReadyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_queue_until_ready() {
        let mut queue = ReadyQueue::new();
        assert_eq!(queue.schedule("a", None), Scheduled::Queued);
        assert_eq!(queue.schedule("b", None), Scheduled::Queued);
        assert_eq!(queue.mark_ready(), vec!["a", "b"]);
    }

    #[test]
    fn test_ready_queue_runs_immediately_after_latch() {
        let mut queue = ReadyQueue::new();
        queue.mark_ready();
        assert_eq!(queue.schedule("now", None), Scheduled::RunNow("now"));
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_keyed_entries_keep_only_latest() {
        let mut queue = ReadyQueue::new();
        queue.schedule(1.0, Some("seek"));
        queue.schedule(0.5, Some("volume"));
        queue.schedule(7.0, Some("seek"));
        assert_eq!(queue.mark_ready(), vec![0.5, 7.0]);
    }

    #[test]
    fn test_drain_happens_exactly_once() {
        let mut queue = ReadyQueue::new();
        queue.schedule("x", None);
        assert_eq!(queue.mark_ready().len(), 1);
        assert!(queue.mark_ready().is_empty());
    }

    #[test]
    fn test_reset_discards_pending_and_clears_latch() {
        let mut queue = ReadyQueue::new();
        queue.mark_ready();
        queue.reset();
        assert!(!queue.is_ready());
        assert_eq!(queue.schedule("y", None), Scheduled::Queued);
        queue.reset();
        assert!(queue.mark_ready().is_empty());
    }
}
