use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a writer's counters. All counters only grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Records accepted by the queue.
    pub enqueued: u64,
    /// Records durably written (appended and synced).
    pub written: u64,
    /// Successful non-empty flushes.
    pub flushes: u64,
    /// Flush attempts that failed to append or sync; the batch was retained.
    pub write_failures: u64,
    /// Records the sink panicked on, or that did not fit in the sink backlog.
    pub sink_failures: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) enqueued: AtomicU64,
    /// Records moved from the queue into the pending batch.
    pub(crate) accepted: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) flushes: AtomicU64,
    pub(crate) write_failures: AtomicU64,
    pub(crate) sink_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}
