//! Fixed capacity FIFO hand-off between producer threads and the writer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Default number of records the queue holds before producers block.
pub const DEFAULT_CAPACITY: usize = 1000;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Items ever accepted; the sequence number of the next push.
    pushed: u64,
}

/// A bounded multi-producer, single-consumer queue.
///
/// Producers block in [`BoundedQueue::push`] while the queue is full; the
/// consumer blocks in [`Drain::next`] while it is empty. Closing wakes both
/// sides: blocked and future pushes fail with [`Error::Closed`], and the
/// consumer receives the remaining items followed by end of stream.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> BoundedQueue<T> {
        let capacity = capacity.max(1);
        BoundedQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                closed: false,
                pushed: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an item, waiting for space while the queue is full.
    ///
    /// Returns the item's sequence number, starting at 1 and assigned in
    /// queue order.
    pub fn push(&self, item: T) -> Result<u64> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(Error::Closed);
            }
            if state.items.len() < self.capacity {
                break;
            }
            // The wait releases the lock, so a stalled producer never blocks
            // the consumer or other producers.
            state = match self.not_full.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        state.items.push_back(item);
        state.pushed += 1;
        let sequence = state.pushed;
        drop(state);
        self.not_empty.notify_one();
        Ok(sequence)
    }

    /// Appends an item only if there is room right now.
    ///
    /// Hands the item back when the queue is full or closed.
    pub fn try_push(&self, item: T) -> std::result::Result<u64, T> {
        let mut state = self.lock();
        if state.closed || state.items.len() >= self.capacity {
            return Err(item);
        }
        state.items.push_back(item);
        state.pushed += 1;
        let sequence = state.pushed;
        drop(state);
        self.not_empty.notify_one();
        Ok(sequence)
    }

    /// Number of items pushed so far, including ones already taken.
    pub fn pushed(&self) -> u64 {
        self.lock().pushed
    }

    /// Removes the oldest item, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = match self.not_empty.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Blocking FIFO iterator over the queue, ending when closed and empty.
    ///
    /// Each call creates a fresh iterator; items taken by a previous drain
    /// are not seen again.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    /// Marks the queue closed. Calling this more than once has no effect.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

/// Iterator returned by [`BoundedQueue::drain`].
pub struct Drain<'a, T> {
    queue: &'a BoundedQueue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.pop()
    }
}
