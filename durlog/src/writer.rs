//! The writer pipeline: producer handle, batch writer thread, flush timer and
//! shutdown.
//!
//! A pipeline is started with [`spawn`], which returns a [`WriterGuard`].
//! Producers log through [`LogWriter`] handles (cheap to clone, shareable
//! across threads). One background thread drains the queue into the pending
//! batch and flushes it when it reaches the batch size or when an `ERROR` or
//! `FATAL` record arrives; a second thread flushes whatever is pending every
//! flush interval. With a [`Sink`] configured, a third thread forwards
//! written records to it.
//!
//! # Quick Start
//!
//! ```no_run
//! use durlog::WriterConfig;
//!
//! let guard = durlog::spawn(WriterConfig::new("/var/log/shop", "orders").with_max_size_mb(64))?;
//! guard.info("service started")?;
//! durlog::warning!(guard, "cache miss ratio {:.2}", 0.31)?;
//! guard.shutdown_default();
//! # Ok::<(), durlog::Error>(())
//! ```
//!
//! # Guard Lifetime
//!
//! Dropping the [`WriterGuard`] performs the emergency shutdown, waiting at
//! most [`EMERGENCY_SHUTDOWN_TIMEOUT`] for queued records to be written.
//! Calling [`LogWriter::shutdown`] first with a longer timeout is preferred.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::WriterConfig;
use crate::error::{Error, Result};
use crate::flush::PendingBatch;
use crate::gate::{Gate, GateGuard};
use crate::queue::BoundedQueue;
use crate::sink::{self, Sink, SINK_BACKLOG};
use crate::stats::{Counters, Stats};
use crate::{Level, Record};

/// Timeout used by [`LogWriter::shutdown_default`].
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout used when a [`WriterGuard`] is dropped.
pub const EMERGENCY_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// Upper bound on how long an explicit flush sleeps between progress checks.
const FLUSH_POLL: Duration = Duration::from_millis(10);

/// Minimum time a flush or shutdown keeps trying to take the gate, even when
/// its own timeout has already run out.
pub const GATE_GRACE: Duration = Duration::from_millis(250);

const GATE_POLL: Duration = Duration::from_millis(1);

/// Lifecycle of the batch writer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting and writing records.
    Running,
    /// Shutdown requested; writing what is left in the queue.
    Draining,
    /// Queue closed and drained, final flush done.
    Stopped,
}

/// Outcome of [`LogWriter::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The writer drained the queue, and the sink took every written record,
    /// within the timeout.
    Completed,
    /// The writer or the sink did not finish in time; a best-effort final
    /// flush was made.
    TimedOut,
    /// An earlier call already shut the writer down; nothing was done.
    AlreadyStopped,
}

struct Lifecycle {
    state: WriterState,
    shutdown_requested: bool,
    timer_stop: bool,
    /// Shutdown gave up waiting; the writer closes the sink backlog itself.
    abandoned: bool,
    sink_stopped: bool,
    consumer: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

struct Shared {
    queue: BoundedQueue<Record>,
    gate: Gate<PendingBatch>,
    /// Written records on their way to the sink; `None` without a sink.
    forward: Option<BoundedQueue<Record>>,
    /// Set while the pending batch holds records; lets the timer skip the gate.
    unflushed: AtomicBool,
    batch_size: usize,
    flush_interval: Duration,
    counters: Counters,
    flush_waiters: AtomicUsize,
    lifecycle: Mutex<Lifecycle>,
    /// Signalled on writer progress and when the writer stops.
    progress: Condvar,
    /// Wakes the timer thread early on shutdown.
    timer_wake: Condvar,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        match self.lifecycle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait_progress<'a>(
        &self,
        mut lifecycle: MutexGuard<'a, Lifecycle>,
        deadline: Instant,
        pending: impl Fn(&Lifecycle) -> bool,
    ) -> MutexGuard<'a, Lifecycle> {
        while pending(&lifecycle) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            lifecycle = match self.progress.wait_timeout(lifecycle, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        lifecycle
    }

    /// Takes the gate, giving up at `deadline`.
    fn gate_until(&self, deadline: Instant) -> Option<GateGuard<'_, PendingBatch>> {
        loop {
            if let Some(batch) = self.gate.try_lock() {
                return Some(batch);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(GATE_POLL);
        }
    }

    fn close_forward(&self) {
        if let Some(forward) = &self.forward {
            forward.close();
        }
    }

    fn flush_locked(&self, batch: &mut PendingBatch) -> std::io::Result<usize> {
        let result = batch.flush(&self.counters, self.forward.as_ref());
        if batch.is_empty() {
            self.unflushed.store(false, Ordering::Release);
        }
        result
    }

    /// Stops whatever threads did start after a failed spawn.
    fn abort_start(&self) {
        self.queue.close();
        self.close_forward();
        let handles = {
            let mut lifecycle = self.lifecycle();
            lifecycle.shutdown_requested = true;
            lifecycle.timer_stop = true;
            [
                lifecycle.consumer.take(),
                lifecycle.timer.take(),
                lifecycle.forwarder.take(),
            ]
        };
        self.timer_wake.notify_all();
        for handle in handles.into_iter().flatten() {
            let _ = handle.join();
        }
    }

    fn timer_tick(&self) {
        if !self.unflushed.load(Ordering::Acquire) {
            return;
        }
        // A flush already in progress will write anything pending; never wait.
        if let Some(mut batch) = self.gate.try_lock() {
            let _ = self.flush_locked(&mut batch);
        }
    }
}

fn batch_writer_thread(shared: Arc<Shared>) {
    for record in shared.queue.drain() {
        let severe = record.level().is_severe();
        {
            let mut batch = shared.gate.lock();
            batch.push(record);
            shared.unflushed.store(true, Ordering::Release);
            if severe || batch.len() >= shared.batch_size {
                let _ = shared.flush_locked(&mut batch);
            }
        }
        Counters::add(&shared.counters.accepted, 1);
        if shared.flush_waiters.load(Ordering::Acquire) > 0 {
            shared.progress.notify_all();
        }
    }
    {
        let mut batch = shared.gate.lock();
        let _ = shared.flush_locked(&mut batch);
    }
    {
        let mut lifecycle = shared.lifecycle();
        lifecycle.state = WriterState::Stopped;
        if lifecycle.abandoned {
            shared.close_forward();
        }
    }
    shared.progress.notify_all();
}

fn sink_forwarder_thread(shared: Arc<Shared>, sink: Arc<dyn Sink>) {
    if let Some(forward) = &shared.forward {
        for record in forward.drain() {
            if !sink::forward(&*sink, &record) {
                Counters::add(&shared.counters.sink_failures, 1);
            }
        }
    }
    shared.lifecycle().sink_stopped = true;
    shared.progress.notify_all();
}

fn flush_timer_thread(shared: Arc<Shared>) {
    let mut next_tick = Instant::now() + shared.flush_interval;
    let mut lifecycle = shared.lifecycle();
    loop {
        if lifecycle.timer_stop {
            return;
        }
        let now = Instant::now();
        if now >= next_tick {
            drop(lifecycle);
            shared.timer_tick();
            next_tick = Instant::now() + shared.flush_interval;
            lifecycle = shared.lifecycle();
            continue;
        }
        lifecycle = match shared.timer_wake.wait_timeout(lifecycle, next_tick - now) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
    }
}

fn start_threads(shared: &Arc<Shared>, sink: Option<Arc<dyn Sink>>) -> std::io::Result<()> {
    if let Some(sink) = sink {
        let forwarder_shared = shared.clone();
        let forwarder = thread::Builder::new()
            .name("durlog-sink".into())
            .spawn(move || sink_forwarder_thread(forwarder_shared, sink))?;
        shared.lifecycle().forwarder = Some(forwarder);
    }
    let consumer_shared = shared.clone();
    let consumer = thread::Builder::new()
        .name("durlog-writer".into())
        .spawn(move || batch_writer_thread(consumer_shared))?;
    shared.lifecycle().consumer = Some(consumer);
    let timer_shared = shared.clone();
    let timer = thread::Builder::new()
        .name("durlog-timer".into())
        .spawn(move || flush_timer_thread(timer_shared))?;
    shared.lifecycle().timer = Some(timer);
    Ok(())
}

/// Starts a writer pipeline.
///
/// Creates the log directory if needed and spawns the batch writer and flush
/// timer threads, plus the sink thread when a sink is configured.
///
/// # Examples
///
/// ```no_run
/// let guard = durlog::spawn(durlog::WriterConfig::new("logs", "worker"))?;
/// let writer = guard.writer();
/// std::thread::spawn(move || writer.info("from another thread"));
/// # Ok::<(), durlog::Error>(())
/// ```
pub fn spawn(config: WriterConfig) -> Result<WriterGuard> {
    config.validate()?;
    std::fs::create_dir_all(&config.directory).map_err(|source| Error::CreateDirectory {
        path: config.directory.clone(),
        source,
    })?;

    let shared = Arc::new(Shared {
        queue: BoundedQueue::new(config.capacity),
        gate: Gate::new(PendingBatch::new(config.rotation(), config.time_zone.clone())),
        forward: config.sink.as_ref().map(|_| BoundedQueue::new(SINK_BACKLOG)),
        unflushed: AtomicBool::new(false),
        batch_size: config.batch_size,
        flush_interval: config.flush_interval,
        counters: Counters::default(),
        flush_waiters: AtomicUsize::new(0),
        lifecycle: Mutex::new(Lifecycle {
            state: WriterState::Running,
            shutdown_requested: false,
            timer_stop: false,
            abandoned: false,
            sink_stopped: config.sink.is_none(),
            consumer: None,
            timer: None,
            forwarder: None,
        }),
        progress: Condvar::new(),
        timer_wake: Condvar::new(),
    });

    if let Err(err) = start_threads(&shared, config.sink.clone()) {
        shared.abort_start();
        return Err(Error::Spawn(err));
    }
    Ok(WriterGuard {
        writer: LogWriter { shared },
    })
}

/// Producer handle of a writer pipeline.
///
/// Every logging call renders nothing itself: it stamps the record with the
/// current time and hands it to the queue, blocking while the queue is full.
/// Calls return once the record is queued, not once it is written; after
/// shutdown they fail with [`Error::Closed`].
#[derive(Clone)]
pub struct LogWriter {
    shared: Arc<Shared>,
}

impl LogWriter {
    /// Queues an already built record.
    pub fn enqueue(&self, record: Record) -> Result<()> {
        self.shared.queue.push(record)?;
        Counters::add(&self.shared.counters.enqueued, 1);
        Ok(())
    }

    pub fn log(&self, level: Level, message: impl Into<Box<str>>) -> Result<()> {
        self.enqueue(Record::new(level, message))
    }

    pub fn debug(&self, message: impl Into<Box<str>>) -> Result<()> {
        self.log(Level::Debug, message)
    }

    pub fn info(&self, message: impl Into<Box<str>>) -> Result<()> {
        self.log(Level::Info, message)
    }

    pub fn warning(&self, message: impl Into<Box<str>>) -> Result<()> {
        self.log(Level::Warning, message)
    }

    pub fn error(&self, message: impl Into<Box<str>>) -> Result<()> {
        self.log(Level::Error, message)
    }

    pub fn fatal(&self, message: impl Into<Box<str>>) -> Result<()> {
        self.log(Level::Fatal, message)
    }

    /// Logs an `ERROR` record describing `error`.
    ///
    /// The file line reads `{message}: {error}`, or just `{error}` without a
    /// message; the sink receives `error` separately as well.
    pub fn error_with(&self, error: impl fmt::Display, message: Option<&str>) -> Result<()> {
        let error = error.to_string();
        let line = match message {
            Some(message) => format!("{message}: {error}"),
            None => error.clone(),
        };
        self.enqueue(Record::new(Level::Error, line).with_error(error))
    }

    /// Writes everything queued before this call and syncs it.
    ///
    /// Waits at most `timeout` for the writer thread to take the queued
    /// records, then flushes the pending batch, waiting for the gate no longer
    /// than the same deadline (or [`GATE_GRACE`], whichever is later).
    /// Returns `Ok(false)` when a wait timed out; whatever had arrived is
    /// still flushed if the gate could be taken.
    pub fn flush(&self, timeout: Duration) -> Result<bool> {
        let shared = &self.shared;
        if shared.queue.is_closed() {
            return Err(Error::Closed);
        }
        // Sequence numbers are assigned under the queue lock, so this covers
        // every push that returned before the call, from any thread.
        let target = shared.queue.pushed();
        let start = Instant::now();
        let deadline = start + timeout;
        shared.flush_waiters.fetch_add(1, Ordering::AcqRel);
        let caught_up = {
            let mut lifecycle = shared.lifecycle();
            loop {
                let accepted = shared.counters.accepted.load(Ordering::Acquire);
                let now = Instant::now();
                if accepted >= target
                    || now >= deadline
                    || lifecycle.state == WriterState::Stopped
                {
                    break accepted >= target;
                }
                let wait = (deadline - now).min(FLUSH_POLL);
                lifecycle = match shared.progress.wait_timeout(lifecycle, wait) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
            }
        };
        shared.flush_waiters.fetch_sub(1, Ordering::AcqRel);
        let Some(mut batch) = shared.gate_until(deadline.max(start + GATE_GRACE)) else {
            return Ok(false);
        };
        shared.flush_locked(&mut batch)?;
        Ok(caught_up)
    }

    /// Closes the queue, waits up to `timeout` for the writer to drain it,
    /// and performs a final flush whether or not the wait succeeded. With a
    /// sink, also waits (within the same bound) for it to receive every
    /// written record.
    ///
    /// The final flush waits for the gate until the deadline, or for
    /// [`GATE_GRACE`] when the deadline has already passed, so a stalled disk
    /// or sink never keeps the caller much longer than `timeout`.
    ///
    /// Only the first call does any work. A later call waits, bounded by its
    /// own `timeout`, for the writer to stop and returns
    /// [`Shutdown::AlreadyStopped`], or [`Shutdown::TimedOut`] if the writer
    /// is still draining.
    pub fn shutdown(&self, timeout: Duration) -> Shutdown {
        let shared = &self.shared;
        let deadline = Instant::now() + timeout;
        {
            let mut lifecycle = shared.lifecycle();
            if lifecycle.shutdown_requested {
                let lifecycle =
                    shared.wait_progress(lifecycle, deadline, |l| l.state != WriterState::Stopped);
                return if lifecycle.state == WriterState::Stopped {
                    Shutdown::AlreadyStopped
                } else {
                    Shutdown::TimedOut
                };
            }
            lifecycle.shutdown_requested = true;
            if lifecycle.state == WriterState::Running {
                lifecycle.state = WriterState::Draining;
            }
        }
        shared.queue.close();

        let (timer, consumer, stopped) = {
            let mut lifecycle =
                shared.wait_progress(shared.lifecycle(), deadline, |l| l.state != WriterState::Stopped);
            let stopped = lifecycle.state == WriterState::Stopped;
            lifecycle.timer_stop = true;
            let consumer = if stopped {
                lifecycle.consumer.take()
            } else {
                lifecycle.abandoned = true;
                None
            };
            (lifecycle.timer.take(), consumer, stopped)
        };
        shared.timer_wake.notify_all();

        if !stopped {
            crate::diag!(
                "shutdown timed out after {:?} with {} records still queued",
                timeout,
                shared.queue.len()
            );
        }
        let final_deadline = deadline.max(Instant::now() + GATE_GRACE);
        match shared.gate_until(final_deadline) {
            Some(mut batch) => {
                let _ = shared.flush_locked(&mut batch);
            }
            None => crate::diag!("final flush skipped; a flush is still in progress"),
        }
        if let Some(timer) = timer {
            let _ = timer.join();
        }
        if let Some(consumer) = consumer {
            let _ = consumer.join();
        }
        if !stopped {
            return Shutdown::TimedOut;
        }

        shared.close_forward();
        let forwarder = {
            let mut lifecycle =
                shared.wait_progress(shared.lifecycle(), final_deadline, |l| !l.sink_stopped);
            if !lifecycle.sink_stopped {
                drop(lifecycle);
                crate::diag!(
                    "sink still busy after {:?}; {} written records not yet forwarded",
                    timeout,
                    shared.forward.as_ref().map_or(0, |forward| forward.len())
                );
                return Shutdown::TimedOut;
            }
            lifecycle.forwarder.take()
        };
        if let Some(forwarder) = forwarder {
            let _ = forwarder.join();
        }
        Shutdown::Completed
    }

    /// [`LogWriter::shutdown`] with [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub fn shutdown_default(&self) -> Shutdown {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn state(&self) -> WriterState {
        self.shared.lifecycle().state
    }

    /// True once shutdown has begun; every enqueue fails from then on.
    pub fn is_closed(&self) -> bool {
        self.shared.queue.is_closed()
    }

    pub fn stats(&self) -> Stats {
        self.shared.counters.snapshot()
    }

    /// Records currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }
}

impl fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWriter")
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Guard that keeps the writer pipeline alive.
///
/// Dereferences to the [`LogWriter`] so it can be used directly for logging.
/// When dropped, the pipeline is shut down with
/// [`EMERGENCY_SHUTDOWN_TIMEOUT`]; this is a no-op if it was already shut
/// down.
pub struct WriterGuard {
    writer: LogWriter,
}

impl WriterGuard {
    /// A producer handle that can be moved to other threads.
    pub fn writer(&self) -> LogWriter {
        self.writer.clone()
    }
}

impl std::ops::Deref for WriterGuard {
    type Target = LogWriter;

    fn deref(&self) -> &LogWriter {
        &self.writer
    }
}

impl fmt::Debug for WriterGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriterGuard").field(&self.writer).finish()
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.writer.shutdown(EMERGENCY_SHUTDOWN_TIMEOUT);
    }
}
