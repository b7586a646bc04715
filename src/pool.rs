//! Work queue and worker pool
//!
//! A fixed set of worker threads pulling work items from one shared FIFO
//! queue. Submission never blocks: it either enqueues and returns, or fails
//! fast (queue at capacity, or shutting down) and hands the item back so the
//! dispatch layer can synthesize the error reply itself.
//!
//! Workers block only while idle, waiting on the queue's condvar; engine
//! I/O inside an item may stall that one worker, which is why there are
//! several. No ordering is promised across items beyond FIFO pickup;
//! per-iterator ordering comes from the single-flight move slot, not from
//! this queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::error;

use veldt_core::Engine;

use crate::work::WorkItem;

/// Pool metrics snapshot.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Number of items waiting in the queue.
    pub queue_depth: usize,
    /// Number of items currently being executed by workers.
    pub active_items: usize,
    /// Total number of items completed since pool creation.
    pub items_completed: u64,
    /// Number of worker threads.
    pub worker_count: usize,
}

struct PoolInner {
    queue: Mutex<VecDeque<WorkItem>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    queue_depth: AtomicUsize,
    active_items: AtomicUsize,
    items_completed: AtomicU64,
    max_queue_depth: usize,
    engine: Arc<dyn Engine>,
}

impl PoolInner {
    /// Enqueue unless shutting down or at capacity; hands the item back on
    /// refusal so the caller owns its disposal.
    fn try_enqueue(&self, item: WorkItem) -> Result<(), WorkItem> {
        // Reject after shutdown: workers have been joined, the item would
        // never run and its reply would never be sent.
        if self.shutdown.load(Ordering::Acquire) {
            return Err(item);
        }

        {
            let mut queue = self.queue.lock();
            // Capacity is checked under the queue lock so racing submitters
            // cannot overshoot the bound.
            if self.queue_depth.load(Ordering::Acquire) >= self.max_queue_depth {
                return Err(item);
            }
            queue.push_back(item);
            self.queue_depth.fetch_add(1, Ordering::Release);
        }

        self.work_ready.notify_one();
        Ok(())
    }
}

/// Fixed-size worker pool executing work items from a shared queue.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl WorkerPool {
    /// Spawn `num_threads` workers named `veldt-worker-0`, `veldt-worker-1`,
    /// etc. Thread-count validation happens at runtime construction.
    pub(crate) fn new(num_threads: usize, max_queue_depth: usize, engine: Arc<dyn Engine>) -> Self {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            queue_depth: AtomicUsize::new(0),
            active_items: AtomicUsize::new(0),
            items_completed: AtomicU64::new(0),
            max_queue_depth,
            engine,
        });

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let inner_clone = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("veldt-worker-{}", i))
                .spawn(move || worker_loop(&inner_clone))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        Self {
            inner,
            workers: Mutex::new(workers),
            num_threads,
        }
    }

    /// Submit a work item; returns it on refusal (saturated or shut down).
    pub(crate) fn submit(&self, item: WorkItem) -> Result<(), WorkItem> {
        self.inner.try_enqueue(item)
    }

    /// Block until all queued and in-flight items have completed.
    ///
    /// Workers remain running after drain completes; this does NOT signal
    /// shutdown. Prefetch chains reach quiescence here too: a chain stops
    /// resubmitting once its result is buffered.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while self.inner.queue_depth.load(Ordering::Acquire) > 0
            || self.inner.active_items.load(Ordering::Acquire) > 0
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Shut down the pool: workers drain remaining items, then exit and are
    /// joined. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);

        // Lock the queue before notifying to prevent lost-wakeup:
        // a worker between its shutdown check and condvar wait holds this
        // lock, so acquiring it guarantees the worker is either already in
        // wait() (and our notify will wake it) or hasn't checked shutdown
        // yet (and will see it's true when it does).
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Return a snapshot of pool metrics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            active_items: self.inner.active_items.load(Ordering::Relaxed),
            items_completed: self.inner.items_completed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// RAII guard that decrements `active_items` and notifies drain waiters on
/// drop, so bookkeeping stays correct even if an item's execution panics.
/// Without it, a panic would leave `active_items` permanently inflated and
/// `drain()` would hang forever.
struct ActiveItemGuard<'a> {
    inner: &'a PoolInner,
}

impl<'a> Drop for ActiveItemGuard<'a> {
    fn drop(&mut self) {
        let prev_active = self.inner.active_items.fetch_sub(1, Ordering::Release);
        self.inner.items_completed.fetch_add(1, Ordering::Relaxed);

        // If we just became idle and the queue is empty, notify drain
        // waiters. Lock the queue before notifying to prevent lost-wakeup:
        // drain() holds this lock while checking the condition and calling
        // wait(), so acquiring it ensures drain either re-checks or is
        // already in wait() where our notify lands.
        if prev_active == 1 && self.inner.queue_depth.load(Ordering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &Arc<PoolInner>) {
    loop {
        let item = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(item) = queue.pop_front() {
                    inner.queue_depth.fetch_sub(1, Ordering::Release);
                    inner.active_items.fetch_add(1, Ordering::Release);
                    break item;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        // Guard ensures active_items is decremented even if execution panics
        let _guard = ActiveItemGuard { inner };

        // Execute outside the lock. catch_unwind keeps a panicking engine
        // call from killing the worker thread (its reply is lost; the guard
        // keeps the bookkeeping straight either way).
        let engine = Arc::clone(&inner.engine);
        let pool = Arc::clone(inner);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            item.execute(&engine, |follow_up| pool.try_enqueue(follow_up));
        }));
        if let Err(e) = outcome {
            error!(
                "work item panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }

        // _guard drops here → decrements active_items, notifies drain waiters
    }
}
