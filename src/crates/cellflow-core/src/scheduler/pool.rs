//! Worker pool, strand serializers and the run-wide error slot
//!
//! The pool is a single FIFO task queue drained by `n_threads` OS worker
//! threads. A task is an opaque closure that runs to completion on its
//! worker; invokers keep the run alive by posting their follow-up task
//! before the current one returns, so the queue can only be empty with no
//! task active once the whole run is over.
//!
//! Completion and failure are two separate signals. Workers detect
//! completion (empty queue, zero active tasks) and flip `finished`, waking
//! the caller blocked in [`WorkerPool::wait_finished`]. Failure goes
//! through a single-slot error holder: the first error wins and flips the
//! `stopping` flag, later errors are logged and dropped, in-flight tasks
//! run to completion and the queue drains as invokers decline to re-post.
//! Either way every worker returns normally from its run loop, so the
//! thread group can always be joined.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GraphError;
use crate::strand::Strand;

/// Unit of scheduling. Cells' `process()` bodies are wrapped in tasks by
/// their invokers.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolInner {
    queue: VecDeque<Task>,
    /// Tasks currently executing on workers.
    active: usize,
    /// Set once: no task will ever be queued or active again.
    finished: bool,
}

/// Shared FIFO task queue plus the error slot for one run
pub(crate) struct WorkerPool {
    inner: Mutex<PoolInner>,
    work_cond: Condvar,
    done_cond: Condvar,
    error: Mutex<Option<GraphError>>,
    stopping: AtomicBool,
}

impl WorkerPool {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PoolInner {
                queue: VecDeque::new(),
                active: 0,
                finished: false,
            }),
            work_cond: Condvar::new(),
            done_cond: Condvar::new(),
            error: Mutex::new(None),
            stopping: AtomicBool::new(false),
        })
    }

    /// Enqueue a task. Silently dropped once the pool is stopping; the run
    /// is aborting and nothing new may start.
    pub(crate) fn spawn(&self, task: Task) {
        if self.is_stopping() {
            return;
        }
        let mut inner = self.inner.lock();
        debug_assert!(!inner.finished, "task posted after pool completion");
        inner.queue.push_back(task);
        self.work_cond.notify_one();
    }

    /// Record a fatal error and begin the drain. First writer wins;
    /// subsequent errors are dropped with a diagnostic.
    pub(crate) fn fail(&self, err: GraphError) {
        let mut slot = self.error.lock();
        if let Some(first) = slot.as_ref() {
            tracing::warn!(
                first = %first,
                dropped = %err,
                "error slot already occupied, dropping subsequent error"
            );
            return;
        }
        *slot = Some(err);
        drop(slot);
        self.stopping.store(true, Ordering::Release);
    }

    /// True once a fatal error has been recorded. Checked by invokers
    /// before doing any work; a stale `false` is harmless, the task that
    /// observes it just finishes normally.
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Block until every task has drained and no task is executing.
    pub(crate) fn wait_finished(&self) {
        let mut inner = self.inner.lock();
        while !inner.finished {
            self.done_cond.wait(&mut inner);
        }
    }

    /// Mark the pool finished without running queued tasks. Only valid
    /// when no worker ever started; used when worker spawning itself
    /// failed.
    pub(crate) fn force_finish(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
        inner.finished = true;
        self.work_cond.notify_all();
        self.done_cond.notify_all();
    }

    /// Take the captured error, if any. Called after the workers joined.
    pub(crate) fn take_error(&self) -> Option<GraphError> {
        self.error.lock().take()
    }

    #[cfg(test)]
    pub(crate) fn queued_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Worker run loop: dequeue, execute, detect completion.
    pub(crate) fn run_worker(&self, index: usize) {
        tracing::debug!(worker = index, "worker started");
        loop {
            let task = {
                let mut inner = self.inner.lock();
                loop {
                    if let Some(task) = inner.queue.pop_front() {
                        inner.active += 1;
                        break Some(task);
                    }
                    if inner.finished {
                        break None;
                    }
                    self.work_cond.wait(&mut inner);
                }
            };
            let Some(task) = task else {
                tracing::debug!(worker = index, "worker exiting");
                return;
            };

            // A panicking task must not unwind through the run loop or
            // join accounting breaks.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                self.fail(GraphError::invariant(format!(
                    "worker task panicked: {}",
                    panic_message(payload)
                )));
            }

            let mut inner = self.inner.lock();
            inner.active -= 1;
            if inner.active == 0 && inner.queue.is_empty() {
                inner.finished = true;
                self.work_cond.notify_all();
                self.done_cond.notify_all();
            }
        }
    }
}

/// Render a panic payload for error messages.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

struct StrandInner {
    queue: VecDeque<Task>,
    /// A drain task is queued or executing on the pool.
    running: bool,
}

/// Per-strand FIFO serializer
///
/// Guarantees: posted tasks run on pool workers, at most one at a time per
/// strand, in post order. Implemented with a private queue and a single
/// drain task that runs one entry and then either re-posts itself or
/// clears `running`; at most one drain task exists per strand, which is
/// the whole exclusion argument.
pub(crate) struct StrandQueue {
    strand: Strand,
    inner: Mutex<StrandInner>,
}

impl StrandQueue {
    pub(crate) fn new(strand: Strand) -> Self {
        Self {
            strand,
            inner: Mutex::new(StrandInner {
                queue: VecDeque::new(),
                running: false,
            }),
        }
    }

    pub(crate) fn post(self: Arc<Self>, pool: &Arc<WorkerPool>, task: Task) {
        let mut inner = self.inner.lock();
        inner.queue.push_back(task);
        if !inner.running {
            inner.running = true;
            drop(inner);
            self.schedule_drain(pool);
        }
    }

    fn schedule_drain(self: Arc<Self>, pool: &Arc<WorkerPool>) {
        let pool_handle = Arc::clone(pool);
        // If the pool is stopping the drain is dropped and the remaining
        // entries die with the registry at teardown.
        pool.spawn(Box::new(move || self.drain_one(&pool_handle)));
    }

    fn drain_one(self: Arc<Self>, pool: &Arc<WorkerPool>) {
        let task = self.inner.lock().queue.pop_front();
        if let Some(task) = task {
            task();
        }
        let mut inner = self.inner.lock();
        if inner.queue.is_empty() {
            inner.running = false;
        } else {
            drop(inner);
            tracing::debug!(strand = self.strand.id(), "strand queue non-empty, re-posting drain");
            self.schedule_drain(pool);
        }
    }
}
