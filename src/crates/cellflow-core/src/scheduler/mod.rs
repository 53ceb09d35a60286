//! Threadpool scheduler: graph-wide firing over a worker pool
//!
//! [`Scheduler::execute`] turns a wired [`Graph`] into a run: one invoker
//! per vertex, `n_threads` workers draining one shared FIFO task queue,
//! strand serializers allocated lazily as strand cells first fire. Invokers re-enqueue themselves until the
//! [`RespawnPolicy`] denies further invocations or a cell fails; then the
//! pool drains, the workers are joined, and the first captured error (if
//! any) is returned to the caller.
//!
//! # Run lifecycle
//!
//! ```text
//! execute(n_threads, respawn)
//!   │
//!   ├─ fresh executor context (queue, strand registry, error slot)
//!   ├─ one invoker per vertex, initial Polling task enqueued
//!   ├─ spawn n_threads workers
//!   │
//!   │    Polling ──not fireable──> Idle wait (1 ms) ──> Polling
//!   │       │
//!   │    fireable
//!   │       │
//!   │    Firing: pop inputs, process(), push outputs
//!   │       │
//!   │    respawn? ──yes──> Polling        ──no──> invoker retires
//!   │
//!   ├─ wait for completion, join workers
//!   ├─ tear down invokers, clear strand registry
//!   └─ Ok(()) or Err(first captured error)
//! ```
//!
//! Ordering guarantees: per-invoker `process()` calls are totally ordered,
//! per-strand calls are totally ordered across cells, and between
//! unrelated vertices only the channel protocol orders anything. There is
//! no global barrier between rounds; back-pressure emerges from the
//! out-edges-empty half of the firing predicate.

mod invoker;
mod pool;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::strand::Strand;
use invoker::Invoker;
use pool::{StrandQueue, Task, WorkerPool};

/// Decides whether an invoker keeps running after each completed call
///
/// Consulted with the vertex's post-increment call count: under
/// `Bounded { max_calls: n }` every vertex fires exactly `n` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RespawnPolicy {
    /// Keep firing until the run fails. The caller is responsible for
    /// bounding the run some other way.
    Unbounded,
    /// Fire each vertex at most `max_calls` times.
    Bounded { max_calls: u32 },
}

impl RespawnPolicy {
    /// True if a vertex that has completed `n_calls` calls should be
    /// rescheduled.
    pub fn should_respawn(&self, n_calls: u32) -> bool {
        match self {
            RespawnPolicy::Unbounded => true,
            RespawnPolicy::Bounded { max_calls } => n_calls < *max_calls,
        }
    }
}

/// Per-run executor state: the pool plus the strand registry
///
/// Invokers hold a reference to the context for the duration of a run;
/// `execute` constructs the context before the invokers and tears the
/// invokers down first on every exit path.
pub(crate) struct ExecutorContext {
    pool: Arc<WorkerPool>,
    strands: Mutex<HashMap<Strand, Arc<StrandQueue>>>,
}

impl ExecutorContext {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            pool: WorkerPool::new(),
            strands: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Post a task through the serializer for `strand`, allocating the
    /// serializer on first use.
    pub(crate) fn post_on_strand(&self, strand: Strand, task: Task) {
        let serializer = {
            let mut strands = self.strands.lock();
            let entry = strands.entry(strand).or_insert_with(|| {
                tracing::debug!(strand = strand.id(), "allocated strand serializer");
                Arc::new(StrandQueue::new(strand))
            });
            Arc::clone(entry)
        };
        serializer.post(&self.pool, task);
    }

    fn clear_strands(&self) {
        self.strands.lock().clear();
    }

    #[cfg(test)]
    fn strand_count(&self) -> usize {
        self.strands.lock().len()
    }
}

/// Executes a dataflow graph on a pool of worker threads
///
/// # Examples
///
/// ```rust
/// use cellflow_core::{FnCell, Graph, RespawnPolicy, Scheduler};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let mut graph = Graph::new();
/// let src = graph.add_cell(Arc::new(FnCell::new("src", |_| Ok(vec![json!(1)]))));
/// let sink = graph.add_cell(Arc::new(FnCell::new("sink", |_| Ok(vec![]))));
/// graph.connect(src, sink)?;
///
/// let scheduler = Scheduler::new(graph);
/// scheduler.execute(2, RespawnPolicy::Bounded { max_calls: 3 })?;
/// # Ok::<(), cellflow_core::GraphError>(())
/// ```
pub struct Scheduler {
    graph: Arc<Graph>,
}

impl Scheduler {
    pub fn new(graph: impl Into<Arc<Graph>>) -> Self {
        Self {
            graph: graph.into(),
        }
    }

    /// The graph this scheduler runs.
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Run the graph until every invoker is denied respawn, or a cell
    /// fails.
    ///
    /// May be called repeatedly; each call gets a fresh task queue, strand
    /// registry and error slot. Channel contents persist between runs.
    ///
    /// # Errors
    ///
    /// - [`GraphError::Configuration`] if `n_threads` is zero.
    /// - [`GraphError::CellFailure`] with the first failing cell if any
    ///   `process()` returned `Err` or panicked.
    /// - [`GraphError::InvariantViolation`] if a channel was observed in a
    ///   state the firing protocol rules out.
    pub fn execute(&self, n_threads: usize, respawn: RespawnPolicy) -> Result<()> {
        if n_threads == 0 {
            return Err(GraphError::Configuration(
                "at least one worker thread is required".to_string(),
            ));
        }
        if self.graph.vertex_count() == 0 {
            tracing::debug!("empty graph, nothing to execute");
            return Ok(());
        }

        let context = ExecutorContext::new();

        // Invokers are created after the context and destroyed before it;
        // they hold references to its queue and strand registry. Initial
        // Polling tasks are enqueued before any worker starts so the pool
        // cannot observe a spuriously empty queue.
        let invokers: Vec<Arc<Invoker>> = self
            .graph
            .vertices()
            .map(|vertex| {
                Invoker::new(
                    Arc::clone(&self.graph),
                    vertex,
                    respawn,
                    Arc::clone(&context),
                )
            })
            .collect();
        for invoker in &invokers {
            Arc::clone(invoker).schedule_poll();
        }

        let mut handles = Vec::with_capacity(n_threads);
        for index in 0..n_threads {
            let pool = Arc::clone(context.pool());
            let spawned = thread::Builder::new()
                .name(format!("cellflow-worker-{index}"))
                .spawn(move || pool.run_worker(index));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    context.pool().fail(GraphError::Configuration(format!(
                        "failed to spawn worker thread {index}: {err}"
                    )));
                    if handles.is_empty() {
                        context.pool().force_finish();
                    }
                    break;
                }
            }
        }

        context.pool().wait_finished();
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked outside task execution");
            }
        }

        drop(invokers);
        context.clear_strands();

        match context.pool().take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::FnCell;
    use serde_json::json;

    #[test]
    fn test_bounded_policy_arithmetic() {
        let policy = RespawnPolicy::Bounded { max_calls: 3 };
        assert!(policy.should_respawn(0));
        assert!(policy.should_respawn(2));
        assert!(!policy.should_respawn(3));
        assert!(!policy.should_respawn(4));
    }

    #[test]
    fn test_unbounded_policy_always_respawns() {
        assert!(RespawnPolicy::Unbounded.should_respawn(0));
        assert!(RespawnPolicy::Unbounded.should_respawn(u32::MAX));
    }

    #[test]
    fn test_zero_threads_is_configuration_error() {
        let mut graph = Graph::new();
        graph.add_cell(Arc::new(FnCell::new("src", |_| Ok(vec![]))));
        let scheduler = Scheduler::new(graph);
        let err = scheduler
            .execute(0, RespawnPolicy::Bounded { max_calls: 1 })
            .unwrap_err();
        assert!(matches!(err, GraphError::Configuration(_)));
    }

    #[test]
    fn test_empty_graph_completes_immediately() {
        let scheduler = Scheduler::new(Graph::new());
        scheduler.execute(4, RespawnPolicy::Unbounded).unwrap();
    }

    #[test]
    fn test_strand_registry_populated_lazily_and_cleared() {
        let context = ExecutorContext::new();
        assert_eq!(context.strand_count(), 0);
        let strand = Strand::new();
        context.post_on_strand(strand, Box::new(|| {}));
        context.post_on_strand(strand, Box::new(|| {}));
        assert_eq!(context.strand_count(), 1);
        context.clear_strands();
        assert_eq!(context.strand_count(), 0);
    }

    #[test]
    fn test_execute_twice_on_same_graph() {
        let mut graph = Graph::new();
        let src = graph.add_cell(Arc::new(FnCell::new("src", |_| Ok(vec![json!(7)]))));
        let sink = graph.add_cell(Arc::new(FnCell::new("sink", |_| Ok(vec![]))));
        graph.connect(src, sink).unwrap();
        let scheduler = Scheduler::new(graph);
        scheduler
            .execute(2, RespawnPolicy::Bounded { max_calls: 2 })
            .unwrap();
        scheduler
            .execute(2, RespawnPolicy::Bounded { max_calls: 2 })
            .unwrap();
    }
}
