//! Per-vertex invokers: poll readiness, fire the cell, re-post
//!
//! Each vertex gets one [`Invoker`] for the duration of a run. The invoker
//! is a small state machine driven entirely by pool tasks:
//!
//! | State     | Entered when                      | Action                              |
//! |-----------|-----------------------------------|-------------------------------------|
//! | Polling   | run start, or after an idle tick  | evaluate the firing predicate       |
//! | Firing    | predicate true while polling      | post `invoke` via strand or pool    |
//! | Idle wait | predicate false while polling     | sleep ~1 ms, re-post Polling        |
//!
//! The invoker posts at most one task for itself at a time, so its
//! `process()` calls are totally ordered; the invoker lock is held across
//! the predicate check and the post decision, and separately across the
//! fire step, guarding against any overlap between a strand-driven
//! invocation and a pool-driven re-entry. The lock is never held across
//! the idle sleep.
//!
//! The 1 ms poll back-off exists because channel occupancy is mutated from
//! arbitrary worker contexts and the channel type is deliberately minimal;
//! under load the delay is rarely reached, since an upstream firing
//! immediately re-posts the downstream poller.

use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::pool::{panic_message, Task};
use super::{ExecutorContext, RespawnPolicy};
use crate::error::{GraphError, Result};
use crate::graph::{Graph, VertexId};

/// Back-off between readiness checks of a vertex that is not fireable.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

struct InvokerState {
    /// Completed `process()` calls for this vertex. Monotonic.
    n_calls: u32,
}

/// Per-vertex scheduler state machine
pub(crate) struct Invoker {
    graph: Arc<Graph>,
    vertex: VertexId,
    respawn: RespawnPolicy,
    context: Arc<ExecutorContext>,
    state: Mutex<InvokerState>,
}

impl Invoker {
    pub(crate) fn new(
        graph: Arc<Graph>,
        vertex: VertexId,
        respawn: RespawnPolicy,
        context: Arc<ExecutorContext>,
    ) -> Arc<Self> {
        Arc::new(Self {
            graph,
            vertex,
            respawn,
            context,
            state: Mutex::new(InvokerState { n_calls: 0 }),
        })
    }

    fn cell_name(&self) -> &str {
        self.graph.cell_name(self.vertex)
    }

    /// Post a Polling task for this vertex.
    pub(crate) fn schedule_poll(self: Arc<Self>) {
        let pool = Arc::clone(self.context.pool());
        pool.spawn(Box::new(move || self.poll()));
    }

    /// Polling: evaluate the firing predicate and either post the fire
    /// task or take an idle tick.
    fn poll(self: Arc<Self>) {
        if self.context.pool().is_stopping() {
            return;
        }
        let guard = self.state.lock();
        if self.fireable() {
            tracing::debug!(cell = %self.cell_name(), vertex = ?self.vertex, "inputs ready, posting fire");
            let invoker = Arc::clone(&self);
            let task: Task = Box::new(move || invoker.invoke());
            match self.graph.cell(self.vertex).strand() {
                Some(strand) => self.context.post_on_strand(strand, task),
                None => self.context.pool().spawn(task),
            }
            drop(guard);
        } else {
            drop(guard);
            tracing::debug!(cell = %self.cell_name(), vertex = ?self.vertex, "not fireable, idle wait");
            thread::sleep(POLL_INTERVAL);
            if !self.context.pool().is_stopping() {
                self.schedule_poll();
            }
        }
    }

    /// Vertex readiness: every in-edge full, every out-edge empty.
    ///
    /// Reads may be stale, but only in the safe direction: in-edges are
    /// drained solely by this vertex and out-edges filled solely by it, so
    /// a true result cannot be invalidated before the fire task runs.
    fn fireable(&self) -> bool {
        let graph = &self.graph;
        graph
            .in_edges(self.vertex)
            .iter()
            .all(|edge| graph.channel(*edge).is_full())
            && graph
                .out_edges(self.vertex)
                .iter()
                .all(|edge| graph.channel(*edge).is_empty())
    }

    /// Firing: run the cell once, then consult the respawn policy.
    fn invoke(self: Arc<Self>) {
        if self.context.pool().is_stopping() {
            return;
        }
        let mut state = self.state.lock();
        tracing::debug!(cell = %self.cell_name(), vertex = ?self.vertex, n_calls = state.n_calls, "invoke");
        match self.fire() {
            Ok(()) => {
                state.n_calls += 1;
                let respawn = self.respawn.should_respawn(state.n_calls);
                let n_calls = state.n_calls;
                drop(state);
                if respawn {
                    self.schedule_poll();
                } else {
                    tracing::debug!(
                        cell = %self.cell_name(),
                        n_calls,
                        "respawn denied, invoker retires"
                    );
                }
            }
            Err(err) => {
                drop(state);
                self.context.pool().fail(err);
            }
        }
    }

    /// One firing: pop one value per in-edge, run `process()`, push one
    /// value per out-edge. Inputs consumed before a failure stay consumed;
    /// partial progress is not rolled back.
    fn fire(&self) -> Result<()> {
        let graph = &self.graph;
        let cell = graph.cell(self.vertex);
        let name = cell.name();
        let in_edges = graph.in_edges(self.vertex);
        let out_edges = graph.out_edges(self.vertex);

        let mut inputs = Vec::with_capacity(in_edges.len());
        for edge in in_edges {
            inputs.push(graph.channel(*edge).pop()?);
        }

        let outputs: Vec<Value> = panic::catch_unwind(AssertUnwindSafe(|| cell.process(inputs)))
            .map_err(|payload| GraphError::cell_failure(name, panic_message(payload)))?
            .map_err(|err| GraphError::cell_failure(name, err.to_string()))?;

        if outputs.len() != out_edges.len() {
            return Err(GraphError::invariant(format!(
                "cell '{}' produced {} outputs for {} out-edges",
                name,
                outputs.len(),
                out_edges.len()
            )));
        }
        for (edge, value) in out_edges.iter().zip(outputs) {
            graph.channel(*edge).push(value)?;
        }
        Ok(())
    }
}

impl Drop for Invoker {
    fn drop(&mut self) {
        tracing::debug!(cell = %self.cell_name(), vertex = ?self.vertex, "invoker destroyed");
    }
}
