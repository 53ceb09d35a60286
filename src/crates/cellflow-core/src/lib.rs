//! # cellflow-core - Threadpool Execution for Dataflow Cell Graphs
//!
//! Execution core for **dataflow processing graphs**: directed graphs
//! whose vertices are processing **cells** and whose edges are bounded
//! **channels** carrying one value at a time between them. Given a wired
//! graph and a worker count, the scheduler repeatedly fires every cell
//! whose input channels are ready and whose output channels are empty,
//! dispatching the work onto a pool of OS threads while honoring
//! per-cell serialization constraints called **strands**.
//!
//! ## Core Concepts
//!
//! ### 1. Cells and Channels
//!
//! A [`Cell`] is an opaque computation unit with a `process()` entry
//! point: one value in per in-edge, one value out per out-edge. Channels
//! have capacity 1; a full in-edge means "input available", a non-empty
//! out-edge means "downstream has not consumed yet".
//!
//! ### 2. The Firing Predicate
//!
//! A vertex is fireable iff **all in-edges are full and all out-edges are
//! empty**. This single rule yields pipeline parallelism and natural
//! back-pressure: a fast producer with a slow consumer stalls until the
//! consumer drains the shared channel, and no scheduling fairness beyond
//! that is promised.
//!
//! ### 3. Strands
//!
//! A [`Strand`] is a value-typed identity. Cells sharing a strand never
//! run `process()` concurrently, even on different workers; their work is
//! routed through a per-strand FIFO serializer allocated lazily per run.
//!
//! ### 4. Respawn Policies
//!
//! Each vertex carries a monotonically increasing call counter. After
//! every completed call the [`RespawnPolicy`] decides whether the vertex
//! is rescheduled; `Bounded { max_calls }` runs each cell exactly that
//! many times, `Unbounded` runs until a cell fails.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Scheduler::execute()                    │
//! │                                                            │
//! │   Invoker(A)   Invoker(B)   Invoker(C)    (one per vertex) │
//! │       │ poll        │ poll       │ poll                    │
//! │       ▼             ▼            ▼                         │
//! │  ┌──────────────────────────────────────┐                  │
//! │  │      shared FIFO task queue          │                  │
//! │  └──────────────────────────────────────┘                  │
//! │       │             │            │                         │
//! │   worker 0      worker 1     worker n-1                    │
//! │       │             │            │                         │
//! │       └──── strand serializers ──┘     (mutual exclusion)  │
//! │                                                            │
//! │  completion condition  +  first-error slot                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use cellflow_core::{FnCell, Graph, RespawnPolicy, Scheduler};
//! use serde_json::json;
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::{Arc, Mutex};
//!
//! // source: emits 0, 1, 2, ...
//! let counter = Arc::new(AtomicI64::new(0));
//! let source = FnCell::new("source", move |_inputs| {
//!     Ok(vec![json!(counter.fetch_add(1, Ordering::SeqCst))])
//! });
//!
//! // sink: records what arrives
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let seen_handle = Arc::clone(&seen);
//! let sink = FnCell::new("sink", move |inputs| {
//!     seen_handle.lock().unwrap().push(inputs[0].as_i64().unwrap());
//!     Ok(vec![])
//! });
//!
//! let mut graph = Graph::new();
//! let src = graph.add_cell(Arc::new(source));
//! let dst = graph.add_cell(Arc::new(sink));
//! graph.connect(src, dst)?;
//!
//! Scheduler::new(graph).execute(2, RespawnPolicy::Bounded { max_calls: 3 })?;
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
//! # Ok::<(), cellflow_core::GraphError>(())
//! ```
//!
//! ## Failure Model
//!
//! An `Err` (or panic) escaping any cell's `process()` is fatal for the
//! run: the scheduler stops posting new work, lets in-flight tasks finish,
//! joins every worker, and returns the **first** captured error; later
//! errors are logged and dropped. Partial progress is not rolled back.
//!
//! ## What This Crate Is Not
//!
//! No persistence, no distribution, no dynamic graph mutation during a
//! run, no priority scheduling, no preemption of in-flight `process()`
//! calls. Cycles are supported but must be seeded ([`Graph::seed`]); an
//! unseeded cycle simply never fires.

pub mod cell;
pub mod channel;
pub mod error;
pub mod graph;
pub mod scheduler;
pub mod strand;

pub use cell::{Cell, FnCell};
pub use channel::{Channel, CHANNEL_CAPACITY};
pub use error::{GraphError, Result};
pub use graph::{EdgeId, Graph, VertexId};
pub use scheduler::{RespawnPolicy, Scheduler};
pub use strand::Strand;
