//! The dataflow graph handed to the scheduler
//!
//! A [`Graph`] is a directed graph in which every vertex owns exactly one
//! [`Cell`] and every edge owns exactly one [`Channel`]. Fan-out and
//! fan-in are modeled as multiple edges, each with its own channel, so
//! every channel has exactly one producer and one consumer.
//!
//! The graph is wired up front and is immutable during execution: vertices
//! and edges are identified by stable [`VertexId`] / [`EdgeId`]
//! descriptors valid for the lifetime of the graph. Cycles and self-loops
//! are allowed; a cycle only makes progress if one of its edges is
//! pre-filled with [`Graph::seed`].
//!
//! # Examples
//!
//! ```rust
//! use cellflow_core::{FnCell, Graph};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut graph = Graph::new();
//! let src = graph.add_cell(Arc::new(FnCell::new("src", |_| Ok(vec![json!(1)]))));
//! let dst = graph.add_cell(Arc::new(FnCell::new("dst", |_| Ok(vec![]))));
//! let edge = graph.connect(src, dst)?;
//! assert!(graph.channel(edge).is_empty());
//! # Ok::<(), cellflow_core::GraphError>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cell::Cell;
use crate::channel::Channel;
use crate::error::{GraphError, Result};

/// Stable descriptor of a vertex within one [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexId(usize);

/// Stable descriptor of an edge within one [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(usize);

struct VertexRecord {
    cell: Arc<dyn Cell>,
    /// In connect order; defines the order of `process()` inputs.
    in_edges: Vec<EdgeId>,
    /// In connect order; defines the order of `process()` outputs.
    out_edges: Vec<EdgeId>,
}

struct EdgeRecord {
    channel: Channel,
    source: VertexId,
    target: VertexId,
}

/// Directed graph of cells and channels
///
/// Built once, then executed any number of times via
/// [`Scheduler`](crate::Scheduler). Channel contents survive across runs,
/// so a seeded cycle stays seeded after a bounded run completes.
#[derive(Default)]
pub struct Graph {
    vertices: Vec<VertexRecord>,
    edges: Vec<EdgeRecord>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell, returning the descriptor of its vertex.
    pub fn add_cell(&mut self, cell: Arc<dyn Cell>) -> VertexId {
        let id = VertexId(self.vertices.len());
        tracing::debug!(vertex = ?id, cell = %cell.name(), "added cell");
        self.vertices.push(VertexRecord {
            cell,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        });
        id
    }

    /// Connect `from` to `to` with a fresh unit-capacity channel.
    ///
    /// The new edge becomes the last in-edge of `to` and the last out-edge
    /// of `from`; that order is the order in which `process()` sees inputs
    /// and must produce outputs. Self-loops are permitted.
    pub fn connect(&mut self, from: VertexId, to: VertexId) -> Result<EdgeId> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        let id = EdgeId(self.edges.len());
        self.edges.push(EdgeRecord {
            channel: Channel::new(),
            source: from,
            target: to,
        });
        self.vertices[from.0].out_edges.push(id);
        self.vertices[to.0].in_edges.push(id);
        tracing::debug!(edge = ?id, from = ?from, to = ?to, "connected");
        Ok(id)
    }

    /// Pre-fill an edge's channel with one value.
    ///
    /// Required to start a cycle: an unseeded cycle never satisfies the
    /// firing predicate and its vertices never run. Fails if the channel
    /// already holds a value.
    pub fn seed(&self, edge: EdgeId, value: Value) -> Result<()> {
        let record = self
            .edges
            .get(edge.0)
            .ok_or_else(|| GraphError::validation(format!("unknown edge {:?}", edge)))?;
        record.channel.push(value)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All vertex descriptors, in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(VertexId)
    }

    /// The cell owned by a vertex.
    ///
    /// # Panics
    ///
    /// Panics on a descriptor from a different graph; descriptors handed
    /// out by this graph are always valid.
    pub fn cell(&self, vertex: VertexId) -> &Arc<dyn Cell> {
        &self.vertices[vertex.0].cell
    }

    /// Diagnostic name of the cell at `vertex`.
    pub fn cell_name(&self, vertex: VertexId) -> &str {
        self.vertices[vertex.0].cell.name()
    }

    /// In-edges of `vertex`, in connect order.
    pub fn in_edges(&self, vertex: VertexId) -> &[EdgeId] {
        &self.vertices[vertex.0].in_edges
    }

    /// Out-edges of `vertex`, in connect order.
    pub fn out_edges(&self, vertex: VertexId) -> &[EdgeId] {
        &self.vertices[vertex.0].out_edges
    }

    /// The channel owned by an edge.
    pub fn channel(&self, edge: EdgeId) -> &Channel {
        &self.edges[edge.0].channel
    }

    /// Producer and consumer vertices of an edge.
    pub fn endpoints(&self, edge: EdgeId) -> (VertexId, VertexId) {
        let record = &self.edges[edge.0];
        (record.source, record.target)
    }

    fn check_vertex(&self, vertex: VertexId) -> Result<()> {
        if vertex.0 >= self.vertices.len() {
            return Err(GraphError::validation(format!(
                "unknown vertex {:?}",
                vertex
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::FnCell;
    use serde_json::json;

    fn passthrough(name: &str) -> Arc<dyn Cell> {
        Arc::new(FnCell::new(name, |inputs| Ok(inputs)))
    }

    #[test]
    fn test_connect_tracks_adjacency_in_order() {
        let mut graph = Graph::new();
        let a = graph.add_cell(passthrough("a"));
        let b = graph.add_cell(passthrough("b"));
        let c = graph.add_cell(passthrough("c"));
        let ab = graph.connect(a, b).unwrap();
        let ac = graph.connect(a, c).unwrap();

        assert_eq!(graph.out_edges(a), &[ab, ac]);
        assert_eq!(graph.in_edges(b), &[ab]);
        assert_eq!(graph.in_edges(c), &[ac]);
        assert_eq!(graph.endpoints(ab), (a, b));
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_connect_unknown_vertex_fails() {
        let mut graph = Graph::new();
        let a = graph.add_cell(passthrough("a"));

        let mut other = Graph::new();
        let _ = other.add_cell(passthrough("x"));
        let ghost = other.add_cell(passthrough("ghost"));

        let err = graph.connect(a, ghost).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn test_self_loop_is_permitted() {
        let mut graph = Graph::new();
        let a = graph.add_cell(passthrough("a"));
        let e = graph.connect(a, a).unwrap();
        assert_eq!(graph.in_edges(a), &[e]);
        assert_eq!(graph.out_edges(a), &[e]);
    }

    #[test]
    fn test_seed_fills_channel_once() {
        let mut graph = Graph::new();
        let a = graph.add_cell(passthrough("a"));
        let b = graph.add_cell(passthrough("b"));
        let e = graph.connect(a, b).unwrap();

        graph.seed(e, json!(0)).unwrap();
        assert!(graph.channel(e).is_full());

        let err = graph.seed(e, json!(1)).unwrap_err();
        assert!(matches!(err, GraphError::InvariantViolation(_)));
    }

    #[test]
    fn test_seed_unknown_edge_fails() {
        let graph = Graph::new();
        let mut other = Graph::new();
        let a = other.add_cell(passthrough("a"));
        let e = other.connect(a, a).unwrap();

        let err = graph.seed(e, json!(0)).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }
}
