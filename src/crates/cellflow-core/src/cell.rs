//! The cell contract seen by the scheduler
//!
//! A [`Cell`] is an opaque computation unit. The scheduler knows three
//! things about it: it has a name (diagnostics only), it may carry a
//! [`Strand`] identity (mutual exclusion), and it has a `process()` entry
//! point that turns one value per in-edge into one value per out-edge.
//!
//! # Contract
//!
//! `process()` receives exactly one popped value per in-edge, in the order
//! the edges were connected, and must return exactly one value per
//! out-edge, in the same order. A source cell receives an empty vector; a
//! sink returns one. Returning the wrong number of outputs is a scheduler
//! invariant violation and aborts the run. Returning `Err` (or panicking)
//! is a fatal [`CellFailure`](crate::error::GraphError::CellFailure).
//!
//! # Examples
//!
//! Most cells are closures wrapped in [`FnCell`]:
//!
//! ```rust
//! use cellflow_core::FnCell;
//! use serde_json::json;
//!
//! let doubler = FnCell::new("doubler", |inputs| {
//!     let n = inputs[0].as_i64().unwrap_or(0);
//!     Ok(vec![json!(n * 2)])
//! });
//! ```

use serde_json::Value;

use crate::error::Result;
use crate::strand::Strand;

/// A processing cell: the unit of work fired by the scheduler
///
/// Implementations must be `Send + Sync`; the scheduler invokes
/// `process()` from arbitrary worker threads, though never concurrently
/// for the same vertex (invoker lock) or the same strand (serializer).
pub trait Cell: Send + Sync {
    /// Human-readable name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Strand identity, if this cell must be serialized against others.
    ///
    /// Cells returning equal strands never execute concurrently.
    fn strand(&self) -> Option<Strand> {
        None
    }

    /// Consume one value per in-edge, produce one value per out-edge.
    fn process(&self, inputs: Vec<Value>) -> Result<Vec<Value>>;
}

/// Adapter turning a closure into a [`Cell`]
///
/// ```rust
/// use cellflow_core::{FnCell, Strand};
/// use serde_json::json;
///
/// let strand = Strand::new();
/// let cell = FnCell::new("emit", move |_inputs| Ok(vec![json!(1)]))
///     .with_strand(strand);
/// ```
pub struct FnCell {
    name: String,
    strand: Option<Strand>,
    #[allow(clippy::type_complexity)]
    func: Box<dyn Fn(Vec<Value>) -> Result<Vec<Value>> + Send + Sync>,
}

impl FnCell {
    /// Wrap a closure under the given diagnostic name.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            strand: None,
            func: Box::new(func),
        }
    }

    /// Attach a strand identity to this cell.
    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = Some(strand);
        self
    }
}

impl Cell for FnCell {
    fn name(&self) -> &str {
        &self.name
    }

    fn strand(&self) -> Option<Strand> {
        self.strand
    }

    fn process(&self, inputs: Vec<Value>) -> Result<Vec<Value>> {
        (self.func)(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fn_cell_forwards_to_closure() {
        let cell = FnCell::new("inc", |inputs: Vec<Value>| {
            let n = inputs[0].as_i64().unwrap();
            Ok(vec![json!(n + 1)])
        });
        assert_eq!(cell.name(), "inc");
        assert!(cell.strand().is_none());
        let out = cell.process(vec![json!(41)]).unwrap();
        assert_eq!(out, vec![json!(42)]);
    }

    #[test]
    fn test_with_strand_reports_identity() {
        let strand = Strand::new();
        let cell = FnCell::new("locked", |_| Ok(vec![])).with_strand(strand);
        assert_eq!(cell.strand(), Some(strand));
    }
}
