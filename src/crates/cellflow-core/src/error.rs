//! Error types for graph construction and scheduled execution
//!
//! All errors surface through a single [`GraphError`] enum implementing
//! `std::error::Error` via the `thiserror` crate.
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation          - Graph structure errors (unknown ids, bad wiring)
//! ├── Configuration       - Bad run parameters (e.g. zero worker threads)
//! ├── CellFailure         - A cell's process() returned Err or panicked
//! ├── InvariantViolation  - A channel observed in an impossible state
//! └── Custom              - Application-defined errors raised inside cells
//! ```
//!
//! During a run no error is recovered locally: the first error captured by
//! any worker wins, later ones are logged and dropped, and
//! [`Scheduler::execute`](crate::Scheduler::execute) returns the winner to
//! the caller after the worker threads have been joined.

use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error type covering graph construction and execution
///
/// # Examples
///
/// ```rust
/// use cellflow_core::error::GraphError;
///
/// let err = GraphError::cell_failure("doubler", "division by zero");
/// assert_eq!(format!("{}", err), "Cell 'doubler' failed: division by zero");
/// ```
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure validation failed
    ///
    /// Returned while wiring a graph, e.g. connecting to a vertex id that
    /// was never added or seeding an edge that does not exist.
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// Run configuration rejected before any work started
    ///
    /// Currently the only case is requesting zero worker threads.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A cell's `process()` call failed
    ///
    /// Raised when a cell returns `Err` or panics. Fatal for the current
    /// run: the scheduler stops posting new work, drains in-flight tasks,
    /// joins its workers and hands this error to the caller.
    #[error("Cell '{cell}' failed: {error}")]
    CellFailure {
        /// Name of the cell that failed
        cell: String,
        /// Error message from the cell
        error: String,
    },

    /// The scheduler observed a state the firing protocol rules out
    ///
    /// Examples: pushing into a full channel, popping an empty one, or a
    /// cell producing a different number of outputs than it has out-edges.
    /// Always indicates a bug in the scheduler or a cell violating its
    /// contract, never a recoverable condition.
    #[error("Scheduler invariant violated: {0}")]
    InvariantViolation(String),

    /// Custom application-defined error
    ///
    /// Escape hatch for cell implementations that want to fail a run with
    /// their own message.
    #[error("{0}")]
    Custom(String),
}

impl GraphError {
    /// Create a cell failure with context
    pub fn cell_failure(cell: impl Into<String>, error: impl Into<String>) -> Self {
        Self::CellFailure {
            cell: cell.into(),
            error: error.into(),
        }
    }

    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_failure_display_includes_cell_name() {
        let err = GraphError::cell_failure("source", "boom");
        assert_eq!(err.to_string(), "Cell 'source' failed: boom");
    }

    #[test]
    fn test_invariant_display() {
        let err = GraphError::invariant("push into full channel");
        assert_eq!(
            err.to_string(),
            "Scheduler invariant violated: push into full channel"
        );
    }
}
