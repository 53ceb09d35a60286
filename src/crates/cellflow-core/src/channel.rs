//! Bounded FIFO channels carried by graph edges
//!
//! Every edge of a [`Graph`](crate::Graph) owns one [`Channel`]: a bounded
//! FIFO buffer with capacity 1 holding the single value in flight between a
//! producer cell and a consumer cell. Channel occupancy is the source of
//! truth for the firing predicate: a vertex may fire only when every
//! in-edge channel is full and every out-edge channel is empty.
//!
//! Mutations (`push`/`pop`) happen only inside the scheduler's fire step,
//! under the owning invoker's lock. Readiness inspection reads `len()`
//! without further coordination; stale reads are tolerated because a
//! channel's occupancy is only ever moved toward readiness by the vertex's
//! neighbors and away from it by the vertex itself.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

use crate::error::{GraphError, Result};

/// Per-edge buffer capacity. The firing protocol is defined for
/// single-slot channels: one produced value in flight per edge.
pub const CHANNEL_CAPACITY: usize = 1;

/// A bounded FIFO buffer attached to a graph edge
///
/// Holds at most [`CHANNEL_CAPACITY`] values. `push` on a full channel and
/// `pop` on an empty one are programming errors surfaced as
/// [`GraphError::InvariantViolation`]; the firing predicate prevents both
/// during a correctly scheduled run.
#[derive(Debug)]
pub struct Channel {
    queue: Mutex<VecDeque<Value>>,
}

impl Channel {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(CHANNEL_CAPACITY)),
        }
    }

    /// Current occupancy (0 or 1).
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when no value is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the producer has written a value the consumer has not yet
    /// consumed.
    pub fn is_full(&self) -> bool {
        self.len() >= CHANNEL_CAPACITY
    }

    /// Append a value. Fails if the channel is already at capacity.
    pub(crate) fn push(&self, value: Value) -> Result<()> {
        let mut queue = self.queue.lock();
        if queue.len() >= CHANNEL_CAPACITY {
            return Err(GraphError::invariant("push into a full channel"));
        }
        queue.push_back(value);
        Ok(())
    }

    /// Remove and return the oldest value. Fails if the channel is empty.
    pub(crate) fn pop(&self) -> Result<Value> {
        self.queue
            .lock()
            .pop_front()
            .ok_or_else(|| GraphError::invariant("pop from an empty channel"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_starts_empty() {
        let ch = Channel::new();
        assert!(ch.is_empty());
        assert!(!ch.is_full());
        assert_eq!(ch.len(), 0);
    }

    #[test]
    fn test_push_then_pop_round_trips() {
        let ch = Channel::new();
        ch.push(json!(42)).unwrap();
        assert!(ch.is_full());
        assert_eq!(ch.len(), 1);
        assert_eq!(ch.pop().unwrap(), json!(42));
        assert!(ch.is_empty());
    }

    #[test]
    fn test_push_into_full_channel_is_invariant_violation() {
        let ch = Channel::new();
        ch.push(json!(1)).unwrap();
        let err = ch.push(json!(2)).unwrap_err();
        assert!(matches!(err, GraphError::InvariantViolation(_)));
    }

    #[test]
    fn test_pop_from_empty_channel_is_invariant_violation() {
        let ch = Channel::new();
        let err = ch.pop().unwrap_err();
        assert!(matches!(err, GraphError::InvariantViolation(_)));
    }
}
