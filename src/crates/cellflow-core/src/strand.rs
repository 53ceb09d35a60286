//! Strand identities for cross-cell mutual exclusion
//!
//! A [`Strand`] is a small value-typed tag. Cells that report the same
//! strand from [`Cell::strand`](crate::Cell::strand) never run their
//! `process()` concurrently, even on different worker threads; the
//! scheduler routes their work through a per-strand FIFO serializer.
//!
//! Strands compare and hash by value, so a strand can be copied freely
//! between cells, stored in configuration, and compared across graphs.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STRAND_ID: AtomicU64 = AtomicU64::new(0);

/// A value-typed identity forcing mutual exclusion between cells
///
/// Two cells sharing a `Strand` are serialized against each other for the
/// lifetime of a run. Allocate one with [`Strand::new`] and hand copies to
/// every cell that must not overlap.
///
/// # Examples
///
/// ```rust
/// use cellflow_core::Strand;
///
/// let s = Strand::new();
/// let copy = s;
/// assert_eq!(s, copy);
/// assert_ne!(s, Strand::new());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strand(u64);

impl Strand {
    /// Allocate a fresh strand identity, distinct from all others in this
    /// process.
    pub fn new() -> Self {
        let id = NEXT_STRAND_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(strand = id, "allocated strand identity");
        Strand(id)
    }

    /// Numeric identity, stable for the life of the process. Diagnostics
    /// only.
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_strands_are_unique() {
        let a = Strand::new();
        let b = Strand::new();
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_copies_compare_equal() {
        let a = Strand::new();
        let b = a;
        assert_eq!(a, b);
    }

    #[test]
    fn test_strand_usable_as_map_key() {
        let a = Strand::new();
        let mut map = HashMap::new();
        map.insert(a, "serializer");
        assert_eq!(map.get(&a), Some(&"serializer"));
    }
}
