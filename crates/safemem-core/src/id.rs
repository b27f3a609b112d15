//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Position of an observer slot inside a control block.
///
/// `index` addresses the slot; `generation` is bumped every time the slot
/// is released, so an identifier for a released slot never matches the
/// slot's next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    /// Slot position. Positions below the inline capacity are inline slots,
    /// the rest live in the overflow area.
    pub index: u32,
    /// Occupancy generation of the slot.
    pub generation: u32,
}

impl SlotId {
    /// Create a slot identifier.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.generation)
    }
}

/// Counter for unique [`AllocationId`] allocation.
static ALLOCATION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-allocation identifier.
///
/// Allocated from a monotonic counter, so two allocations never share an ID
/// even when the second reuses the first one's address. Used to tell
/// iterators over different allocations apart in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId(u64);

impl AllocationId {
    /// Allocate a fresh, never-before-returned ID. Thread-safe.
    pub fn next() -> Self {
        Self(ALLOCATION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_ids_are_unique() {
        let a = AllocationId::next();
        let b = AllocationId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn slot_id_display() {
        assert_eq!(SlotId::new(3, 7).to_string(), "3@7");
    }
}
