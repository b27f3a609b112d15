//! Per-heap allocation counters.
//!
//! [`HeapStats`] is a plain snapshot of the counters a [`Heap`](crate::Heap)
//! maintains. Read it with [`Heap::stats`](crate::Heap::stats).

/// Allocation, quarantine, and observer counters for one heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks handed out since the heap was created.
    pub allocations: u64,
    /// Blocks released by their owners (quarantined or freed).
    pub deallocations: u64,
    /// Blocks currently owned.
    pub live_blocks: usize,
    /// Bytes in currently owned blocks, prefix included.
    pub live_bytes: usize,
    /// Blocks currently on the zombie list.
    pub zombie_blocks: usize,
    /// Bytes currently held by zombies, prefix included.
    pub zombie_bytes: usize,
    /// Zombies returned to the process allocator.
    pub reclaimed_zombies: u64,
    /// Observer slots registered across all control blocks.
    pub soft_registrations: u64,
    /// Observer slots invalidated by owner teardown.
    pub invalidations: u64,
}
