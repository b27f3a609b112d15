//! Benchmark workloads for the safemem runtime.
//!
//! Each workload is built twice, once on a checked heap and once on the
//! throughput heap, so the benches can report what quarantine and observer
//! tracking cost:
//!
//! - [`checked_heap`] / [`throughput_heap`]: the two heap profiles
//! - [`populate`]: `objects` owners, each watched by `views` soft handles
//! - [`filled_array`]: an array of `len` ascending integers
//! - [`churn`]: allocate and drop `n` owners, returning the zombie count

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use safemem_core::SafetyMode;
use safemem_heap::{Heap, HeapConfig, OwningPtr, SoftPtr};

/// Heap with quarantine, poisoning and early detection on.
pub fn checked_heap() -> Heap {
    Heap::new(HeapConfig::default())
        .unwrap_or_else(|err| panic!("checked heap config rejected: {err}"))
}

/// Heap that frees immediately and never poisons.
pub fn throughput_heap() -> Heap {
    Heap::new(HeapConfig::without_zombies())
        .unwrap_or_else(|err| panic!("throughput heap config rejected: {err}"))
}

/// `objects` owners of `u64`, each watched by `views` soft handles.
pub fn populate<S: SafetyMode>(
    heap: &Heap,
    objects: usize,
    views: usize,
) -> (Vec<OwningPtr<u64, S>>, Vec<SoftPtr<u64, S>>) {
    let owners: Vec<OwningPtr<u64, S>> = (0..objects as u64)
        .map(|v| OwningPtr::new_in(heap, v))
        .collect();
    let softs = owners
        .iter()
        .flat_map(|o| (0..views).map(move |_| o.soft()))
        .collect();
    (owners, softs)
}

/// Array of `0..len`.
pub fn filled_array<S: SafetyMode>(heap: &Heap, len: usize) -> OwningPtr<[u64], S> {
    OwningPtr::new_array_in(heap, len, |i| i as u64)
}

/// Allocate and drop `n` owners, one at a time. Returns the zombie count
/// afterwards.
pub fn churn(heap: &Heap, n: usize) -> usize {
    for i in 0..n {
        let owner: OwningPtr<[u8; 64]> = OwningPtr::new_in(heap, [i as u8; 64]);
        drop(owner);
    }
    heap.zombie_count()
}
