//! Safemem: runtime ownership tracking for heap objects.
//!
//! Every managed object has exactly one [`OwningPtr`](heap::OwningPtr).
//! Any number of [`SoftPtr`](heap::SoftPtr)s may observe it; each one is
//! registered in the allocation's control block and invalidated when the
//! owner destroys the object. Released blocks are kept as poisoned zombies
//! until the heap is told to kill them, so stray raw pointers read a
//! recognisable pattern instead of reused memory.
//!
//! This facade re-exports the public API of the sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use safemem::prelude::*;
//!
//! let heap = Heap::new(HeapConfig::default()).unwrap();
//!
//! let mut owner: OwningPtr<String> = OwningPtr::new_in(&heap, "hello".to_string());
//! let view = owner.soft();
//! assert_eq!(view.get().as_str(), "hello");
//!
//! owner.reset();
//! assert_eq!(view.try_get().unwrap_err(), AccessError::Invalidated);
//! assert_eq!(heap.zombie_count(), 1);
//!
//! let arr: OwningPtr<[u32]> = OwningPtr::new_array_in(&heap, 4, |i| i as u32 * 10);
//! let soft = arr.soft();
//! let total: u32 = ArrayIter::begin(&soft).values().sum();
//! assert_eq!(total, 60);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `safemem-core` | Access errors, safety modes, IDs, checker attributes |
//! | [`heap`] | `safemem-heap` | Heaps, owning and soft handles, control blocks, zombies |
//! | [`iter`] | `safemem-iter` | Clamped array, fixed-array and hash-chain iterators |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Shared vocabulary (`safemem-core`).
///
/// [`types::AccessError`] is what every `try_*` operation returns;
/// [`types::Safe`] and [`types::Unchecked`] select checking per handle type.
pub use safemem_core as types;

/// Heaps and handles (`safemem-heap`).
///
/// [`heap::Heap`] owns the zombie list, [`heap::OwningPtr`] and
/// [`heap::SoftPtr`] are the handles, [`heap::control::ControlBlock`] is the
/// per-allocation slot registry.
pub use safemem_heap as heap;

/// Checked iterators (`safemem-iter`).
pub use safemem_iter as iter;

/// Common imports.
///
/// ```rust
/// use safemem::prelude::*;
/// ```
pub mod prelude {
    // Vocabulary
    pub use safemem_core::{fatal, AccessError, MemorySafety, Safe, SafetyMode, Unchecked};

    // Heap and handles
    pub use safemem_heap::{Heap, HeapConfig, HeapError, OwningPtr, Ref, RefMut, SoftPtr};

    // Iteration
    pub use safemem_iter::{ArrayIter, FixedArray, HashIter, StackIter};
}
