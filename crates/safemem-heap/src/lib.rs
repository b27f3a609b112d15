//! Ownership-tracking heap for safemem.
//!
//! Every managed allocation has exactly one [`OwningPtr`] and any number of
//! [`SoftPtr`] observers. The owner's teardown invalidates every observer in
//! one pass over the allocation's [`ControlBlock`](control::ControlBlock),
//! then hands the block to the [`Heap`], which quarantines it as a zombie
//! (poisoned and still mapped) until [`Heap::kill_all_zombies`].
//!
//! This crate holds all of safemem's `unsafe` code, confined to `raw.rs`,
//! `borrow.rs`, and `shared.rs`.
//!
//! # Architecture
//!
//! ```text
//! Heap (Rc, thread-affine)
//! ├── ZombieRegistry ── intrusive list through RawBlock headers
//! │                   └── BTreeMap<start, size> (early detection)
//! └── HeapStats
//!
//! Rc<Shared<T>> (one per allocation)
//! ├── RawBlock ── BlockHeader | payload
//! ├── ControlBlock ── SmallVec<[Slot; 5]> + free list
//! ├── BorrowFlag ── Ref / RefMut guards
//! └── object: Option<NonNull<T>>
//!       ▲                 ▲
//!   OwningPtr         SoftPtr × n (one slot each)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod array;
mod borrow;
pub mod config;
pub mod control;
pub mod error;
mod heap;
pub mod owning;
pub mod raw;
mod shared;
pub mod soft;
pub mod stats;
pub mod zombie;

// Public re-exports for the primary API surface.
pub use borrow::{Ref, RefMut};
pub use config::{HeapConfig, ZombieMode};
pub use control::CONTROL_BLOCK_INLINE_SLOTS;
pub use error::{ConfigError, HeapError};
pub use heap::Heap;
pub use owning::OwningPtr;
pub use raw::{RawBlock, FREED_PATTERN};
pub use soft::SoftPtr;
pub use stats::HeapStats;
