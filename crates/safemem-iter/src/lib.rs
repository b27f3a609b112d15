//! Bounds- and liveness-checked iterators over safemem allocations.
//!
//! Every iterator here keeps its position in `[0, len]`: arithmetic clamps
//! instead of failing, and only dereferencing the end position is an
//! error. Heap-safe iterators reach their elements through a soft handle,
//! so an iterator that outlives its array reports
//! [`AccessError::Invalidated`](safemem_core::AccessError::Invalidated).
//!
//! | Type | Backing | Outlives its array? |
//! |------|---------|---------------------|
//! | [`ArrayIter`] | soft handle to `[E]` or a [`FixedArray`] | yes, detected |
//! | [`StackIter`] | borrowed slice | no, enforced by the borrow checker |
//! | [`HashIter`] | soft handles to bucket array and chain nodes | yes, detected |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array_iter;
pub mod cursor;
pub mod fixed_array;
pub mod hash_iter;
pub mod stack_iter;
pub mod view;

pub use array_iter::{ArrayIter, ArrayValues};
pub use cursor::Cursor;
pub use fixed_array::{FixedArray, FixedArrayIter};
pub use hash_iter::{Buckets, ChainNode, HashIter, HashNodes};
pub use stack_iter::StackIter;
pub use view::ArrayView;
