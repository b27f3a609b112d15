//! Core types for the safemem ownership runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the heap and iterator layers: the access
//! error taxonomy, the type-level safety modes, slot and allocation
//! identifiers, and the attribute names consumed by the static checker.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod attributes;
pub mod error;
pub mod id;
pub mod safety;

pub use attributes::{CheckerAttribute, TrackedTemporary};
pub use error::{fatal, AccessError, BorrowMode};
pub use id::{AllocationId, SlotId};
pub use safety::{MemorySafety, Safe, SafetyMode, Unchecked};
