//! Error taxonomy for handle and iterator access.
//!
//! Every variant is a programmer error: by the time one is detected the
//! program has already broken an ownership invariant. Callers that want to
//! check validity use the `try_*` accessors and receive an [`AccessError`];
//! the plain accessors route the same value through [`fatal`].

use std::error::Error;
use std::fmt;

/// Kind of borrow that was already active when a conflicting one was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BorrowMode {
    /// One or more shared borrows are alive.
    Shared,
    /// An exclusive borrow is alive.
    Exclusive,
}

impl fmt::Display for BorrowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Errors raised when dereferencing a handle or iterator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessError {
    /// The handle never pointed at anything (empty owner, default soft handle).
    NullHandle,
    /// The owner of the allocation has been destroyed or reset.
    Invalidated,
    /// An index or iterator position is outside the allocation.
    OutOfRange {
        /// The position that was dereferenced.
        index: usize,
        /// Number of dereferenceable elements.
        len: usize,
    },
    /// Two iterators or handles over different allocations were compared
    /// or subtracted.
    UnrelatedRanges,
    /// The allocation is already borrowed in a conflicting mode.
    BorrowConflict {
        /// The borrow that is currently held.
        mode: BorrowMode,
    },
    /// The owner tried to destroy an allocation while a borrow guard was alive.
    DestroyedWhileBorrowed,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullHandle => write!(f, "null handle access"),
            Self::Invalidated => write!(f, "access through invalidated handle (owner destroyed)"),
            Self::OutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::UnrelatedRanges => write!(f, "comparing unrelated ranges"),
            Self::BorrowConflict { mode } => {
                write!(f, "allocation already has an active {mode} borrow")
            }
            Self::DestroyedWhileBorrowed => {
                write!(f, "allocation destroyed while a borrow guard is alive")
            }
        }
    }
}

impl Error for AccessError {}

/// Raise a safety violation as a fatal error.
///
/// Panics with the error's display text prefixed by `safemem:`. The caller's
/// location is reported, so the panic points at the offending access site.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(err: impl fmt::Display) -> ! {
    panic!("safemem: {err}")
}
