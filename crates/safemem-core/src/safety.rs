//! Type-level memory safety modes.
//!
//! The safety mode is a type parameter rather than a runtime switch, so a
//! checked and an unchecked instantiation of the same handle type can live
//! in one program without paying for each other.
//!
//! - [`Safe`]: soft handles register an observer slot, freed blocks are
//!   quarantined as zombies, iterators bounds-check every dereference.
//! - [`Unchecked`]: no observer slots and no quarantine. Liveness is still
//!   tracked through the shared allocation record, so an unchecked soft
//!   handle reports [`AccessError::Invalidated`](crate::AccessError) rather
//!   than dangling.

use std::fmt;

/// Runtime mirror of a [`SafetyMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemorySafety {
    /// No observer tracking.
    None,
    /// Full observer tracking and zombie quarantine.
    Safe,
}

impl fmt::Display for MemorySafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Safe => write!(f, "safe"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker trait implemented by the two safety modes.
///
/// Sealed: only [`Safe`] and [`Unchecked`] implement it.
pub trait SafetyMode: sealed::Sealed + 'static {
    /// The runtime value of this mode.
    const MODE: MemorySafety;

    /// Whether observer slots and zombie quarantine are active.
    fn is_safe() -> bool {
        Self::MODE == MemorySafety::Safe
    }
}

/// Full checking (the default for every handle type).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Safe {}

/// No observer tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unchecked {}

impl sealed::Sealed for Safe {}
impl sealed::Sealed for Unchecked {}

impl SafetyMode for Safe {
    const MODE: MemorySafety = MemorySafety::Safe;
}

impl SafetyMode for Unchecked {
    const MODE: MemorySafety = MemorySafety::None;
}
