//! Heap-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during heap and control-block operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// A control block cannot track another observer.
    SlotExhausted {
        /// Number of slots the control block already holds.
        capacity: usize,
    },
    /// The process allocator returned null.
    AllocationFailed {
        /// Requested block size in bytes, prefix included.
        size: usize,
        /// Requested block alignment.
        align: usize,
    },
    /// An array allocation's byte size overflows `isize`.
    LayoutOverflow {
        /// Requested element count.
        elements: usize,
    },
    /// Early detection can only be toggled while no zombies are recorded.
    DetectionToggleWithZombies {
        /// Number of zombie ranges still in the detection map.
        zombies: usize,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotExhausted { capacity } => {
                write!(f, "control block exhausted: {capacity} observer slots in use")
            }
            Self::AllocationFailed { size, align } => {
                write!(f, "allocation of {size} bytes (align {align}) failed")
            }
            Self::LayoutOverflow { elements } => {
                write!(f, "array of {elements} elements exceeds the maximum allocation size")
            }
            Self::DetectionToggleWithZombies { zombies } => {
                write!(
                    f,
                    "cannot toggle early detection while {zombies} zombie ranges are recorded"
                )
            }
        }
    }
}

impl Error for HeapError {}

/// Errors detected during [`HeapConfig::validate()`](crate::HeapConfig::validate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Overflow growth must at least double the slot count.
    GrowthFactorTooSmall {
        /// The configured factor.
        configured: usize,
    },
    /// The per-block slot cap must cover the inline slots.
    MaxSlotsBelowInline {
        /// The configured cap.
        configured: u32,
        /// Inline slot count that must fit under the cap.
        inline: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GrowthFactorTooSmall { configured } => {
                write!(f, "slot growth factor {configured} is below the minimum of 2")
            }
            Self::MaxSlotsBelowInline { configured, inline } => {
                write!(
                    f,
                    "max_slots_per_block {configured} is below the {inline} inline slots"
                )
            }
        }
    }
}

impl Error for ConfigError {}
