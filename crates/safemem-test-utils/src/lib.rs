//! Test utilities for safemem development.
//!
//! Provides a [`DropCounter`] for asserting destruction counts, a
//! [`TestHeapBuilder`] for heaps with non-default configuration, and the
//! reusable object graphs in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::Cell;
use std::rc::Rc;

use safemem_heap::{Heap, HeapConfig, ZombieMode};

/// Shared counter incremented by every [`Tracked`] value it hands out.
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    drops: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A value that bumps this counter when dropped.
    pub fn track<T>(&self, value: T) -> Tracked<T> {
        Tracked {
            value,
            drops: Rc::clone(&self.drops),
        }
    }

    pub fn count(&self) -> usize {
        self.drops.get()
    }
}

/// A value paired with a [`DropCounter`].
#[derive(Debug)]
pub struct Tracked<T> {
    pub value: T,
    drops: Rc<Cell<usize>>,
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// Builder for heaps used in tests.
///
/// Starts from [`HeapConfig::default`]; every setter overrides one field.
pub struct TestHeapBuilder {
    config: HeapConfig,
}

impl TestHeapBuilder {
    pub fn new() -> Self {
        Self {
            config: HeapConfig::default(),
        }
    }

    pub fn zombies(mut self, on: bool) -> Self {
        self.config.zombie_mode = if on {
            ZombieMode::Quarantine
        } else {
            ZombieMode::Disabled
        };
        self
    }

    pub fn early_detection(mut self, on: bool) -> Self {
        self.config.early_detection = on;
        self
    }

    pub fn poison(mut self, on: bool) -> Self {
        self.config.poison_freed = on;
        self
    }

    pub fn growth_factor(mut self, factor: usize) -> Self {
        self.config.slot_growth_factor = factor;
        self
    }

    pub fn max_slots(mut self, max: u32) -> Self {
        self.config.max_slots_per_block = max;
        self
    }

    /// Build the heap. Panics on an invalid configuration.
    pub fn build(self) -> Heap {
        Heap::new(self.config).expect("test heap config should be valid")
    }
}

impl Default for TestHeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh heap with the default (quarantining, detecting) configuration.
pub fn test_heap() -> Heap {
    TestHeapBuilder::new().build()
}

/// A fresh heap that frees blocks immediately.
pub fn throughput_heap() -> Heap {
    TestHeapBuilder::new().zombies(false).build()
}
