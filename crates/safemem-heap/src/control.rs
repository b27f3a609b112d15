//! Per-allocation observer registry.
//!
//! A [`ControlBlock`] tracks every soft handle pointing at one allocation.
//! Each handle holds a [`SlotId`]: an index plus the generation the slot had
//! when the handle registered. The first [`CONTROL_BLOCK_INLINE_SLOTS`] slots
//! live inline; further registrations spill into a heap-allocated overflow
//! that grows geometrically and never shrinks.
//!
//! Freed slots are threaded onto a free list and reused. Removal bumps the
//! slot's generation so a stale [`SlotId`] is rejected. A slot whose
//! generation wraps to zero is retired permanently rather than risk an ABA
//! match.

use log::debug;
use safemem_core::SlotId;
use smallvec::SmallVec;

use crate::error::HeapError;

/// Number of observer slots stored inline in every control block.
pub const CONTROL_BLOCK_INLINE_SLOTS: usize = 5;

/// State of a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverState {
    /// The observed object is alive.
    Live,
    /// The owner destroyed the object after this observer registered.
    Invalidated,
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Free {
        next: Option<u32>,
        generation: u32,
    },
    Used {
        generation: u32,
        state: ObserverState,
    },
    Retired,
}

/// Slot registry for the soft handles of one allocation.
#[derive(Debug)]
pub struct ControlBlock {
    slots: SmallVec<[Slot; CONTROL_BLOCK_INLINE_SLOTS]>,
    free_head: Option<u32>,
    used: usize,
    growth_factor: usize,
    max_slots: u32,
}

impl ControlBlock {
    /// Create a control block with every inline slot free.
    ///
    /// `growth_factor` and `max_slots` come from a validated
    /// [`HeapConfig`](crate::HeapConfig).
    pub fn new(growth_factor: usize, max_slots: u32) -> Self {
        let mut slots = SmallVec::new();
        thread_free_slots(&mut slots, 0, CONTROL_BLOCK_INLINE_SLOTS);
        Self {
            slots,
            free_head: Some(0),
            used: 0,
            growth_factor,
            max_slots,
        }
    }

    /// Register an observer in the given state.
    ///
    /// Fails with [`HeapError::SlotExhausted`] once `max_slots` slots exist
    /// and none is free, or when the overflow cannot be grown.
    pub fn insert(&mut self, state: ObserverState) -> Result<SlotId, HeapError> {
        if self.free_head.is_none() {
            self.grow()?;
        }
        let Some(index) = self.free_head else {
            return Err(HeapError::SlotExhausted {
                capacity: self.slots.len(),
            });
        };
        match self.slots[index as usize] {
            Slot::Free { next, generation } => {
                self.slots[index as usize] = Slot::Used { generation, state };
                self.free_head = next;
                self.used += 1;
                Ok(SlotId::new(index, generation))
            }
            // The free list only ever links free slots.
            Slot::Used { .. } | Slot::Retired => unreachable!("free list links a non-free slot"),
        }
    }

    /// Deregister an observer. Returns `false` if `id` is stale or unknown.
    pub fn remove(&mut self, id: SlotId) -> bool {
        let index = id.index as usize;
        match self.slots.get(index) {
            Some(&Slot::Used { generation, .. }) if generation == id.generation => {
                let next_generation = generation.wrapping_add(1);
                self.slots[index] = if next_generation == 0 {
                    Slot::Retired
                } else {
                    let slot = Slot::Free {
                        next: self.free_head,
                        generation: next_generation,
                    };
                    self.free_head = Some(id.index);
                    slot
                };
                self.used -= 1;
                true
            }
            _ => false,
        }
    }

    /// State of the observer registered under `id`, or `None` if stale.
    pub fn state(&self, id: SlotId) -> Option<ObserverState> {
        match self.slots.get(id.index as usize) {
            Some(&Slot::Used { generation, state }) if generation == id.generation => Some(state),
            _ => None,
        }
    }

    /// Whether `id` is registered and its object has not been destroyed.
    pub fn is_live(&self, id: SlotId) -> bool {
        self.state(id) == Some(ObserverState::Live)
    }

    /// Visit every registered observer.
    pub fn for_each_used(&mut self, mut f: impl FnMut(SlotId, &mut ObserverState)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Used { generation, state } = slot {
                f(SlotId::new(index as u32, *generation), state);
            }
        }
    }

    /// Mark every live observer invalidated. Returns how many changed.
    pub fn invalidate_all(&mut self) -> usize {
        let mut changed = 0;
        self.for_each_used(|_, state| {
            if *state == ObserverState::Live {
                *state = ObserverState::Invalidated;
                changed += 1;
            }
        });
        changed
    }

    /// Number of registered observers.
    pub fn used_count(&self) -> usize {
        self.used
    }

    /// Total slots, inline plus overflow, retired included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `index` falls in the inline region.
    pub fn is_inline(index: u32) -> bool {
        (index as usize) < CONTROL_BLOCK_INLINE_SLOTS
    }

    /// Whether the registry has spilled into its overflow.
    pub fn has_overflow(&self) -> bool {
        self.slots.spilled()
    }

    fn grow(&mut self) -> Result<(), HeapError> {
        let current = self.slots.len();
        let max = self.max_slots as usize;
        if current >= max {
            return Err(HeapError::SlotExhausted { capacity: current });
        }
        let target = current
            .saturating_mul(self.growth_factor)
            .clamp(current + 1, max);
        self.slots
            .try_reserve_exact(target - current)
            .map_err(|_| HeapError::SlotExhausted { capacity: current })?;
        thread_free_slots(&mut self.slots, current, target);
        self.free_head = Some(current as u32);
        debug!("control block grew from {current} to {target} slots");
        Ok(())
    }
}

/// Append free slots `start..end`, each linking to the next.
fn thread_free_slots(
    slots: &mut SmallVec<[Slot; CONTROL_BLOCK_INLINE_SLOTS]>,
    start: usize,
    end: usize,
) {
    for index in start..end {
        let next = (index + 1 < end).then(|| (index + 1) as u32);
        slots.push(Slot::Free {
            next,
            generation: 0,
        });
    }
}
