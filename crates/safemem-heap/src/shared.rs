//! The per-allocation record shared by an owner and its soft handles.
//!
//! Every managed allocation has one [`Shared`] record behind an `Rc`. The
//! owner and every soft handle hold a strong reference, so the record
//! outlives the object: after teardown it still answers "is this alive?"
//! and still holds the control block that soft handles deregister from.
//!
//! Teardown order: destroy the object, invalidate every registered
//! observer, then release or quarantine the block. The last two steps run
//! even if the object's destructor panics.
//!
//! An owner dropped while a borrow guard is alive cannot destroy the
//! object under that guard. It orphans the record instead: observers are
//! invalidated at once and the object is destroyed when the last handle
//! lets go of the record.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::ptr::{self, NonNull};

use log::warn;
use safemem_core::{AccessError, AllocationId, SlotId};

use crate::borrow::{BorrowFlag, Ref, RefMut};
use crate::control::{ControlBlock, ObserverState};
use crate::error::HeapError;
use crate::heap::Heap;
use crate::raw::RawBlock;

pub(crate) struct Shared<T: ?Sized> {
    id: AllocationId,
    heap: Heap,
    block: RefCell<Option<RawBlock>>,
    borrow: BorrowFlag,
    slots: RefCell<ControlBlock>,
    /// Route the block to the zombie list on release.
    quarantine: bool,
    /// Element count for arrays, 1 for scalars. Survives teardown.
    elements: usize,
    /// `None` once the object has been destroyed.
    object: Cell<Option<NonNull<T>>>,
    /// Set when the owner went away before the object could be destroyed.
    orphaned: Cell<bool>,
}

impl<T> Shared<T> {
    /// Move `value` into a fresh block on `heap`.
    pub(crate) fn allocate_value(heap: &Heap, value: T, quarantine: bool) -> Result<Self, HeapError> {
        let block = heap.allocate(Layout::new::<T>(), 1)?;
        let object = block.payload().cast::<T>();
        // SAFETY: the payload was laid out for exactly one `T`, so it is
        // aligned and large enough; nothing else references it yet.
        unsafe { object.as_ptr().write(value) };
        Ok(Self::from_parts(heap, block, object, 1, quarantine))
    }
}

impl<E> Shared<[E]> {
    /// Build a `capacity`-element array in a fresh block on `heap`.
    ///
    /// If `init` panics, the elements written so far are dropped and the
    /// block is freed before the panic continues.
    pub(crate) fn allocate_array(
        heap: &Heap,
        capacity: usize,
        mut init: impl FnMut(usize) -> E,
        quarantine: bool,
    ) -> Result<Self, HeapError> {
        let layout = Layout::array::<E>(capacity)
            .map_err(|_| HeapError::LayoutOverflow { elements: capacity })?;
        let block = heap.allocate(layout, capacity)?;
        let base = block.payload().cast::<E>();
        let mut guard = FillGuard {
            heap,
            block: Some(block),
            base,
            written: 0,
        };
        while guard.written < capacity {
            let value = init(guard.written);
            // SAFETY: `written < capacity` and the payload holds `capacity`
            // elements, so the slot is in bounds and uninitialised.
            unsafe { base.as_ptr().add(guard.written).write(value) };
            guard.written += 1;
        }
        let Some(block) = guard.block.take() else {
            unreachable!("fill guard disarmed before completion");
        };
        let object = NonNull::slice_from_raw_parts(base, capacity);
        Ok(Self::from_parts(heap, block, object, capacity, quarantine))
    }
}

/// Cleans up a partially built array when element construction panics.
struct FillGuard<'a, E> {
    heap: &'a Heap,
    block: Option<RawBlock>,
    base: NonNull<E>,
    written: usize,
}

impl<E> Drop for FillGuard<'_, E> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            let filled = ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.written);
            // SAFETY: exactly the first `written` elements were initialised
            // and nothing else references them.
            unsafe { ptr::drop_in_place(filled) };
            self.heap.release(block, false);
        }
    }
}

impl<T: ?Sized> Shared<T> {
    fn from_parts(
        heap: &Heap,
        block: RawBlock,
        object: NonNull<T>,
        elements: usize,
        quarantine: bool,
    ) -> Self {
        let config = heap.config();
        Self {
            id: AllocationId::next(),
            heap: heap.clone(),
            block: RefCell::new(Some(block)),
            borrow: BorrowFlag::new(),
            slots: RefCell::new(ControlBlock::new(
                config.slot_growth_factor,
                config.max_slots_per_block,
            )),
            quarantine,
            elements,
            object: Cell::new(Some(object)),
            orphaned: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> AllocationId {
        self.id
    }

    pub(crate) fn heap(&self) -> &Heap {
        &self.heap
    }

    pub(crate) fn elements(&self) -> usize {
        self.elements
    }

    pub(crate) fn object(&self) -> Option<NonNull<T>> {
        self.object.get()
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.orphaned.get() && self.object.get().is_some()
    }

    fn live_object(&self) -> Result<NonNull<T>, AccessError> {
        if self.orphaned.get() {
            return Err(AccessError::Invalidated);
        }
        self.object.get().ok_or(AccessError::Invalidated)
    }

    pub(crate) fn try_borrow(&self) -> Result<Ref<'_, T>, AccessError> {
        let object = self.live_object()?;
        self.borrow.try_shared()?;
        // SAFETY: the shared borrow was just recorded; teardown refuses to
        // destroy the object while any borrow is held.
        Ok(unsafe { Ref::new(object, &self.borrow) })
    }

    pub(crate) fn try_borrow_mut(&self) -> Result<RefMut<'_, T>, AccessError> {
        let object = self.live_object()?;
        self.borrow.try_exclusive()?;
        // SAFETY: the exclusive borrow was just recorded; no other guard can
        // exist and teardown is refused until it drops.
        Ok(unsafe { RefMut::new(object, &self.borrow) })
    }

    /// Register an observer. It starts invalidated if the object is gone.
    pub(crate) fn register(&self) -> Result<SlotId, HeapError> {
        let state = if self.is_alive() {
            ObserverState::Live
        } else {
            ObserverState::Invalidated
        };
        let slot = self.slots.borrow_mut().insert(state)?;
        self.heap.record_registration();
        Ok(slot)
    }

    pub(crate) fn deregister(&self, slot: SlotId) {
        let removed = self.slots.borrow_mut().remove(slot);
        debug_assert!(removed, "soft handle held stale slot {slot}");
    }

    pub(crate) fn slot_is_live(&self, slot: SlotId) -> bool {
        self.slots.borrow().is_live(slot)
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.slots.borrow().used_count()
    }

    pub(crate) fn slot_capacity(&self) -> usize {
        self.slots.borrow().capacity()
    }

    /// Whether `ptr` lies in this allocation's payload. `false` after release.
    pub(crate) fn contains(&self, ptr: *const u8) -> bool {
        self.block
            .borrow()
            .as_ref()
            .is_some_and(|block| Heap::is_zombieable_pointer_in_block(block, ptr))
    }

    /// Destroy the object and invalidate every observer.
    ///
    /// A no-op if already torn down. Fails without side effects while a
    /// borrow guard is alive.
    pub(crate) fn teardown(&self) -> Result<(), AccessError> {
        if self.borrow.is_borrowed() {
            return Err(AccessError::DestroyedWhileBorrowed);
        }
        let Some(object) = self.object.take() else {
            return Ok(());
        };
        let _retire = RetireGuard { shared: self };
        // SAFETY: `object` was initialised at allocation, has not been
        // dropped (it was still recorded), and no guard references it. It
        // is unrecorded first so re-entrant access from its destructor sees
        // it as gone.
        unsafe { ptr::drop_in_place(object.as_ptr()) };
        Ok(())
    }

    /// Detach from an owner that is going away while a borrow guard is
    /// alive. Every observer is invalidated now; the object itself is
    /// destroyed when the record is dropped.
    pub(crate) fn orphan(&self) {
        if !self.orphaned.replace(true) {
            self.invalidate_observers();
        }
    }

    fn invalidate_observers(&self) {
        let invalidated = self.slots.borrow_mut().invalidate_all();
        self.heap.record_invalidations(invalidated);
    }

    fn release_block(&self) {
        if let Some(block) = self.block.borrow_mut().take() {
            self.heap.release(block, self.quarantine);
        }
    }
}

/// Invalidates observers and releases the block once the object's
/// destructor has returned or unwound.
struct RetireGuard<'a, T: ?Sized> {
    shared: &'a Shared<T>,
}

impl<T: ?Sized> Drop for RetireGuard<'_, T> {
    fn drop(&mut self) {
        self.shared.invalidate_observers();
        self.shared.release_block();
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        // Only reached with a live object for orphaned records: no guard
        // can outlive the record, so the teardown goes through.
        if let Err(err) = self.teardown() {
            warn!("leaking allocation {}: {err}", self.id);
        }
    }
}
