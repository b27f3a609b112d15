//! The unique owning handle.
//!
//! An [`OwningPtr`] is either empty or owns exactly one managed object.
//! Destroying or resetting it destroys the object, invalidates every soft
//! handle registered against it, and releases the block (to quarantine
//! when the heap and the safety mode ask for it). It cannot be cloned and
//! has no operation that detaches the object from its tracking.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::rc::Rc;
use std::thread;

use log::warn;
use safemem_core::{fatal, AccessError, AllocationId, Safe, SafetyMode};

use crate::borrow::{Ref, RefMut};
use crate::error::HeapError;
use crate::heap::Heap;
use crate::shared::Shared;
use crate::soft::SoftPtr;

/// Unique owner of one managed object.
///
/// Moving an `OwningPtr` moves ownership; [`std::mem::take`] leaves an
/// empty owner behind.
pub struct OwningPtr<T: ?Sized, S: SafetyMode = Safe> {
    shared: Option<Rc<Shared<T>>>,
    _mode: PhantomData<S>,
}

impl<T, S: SafetyMode> OwningPtr<T, S> {
    /// Allocate `value` on the thread's default heap.
    #[track_caller]
    pub fn new(value: T) -> Self {
        Self::new_in(&Heap::current(), value)
    }

    /// Allocate `value` on `heap`. Allocation failure is fatal.
    #[track_caller]
    pub fn new_in(heap: &Heap, value: T) -> Self {
        Self::try_new_in(heap, value).unwrap_or_else(|err| fatal(err))
    }

    /// Allocate `value` on `heap`.
    pub fn try_new_in(heap: &Heap, value: T) -> Result<Self, HeapError> {
        let shared = Shared::allocate_value(heap, value, S::is_safe())?;
        Ok(Self::from_shared(shared))
    }

    /// Destroy the current object (if any) and take ownership of `value`.
    ///
    /// The new object lives on the same heap as the old one, or on the
    /// thread's default heap if this owner was empty. Every soft handle to
    /// the old object is invalidated; none observe the new one.
    #[track_caller]
    pub fn reset_with(&mut self, value: T) {
        let heap = self.heap().cloned().unwrap_or_else(Heap::current);
        self.reset();
        *self = Self::new_in(&heap, value);
    }
}

impl<T: ?Sized, S: SafetyMode> OwningPtr<T, S> {
    /// An owner that owns nothing.
    pub const fn empty() -> Self {
        Self {
            shared: None,
            _mode: PhantomData,
        }
    }

    pub(crate) fn from_shared(shared: Shared<T>) -> Self {
        Self {
            shared: Some(Rc::new(shared)),
            _mode: PhantomData,
        }
    }

    pub(crate) fn shared(&self) -> Option<&Rc<Shared<T>>> {
        self.shared.as_ref()
    }

    fn live(&self) -> Result<&Rc<Shared<T>>, AccessError> {
        self.shared.as_ref().ok_or(AccessError::NullHandle)
    }

    /// Whether the owner is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.is_none()
    }

    /// Whether the owner holds an object.
    pub fn is_owning(&self) -> bool {
        self.shared.is_some()
    }

    /// Destroy the owned object, leaving the owner empty.
    ///
    /// Fails with [`AccessError::DestroyedWhileBorrowed`] (and changes
    /// nothing) while a soft handle's borrow guard is alive.
    pub fn try_reset(&mut self) -> Result<(), AccessError> {
        let Some(shared) = self.shared.take() else {
            return Ok(());
        };
        // Emptied first: a panicking destructor still leaves the owner empty.
        if let Err(err) = shared.teardown() {
            self.shared = Some(shared);
            return Err(err);
        }
        Ok(())
    }

    /// Destroy the owned object, leaving the owner empty.
    #[track_caller]
    pub fn reset(&mut self) {
        if let Err(err) = self.try_reset() {
            fatal(err);
        }
    }

    /// Borrow the owned object.
    pub fn try_borrow(&self) -> Result<Ref<'_, T>, AccessError> {
        self.live()?.try_borrow()
    }

    /// Borrow the owned object. Fatal if empty or exclusively borrowed.
    #[track_caller]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.try_borrow().unwrap_or_else(|err| fatal(err))
    }

    /// Mutably borrow the owned object.
    pub fn try_borrow_mut(&mut self) -> Result<RefMut<'_, T>, AccessError> {
        self.live()?.try_borrow_mut()
    }

    /// Mutably borrow the owned object. Fatal if empty or already borrowed.
    #[track_caller]
    pub fn borrow_mut(&mut self) -> RefMut<'_, T> {
        self.try_borrow_mut().unwrap_or_else(|err| fatal(err))
    }

    /// Raw pointer to the owned object.
    pub fn try_as_ptr(&self) -> Result<NonNull<T>, AccessError> {
        self.live()?.object().ok_or(AccessError::Invalidated)
    }

    /// Raw pointer to the owned object. Calling this on an empty owner is
    /// a logic error and fatal.
    #[track_caller]
    pub fn as_ptr(&self) -> NonNull<T> {
        self.try_as_ptr().unwrap_or_else(|err| fatal(err))
    }

    /// Identifier of the owned allocation.
    pub fn allocation_id(&self) -> Option<AllocationId> {
        self.shared.as_ref().map(|s| s.id())
    }

    /// Number of soft handles currently registered.
    pub fn observer_count(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.observer_count())
    }

    /// Observer slots allocated for this object, inline and overflow.
    pub fn observer_capacity(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.slot_capacity())
    }

    /// The heap the object lives on.
    pub fn heap(&self) -> Option<&Heap> {
        self.shared.as_ref().map(|s| s.heap())
    }

    /// Whether `ptr` points into the owned object's block.
    pub fn is_pointer_in_block(&self, ptr: *const u8) -> bool {
        self.shared.as_ref().is_some_and(|s| s.contains(ptr))
    }

    /// Exchange owned objects with `other`. Soft handles keep observing
    /// the object they registered against.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.shared, &mut other.shared);
    }

    /// A soft handle observing the owned object (null if empty).
    #[track_caller]
    pub fn soft(&self) -> SoftPtr<T, S> {
        SoftPtr::from_owner(self)
    }
}

impl<T: ?Sized, S: SafetyMode> Default for OwningPtr<T, S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, S: SafetyMode> Drop for OwningPtr<T, S> {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        if let Err(err) = shared.teardown() {
            // Observers fail from here on; the last handle to let go of the
            // record destroys the object.
            shared.orphan();
            if thread::panicking() {
                warn!(
                    "owner of allocation {} dropped during unwind: {err}",
                    shared.id()
                );
            } else {
                fatal(err);
            }
        }
    }
}

impl<T: ?Sized, S: SafetyMode> fmt::Debug for OwningPtr<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shared {
            None => f.write_str("OwningPtr(empty)"),
            Some(shared) => f
                .debug_struct("OwningPtr")
                .field("id", &shared.id())
                .field("mode", &S::MODE)
                .field("observers", &shared.observer_count())
                .finish(),
        }
    }
}
