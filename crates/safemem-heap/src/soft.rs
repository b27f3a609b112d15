//! The non-owning ("soft") handle.
//!
//! A [`SoftPtr`] observes an object owned by an [`OwningPtr`]. In the
//! [`Safe`] mode every soft handle holds a slot in the allocation's control
//! block, so the owner can invalidate all of them in one pass at teardown.
//! Each access checks, in order: null handle, slot invalidated, object
//! gone. A soft handle that outlives its object is the condition this type
//! exists to detect; it reports [`AccessError::Invalidated`] instead of
//! reading freed memory.
//!
//! Cloning registers a new slot. Moving transfers the registration as is:
//! the control block records slot identifiers, not handle addresses, so a
//! move needs no patching.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::rc::Rc;

use safemem_core::{fatal, AccessError, AllocationId, Safe, SafetyMode, SlotId, TrackedTemporary};

use crate::borrow::{Ref, RefMut};
use crate::error::HeapError;
use crate::owning::OwningPtr;
use crate::shared::Shared;

/// Registered observer of a managed object.
pub struct SoftPtr<T: ?Sized, S: SafetyMode = Safe> {
    shared: Option<Rc<Shared<T>>>,
    /// `None` for null handles and in the unchecked mode.
    slot: Option<SlotId>,
    _mode: PhantomData<S>,
}

impl<T: ?Sized, S: SafetyMode> SoftPtr<T, S> {
    /// A handle that observes nothing.
    pub const fn null() -> Self {
        Self {
            shared: None,
            slot: None,
            _mode: PhantomData,
        }
    }

    /// Observe `owner`'s object. Null if the owner is empty.
    pub fn try_from_owner(owner: &OwningPtr<T, S>) -> Result<Self, HeapError> {
        match owner.shared() {
            Some(shared) => Self::attach(shared),
            None => Ok(Self::null()),
        }
    }

    /// Observe `owner`'s object. Control-block exhaustion is fatal.
    #[track_caller]
    pub fn from_owner(owner: &OwningPtr<T, S>) -> Self {
        Self::try_from_owner(owner).unwrap_or_else(|err| fatal(err))
    }

    fn attach(shared: &Rc<Shared<T>>) -> Result<Self, HeapError> {
        let slot = if S::is_safe() {
            Some(shared.register()?)
        } else {
            None
        };
        Ok(Self {
            shared: Some(Rc::clone(shared)),
            slot,
            _mode: PhantomData,
        })
    }

    /// Register a second observer of the same object.
    ///
    /// Copying an invalidated handle yields an invalidated handle.
    pub fn try_clone(&self) -> Result<Self, HeapError> {
        match &self.shared {
            Some(shared) => Self::attach(shared),
            None => Ok(Self::null()),
        }
    }

    pub(crate) fn check(&self) -> Result<&Shared<T>, AccessError> {
        let shared = self.shared.as_deref().ok_or(AccessError::NullHandle)?;
        if let Some(slot) = self.slot {
            if !shared.slot_is_live(slot) {
                return Err(AccessError::Invalidated);
            }
        }
        if !shared.is_alive() {
            return Err(AccessError::Invalidated);
        }
        Ok(shared)
    }

    pub(crate) fn shared(&self) -> Option<&Shared<T>> {
        self.shared.as_deref()
    }

    /// Borrow the observed object.
    pub fn try_get(&self) -> Result<Ref<'_, T>, AccessError> {
        self.check()?.try_borrow()
    }

    /// Borrow the observed object. Fatal if null or invalidated.
    #[track_caller]
    pub fn get(&self) -> Ref<'_, T> {
        self.try_get().unwrap_or_else(|err| fatal(err))
    }

    /// Mutably borrow the observed object.
    ///
    /// Exclusivity is enforced dynamically across every handle to the
    /// allocation, the owner included.
    pub fn try_get_mut(&self) -> Result<RefMut<'_, T>, AccessError> {
        self.check()?.try_borrow_mut()
    }

    /// Mutably borrow the observed object. Fatal on any access error.
    #[track_caller]
    pub fn get_mut(&self) -> RefMut<'_, T> {
        self.try_get_mut().unwrap_or_else(|err| fatal(err))
    }

    /// Raw pointer to the observed object, if it is alive.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.check().ok().and_then(|shared| shared.object())
    }

    /// Whether the handle observes nothing.
    pub fn is_null(&self) -> bool {
        self.shared.is_none()
    }

    /// Whether the handle is non-null and its object is alive.
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Whether both handles observe the same allocation (live or not).
    pub fn same_allocation(&self, other: &Self) -> bool {
        match (&self.shared, &other.shared) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this handle observes the object `owner` currently holds.
    pub fn points_to(&self, owner: &OwningPtr<T, S>) -> bool {
        match (&self.shared, owner.shared()) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// This handle's control-block slot.
    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot
    }

    /// Identifier of the observed allocation.
    pub fn allocation_id(&self) -> Option<AllocationId> {
        self.shared.as_ref().map(|s| s.id())
    }

    /// Deregister and become null.
    pub fn reset(&mut self) {
        *self = Self::null();
    }

    /// Exchange observed objects with `other`.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }
}

impl<T: ?Sized, S: SafetyMode> Clone for SoftPtr<T, S> {
    #[track_caller]
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|err| fatal(err))
    }
}

impl<T: ?Sized, S: SafetyMode> Drop for SoftPtr<T, S> {
    fn drop(&mut self) {
        if let (Some(shared), Some(slot)) = (&self.shared, self.slot) {
            shared.deregister(slot);
        }
    }
}

impl<T: ?Sized, S: SafetyMode> Default for SoftPtr<T, S> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, S: SafetyMode> From<&OwningPtr<T, S>> for SoftPtr<T, S> {
    #[track_caller]
    fn from(owner: &OwningPtr<T, S>) -> Self {
        Self::from_owner(owner)
    }
}

/// Two soft handles are equal when both are null or both observe the same
/// allocation.
impl<T: ?Sized, S: SafetyMode> PartialEq for SoftPtr<T, S> {
    fn eq(&self, other: &Self) -> bool {
        (self.is_null() && other.is_null()) || self.same_allocation(other)
    }
}

impl<T: ?Sized, S: SafetyMode> Eq for SoftPtr<T, S> {}

impl<T: ?Sized, S: SafetyMode> TrackedTemporary for SoftPtr<T, S> {}

impl<T: ?Sized, S: SafetyMode> fmt::Debug for SoftPtr<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shared {
            None => f.write_str("SoftPtr(null)"),
            Some(shared) => {
                let mut d = f.debug_struct("SoftPtr");
                d.field("id", &shared.id());
                if let Some(slot) = self.slot {
                    d.field("slot", &format_args!("{slot}"));
                }
                d.field("valid", &self.is_valid()).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;
    use crate::control::CONTROL_BLOCK_INLINE_SLOTS;
    use crate::heap::Heap;
    use proptest::prelude::*;
    use safemem_core::Unchecked;

    fn heap() -> Heap {
        Heap::new(HeapConfig::default()).unwrap()
    }

    #[test]
    fn soft_reads_through_to_owner() {
        let heap = heap();
        let o: OwningPtr<i32> = OwningPtr::new_in(&heap, 42);
        let s = o.soft();
        assert_eq!(*s.get(), 42);
        assert!(s.points_to(&o));
        assert_eq!(o.observer_count(), 1);
        assert_eq!(heap.stats().soft_registrations, 1);
    }

    #[test]
    fn null_soft_reports_null() {
        let s: SoftPtr<i32> = SoftPtr::default();
        assert!(s.is_null());
        assert!(!s.is_valid());
        assert_eq!(s.try_get().unwrap_err(), AccessError::NullHandle);
        assert!(s.as_ptr().is_none());
    }

    #[test]
    fn soft_from_empty_owner_is_null() {
        let o: OwningPtr<i32> = OwningPtr::empty();
        assert!(o.soft().is_null());
    }

    #[test]
    fn drop_deregisters() {
        let heap = heap();
        let o: OwningPtr<i32> = OwningPtr::new_in(&heap, 1);
        let a = o.soft();
        let b = a.clone();
        assert_eq!(o.observer_count(), 2);
        drop(a);
        assert_eq!(o.observer_count(), 1);
        drop(b);
        assert_eq!(o.observer_count(), 0);
    }

    #[test]
    fn reset_owner_invalidates_all() {
        let heap = heap();
        let mut o: OwningPtr<i32> = OwningPtr::new_in(&heap, 1);
        let softs: Vec<_> = (0..12).map(|_| o.soft()).collect();
        o.reset();
        for s in &softs {
            assert_eq!(s.try_get().unwrap_err(), AccessError::Invalidated);
            assert!(!s.is_null());
        }
        assert_eq!(heap.stats().invalidations, 12);
    }

    #[test]
    fn clone_of_invalidated_is_invalidated() {
        let heap = heap();
        let mut o: OwningPtr<i32> = OwningPtr::new_in(&heap, 1);
        let s = o.soft();
        o.reset();
        let copy = s.clone();
        assert_eq!(copy.try_get().unwrap_err(), AccessError::Invalidated);
        assert!(copy.same_allocation(&s));
    }

    #[test]
    fn soft_mut_writes_are_visible_to_owner() {
        let heap = heap();
        let o: OwningPtr<Vec<u8>> = OwningPtr::new_in(&heap, vec![1]);
        let s = o.soft();
        s.get_mut().push(2);
        assert_eq!(*o.borrow(), vec![1, 2]);
    }

    #[test]
    fn conflicting_borrows_rejected() {
        let heap = heap();
        let o: OwningPtr<u8> = OwningPtr::new_in(&heap, 1);
        let a = o.soft();
        let b = o.soft();
        let read = a.get();
        assert!(matches!(
            b.try_get_mut(),
            Err(AccessError::BorrowConflict { .. })
        ));
        drop(read);
        let write = b.get_mut();
        assert!(matches!(
            a.try_get(),
            Err(AccessError::BorrowConflict { .. })
        ));
        drop(write);
    }

    #[test]
    fn move_keeps_registration() {
        let heap = heap();
        let o: OwningPtr<u8> = OwningPtr::new_in(&heap, 5);
        let mut a = o.soft();
        let slot = a.slot_id();
        let b = mem::take(&mut a);
        assert!(a.is_null());
        assert_eq!(b.slot_id(), slot);
        assert_eq!(o.observer_count(), 1);
        drop(a);
        assert_eq!(*b.get(), 5);
    }

    #[test]
    fn many_softs_spill_past_inline_slots() {
        let heap = heap();
        let o: OwningPtr<u8> = OwningPtr::new_in(&heap, 0);
        let softs: Vec<_> = (0..CONTROL_BLOCK_INLINE_SLOTS * 3).map(|_| o.soft()).collect();
        assert!(o.observer_capacity() > CONTROL_BLOCK_INLINE_SLOTS);
        assert!(softs.iter().all(SoftPtr::is_valid));
    }

    #[test]
    #[should_panic(expected = "control block exhausted")]
    fn exhaustion_is_fatal() {
        let heap = Heap::new(HeapConfig {
            max_slots_per_block: CONTROL_BLOCK_INLINE_SLOTS as u32,
            ..HeapConfig::new()
        })
        .unwrap();
        let o: OwningPtr<u8> = OwningPtr::new_in(&heap, 0);
        let _softs: Vec<_> = (0..=CONTROL_BLOCK_INLINE_SLOTS).map(|_| o.soft()).collect();
    }

    #[test]
    fn unchecked_soft_has_no_slot() {
        let heap = heap();
        let o: OwningPtr<u8, Unchecked> = OwningPtr::new_in(&heap, 3);
        let s = o.soft();
        assert!(s.slot_id().is_none());
        assert_eq!(*s.get(), 3);
        assert_eq!(heap.stats().soft_registrations, 0);
    }

    #[test]
    fn equality_is_same_allocation() {
        let heap = heap();
        let o1: OwningPtr<u8> = OwningPtr::new_in(&heap, 1);
        let o2: OwningPtr<u8> = OwningPtr::new_in(&heap, 1);
        assert_eq!(o1.soft(), o1.soft());
        assert_ne!(o1.soft(), o2.soft());
        assert_eq!(SoftPtr::<u8>::null(), SoftPtr::null());
        assert_ne!(o1.soft(), SoftPtr::null());
    }

    #[test]
    fn reset_and_swap() {
        let heap = heap();
        let o1: OwningPtr<u8> = OwningPtr::new_in(&heap, 1);
        let o2: OwningPtr<u8> = OwningPtr::new_in(&heap, 2);
        let mut a = o1.soft();
        let mut b = o2.soft();
        a.swap(&mut b);
        assert_eq!(*a.get(), 2);
        assert_eq!(*b.get(), 1);
        a.reset();
        assert!(a.is_null());
        assert_eq!(o2.observer_count(), 0);
    }

    proptest! {
        #[test]
        fn invalidation_independent_of_drop_order(
            count in 1usize..24,
            order in prop::collection::vec(any::<prop::sample::Index>(), 0..24),
        ) {
            let heap = heap();
            let mut o: OwningPtr<u32> = OwningPtr::new_in(&heap, 7);
            let mut softs: Vec<_> = (0..count).map(|_| o.soft()).collect();
            for ix in &order {
                if softs.len() > 1 {
                    let victim = ix.index(softs.len());
                    softs.remove(victim);
                }
            }
            prop_assert_eq!(o.observer_count(), softs.len());
            o.reset();
            for s in &softs {
                prop_assert_eq!(s.try_get().unwrap_err(), AccessError::Invalidated);
            }
        }
    }
}
