//! Zero-offset array allocations.
//!
//! An array lives in one block: the header records the capacity and the
//! elements follow at the payload offset. The owning and soft handles over
//! `[E]` address elements by index; every index is checked against the
//! capacity before it becomes a reference or a raw pointer. Reallocating an
//! array is an ordinary owner reset, so soft handles to the old buffer are
//! invalidated like any other.

use std::mem;
use std::ptr::NonNull;

use safemem_core::{fatal, AccessError, SafetyMode};

use crate::borrow::{Ref, RefMut};
use crate::error::HeapError;
use crate::heap::Heap;
use crate::owning::OwningPtr;
use crate::shared::Shared;
use crate::soft::SoftPtr;

fn bounds(index: usize, len: usize) -> Result<(), AccessError> {
    if index < len {
        Ok(())
    } else {
        Err(AccessError::OutOfRange { index, len })
    }
}

impl<E, S: SafetyMode> OwningPtr<[E], S> {
    /// Allocate `capacity` elements on the thread's default heap.
    #[track_caller]
    pub fn new_array(capacity: usize, init: impl FnMut(usize) -> E) -> Self {
        Self::new_array_in(&Heap::current(), capacity, init)
    }

    /// Allocate `capacity` elements on `heap`, element `i` built by
    /// `init(i)`. Allocation failure is fatal.
    #[track_caller]
    pub fn new_array_in(heap: &Heap, capacity: usize, init: impl FnMut(usize) -> E) -> Self {
        Self::try_new_array_in(heap, capacity, init).unwrap_or_else(|err| fatal(err))
    }

    /// Allocate `capacity` elements on `heap`.
    pub fn try_new_array_in(
        heap: &Heap,
        capacity: usize,
        init: impl FnMut(usize) -> E,
    ) -> Result<Self, HeapError> {
        let shared = Shared::allocate_array(heap, capacity, init, S::is_safe())?;
        Ok(Self::from_shared(shared))
    }

    /// Element count, 0 if empty.
    pub fn capacity(&self) -> usize {
        self.shared().map_or(0, |s| s.elements())
    }

    /// Borrow element `index`.
    pub fn try_at(&self, index: usize) -> Result<Ref<'_, E>, AccessError> {
        let array = self.try_borrow()?;
        bounds(index, array.len())?;
        Ok(Ref::map(array, |a| &a[index]))
    }

    /// Borrow element `index`. Fatal if out of range.
    #[track_caller]
    pub fn at(&self, index: usize) -> Ref<'_, E> {
        self.try_at(index).unwrap_or_else(|err| fatal(err))
    }

    /// Mutably borrow element `index`.
    pub fn try_at_mut(&mut self, index: usize) -> Result<RefMut<'_, E>, AccessError> {
        let array = self.try_borrow_mut()?;
        bounds(index, array.len())?;
        Ok(RefMut::map(array, |a| &mut a[index]))
    }

    /// Mutably borrow element `index`. Fatal if out of range.
    #[track_caller]
    pub fn at_mut(&mut self, index: usize) -> RefMut<'_, E> {
        self.try_at_mut(index).unwrap_or_else(|err| fatal(err))
    }
}

impl<E, S: SafetyMode> SoftPtr<[E], S> {
    /// Element count of the observed array, 0 if null.
    ///
    /// Still answers after the owner is destroyed.
    pub fn capacity(&self) -> usize {
        self.shared().map_or(0, |s| s.elements())
    }

    /// Borrow element `index`.
    pub fn try_at(&self, index: usize) -> Result<Ref<'_, E>, AccessError> {
        let array = self.try_get()?;
        bounds(index, array.len())?;
        Ok(Ref::map(array, |a| &a[index]))
    }

    /// Borrow element `index`. Fatal on any access error.
    #[track_caller]
    pub fn at(&self, index: usize) -> Ref<'_, E> {
        self.try_at(index).unwrap_or_else(|err| fatal(err))
    }

    /// Mutably borrow element `index`.
    pub fn try_at_mut(&self, index: usize) -> Result<RefMut<'_, E>, AccessError> {
        let array = self.try_get_mut()?;
        bounds(index, array.len())?;
        Ok(RefMut::map(array, |a| &mut a[index]))
    }

    /// Mutably borrow element `index`. Fatal on any access error.
    #[track_caller]
    pub fn at_mut(&self, index: usize) -> RefMut<'_, E> {
        self.try_at_mut(index).unwrap_or_else(|err| fatal(err))
    }

    fn base(&self) -> Result<NonNull<E>, AccessError> {
        let shared = self.check()?;
        shared
            .object()
            .map(NonNull::cast::<E>)
            .ok_or(AccessError::Invalidated)
    }

    /// Raw pointer to element `index`. `index == capacity` yields the
    /// one-past-the-end pointer, which must not be dereferenced.
    ///
    /// Zero-sized elements all share the base address, so every index maps
    /// to the same pointer.
    pub fn get_raw_ptr(&self, index: usize) -> Result<NonNull<E>, AccessError> {
        let len = self.capacity();
        if index > len {
            return Err(AccessError::OutOfRange { index, len });
        }
        let base = self.base()?;
        NonNull::new(base.as_ptr().wrapping_add(index)).ok_or(AccessError::Invalidated)
    }

    /// Index of the element `ptr` points at, inverse of
    /// [`get_raw_ptr`](Self::get_raw_ptr).
    ///
    /// Fails with [`AccessError::UnrelatedRanges`] for pointers outside the
    /// array or between elements. For zero-sized elements the index is not
    /// recoverable: the base address answers 0 and any other address fails.
    pub fn get_index(&self, ptr: *const E) -> Result<usize, AccessError> {
        let base = self.base()?.as_ptr() as usize;
        let addr = ptr as usize;
        let size = mem::size_of::<E>();
        if size == 0 {
            return if addr == base {
                Ok(0)
            } else {
                Err(AccessError::UnrelatedRanges)
            };
        }
        let offset = addr
            .checked_sub(base)
            .ok_or(AccessError::UnrelatedRanges)?;
        let index = offset / size;
        if offset % size != 0 || index > self.capacity() {
            return Err(AccessError::UnrelatedRanges);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;

    fn heap() -> Heap {
        Heap::new(HeapConfig::default()).unwrap()
    }

    #[test]
    fn array_is_initialised_by_index() {
        let heap = heap();
        let a: OwningPtr<[u32]> = OwningPtr::new_array_in(&heap, 5, |i| i as u32 * 10);
        assert_eq!(a.capacity(), 5);
        assert_eq!(*a.at(3), 30);
        assert_eq!(&*a.borrow(), &[0, 10, 20, 30, 40]);
    }

    #[test]
    fn owner_index_checks() {
        let heap = heap();
        let mut a: OwningPtr<[u8]> = OwningPtr::new_array_in(&heap, 2, |_| 0);
        *a.at_mut(1) = 7;
        assert_eq!(*a.at(1), 7);
        assert_eq!(
            a.try_at(2).unwrap_err(),
            AccessError::OutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn soft_array_access_and_invalidation() {
        let heap = heap();
        let mut a: OwningPtr<[u16]> = OwningPtr::new_array_in(&heap, 4, |i| i as u16);
        let s = a.soft();
        *s.at_mut(0) = 9;
        assert_eq!(*s.at(0), 9);
        assert_eq!(
            s.try_at(4).unwrap_err(),
            AccessError::OutOfRange { index: 4, len: 4 }
        );
        a.reset();
        assert_eq!(s.try_at(0).unwrap_err(), AccessError::Invalidated);
        assert_eq!(s.capacity(), 4);
    }

    #[test]
    fn raw_pointer_round_trip() {
        let heap = heap();
        let a: OwningPtr<[u64]> = OwningPtr::new_array_in(&heap, 3, |i| i as u64);
        let s = a.soft();
        for ix in 0..=3 {
            let p = s.get_raw_ptr(ix).unwrap();
            assert_eq!(s.get_index(p.as_ptr()), Ok(ix));
        }
        assert_eq!(
            s.get_raw_ptr(4).unwrap_err(),
            AccessError::OutOfRange { index: 4, len: 3 }
        );
        let base = s.get_raw_ptr(0).unwrap().as_ptr() as *const u8;
        assert_eq!(
            s.get_index(base.wrapping_add(3).cast()),
            Err(AccessError::UnrelatedRanges)
        );
        assert!(a.is_pointer_in_block(base));
    }

    #[test]
    fn empty_array_has_only_end() {
        let heap = heap();
        let a: OwningPtr<[i8]> = OwningPtr::new_array_in(&heap, 0, |_| 0);
        let s = a.soft();
        assert_eq!(s.capacity(), 0);
        assert!(s.get_raw_ptr(0).is_ok());
        assert!(s.try_at(0).is_err());
    }

    #[test]
    fn zero_sized_elements() {
        let heap = heap();
        let a: OwningPtr<[()]> = OwningPtr::new_array_in(&heap, 10, |_| ());
        let s = a.soft();
        assert_eq!(s.capacity(), 10);
        assert!(s.try_at(9).is_ok());
        let p = s.get_raw_ptr(0).unwrap();
        assert_eq!(s.get_index(p.as_ptr()), Ok(0));
        let end = s.get_raw_ptr(10).unwrap();
        assert_eq!(end, p);
        assert_eq!(s.get_index(end.as_ptr()), Ok(0));
        assert_eq!(
            s.get_index(p.as_ptr().cast::<u8>().wrapping_add(1).cast::<()>()),
            Err(AccessError::UnrelatedRanges)
        );
    }

    #[test]
    fn empty_owner_index_is_null_access() {
        let mut a: OwningPtr<[u32]> = OwningPtr::empty();
        assert_eq!(a.try_at(0).unwrap_err(), AccessError::NullHandle);
        assert_eq!(a.try_at_mut(3).unwrap_err(), AccessError::NullHandle);
        assert_eq!(a.capacity(), 0);
    }

    #[test]
    fn huge_capacity_is_layout_overflow() {
        let heap = heap();
        let err = OwningPtr::<[u64]>::try_new_array_in(&heap, usize::MAX / 4, |_| 0).unwrap_err();
        assert!(matches!(err, HeapError::LayoutOverflow { .. }));
    }

    #[test]
    fn make_array_on_heap() {
        let heap = heap();
        let a = heap.make_array(3, |i| i * 2);
        assert_eq!(*a.at(2), 4);
        let o = heap.make_owning("x");
        assert_eq!(*o.borrow(), "x");
    }
}
