//! Dynamic borrow tracking for managed objects.
//!
//! Handles never hand out bare references. Dereferencing produces a
//! [`Ref`] or [`RefMut`] guard that holds a shared or exclusive borrow on
//! the allocation's [`BorrowFlag`]. The owner refuses to destroy an
//! allocation while any guard is alive, so a guard can never outlive the
//! object it points at.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use safemem_core::{AccessError, BorrowMode};

const UNUSED: isize = 0;
const WRITING: isize = -1;

/// Reader count, or `-1` while a writer holds the allocation.
#[derive(Debug, Default)]
pub(crate) struct BorrowFlag(Cell<isize>);

impl BorrowFlag {
    pub(crate) const fn new() -> Self {
        Self(Cell::new(UNUSED))
    }

    pub(crate) fn try_shared(&self) -> Result<(), AccessError> {
        let count = self.0.get();
        if count == WRITING {
            return Err(AccessError::BorrowConflict {
                mode: BorrowMode::Exclusive,
            });
        }
        // isize::MAX readers would need more guards than fit in memory.
        self.0.set(count + 1);
        Ok(())
    }

    pub(crate) fn try_exclusive(&self) -> Result<(), AccessError> {
        match self.0.get() {
            UNUSED => {
                self.0.set(WRITING);
                Ok(())
            }
            WRITING => Err(AccessError::BorrowConflict {
                mode: BorrowMode::Exclusive,
            }),
            _ => Err(AccessError::BorrowConflict {
                mode: BorrowMode::Shared,
            }),
        }
    }

    pub(crate) fn is_borrowed(&self) -> bool {
        self.0.get() != UNUSED
    }

    fn release_shared(&self) {
        let count = self.0.get();
        debug_assert!(count > 0);
        self.0.set(count - 1);
    }

    fn release_exclusive(&self) {
        debug_assert_eq!(self.0.get(), WRITING);
        self.0.set(UNUSED);
    }
}

/// Shared borrow of a managed object.
pub struct Ref<'a, T: ?Sized> {
    value: NonNull<T>,
    flag: &'a BorrowFlag,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: ?Sized> Ref<'a, T> {
    /// # Safety
    ///
    /// A shared borrow must already be recorded on `flag`, and `value` must
    /// stay valid for reads while that borrow is held.
    pub(crate) unsafe fn new(value: NonNull<T>, flag: &'a BorrowFlag) -> Self {
        Self {
            value,
            flag,
            _marker: PhantomData,
        }
    }

    /// Project the guard onto a part of the borrowed value.
    ///
    /// An associated function so it does not shadow methods of `T`.
    pub fn map<U: ?Sized>(orig: Ref<'a, T>, f: impl FnOnce(&T) -> &U) -> Ref<'a, U> {
        let value = NonNull::from(f(&*orig));
        let flag = orig.flag;
        // The borrow moves to the projected guard.
        mem::forget(orig);
        Ref {
            value,
            flag,
            _marker: PhantomData,
        }
    }

    /// Take a second shared borrow of the same value.
    #[allow(clippy::should_implement_trait)]
    pub fn clone(orig: &Ref<'a, T>) -> Ref<'a, T> {
        let count = orig.flag.0.get();
        orig.flag.0.set(count + 1);
        Ref {
            value: orig.value,
            flag: orig.flag,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Deref for Ref<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the shared borrow recorded on `flag` keeps the object alive
        // and free of writers until this guard drops.
        unsafe { self.value.as_ref() }
    }
}

impl<T: ?Sized> Drop for Ref<'_, T> {
    fn drop(&mut self) {
        self.flag.release_shared();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Ref<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Ref<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// Exclusive borrow of a managed object.
pub struct RefMut<'a, T: ?Sized> {
    value: NonNull<T>,
    flag: &'a BorrowFlag,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T: ?Sized> RefMut<'a, T> {
    /// # Safety
    ///
    /// An exclusive borrow must already be recorded on `flag`, and `value`
    /// must stay valid for reads and writes while that borrow is held.
    pub(crate) unsafe fn new(value: NonNull<T>, flag: &'a BorrowFlag) -> Self {
        Self {
            value,
            flag,
            _marker: PhantomData,
        }
    }

    /// Project the guard onto a part of the borrowed value.
    pub fn map<U: ?Sized>(mut orig: RefMut<'a, T>, f: impl FnOnce(&mut T) -> &mut U) -> RefMut<'a, U> {
        let value = NonNull::from(f(&mut *orig));
        let flag = orig.flag;
        mem::forget(orig);
        RefMut {
            value,
            flag,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Deref for RefMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the exclusive borrow recorded on `flag` keeps the object
        // alive and unaliased until this guard drops.
        unsafe { self.value.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for RefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`; `&mut self` makes this the only live access.
        unsafe { self.value.as_mut() }
    }
}

impl<T: ?Sized> Drop for RefMut<'_, T> {
    fn drop(&mut self) {
        self.flag.release_exclusive();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RefMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for RefMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
