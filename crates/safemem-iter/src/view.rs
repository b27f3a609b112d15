//! Handles an [`ArrayIter`](crate::ArrayIter) can iterate through.

use safemem_core::{AccessError, SafetyMode};
use safemem_heap::{Ref, RefMut, SoftPtr};

use crate::fixed_array::FixedArray;

/// A soft handle to a contiguous run of elements.
///
/// Every access goes through the handle, so an iterator over a destroyed
/// array reports [`AccessError::Invalidated`] instead of reading it.
pub trait ArrayView {
    /// Element type.
    type Elem;

    /// Borrow the elements.
    fn view(&self) -> Result<Ref<'_, [Self::Elem]>, AccessError>;

    /// Mutably borrow the elements.
    fn view_mut(&self) -> Result<RefMut<'_, [Self::Elem]>, AccessError>;

    /// Element count. Stays known after the array is destroyed.
    fn len(&self) -> usize;

    /// Whether the array has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the handle observes nothing.
    fn is_null(&self) -> bool;

    /// Whether both handles observe the same allocation.
    fn same_range(&self, other: &Self) -> bool;
}

impl<E, S: SafetyMode> ArrayView for SoftPtr<[E], S> {
    type Elem = E;

    fn view(&self) -> Result<Ref<'_, [E]>, AccessError> {
        self.try_get()
    }

    fn view_mut(&self) -> Result<RefMut<'_, [E]>, AccessError> {
        self.try_get_mut()
    }

    fn len(&self) -> usize {
        self.capacity()
    }

    fn is_null(&self) -> bool {
        SoftPtr::is_null(self)
    }

    fn same_range(&self, other: &Self) -> bool {
        self.same_allocation(other)
    }
}

impl<T, const N: usize, S: SafetyMode> ArrayView for SoftPtr<FixedArray<T, N, S>, S> {
    type Elem = T;

    fn view(&self) -> Result<Ref<'_, [T]>, AccessError> {
        Ok(Ref::map(self.try_get()?, |a| a.as_slice()))
    }

    fn view_mut(&self) -> Result<RefMut<'_, [T]>, AccessError> {
        Ok(RefMut::map(self.try_get_mut()?, |a| a.as_mut_slice()))
    }

    fn len(&self) -> usize {
        if SoftPtr::is_null(self) {
            0
        } else {
            N
        }
    }

    fn is_null(&self) -> bool {
        SoftPtr::is_null(self)
    }

    fn same_range(&self, other: &Self) -> bool {
        self.same_allocation(other)
    }
}
