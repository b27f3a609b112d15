//! Fixed-size array consumer.
//!
//! [`FixedArray`] is an inline `[T; N]` with checked element access. Inside
//! a scope it iterates through a [`StackIter`]; when it lives on a safemem
//! heap, [`FixedArray::begin_safe`] builds an [`ArrayIter`] that goes
//! through a soft handle to the whole array and so outlives nothing.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use safemem_core::{fatal, AccessError, Safe, SafetyMode};
use safemem_heap::SoftPtr;

use crate::array_iter::ArrayIter;
use crate::stack_iter::StackIter;

/// `N` elements stored inline, every access bounds-checked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FixedArray<T, const N: usize, S: SafetyMode = Safe> {
    items: [T; N],
    _mode: PhantomData<S>,
}

/// Heap-safe iterator over a [`FixedArray`] behind a soft handle.
pub type FixedArrayIter<T, const N: usize, S = Safe> = ArrayIter<SoftPtr<FixedArray<T, N, S>, S>>;

impl<T, const N: usize, S: SafetyMode> FixedArray<T, N, S> {
    /// Wrap `items`.
    pub fn new(items: [T; N]) -> Self {
        Self {
            items,
            _mode: PhantomData,
        }
    }

    /// Build element `i` with `f(i)`.
    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Self::new(std::array::from_fn(f))
    }

    /// Number of elements.
    pub const fn len(&self) -> usize {
        N
    }

    /// Whether `N == 0`.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Element `ix`.
    pub fn try_at(&self, ix: usize) -> Result<&T, AccessError> {
        self.items
            .get(ix)
            .ok_or(AccessError::OutOfRange { index: ix, len: N })
    }

    /// Element `ix`. Fatal if out of range.
    #[track_caller]
    pub fn at(&self, ix: usize) -> &T {
        self.try_at(ix).unwrap_or_else(|err| fatal(err))
    }

    /// Mutable element `ix`.
    pub fn try_at_mut(&mut self, ix: usize) -> Result<&mut T, AccessError> {
        self.items
            .get_mut(ix)
            .ok_or(AccessError::OutOfRange { index: ix, len: N })
    }

    /// Mutable element `ix`. Fatal if out of range.
    #[track_caller]
    pub fn at_mut(&mut self, ix: usize) -> &mut T {
        self.try_at_mut(ix).unwrap_or_else(|err| fatal(err))
    }

    /// First element. Fatal if empty.
    #[track_caller]
    pub fn front(&self) -> &T {
        self.at(0)
    }

    /// Last element. Fatal if empty.
    #[track_caller]
    pub fn back(&self) -> &T {
        match N.checked_sub(1) {
            Some(last) => self.at(last),
            None => fatal(AccessError::OutOfRange { index: 0, len: 0 }),
        }
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.items.fill(value);
    }

    /// Exchange contents with `other`.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.items, &mut other.items);
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Scoped iterator over the elements.
    pub fn iter(&self) -> StackIter<'_, T> {
        StackIter::begin(&self.items)
    }

    /// Scoped iterator at the end position.
    pub fn iter_end(&self) -> StackIter<'_, T> {
        StackIter::end(&self.items)
    }

    /// Whether `it` walks this array and sits within `[0, N]`.
    pub fn validate_iterator(&self, it: &StackIter<'_, T>) -> bool {
        it.belongs_to(&self.items)
    }

    /// Heap-safe iterator at the first element of the array behind `this`.
    #[track_caller]
    pub fn begin_safe(this: &SoftPtr<Self, S>) -> FixedArrayIter<T, N, S> {
        ArrayIter::begin(this)
    }

    /// Heap-safe iterator at the end of the array behind `this`.
    #[track_caller]
    pub fn end_safe(this: &SoftPtr<Self, S>) -> FixedArrayIter<T, N, S> {
        ArrayIter::end(this)
    }
}

impl<T: Default, const N: usize, S: SafetyMode> Default for FixedArray<T, N, S> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T, const N: usize, S: SafetyMode> Index<usize> for FixedArray<T, N, S> {
    type Output = T;

    #[track_caller]
    fn index(&self, ix: usize) -> &T {
        self.at(ix)
    }
}

impl<T, const N: usize, S: SafetyMode> IndexMut<usize> for FixedArray<T, N, S> {
    #[track_caller]
    fn index_mut(&mut self, ix: usize) -> &mut T {
        self.at_mut(ix)
    }
}

impl<T, const N: usize, S: SafetyMode> From<[T; N]> for FixedArray<T, N, S> {
    fn from(items: [T; N]) -> Self {
        Self::new(items)
    }
}
