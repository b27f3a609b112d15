//! Heap-safe array iterator.
//!
//! An [`ArrayIter`] pairs a soft handle to an array with a clamped
//! [`Cursor`]. Arithmetic never fails and never leaves `[0, len]`;
//! dereferencing checks liveness first and bounds second. Comparing or
//! subtracting iterators over different arrays is a fatal error.
//!
//! `ArrayIter` is a position, not a [`std::iter::Iterator`]: the iterator
//! combinators `eq`/`lt`/`partial_cmp` would otherwise shadow the checked
//! comparisons under method syntax. Element iteration goes through
//! [`ArrayIter::values`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use safemem_core::{fatal, AccessError};
use safemem_heap::{Ref, RefMut};

use crate::cursor::Cursor;
use crate::view::ArrayView;

/// Bounds- and liveness-checked iterator over an [`ArrayView`].
pub struct ArrayIter<P: ArrayView> {
    arr: P,
    cursor: Cursor,
}

impl<P: ArrayView> ArrayIter<P> {
    /// Iterator over `arr` at `ix`, clamped to the array's length.
    pub fn new(arr: P, ix: usize) -> Self {
        let len = arr.len();
        Self {
            arr,
            cursor: Cursor::new(ix, len),
        }
    }

    /// Iterator at the first element.
    pub fn begin(arr: &P) -> Self
    where
        P: Clone,
    {
        Self::new(arr.clone(), 0)
    }

    /// Iterator at the end position.
    pub fn end(arr: &P) -> Self
    where
        P: Clone,
    {
        let len = arr.len();
        Self::new(arr.clone(), len)
    }

    /// Current position.
    pub fn index(&self) -> usize {
        self.cursor.index()
    }

    /// Length of the iterated array.
    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    /// Whether the iterated array is empty.
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    /// Whether the iterator sits at the end position.
    pub fn is_end(&self) -> bool {
        self.cursor.is_end()
    }

    /// Whether the iterator has no array.
    pub fn is_null(&self) -> bool {
        self.arr.is_null()
    }

    /// The handle being iterated.
    pub fn array(&self) -> &P {
        &self.arr
    }

    /// Borrow the current element.
    pub fn try_get(&self) -> Result<Ref<'_, P::Elem>, AccessError> {
        let view = self.arr.view()?;
        let ix = Cursor::new(self.cursor.index(), view.len()).check()?;
        Ok(Ref::map(view, |v| &v[ix]))
    }

    /// Borrow the current element. Fatal at the end position or if the
    /// array is gone.
    #[track_caller]
    pub fn get(&self) -> Ref<'_, P::Elem> {
        self.try_get().unwrap_or_else(|err| fatal(err))
    }

    /// Mutably borrow the current element.
    pub fn try_get_mut(&self) -> Result<RefMut<'_, P::Elem>, AccessError> {
        let view = self.arr.view_mut()?;
        let ix = Cursor::new(self.cursor.index(), view.len()).check()?;
        Ok(RefMut::map(view, |v| &mut v[ix]))
    }

    /// Mutably borrow the current element. Fatal on any access error.
    #[track_caller]
    pub fn get_mut(&self) -> RefMut<'_, P::Elem> {
        self.try_get_mut().unwrap_or_else(|err| fatal(err))
    }

    /// Borrow the element `n` positions away, without moving.
    pub fn try_at(&self, n: isize) -> Result<Ref<'_, P::Elem>, AccessError> {
        let view = self.arr.view()?;
        let ix = Cursor::new(self.cursor.index(), view.len()).offset(n)?;
        Ok(Ref::map(view, |v| &v[ix]))
    }

    /// Borrow the element `n` positions away. Fatal if out of range.
    #[track_caller]
    pub fn at(&self, n: isize) -> Ref<'_, P::Elem> {
        self.try_at(n).unwrap_or_else(|err| fatal(err))
    }

    /// Step forward; parks at the end.
    pub fn inc(&mut self) -> &mut Self {
        self.cursor.inc();
        self
    }

    /// Step back; parks at 0.
    pub fn dec(&mut self) -> &mut Self {
        self.cursor.dec();
        self
    }

    /// Move by `n`, clamped to `[0, len]`.
    pub fn advance(&mut self, n: isize) -> &mut Self {
        self.cursor.advance(n);
        self
    }

    /// Signed distance `self - other`.
    pub fn try_distance(&self, other: &Self) -> Result<isize, AccessError> {
        self.related(other)?;
        Ok(self.cursor.distance(other.cursor))
    }

    /// Equality, failing for iterators over different arrays.
    ///
    /// An iterator without an array equals nothing.
    pub fn try_eq(&self, other: &Self) -> Result<bool, AccessError> {
        if self.is_null() || other.is_null() {
            return Ok(false);
        }
        self.related(other)?;
        Ok(self.cursor.index() == other.cursor.index())
    }

    /// Ordering, failing for iterators over different or no arrays.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, AccessError> {
        if self.is_null() || other.is_null() {
            return Err(AccessError::NullHandle);
        }
        self.related(other)?;
        Ok(self.cursor.index().cmp(&other.cursor.index()))
    }

    fn related(&self, other: &Self) -> Result<(), AccessError> {
        if self.arr.same_range(&other.arr) || (self.is_null() && other.is_null()) {
            Ok(())
        } else {
            Err(AccessError::UnrelatedRanges)
        }
    }

    /// Clones of the elements from the current position to the end.
    pub fn values(&self) -> ArrayValues<P>
    where
        P: Clone,
    {
        self.clone().into_values()
    }

    /// Like [`values`](Self::values), consuming the position.
    pub fn into_values(self) -> ArrayValues<P> {
        ArrayValues { pos: self }
    }

    /// Check the iterator is usable: the array is alive and the position
    /// is within `[0, len]`.
    pub fn validate(&self) -> Result<(), AccessError> {
        let view = self.arr.view()?;
        if self.cursor.index() > view.len() {
            return Err(AccessError::OutOfRange {
                index: self.cursor.index(),
                len: view.len(),
            });
        }
        Ok(())
    }
}

impl<P: ArrayView + Clone> Clone for ArrayIter<P> {
    fn clone(&self) -> Self {
        Self {
            arr: self.arr.clone(),
            cursor: self.cursor,
        }
    }
}

impl<P: ArrayView + Default> Default for ArrayIter<P> {
    fn default() -> Self {
        Self {
            arr: P::default(),
            cursor: Cursor::default(),
        }
    }
}

impl<P: ArrayView> Add<isize> for ArrayIter<P> {
    type Output = Self;

    fn add(mut self, n: isize) -> Self {
        self.cursor.advance(n);
        self
    }
}

impl<P: ArrayView> AddAssign<isize> for ArrayIter<P> {
    fn add_assign(&mut self, n: isize) {
        self.cursor.advance(n);
    }
}

impl<P: ArrayView> Sub<isize> for ArrayIter<P> {
    type Output = Self;

    fn sub(mut self, n: isize) -> Self {
        self.cursor.advance(n.saturating_neg());
        self
    }
}

impl<P: ArrayView> SubAssign<isize> for ArrayIter<P> {
    fn sub_assign(&mut self, n: isize) {
        self.cursor.advance(n.saturating_neg());
    }
}

/// Element distance. Fatal for iterators over different arrays.
impl<P: ArrayView> Sub for &ArrayIter<P> {
    type Output = isize;

    #[track_caller]
    fn sub(self, other: Self) -> isize {
        self.try_distance(other).unwrap_or_else(|err| fatal(err))
    }
}

/// Fatal for iterators over different arrays.
impl<P: ArrayView> PartialEq for ArrayIter<P> {
    #[track_caller]
    fn eq(&self, other: &Self) -> bool {
        self.try_eq(other).unwrap_or_else(|err| fatal(err))
    }
}

/// `None` when either side has no array; fatal for different arrays.
impl<P: ArrayView> PartialOrd for ArrayIter<P> {
    #[track_caller]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.try_cmp(other) {
            Ok(ordering) => Some(ordering),
            Err(AccessError::NullHandle) => None,
            Err(err) => fatal(err),
        }
    }
}

/// Element iterator returned by [`ArrayIter::values`].
///
/// Yields clones of the remaining elements. Fatal if the array is
/// destroyed mid-iteration.
pub struct ArrayValues<P: ArrayView> {
    pos: ArrayIter<P>,
}

impl<P: ArrayView> ArrayValues<P> {
    /// The position of the next element.
    pub fn position(&self) -> &ArrayIter<P> {
        &self.pos
    }
}

impl<P: ArrayView> Iterator for ArrayValues<P>
where
    P::Elem: Clone,
{
    type Item = P::Elem;

    #[track_caller]
    fn next(&mut self) -> Option<P::Elem> {
        if self.pos.is_end() {
            return None;
        }
        let item = self.pos.get().clone();
        self.pos.inc();
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pos.len() - self.pos.index();
        (remaining, Some(remaining))
    }
}

impl<P: ArrayView> ExactSizeIterator for ArrayValues<P> where P::Elem: Clone {}

impl<P: ArrayView> fmt::Debug for ArrayIter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayIter")
            .field("index", &self.cursor.index())
            .field("len", &self.cursor.len())
            .field("null", &self.is_null())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use safemem_heap::{Heap, HeapConfig, OwningPtr, SoftPtr};

    type Iter = ArrayIter<SoftPtr<[i32]>>;

    fn array(heap: &Heap, len: usize) -> OwningPtr<[i32]> {
        OwningPtr::new_array_in(heap, len, |i| i as i32)
    }

    fn heap() -> Heap {
        Heap::new(HeapConfig::default()).unwrap()
    }

    #[test]
    fn begin_plus_ten_clamps_to_end() {
        let heap = heap();
        let a = array(&heap, 5);
        let s = a.soft();
        let it = Iter::begin(&s) + 10;
        assert!(it.is_end());
        assert_eq!(it.try_get().unwrap_err(), AccessError::OutOfRange { index: 5, len: 5 });
        assert_eq!(&it - &Iter::begin(&s), 5);
        assert!(it == Iter::end(&s));
    }

    #[test]
    fn walk_forward_and_back() {
        let heap = heap();
        let a = array(&heap, 3);
        let s = a.soft();
        let mut it = Iter::begin(&s);
        assert_eq!(*it.get(), 0);
        it.inc().inc();
        assert_eq!(*it.get(), 2);
        it.dec().dec().dec().dec();
        assert_eq!(it.index(), 0);
        assert_eq!(*it.at(2), 2);
        assert!(it.try_at(3).is_err());
        assert!(it.try_at(-1).is_err());
    }

    #[test]
    fn write_through_iterator() {
        let heap = heap();
        let a = array(&heap, 2);
        let s = a.soft();
        let it = Iter::begin(&s) + 1;
        *it.get_mut() = 40;
        assert_eq!(*a.at(1), 40);
    }

    #[test]
    fn values_clone_remaining_elements() {
        let heap = heap();
        let a = array(&heap, 4);
        let s = a.soft();
        let it = Iter::begin(&s) + 1;
        assert_eq!(it.values().len(), 3);
        assert_eq!(it.values().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(it.index(), 1);
        let mut values = it.into_values();
        values.next();
        assert_eq!(values.position().index(), 2);
    }

    #[test]
    fn destroyed_array_invalidates_iterator() {
        let heap = heap();
        let mut a = array(&heap, 4);
        let s = a.soft();
        let it = Iter::begin(&s) + 1;
        assert!(it.validate().is_ok());
        a.reset();
        assert_eq!(it.try_get().unwrap_err(), AccessError::Invalidated);
        assert_eq!(it.validate(), Err(AccessError::Invalidated));
        assert_eq!(it.len(), 4);
    }

    #[test]
    #[should_panic(expected = "safemem: comparing unrelated ranges")]
    fn comparing_unrelated_is_fatal() {
        let heap = heap();
        let a = array(&heap, 2);
        let b = array(&heap, 2);
        let (sa, sb) = (a.soft(), b.soft());
        let _ = Iter::begin(&sa) == Iter::begin(&sb);
    }

    #[test]
    #[should_panic(expected = "safemem: comparing unrelated ranges")]
    fn method_eq_on_unrelated_is_fatal() {
        let heap = heap();
        let a = array(&heap, 3);
        let b = array(&heap, 3);
        let (sa, sb) = (a.soft(), b.soft());
        let _ = Iter::begin(&sa).eq(&Iter::begin(&sb));
    }

    #[test]
    #[should_panic(expected = "safemem: comparing unrelated ranges")]
    fn method_partial_cmp_on_unrelated_is_fatal() {
        let heap = heap();
        let a = array(&heap, 3);
        let b = array(&heap, 3);
        let (sa, sb) = (a.soft(), b.soft());
        let _ = Iter::begin(&sa).partial_cmp(&Iter::end(&sb));
    }

    #[test]
    #[should_panic(expected = "safemem: comparing unrelated ranges")]
    fn subtracting_unrelated_is_fatal() {
        let heap = heap();
        let a = array(&heap, 2);
        let b = array(&heap, 2);
        let (sa, sb) = (a.soft(), b.soft());
        let _ = &Iter::begin(&sa) - &Iter::begin(&sb);
    }

    #[test]
    fn null_iterators_compare_unequal() {
        let heap = heap();
        let a = array(&heap, 2);
        let s = a.soft();
        let null = Iter::default();
        assert!(null.is_null());
        assert!(null != Iter::default());
        assert!(Iter::begin(&s) != null);
        assert_eq!(Iter::begin(&s).partial_cmp(&null), None);
        assert_eq!(null.validate(), Err(AccessError::NullHandle));
    }

    #[test]
    fn ordering_within_one_array() {
        let heap = heap();
        let a = array(&heap, 5);
        let s = a.soft();
        let lo = Iter::begin(&s) + 1;
        let hi = Iter::begin(&s) + 3;
        assert!(lo < hi);
        assert_eq!(&lo - &hi, -2);
        assert_eq!(hi.clone() - 2, lo);
    }

    proptest! {
        #[test]
        fn arithmetic_never_fails_and_end_never_derefs(
            len in 0usize..16,
            steps in prop::collection::vec(-20isize..20, 0..24),
        ) {
            let heap = heap();
            let a = array(&heap, len);
            let s = a.soft();
            let mut it = Iter::begin(&s);
            for n in steps {
                it += n;
                prop_assert!(it.index() <= len);
                match it.try_get() {
                    Ok(v) => prop_assert_eq!(*v, it.index() as i32),
                    Err(e) => {
                        prop_assert!(it.is_end());
                        prop_assert_eq!(e, AccessError::OutOfRange { index: len, len });
                    }
                }
            }
        }
    }
}
