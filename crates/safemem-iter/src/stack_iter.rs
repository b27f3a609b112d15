//! Stack-only array iterator.
//!
//! [`StackIter`] borrows its slice, so the compiler already guarantees the
//! elements outlive it. It keeps the same clamping and unrelated-range
//! rules as [`ArrayIter`](crate::ArrayIter) so code can switch between the
//! two without changing behaviour. Like `ArrayIter` it is a position;
//! [`StackIter::values`] walks the elements.

use std::cmp::Ordering;
use std::ops::{Add, Sub};
use std::ptr;
use std::slice;

use safemem_core::{fatal, AccessError};

use crate::cursor::Cursor;

/// Clamped iterator over a borrowed slice.
#[derive(Debug)]
pub struct StackIter<'a, E> {
    items: &'a [E],
    cursor: Cursor,
}

impl<E> Clone for StackIter<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for StackIter<'_, E> {}

impl<'a, E> StackIter<'a, E> {
    /// Iterator over `items` at `ix`, clamped to the slice length.
    pub fn new(items: &'a [E], ix: usize) -> Self {
        Self {
            items,
            cursor: Cursor::new(ix, items.len()),
        }
    }

    /// Iterator at the first element.
    pub fn begin(items: &'a [E]) -> Self {
        Self::new(items, 0)
    }

    /// Iterator at the end position.
    pub fn end(items: &'a [E]) -> Self {
        Self::new(items, items.len())
    }

    /// Current position.
    pub fn index(&self) -> usize {
        self.cursor.index()
    }

    /// Whether the iterator sits at the end position.
    pub fn is_end(&self) -> bool {
        self.cursor.is_end()
    }

    /// Current element.
    pub fn try_get(&self) -> Result<&'a E, AccessError> {
        let ix = self.cursor.check()?;
        Ok(&self.items[ix])
    }

    /// Current element. Fatal at the end position.
    #[track_caller]
    pub fn get(&self) -> &'a E {
        self.try_get().unwrap_or_else(|err| fatal(err))
    }

    /// Element `n` positions away, without moving.
    pub fn try_at(&self, n: isize) -> Result<&'a E, AccessError> {
        let ix = self.cursor.offset(n)?;
        Ok(&self.items[ix])
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

    /// The elements from the current position to the end.
    pub fn values(&self) -> slice::Iter<'a, E> {
        let items: &'a [E] = self.items;
        items[self.cursor.index()..].iter()
    }

    /// Whether both iterators walk the same slice.
    pub fn same_range(&self, other: &Self) -> bool {
        ptr::eq(self.items, other.items)
    }

    /// Whether this iterator walks `items` and sits within `[0, len]`.
    pub fn belongs_to(&self, items: &[E]) -> bool {
        ptr::eq(self.items, items) && self.cursor.index() <= items.len()
    }

    /// Signed distance `self - other`.
    pub fn try_distance(&self, other: &Self) -> Result<isize, AccessError> {
        if !self.same_range(other) {
            return Err(AccessError::UnrelatedRanges);
        }
        Ok(self.cursor.distance(other.cursor))
    }
}

impl<E> Add<isize> for StackIter<'_, E> {
    type Output = Self;

    fn add(mut self, n: isize) -> Self {
        self.cursor.advance(n);
        self
    }
}

impl<E> Sub<isize> for StackIter<'_, E> {
    type Output = Self;

    fn sub(mut self, n: isize) -> Self {
        self.cursor.advance(n.saturating_neg());
        self
    }
}

/// Element distance. Fatal for iterators over different slices.
impl<'a, E> Sub for StackIter<'a, E> {
    type Output = isize;

    #[track_caller]
    fn sub(self, other: Self) -> isize {
        self.try_distance(&other).unwrap_or_else(|err| fatal(err))
    }
}

/// Fatal for iterators over different slices.
impl<E> PartialEq for StackIter<'_, E> {
    #[track_caller]
    fn eq(&self, other: &Self) -> bool {
        if !self.same_range(other) {
            fatal(AccessError::UnrelatedRanges);
        }
        self.cursor.index() == other.cursor.index()
    }
}

impl<E> PartialOrd for StackIter<'_, E> {
    #[track_caller]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.same_range(other) {
            fatal(AccessError::UnrelatedRanges);
        }
        Some(self.cursor.index().cmp(&other.cursor.index()))
    }
}
