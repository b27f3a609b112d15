//! Clamped iterator positions.

use safemem_core::AccessError;

/// A position in `[0, len]`.
///
/// Arithmetic saturates at both ends instead of failing: stepping past the
/// end parks at `len`, stepping before the start parks at 0. Only
/// [`check`](Cursor::check) reports the end position as an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    ix: usize,
    len: usize,
}

impl Cursor {
    /// Cursor at `ix`, clamped to `len`.
    pub fn new(ix: usize, len: usize) -> Self {
        Self {
            ix: ix.min(len),
            len,
        }
    }

    /// Cursor at 0.
    pub fn begin(len: usize) -> Self {
        Self { ix: 0, len }
    }

    /// Cursor at `len`.
    pub fn end(len: usize) -> Self {
        Self { ix: len, len }
    }

    /// Current position.
    pub fn index(self) -> usize {
        self.ix
    }

    /// Length of the underlying range.
    pub fn len(self) -> usize {
        self.len
    }

    /// Whether the range is empty.
    pub fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Whether the cursor sits at `len`.
    pub fn is_end(self) -> bool {
        self.ix == self.len
    }

    /// Step forward, stopping at `len`.
    pub fn inc(&mut self) {
        if self.ix < self.len {
            self.ix += 1;
        }
    }

    /// Step back, stopping at 0.
    pub fn dec(&mut self) {
        self.ix = self.ix.saturating_sub(1);
    }

    /// Move by `n`, clamped to `[0, len]`.
    pub fn advance(&mut self, n: isize) {
        self.ix = if n >= 0 {
            self.ix.saturating_add(n.unsigned_abs()).min(self.len)
        } else {
            self.ix.saturating_sub(n.unsigned_abs())
        };
    }

    /// `self - other` as a signed element count.
    pub fn distance(self, other: Cursor) -> isize {
        if self.ix >= other.ix {
            (self.ix - other.ix) as isize
        } else {
            -((other.ix - self.ix) as isize)
        }
    }

    /// The position, if it addresses an element.
    pub fn check(self) -> Result<usize, AccessError> {
        if self.ix < self.len {
            Ok(self.ix)
        } else {
            Err(AccessError::OutOfRange {
                index: self.ix,
                len: self.len,
            })
        }
    }

    /// Position `n` away from the cursor, without clamping.
    pub fn offset(self, n: isize) -> Result<usize, AccessError> {
        let target = self.ix.checked_add_signed(n);
        match target {
            Some(ix) if ix < self.len => Ok(ix),
            _ => Err(AccessError::OutOfRange {
                index: target.unwrap_or(usize::MAX),
                len: self.len,
            }),
        }
    }
}
