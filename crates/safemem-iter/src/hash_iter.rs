//! Iterator adapter for chained hash tables.
//!
//! A chained table keeps a bucket array of owning handles, each heading a
//! singly linked chain of nodes. [`HashIter`] holds a soft handle to the
//! current node plus an [`ArrayIter`] over the buckets. Advancing follows
//! the chain, then skips empty buckets; past the last node it parks at the
//! end position with a null node handle. [`HashIter::nodes`] walks the
//! remaining nodes.

use std::fmt;

use safemem_core::{fatal, AccessError, Safe, SafetyMode};
use safemem_heap::{OwningPtr, Ref, SoftPtr};

use crate::array_iter::ArrayIter;

/// A node in a hash chain.
pub trait ChainNode<S: SafetyMode = Safe>: Sized {
    /// The stored entry.
    type Value;

    /// The entry held by this node.
    fn value(&self) -> &Self::Value;

    /// The next node in the chain (empty at the tail).
    fn next(&self) -> &OwningPtr<Self, S>;
}

/// Soft handle to a table's bucket array.
pub type Buckets<N, S = Safe> = SoftPtr<[OwningPtr<N, S>], S>;

/// Forward iterator over every node of a chained table.
pub struct HashIter<N: ChainNode<S>, S: SafetyMode = Safe> {
    node: SoftPtr<N, S>,
    bucket: ArrayIter<Buckets<N, S>>,
}

impl<N: ChainNode<S>, S: SafetyMode> HashIter<N, S> {
    /// Iterator at the first node, or at the end for an empty table.
    pub fn try_begin(buckets: &Buckets<N, S>) -> Result<Self, AccessError> {
        let mut it = Self {
            node: SoftPtr::null(),
            bucket: ArrayIter::begin(buckets),
        };
        it.settle()?;
        Ok(it)
    }

    /// Iterator at the first node. Fatal if the bucket array is gone.
    #[track_caller]
    pub fn begin(buckets: &Buckets<N, S>) -> Self {
        Self::try_begin(buckets).unwrap_or_else(|err| fatal(err))
    }

    /// Iterator at the end position.
    pub fn end(buckets: &Buckets<N, S>) -> Self {
        Self {
            node: SoftPtr::null(),
            bucket: ArrayIter::end(buckets),
        }
    }

    /// Point at the head of the current bucket, or of the next non-empty one.
    fn settle(&mut self) -> Result<(), AccessError> {
        while !self.bucket.is_end() {
            let head = self.bucket.try_get()?.soft();
            if !head.is_null() {
                self.node = head;
                return Ok(());
            }
            self.bucket.inc();
        }
        self.node = SoftPtr::null();
        Ok(())
    }

    /// Whether the iterator is past the last node.
    pub fn is_end(&self) -> bool {
        self.node.is_null()
    }

    /// Index of the current bucket.
    pub fn bucket_index(&self) -> usize {
        self.bucket.index()
    }

    /// Soft handle to the current node (null at the end).
    pub fn node(&self) -> &SoftPtr<N, S> {
        &self.node
    }

    /// Borrow the current entry.
    pub fn try_get(&self) -> Result<Ref<'_, N::Value>, AccessError> {
        Ok(Ref::map(self.node.try_get()?, |n| n.value()))
    }

    /// Borrow the current entry. Fatal at the end or if the node is gone.
    #[track_caller]
    pub fn get(&self) -> Ref<'_, N::Value> {
        self.try_get().unwrap_or_else(|err| fatal(err))
    }

    /// Advance to the next node. A no-op at the end.
    pub fn try_inc(&mut self) -> Result<(), AccessError> {
        if self.node.is_null() {
            return Ok(());
        }
        let next = self.node.try_get()?.next().soft();
        if next.is_null() {
            self.bucket.inc();
            self.settle()
        } else {
            self.node = next;
            Ok(())
        }
    }

    /// Advance to the next node. Fatal if the current node is gone.
    #[track_caller]
    pub fn inc(&mut self) -> &mut Self {
        if let Err(err) = self.try_inc() {
            fatal(err);
        }
        self
    }

    /// Soft handles to the nodes from the current position to the end.
    pub fn nodes(&self) -> HashNodes<N, S> {
        HashNodes { pos: self.clone() }
    }

    /// Check the iterator is usable: at the end, or at a live node.
    pub fn validate(&self) -> Result<(), AccessError> {
        self.bucket.validate()?;
        if self.node.is_null() || self.node.is_valid() {
            Ok(())
        } else {
            Err(AccessError::Invalidated)
        }
    }
}

impl<N: ChainNode<S>, S: SafetyMode> Clone for HashIter<N, S> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            bucket: self.bucket.clone(),
        }
    }
}

/// Same node and same bucket. Two end iterators over one table are equal.
impl<N: ChainNode<S>, S: SafetyMode> PartialEq for HashIter<N, S> {
    #[track_caller]
    fn eq(&self, other: &Self) -> bool {
        if !self.bucket.array().same_allocation(other.bucket.array()) {
            fatal(AccessError::UnrelatedRanges);
        }
        self.node == other.node && self.bucket.index() == other.bucket.index()
    }
}

/// Node iterator returned by [`HashIter::nodes`].
///
/// Yields a soft handle to each remaining node in table order.
pub struct HashNodes<N: ChainNode<S>, S: SafetyMode = Safe> {
    pos: HashIter<N, S>,
}

impl<N: ChainNode<S>, S: SafetyMode> Iterator for HashNodes<N, S> {
    type Item = SoftPtr<N, S>;

    #[track_caller]
    fn next(&mut self) -> Option<SoftPtr<N, S>> {
        if self.pos.node.is_null() {
            return None;
        }
        let current = self.pos.node.clone();
        self.pos.inc();
        Some(current)
    }
}

impl<N: ChainNode<S>, S: SafetyMode> fmt::Debug for HashIter<N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashIter")
            .field("bucket", &self.bucket.index())
            .field("node", &self.node)
            .finish()
    }
}
