//! Raw block allocation with a bookkeeping prefix.
//!
//! Every block handed out by a [`Heap`](crate::Heap) starts with a
//! `BlockHeader` recording the block's layout, the payload offset and
//! element count, and the intrusive zombie-list link. The payload follows
//! at the offset computed by [`Layout::extend`], so it is correctly aligned
//! for any payload type.
//!
//! All `unsafe` in the crate's allocation path lives here. Each block
//! carries a mandatory `// SAFETY:` comment.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};

use crate::error::HeapError;

/// Byte written over zombie payloads when poisoning is enabled.
pub const FREED_PATTERN: u8 = 0xCD;

/// Prefix stored at the start of every block.
#[repr(C)]
struct BlockHeader {
    block_size: usize,
    block_align: usize,
    payload_offset: usize,
    payload_size: usize,
    /// Element count for array payloads, 1 for scalars.
    elements: usize,
    /// Next block on the owning heap's zombie list.
    next_zombie: Option<NonNull<BlockHeader>>,
}

/// An allocated block: header prefix plus payload.
///
/// Not `Clone`: a `RawBlock` is the unique token for its allocation and is
/// consumed when the block is released. Dropping one without handing it
/// back to [`Heap::deallocate`](crate::Heap::deallocate) leaks the block.
pub struct RawBlock {
    header: NonNull<BlockHeader>,
}

impl RawBlock {
    /// Allocate a block able to hold `payload`.
    pub(crate) fn allocate(payload: Layout, elements: usize) -> Result<Self, HeapError> {
        let (layout, payload_offset) = Layout::new::<BlockHeader>()
            .extend(payload)
            .map_err(|_| HeapError::LayoutOverflow { elements })?;
        let layout = layout.pad_to_align();

        // SAFETY: `layout` includes the header, so its size is non-zero.
        let base = unsafe { alloc::alloc(layout) };
        let header = NonNull::new(base.cast::<BlockHeader>()).ok_or(
            HeapError::AllocationFailed {
                size: layout.size(),
                align: layout.align(),
            },
        )?;

        // SAFETY: `header` is a fresh allocation whose alignment is at least
        // that of `BlockHeader` (the extended layout keeps the max alignment).
        unsafe {
            header.as_ptr().write(BlockHeader {
                block_size: layout.size(),
                block_align: layout.align(),
                payload_offset,
                payload_size: payload.size(),
                elements,
                next_zombie: None,
            });
        }
        Ok(Self { header })
    }

    fn header(&self) -> &BlockHeader {
        // SAFETY: a `RawBlock` exists only while its allocation is live; the
        // header is mutated only through `&mut self`.
        unsafe { self.header.as_ref() }
    }

    /// Total block size in bytes, prefix included.
    pub fn block_size(&self) -> usize {
        self.header().block_size
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.header().payload_size
    }

    /// Element count recorded at allocation.
    pub fn elements(&self) -> usize {
        self.header().elements
    }

    /// Address of the block start (the header).
    pub fn base_addr(&self) -> usize {
        self.header.as_ptr() as usize
    }

    /// Start of the payload.
    pub fn payload(&self) -> NonNull<u8> {
        // SAFETY: `payload_offset` was produced by `Layout::extend` for this
        // block and lies within it.
        unsafe { self.header.cast::<u8>().add(self.header().payload_offset) }
    }

    /// Whether `ptr` points into this block's payload.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.payload().as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr < start + self.payload_size()
    }

    /// Overwrite the payload with [`FREED_PATTERN`].
    ///
    /// Only called after the payload object has been dropped.
    pub(crate) fn poison(&mut self) {
        let len = self.payload_size();
        // SAFETY: the payload is `len` writable bytes owned by this block and
        // holds no live object.
        unsafe { ptr::write_bytes(self.payload().as_ptr(), FREED_PATTERN, len) }
    }

    pub(crate) fn set_next_zombie(&mut self, next: Option<RawBlock>) {
        let next = next.map(|block| block.header);
        // SAFETY: `&mut self` guarantees no outstanding header borrows.
        unsafe { (*self.header.as_ptr()).next_zombie = next }
    }

    pub(crate) fn take_next_zombie(&mut self) -> Option<RawBlock> {
        // SAFETY: as in `set_next_zombie`. The link was written from a
        // consumed `RawBlock`, so rebuilding one keeps the token unique.
        unsafe { (*self.header.as_ptr()).next_zombie.take() }.map(|header| RawBlock { header })
    }

    fn layout(&self) -> Layout {
        let h = self.header();
        // SAFETY: size and align were copied from a valid `Layout`.
        unsafe { Layout::from_size_align_unchecked(h.block_size, h.block_align) }
    }

    /// Return the block to the process allocator.
    pub(crate) fn release(self) {
        let layout = self.layout();
        // SAFETY: allocated in `allocate` with exactly this layout; `self` is
        // consumed, so no other token refers to the allocation.
        unsafe { alloc::dealloc(self.header.as_ptr().cast::<u8>(), layout) }
    }
}

impl fmt::Debug for RawBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBlock")
            .field("base", &format_args!("{:#x}", self.base_addr()))
            .field("block_size", &self.block_size())
            .field("payload_size", &self.payload_size())
            .field("elements", &self.elements())
            .finish()
    }
}
