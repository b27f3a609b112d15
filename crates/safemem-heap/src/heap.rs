//! The heap context: allocator adapter plus zombie quarantine.
//!
//! A [`Heap`] owns the zombie registry and the statistics for every block
//! allocated through it. Handles keep a clone of the heap they came from,
//! so a heap lives until its last allocation is gone. Each thread has a
//! lazily created default heap reachable through [`Heap::current`].
//!
//! `Heap` is `!Send`: blocks, control blocks and the zombie
//! list are all thread-affine.

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::config::HeapConfig;
use crate::error::{ConfigError, HeapError};
use crate::owning::OwningPtr;
use crate::raw::RawBlock;
use crate::stats::HeapStats;
use crate::zombie::ZombieRegistry;

thread_local! {
    static CURRENT: Heap = Heap::from_valid(HeapConfig::default());
}

struct HeapInner {
    config: HeapConfig,
    zombies: RefCell<ZombieRegistry>,
    stats: Cell<HeapStats>,
}

impl Drop for HeapInner {
    fn drop(&mut self) {
        let killed = self.zombies.get_mut().kill_all();
        if killed > 0 {
            debug!("heap dropped, reclaimed {killed} zombie blocks");
        }
    }
}

/// Cheap-clone handle to a heap context.
#[derive(Clone)]
pub struct Heap {
    inner: Rc<HeapInner>,
}

impl Heap {
    /// Create a heap with the given configuration.
    pub fn new(config: HeapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: HeapConfig) -> Self {
        let zombies = ZombieRegistry::new(config.quarantines() && config.early_detection);
        Self {
            inner: Rc::new(HeapInner {
                config,
                zombies: RefCell::new(zombies),
                stats: Cell::new(HeapStats::default()),
            }),
        }
    }

    /// The calling thread's default heap.
    ///
    /// Once the thread-local has been torn down (during thread exit), a
    /// fresh default heap is returned instead.
    pub fn current() -> Self {
        CURRENT
            .try_with(Heap::clone)
            .unwrap_or_else(|_| Self::from_valid(HeapConfig::default()))
    }

    /// This heap's configuration.
    pub fn config(&self) -> &HeapConfig {
        &self.inner.config
    }

    /// Snapshot of the heap's counters.
    pub fn stats(&self) -> HeapStats {
        self.inner.stats.get()
    }

    /// Whether two handles refer to the same heap.
    pub fn same_heap(&self, other: &Heap) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn update_stats(&self, f: impl FnOnce(&mut HeapStats)) {
        let mut stats = self.inner.stats.get();
        f(&mut stats);
        self.inner.stats.set(stats);
    }

    /// Allocate a prefixed block whose payload fits `payload`.
    ///
    /// `elements` is recorded in the block header; pass 1 for scalars.
    pub fn allocate(&self, payload: Layout, elements: usize) -> Result<RawBlock, HeapError> {
        let block = RawBlock::allocate(payload, elements)?;
        let size = block.block_size();
        trace!("allocated {size} byte block at {:#x}", block.base_addr());
        self.update_stats(|s| {
            s.allocations += 1;
            s.live_blocks += 1;
            s.live_bytes += size;
        });
        Ok(block)
    }

    /// Release a block allocated by [`allocate`](Self::allocate).
    ///
    /// With quarantine on, the block becomes a zombie instead of being
    /// returned to the process allocator. The payload must not hold a live
    /// object.
    pub fn deallocate(&self, block: RawBlock) {
        self.release(block, true);
    }

    /// Release a block, quarantining it only if both the caller and the
    /// configuration ask for it.
    pub(crate) fn release(&self, mut block: RawBlock, quarantine: bool) {
        let size = block.block_size();
        self.update_stats(|s| {
            s.deallocations += 1;
            s.live_blocks = s.live_blocks.saturating_sub(1);
            s.live_bytes = s.live_bytes.saturating_sub(size);
        });
        if quarantine && self.inner.config.quarantines() {
            if self.inner.config.poison_freed {
                block.poison();
            }
            trace!("zombified {size} byte block at {:#x}", block.base_addr());
            self.inner.zombies.borrow_mut().push(block);
            self.update_stats(|s| {
                s.zombie_blocks += 1;
                s.zombie_bytes += size;
            });
        } else {
            trace!("freed {size} byte block at {:#x}", block.base_addr());
            block.release();
        }
    }

    /// `false` if `ptr` falls inside a zombie recorded by early detection.
    ///
    /// Best effort: with early detection or quarantine off, every address
    /// is reported as not-zombie.
    pub fn is_pointer_not_zombie(&self, ptr: *const u8) -> bool {
        self.inner.zombies.borrow().is_pointer_not_zombie(ptr)
    }

    /// Whether `ptr` lies inside `block`'s payload.
    pub fn is_zombieable_pointer_in_block(block: &RawBlock, ptr: *const u8) -> bool {
        block.contains(ptr)
    }

    /// Return every zombie to the process allocator. Returns the count.
    pub fn kill_all_zombies(&self) -> usize {
        let killed = self.inner.zombies.borrow_mut().kill_all();
        self.update_stats(|s| {
            s.reclaimed_zombies += killed as u64;
            s.zombie_blocks = 0;
            s.zombie_bytes = 0;
        });
        debug!("reclaimed {killed} zombie blocks");
        killed
    }

    /// Turn early detection on or off. Returns the previous effective
    /// setting.
    ///
    /// Refused with [`HeapError::DetectionToggleWithZombies`] while any
    /// zombie range is recorded; call [`kill_all_zombies`](Self::kill_all_zombies)
    /// first. On a heap without quarantine the request is recorded but
    /// detection stays off, since no freed range is ever kept.
    pub fn set_early_detection(&self, on: bool) -> Result<bool, HeapError> {
        let quarantines = self.inner.config.quarantines();
        self.inner
            .zombies
            .borrow_mut()
            .set_early_detection(on)
            .map(|previous| previous && quarantines)
            .inspect_err(|err| warn!("early detection toggle refused: {err}"))
    }

    /// Whether early detection is currently in effect.
    pub fn early_detection(&self) -> bool {
        self.inner.config.quarantines() && self.inner.zombies.borrow().early_detection()
    }

    /// Number of blocks in quarantine.
    pub fn zombie_count(&self) -> usize {
        self.inner.zombies.borrow().len()
    }

    pub(crate) fn record_registration(&self) {
        self.update_stats(|s| s.soft_registrations += 1);
    }

    pub(crate) fn record_invalidations(&self, count: usize) {
        self.update_stats(|s| s.invalidations += count as u64);
    }

    /// Allocate `value` on this heap under a checked owning handle.
    #[track_caller]
    pub fn make_owning<T>(&self, value: T) -> OwningPtr<T> {
        OwningPtr::new_in(self, value)
    }

    /// Allocate an array of `capacity` elements built by `init(index)`.
    #[track_caller]
    pub fn make_array<E>(&self, capacity: usize, init: impl FnMut(usize) -> E) -> OwningPtr<[E]> {
        OwningPtr::new_array_in(self, capacity, init)
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}
