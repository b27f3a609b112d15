//! Quarantine for released blocks.
//!
//! Released blocks are kept mapped on an intrusive singly-linked list
//! threaded through their headers, so no bookkeeping allocation happens on
//! the release path. When early detection is on, each zombie's
//! `{start, size}` range is also recorded in an ordered map, which answers
//! "does this address fall inside a zombie?" with one predecessor lookup.

use std::collections::BTreeMap;

use crate::error::HeapError;
use crate::raw::RawBlock;

/// Zombie list plus optional address-range index.
#[derive(Debug)]
pub struct ZombieRegistry {
    head: Option<RawBlock>,
    len: usize,
    bytes: usize,
    early_detection: bool,
    /// Block start address to block size, for every zombie pushed while
    /// early detection was on.
    ranges: BTreeMap<usize, usize>,
}

impl ZombieRegistry {
    /// Create an empty registry.
    pub fn new(early_detection: bool) -> Self {
        Self {
            head: None,
            len: 0,
            bytes: 0,
            early_detection,
            ranges: BTreeMap::new(),
        }
    }

    /// Quarantine a block.
    pub fn push(&mut self, mut block: RawBlock) {
        if self.early_detection {
            self.ranges.insert(block.base_addr(), block.block_size());
        }
        self.len += 1;
        self.bytes += block.block_size();
        block.set_next_zombie(self.head.take());
        self.head = Some(block);
    }

    /// `false` if `ptr` falls inside a recorded zombie block.
    ///
    /// Always `true` when nothing is recorded, including when early
    /// detection is off.
    pub fn is_pointer_not_zombie(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        match self.ranges.range(..=addr).next_back() {
            Some((&start, &size)) => addr >= start + size,
            None => true,
        }
    }

    /// Free every zombie and clear the range index. Returns the number freed.
    pub fn kill_all(&mut self) -> usize {
        let mut killed = 0;
        let mut cursor = self.head.take();
        while let Some(mut block) = cursor {
            cursor = block.take_next_zombie();
            block.release();
            killed += 1;
        }
        debug_assert_eq!(killed, self.len);
        self.ranges.clear();
        self.len = 0;
        self.bytes = 0;
        killed
    }

    /// Turn early detection on or off. Returns the previous setting.
    ///
    /// Refused while any zombie range is recorded: turning detection off
    /// would strand the ranges and turning it on would miss existing zombies.
    pub fn set_early_detection(&mut self, on: bool) -> Result<bool, HeapError> {
        if !self.ranges.is_empty() {
            return Err(HeapError::DetectionToggleWithZombies {
                zombies: self.ranges.len(),
            });
        }
        Ok(std::mem::replace(&mut self.early_detection, on))
    }

    /// Whether early detection is on.
    pub fn early_detection(&self) -> bool {
        self.early_detection
    }

    /// Number of quarantined blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no block is quarantined.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes held by quarantined blocks, prefix included.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of ranges in the detection index.
    pub fn recorded_ranges(&self) -> usize {
        self.ranges.len()
    }
}

impl Drop for ZombieRegistry {
    fn drop(&mut self) {
        self.kill_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::Layout;

    fn block(bytes: usize) -> RawBlock {
        RawBlock::allocate(Layout::array::<u8>(bytes).unwrap(), bytes).unwrap()
    }

    #[test]
    fn detection_covers_whole_block() {
        let mut reg = ZombieRegistry::new(true);
        let b = block(32);
        let start = b.base_addr();
        let size = b.block_size();
        let payload = b.payload().as_ptr() as usize;
        reg.push(b);

        assert!(!reg.is_pointer_not_zombie(start as *const u8));
        assert!(!reg.is_pointer_not_zombie(payload as *const u8));
        assert!(!reg.is_pointer_not_zombie((start + size - 1) as *const u8));
        assert!(reg.is_pointer_not_zombie((start + size) as *const u8));
        assert!(reg.is_pointer_not_zombie((start - 1) as *const u8));
        assert_eq!(reg.kill_all(), 1);
    }

    #[test]
    fn no_detection_means_everything_is_not_zombie() {
        let mut reg = ZombieRegistry::new(false);
        let b = block(16);
        let start = b.base_addr();
        reg.push(b);
        assert!(reg.is_pointer_not_zombie(start as *const u8));
        assert_eq!(reg.recorded_ranges(), 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn kill_all_clears_everything() {
        let mut reg = ZombieRegistry::new(true);
        let addrs: Vec<_> = (0..4)
            .map(|i| {
                let b = block(8 * (i + 1));
                let a = b.base_addr();
                reg.push(b);
                a
            })
            .collect();
        assert_eq!(reg.len(), 4);
        assert!(reg.bytes() > 0);
        assert_eq!(reg.kill_all(), 4);
        assert!(reg.is_empty());
        assert_eq!(reg.bytes(), 0);
        for a in addrs {
            assert!(reg.is_pointer_not_zombie(a as *const u8));
        }
        assert_eq!(reg.kill_all(), 0);
    }

    #[test]
    fn toggle_refused_while_ranges_recorded() {
        let mut reg = ZombieRegistry::new(true);
        reg.push(block(8));
        assert_eq!(
            reg.set_early_detection(false),
            Err(HeapError::DetectionToggleWithZombies { zombies: 1 })
        );
        reg.kill_all();
        assert_eq!(reg.set_early_detection(false), Ok(true));
        assert!(!reg.early_detection());
    }

    #[test]
    fn toggle_allowed_with_unrecorded_zombies() {
        let mut reg = ZombieRegistry::new(false);
        reg.push(block(8));
        assert_eq!(reg.set_early_detection(true), Ok(false));
        assert_eq!(reg.recorded_ranges(), 0);
    }

    #[test]
    fn drop_releases_zombies() {
        let mut reg = ZombieRegistry::new(true);
        for _ in 0..3 {
            reg.push(block(64));
        }
        drop(reg);
    }
}
