//! Heap configuration parameters.

use crate::control::CONTROL_BLOCK_INLINE_SLOTS;
use crate::error::ConfigError;

/// What happens to a block when its owner releases it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZombieMode {
    /// Freed blocks stay mapped on the heap's zombie list until
    /// [`Heap::kill_all_zombies`](crate::Heap::kill_all_zombies).
    Quarantine,
    /// Freed blocks go straight back to the process allocator. Zombie
    /// detection degrades to none.
    Disabled,
}

/// Configuration for a [`Heap`](crate::Heap).
///
/// Validated at construction; immutable afterwards except for the
/// early-detection toggle, which has its own gated setter.
#[derive(Clone, Debug)]
pub struct HeapConfig {
    /// Whether released blocks are quarantined. Default: `Quarantine`.
    pub zombie_mode: ZombieMode,

    /// Record `{address, size}` of every zombie so that
    /// [`Heap::is_pointer_not_zombie`](crate::Heap::is_pointer_not_zombie)
    /// can answer. Default: `true`. Ignored when `zombie_mode` is `Disabled`.
    pub early_detection: bool,

    /// Overwrite zombie payloads with [`FREED_PATTERN`](crate::raw::FREED_PATTERN).
    /// Default: `true`.
    pub poison_freed: bool,

    /// Multiplier applied to a control block's slot count when every slot
    /// is taken. Default: 2. Tunable; no correctness property depends on it.
    pub slot_growth_factor: usize,

    /// Upper bound on observer slots per allocation. Registering past it is
    /// the fatal exhaustion condition. Default: `u32::MAX - 1`.
    pub max_slots_per_block: u32,
}

impl HeapConfig {
    /// Default overflow growth factor.
    pub const DEFAULT_SLOT_GROWTH_FACTOR: usize = 2;

    /// Default per-block observer cap.
    pub const DEFAULT_MAX_SLOTS_PER_BLOCK: u32 = u32::MAX - 1;

    /// Quarantining configuration with early detection and poisoning.
    pub fn new() -> Self {
        Self {
            zombie_mode: ZombieMode::Quarantine,
            early_detection: true,
            poison_freed: true,
            slot_growth_factor: Self::DEFAULT_SLOT_GROWTH_FACTOR,
            max_slots_per_block: Self::DEFAULT_MAX_SLOTS_PER_BLOCK,
        }
    }

    /// Throughput configuration: blocks are freed immediately.
    pub fn without_zombies() -> Self {
        Self {
            zombie_mode: ZombieMode::Disabled,
            early_detection: false,
            poison_freed: false,
            ..Self::new()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_growth_factor < 2 {
            return Err(ConfigError::GrowthFactorTooSmall {
                configured: self.slot_growth_factor,
            });
        }
        if (self.max_slots_per_block as usize) < CONTROL_BLOCK_INLINE_SLOTS {
            return Err(ConfigError::MaxSlotsBelowInline {
                configured: self.max_slots_per_block,
                inline: CONTROL_BLOCK_INLINE_SLOTS,
            });
        }
        Ok(())
    }

    /// Whether released blocks are routed to the zombie list.
    pub fn quarantines(&self) -> bool {
        self.zombie_mode == ZombieMode::Quarantine
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(HeapConfig::default().validate().is_ok());
        assert!(HeapConfig::without_zombies().validate().is_ok());
    }

    #[test]
    fn growth_factor_of_one_rejected() {
        let config = HeapConfig {
            slot_growth_factor: 1,
            ..HeapConfig::new()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::GrowthFactorTooSmall { configured: 1 })
        );
    }

    #[test]
    fn slot_cap_below_inline_rejected() {
        let config = HeapConfig {
            max_slots_per_block: 2,
            ..HeapConfig::new()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxSlotsBelowInline { configured: 2, .. })
        ));
    }

    #[test]
    fn without_zombies_disables_quarantine() {
        let config = HeapConfig::without_zombies();
        assert!(!config.quarantines());
        assert!(!config.early_detection);
    }
}
