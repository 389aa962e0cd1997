//! Per-dict tunables.

use crate::hash::DEFAULT_SEED;

/// Growth on insert ignores a disabled resize toggle once `used / size`
/// exceeds this ratio.
pub const DEFAULT_FORCE_RESIZE_RATIO: usize = 5;

/// Configuration owned by each `Dict`.
///
/// The hash seed and the resize toggle are per dict rather than per
/// process, so two dicts in one process can be tuned independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictConfig {
    hash_seed: u32,
    resize_enabled: bool,
    force_resize_ratio: usize,
    active_rehashing: bool,
    rng_seed: Option<u64>,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            hash_seed: DEFAULT_SEED,
            resize_enabled: true,
            force_resize_ratio: DEFAULT_FORCE_RESIZE_RATIO,
            active_rehashing: true,
            rng_seed: None,
        }
    }
}

impl DictConfig {
    pub fn with_hash_seed(mut self, seed: u32) -> Self {
        self.hash_seed = seed;
        self
    }

    pub fn with_resize_enabled(mut self, enabled: bool) -> Self {
        self.resize_enabled = enabled;
        self
    }

    pub fn with_force_resize_ratio(mut self, ratio: usize) -> Self {
        self.force_resize_ratio = ratio;
        self
    }

    /// Whether `Dict::maintenance_tick` spends time migrating buckets.
    pub fn with_active_rehashing(mut self, enabled: bool) -> Self {
        self.active_rehashing = enabled;
        self
    }

    /// Seed the random-key sampler. Without a seed the sampler draws from OS
    /// entropy.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn hash_seed(&self) -> u32 {
        self.hash_seed
    }

    pub fn set_hash_seed(&mut self, seed: u32) {
        self.hash_seed = seed;
    }

    pub fn resize_enabled(&self) -> bool {
        self.resize_enabled
    }

    pub fn set_resize_enabled(&mut self, enabled: bool) {
        self.resize_enabled = enabled;
    }

    pub fn force_resize_ratio(&self) -> usize {
        self.force_resize_ratio
    }

    pub fn active_rehashing(&self) -> bool {
        self.active_rehashing
    }

    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DictConfig::default();
        assert_eq!(c.hash_seed(), DEFAULT_SEED);
        assert!(c.resize_enabled());
        assert_eq!(c.force_resize_ratio(), DEFAULT_FORCE_RESIZE_RATIO);
        assert!(c.active_rehashing());
        assert_eq!(c.rng_seed(), None);
    }

    #[test]
    fn builder_overrides() {
        let c = DictConfig::default()
            .with_hash_seed(7)
            .with_resize_enabled(false)
            .with_force_resize_ratio(2)
            .with_active_rehashing(false)
            .with_rng_seed(99);
        assert_eq!(c.hash_seed(), 7);
        assert!(!c.resize_enabled());
        assert_eq!(c.force_resize_ratio(), 2);
        assert!(!c.active_rehashing());
        assert_eq!(c.rng_seed(), Some(99));
    }
}
