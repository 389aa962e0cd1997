//! A single hash table generation: a power-of-two array of chain heads.

use slotmap::DefaultKey;

/// Size of the first allocated generation and the floor for every resize.
pub const INITIAL_SIZE: usize = 4;

/// Largest generation size we will ever request.
pub(crate) const MAX_SIZE: usize = 1 << (usize::BITS - 1);

#[derive(Debug)]
pub(crate) struct Table {
    /// Distinguishes successive allocations for the iterator fingerprint.
    pub(crate) id: u64,
    pub(crate) buckets: Vec<Option<DefaultKey>>,
    pub(crate) mask: usize,
    pub(crate) used: usize,
}

impl Table {
    pub(crate) const fn unallocated() -> Self {
        Self {
            id: 0,
            buckets: Vec::new(),
            mask: 0,
            used: 0,
        }
    }

    /// `None` when `size` buckets cannot be allocated.
    pub(crate) fn try_with_size(id: u64, size: usize) -> Option<Self> {
        debug_assert!(size.is_power_of_two());
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(size).ok()?;
        buckets.resize(size, None);
        Some(Self {
            id,
            buckets,
            mask: size - 1,
            used: 0,
        })
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }
}

/// Smallest power of two `>= size`, never below `INITIAL_SIZE`.
pub(crate) fn next_power(size: usize) -> usize {
    size.max(INITIAL_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_power_rounds_up_with_floor() {
        assert_eq!(next_power(0), 4);
        assert_eq!(next_power(3), 4);
        assert_eq!(next_power(4), 4);
        assert_eq!(next_power(5), 8);
        assert_eq!(next_power(8), 8);
        assert_eq!(next_power(1000), 1024);
        assert_eq!(next_power(usize::MAX), MAX_SIZE);
    }

    #[test]
    fn allocated_table_shape() {
        let t = Table::try_with_size(1, 8).unwrap();
        assert_eq!(t.size(), 8);
        assert_eq!(t.mask, 7);
        assert_eq!(t.used, 0);
        assert!(t.is_allocated());
        assert_eq!(t.bucket_of(13), 5);
        assert!(!Table::unallocated().is_allocated());
    }

    #[test]
    fn oversized_table_is_refused() {
        assert!(Table::try_with_size(1, MAX_SIZE).is_none());
    }
}
