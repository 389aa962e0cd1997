//! Incremental rehashing and the growth/shrink policy.
//!
//! A resize never moves every entry at once. `expand` only allocates the
//! target generation; entries then migrate a bucket at a time, either one
//! step ahead of each add/find/delete or in time-boxed batches driven by a
//! periodic caller.

use crate::dict::Dict;
use crate::error::{DictError, ResizeRejection};
use crate::table::{next_power, Table, INITIAL_SIZE};
use crate::types::DictType;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Below this fill percentage a table larger than `INITIAL_SIZE` is worth
/// shrinking.
pub const HASHTABLE_MIN_FILL: usize = 10;

/// Buckets migrated between deadline checks in `rehash_milliseconds`.
const BULK_BATCH: usize = 100;

impl<T: DictType> Dict<T> {
    /// Migrate up to `n` non-empty buckets from `ht[0]` to `ht[1]`. Empty
    /// buckets are skipped without counting. Returns `true` while entries
    /// remain to be moved.
    pub fn rehash(&mut self, n: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        let seed = self.config.hash_seed();

        let mut n = n;
        while n > 0 && self.ht[0].used > 0 {
            // ht[0] still holds entries, so a non-empty bucket exists at or past idx.
            debug_assert!(idx < self.ht[0].size());
            while self.ht[0].buckets[idx].is_none() {
                idx += 1;
            }
            let mut cur = self.ht[0].buckets[idx].take();
            while let Some(k) = cur {
                let entry = &mut self.slots[k];
                cur = entry.next;
                let dst = self.ht[1].bucket_of(self.ty.hash(&entry.key, seed));
                entry.next = self.ht[1].buckets[dst];
                self.ht[1].buckets[dst] = Some(k);
                self.ht[0].used -= 1;
                self.ht[1].used += 1;
            }
            idx += 1;
            n -= 1;
        }

        if self.ht[0].used == 0 {
            self.finish_rehash();
            return false;
        }
        self.rehash_idx = Some(idx);
        true
    }

    fn finish_rehash(&mut self) {
        self.ht[0] = core::mem::replace(&mut self.ht[1], Table::unallocated());
        self.rehash_idx = None;
        debug!(
            size = self.ht[0].size(),
            used = self.ht[0].used,
            "dict rehash finished"
        );
    }

    /// Opportunistic single step, skipped while safe iterators are out so
    /// entries do not move under them.
    pub(crate) fn rehash_step(&mut self) {
        if self.safe_iterators == 0 {
            self.rehash(1);
        }
    }

    /// Rehash in batches of 100 buckets until done or until `ms` milliseconds
    /// have passed. The deadline is checked between batches only. Returns the
    /// number of buckets scheduled.
    pub fn rehash_milliseconds(&mut self, ms: u64) -> usize {
        if self.safe_iterators > 0 {
            return 0;
        }
        let budget = Duration::from_millis(ms);
        let start = Instant::now();
        let mut rehashes = 0;
        while self.rehash(BULK_BATCH) {
            rehashes += BULK_BATCH;
            if start.elapsed() > budget {
                break;
            }
        }
        trace!(
            rehashes,
            done = !self.is_rehashing(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "bulk rehash"
        );
        rehashes
    }

    fn reject(&self, reason: ResizeRejection) -> Result<(), DictError> {
        trace!(%reason, len = self.len(), "dict resize rejected");
        Err(reason.into())
    }

    /// Allocate a generation of `next_power(size)` buckets. The first
    /// allocation becomes `ht[0]` directly; later ones start a rehash.
    pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
        if self.is_rehashing() {
            return self.reject(ResizeRejection::Rehashing);
        }
        let used = self.ht[0].used;
        if used > size {
            return self.reject(ResizeRejection::BelowUsed {
                requested: size,
                used,
            });
        }
        match self.install(size) {
            Ok(()) => Ok(()),
            Err(reason) => self.reject(reason),
        }
    }

    fn install(&mut self, size: usize) -> Result<(), ResizeRejection> {
        let realsize = next_power(size);
        let table = self
            .alloc_table(realsize)
            .ok_or(ResizeRejection::TooLarge { buckets: realsize })?;
        if !self.ht[0].is_allocated() {
            self.ht[0] = table;
            return Ok(());
        }
        debug!(
            from = self.ht[0].size(),
            to = realsize,
            used = self.ht[0].used,
            "dict rehash started"
        );
        self.ht[1] = table;
        self.rehash_idx = Some(0);
        Ok(())
    }

    /// Shrink (or grow) to the smallest table holding every entry.
    pub fn resize(&mut self) -> Result<(), DictError> {
        if !self.config.resize_enabled() {
            return self.reject(ResizeRejection::Disabled);
        }
        if self.is_rehashing() {
            return self.reject(ResizeRejection::Rehashing);
        }
        let minimal = self.ht[0].used.max(INITIAL_SIZE);
        self.expand(minimal)
    }

    /// Growth check run before every insertion.
    pub(crate) fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        let target = if !self.ht[0].is_allocated() {
            INITIAL_SIZE
        } else {
            let used = self.ht[0].used;
            let size = self.ht[0].size();
            if used < size
                || !(self.config.resize_enabled() || used / size > self.config.force_resize_ratio())
            {
                return;
            }
            used.saturating_mul(2)
        };
        // A refused growth leaves the current table in service with longer chains.
        if let Err(reason) = self.install(target) {
            trace!(%reason, len = self.len(), "dict growth skipped");
        }
    }

    pub fn enable_resize(&mut self) {
        self.config.set_resize_enabled(true);
    }

    /// Block new resize decisions. A rehash already under way keeps going,
    /// and growth is still forced once the load passes the force ratio.
    pub fn disable_resize(&mut self) {
        self.config.set_resize_enabled(false);
    }

    pub fn needs_shrink(&self) -> bool {
        let size = self.ht[0].size();
        !self.is_rehashing()
            && size > INITIAL_SIZE
            && self.ht[0].used * 100 / size < HASHTABLE_MIN_FILL
    }

    /// One periodic maintenance pass: shrink a sparse table, then spend up to
    /// a millisecond migrating buckets if active rehashing is enabled.
    /// Returns the number of buckets scheduled for migration.
    pub fn maintenance_tick(&mut self) -> usize {
        if self.needs_shrink() {
            if let Err(e) = self.resize() {
                trace!(%e, len = self.len(), "dict shrink skipped");
            }
        }
        if self.config.active_rehashing() && self.is_rehashing() {
            self.rehash_milliseconds(1)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DictConfig;
    use crate::dict::Dict;
    use crate::error::{DictError, ResizeRejection};
    use crate::types::IntKeys;

    fn dict() -> Dict<IntKeys<u32>> {
        Dict::with_config(IntKeys::new(), DictConfig::default().with_rng_seed(3))
    }

    #[test]
    fn rehash_is_noop_when_idle() {
        let mut d = dict();
        assert!(!d.rehash(10));
        d.add(1, 1).unwrap();
        assert!(!d.rehash(10));
        assert!(!d.is_rehashing());
    }

    #[test]
    fn empty_buckets_do_not_count_against_n() {
        let mut d = dict();
        // Leave a single entry in a sparse table, then grow it.
        for k in 0..40 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        for k in 1..40 {
            d.delete(&k).unwrap();
        }
        assert_eq!(d.len(), 1);
        d.expand(1024).unwrap();
        assert!(d.is_rehashing());
        // One call with n = 1 must reach the lone entry wherever it sits.
        assert!(!d.rehash(1));
        assert!(!d.is_rehashing());
        assert_eq!(d.get(&0), Some(&0));
    }

    #[test]
    fn expand_rejections() {
        let mut d = dict();
        for k in 0..10 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        assert_eq!(
            d.expand(5),
            Err(DictError::ResizeRejected(ResizeRejection::BelowUsed {
                requested: 5,
                used: 10
            }))
        );
        d.expand(100).unwrap();
        assert_eq!(
            d.expand(1000),
            Err(DictError::ResizeRejected(ResizeRejection::Rehashing))
        );
        assert_eq!(
            d.resize(),
            Err(DictError::ResizeRejected(ResizeRejection::Rehashing))
        );
    }

    #[test]
    fn expand_on_fresh_dict_allocates_directly() {
        let mut d = dict();
        d.expand(100).unwrap();
        assert_eq!(d.slots(), 128);
        assert!(!d.is_rehashing());
    }

    #[test]
    fn disabled_resize_does_not_pause_running_rehash() {
        let mut d = dict();
        for k in 0..5 {
            d.add(k, k).unwrap();
        }
        assert!(d.is_rehashing());
        d.disable_resize();
        while d.rehash(1) {}
        assert!(!d.is_rehashing());
        assert_eq!(d.slots(), 8);
    }

    #[test]
    fn bulk_rehash_pauses_for_safe_iterators() {
        let mut d = dict();
        for k in 0..500 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        d.expand(4096).unwrap();
        let it = d.safe_iterator();
        let idx = d.rehash_index();
        assert_eq!(d.rehash_milliseconds(100), 0);
        assert_eq!(d.rehash_index(), idx);
        d.release_iterator(it);
        while d.is_rehashing() {
            d.rehash_milliseconds(100);
        }
        assert_eq!(d.len(), 500);
    }

    #[test]
    fn bulk_rehash_reports_whole_batches() {
        let mut d = dict();
        d.expand(16384).unwrap();
        for k in 0..10_000 {
            d.add(k, k).unwrap();
        }
        assert!(!d.is_rehashing());
        d.expand(65536).unwrap();
        let non_empty = d.ht[0].buckets.iter().filter(|b| b.is_some()).count();

        let scheduled = d.rehash_milliseconds(10_000);
        assert!(!d.is_rehashing());
        assert!(scheduled > 0);
        assert_eq!(scheduled % 100, 0);
        // The batch that finishes the migration is not counted.
        assert!(scheduled < non_empty && non_empty <= scheduled + 100);
        assert_eq!(d.len(), 10_000);
        assert_eq!(d.slots(), 65536);
    }

    #[test]
    fn oversized_expand_is_rejected() {
        let mut d = dict();
        for k in 0..10 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        let slots = d.slots();
        assert!(matches!(
            d.expand(usize::MAX),
            Err(DictError::ResizeRejected(ResizeRejection::TooLarge { .. }))
        ));
        assert!(!d.is_rehashing());
        assert_eq!(d.slots(), slots);
        d.add(10, 10).unwrap();
        assert_eq!(d.get(&10), Some(&10));
    }

    #[test]
    fn maintenance_tick_leaves_sparse_table_when_resize_disabled() {
        let mut d = dict();
        for k in 0..200 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        for k in 3..200 {
            d.delete(&k).unwrap();
        }
        d.disable_resize();
        assert!(d.needs_shrink());
        let slots = d.slots();
        assert_eq!(d.maintenance_tick(), 0);
        assert_eq!(d.slots(), slots);
        assert!(!d.is_rehashing());
    }

    #[test]
    fn maintenance_tick_shrinks_sparse_tables() {
        let mut d = dict();
        for k in 0..200 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        for k in 3..200 {
            d.delete(&k).unwrap();
        }
        while d.rehash(100) {}
        assert!(d.needs_shrink());
        while d.needs_shrink() || d.is_rehashing() {
            d.maintenance_tick();
        }
        assert_eq!(d.slots(), 4);
        for k in 0..3 {
            assert_eq!(d.get(&k), Some(&k));
        }
    }

    #[test]
    fn maintenance_tick_respects_active_rehashing_flag() {
        let mut d = Dict::with_config(
            IntKeys::<u32>::new(),
            DictConfig::default().with_active_rehashing(false),
        );
        for k in 0..5 {
            d.add(k, k).unwrap();
        }
        assert!(d.is_rehashing());
        assert_eq!(d.maintenance_tick(), 0);
        assert!(d.is_rehashing());
    }
}
