//! Resumable, resize-tolerant enumeration.
//!
//! The cursor is incremented from its high bits down (reverse binary), so
//! every bucket index already visited at one table size maps onto indices
//! below the cursor at any other size. Growing or shrinking between calls
//! therefore never causes an unvisited bucket to be skipped.

use crate::dict::{Dict, Entry};
use crate::table::Table;
use crate::types::DictType;

/// Reverse-binary increment of `v` within `mask`.
#[inline]
pub(crate) fn next_cursor(v: u64, mask: u64) -> u64 {
    (v | !mask).reverse_bits().wrapping_add(1).reverse_bits()
}

impl<T: DictType> Dict<T> {
    /// Visit one step's worth of buckets and return the cursor to pass next.
    /// Start with `0`; a full pass is over when `0` comes back.
    ///
    /// Entries present for the whole pass are reported at least once.
    /// Entries added or removed mid-pass may or may not be. Any cursor value
    /// is accepted; one not produced by this pass only loses the guarantee.
    pub fn scan<F>(&self, cursor: u64, mut visit: F) -> u64
    where
        F: FnMut(&Entry<T::Key, T::Value>),
    {
        if self.is_empty() {
            return 0;
        }
        let mut v = cursor;

        if !self.is_rehashing() {
            let t0 = &self.ht[0];
            let m0 = t0.mask as u64;
            self.visit_bucket(t0, v & m0, &mut visit);
            return next_cursor(v, m0);
        }

        let (small, large) = if self.ht[0].size() <= self.ht[1].size() {
            (&self.ht[0], &self.ht[1])
        } else {
            (&self.ht[1], &self.ht[0])
        };
        let m0 = small.mask as u64;
        let m1 = large.mask as u64;

        self.visit_bucket(small, v & m0, &mut visit);
        // Every larger-table bucket that folds onto the one just visited.
        loop {
            self.visit_bucket(large, v & m1, &mut visit);
            v = next_cursor(v, m1);
            if v & (m0 ^ m1) == 0 {
                break;
            }
        }
        v
    }

    fn visit_bucket<F>(&self, table: &Table, index: u64, visit: &mut F)
    where
        F: FnMut(&Entry<T::Key, T::Value>),
    {
        let head = table.buckets[index as usize];
        for k in self.chain(head) {
            visit(&self.slots[k]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::next_cursor;
    use crate::config::DictConfig;
    use crate::dict::Dict;
    use crate::types::IntKeys;
    use std::collections::BTreeSet;

    #[test]
    fn cursor_walks_mask_in_reverse_binary_order() {
        let mut v = 0;
        let mut order = vec![v];
        loop {
            v = next_cursor(v, 3);
            if v == 0 {
                break;
            }
            order.push(v);
        }
        assert_eq!(order, [0, 2, 1, 3]);
    }

    #[test]
    fn cursor_covers_every_bucket_once() {
        let mut seen = BTreeSet::new();
        let mut v = 0;
        loop {
            assert!(seen.insert(v));
            v = next_cursor(v, 7);
            if v == 0 {
                break;
            }
        }
        assert_eq!(seen, (0..8).collect::<BTreeSet<_>>());
    }

    #[test]
    fn scan_on_empty_dict_returns_zero() {
        let d: Dict<IntKeys<u32>> = Dict::new(IntKeys::new());
        let mut calls = 0;
        assert_eq!(d.scan(12345, |_| calls += 1), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn scan_mid_rehash_reports_every_key_once() {
        let mut d = Dict::with_config(IntKeys::<u32>::new(), DictConfig::default().with_rng_seed(9));
        for k in 0..60 {
            d.add(k, k).unwrap();
        }
        while d.rehash(100) {}
        d.expand(512).unwrap();
        d.rehash(5);
        assert!(d.is_rehashing());

        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            cursor = d.scan(cursor, |e| seen.push(*e.key()));
            if cursor == 0 {
                break;
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..60).collect::<Vec<_>>());
    }
}
