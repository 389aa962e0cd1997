//! Dict: a two-generation chained hash table.
//!
//! Entries live in one `SlotMap` arena per dict. Each generation is an array
//! of chain heads, and chains are linked through generational slot keys, so
//! moving an entry between generations is a relink and never a copy.

use crate::config::DictConfig;
use crate::error::DictError;
use crate::fingerprint;
use crate::table::Table;
use crate::types::DictType;
use core::fmt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::{DefaultKey, SlotMap};
use tracing::trace;

/// Stable reference to one entry. Resolving a handle after its entry was
/// deleted yields `None`, even if the slot has since been reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }

    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, T: DictType>(&self, dict: &'a Dict<T>) -> Option<&'a T::Key> {
        dict.entry(*self).map(Entry::key)
    }

    pub fn value<'a, T: DictType>(&self, dict: &'a Dict<T>) -> Option<&'a T::Value> {
        dict.entry(*self).and_then(Entry::value)
    }

    pub fn value_mut<'a, T: DictType>(&self, dict: &'a mut Dict<T>) -> Option<&'a mut T::Value> {
        dict.slots.get_mut(self.0).and_then(|e| e.value.as_mut())
    }
}

/// One key/value pair and its link to the next entry in the same bucket.
#[derive(Debug)]
pub struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: Option<V>,
    pub(crate) next: Option<DefaultKey>,
}

impl<K, V> Entry<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// `None` only between `add_raw` and the first `set_value`.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_parts(self) -> (K, Option<V>) {
        (self.key, self.value)
    }
}

pub struct Dict<T: DictType> {
    pub(crate) ty: T,
    pub(crate) config: DictConfig,
    pub(crate) slots: SlotMap<DefaultKey, Entry<T::Key, T::Value>>,
    /// `ht[0]` serves traffic; `ht[1]` is allocated only while rehashing.
    pub(crate) ht: [Table; 2],
    /// Next `ht[0]` bucket to migrate; `None` when not rehashing.
    pub(crate) rehash_idx: Option<usize>,
    pub(crate) safe_iterators: usize,
    table_ids: u64,
    pub(crate) rng: StdRng,
}

pub(crate) fn destroy_entry<T: DictType>(ty: &T, entry: Entry<T::Key, T::Value>) {
    let (key, value) = entry.into_parts();
    ty.destroy_key(key);
    if let Some(v) = value {
        ty.destroy_value(v);
    }
}

impl<T: DictType> Dict<T> {
    pub fn new(ty: T) -> Self {
        Self::with_config(ty, DictConfig::default())
    }

    pub fn with_config(ty: T, config: DictConfig) -> Self {
        let rng = match config.rng_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            ty,
            config,
            slots: SlotMap::with_key(),
            ht: [Table::unallocated(), Table::unallocated()],
            rehash_idx: None,
            safe_iterators: 0,
            table_ids: 0,
            rng,
        }
    }

    pub fn dict_type(&self) -> &T {
        &self.ty
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn hash_seed(&self) -> u32 {
        self.config.hash_seed()
    }

    /// Change the seed fed to `DictType::hash`. Existing entries are not
    /// rehashed, so this belongs before the first insertion.
    pub fn set_hash_seed(&mut self, seed: u32) {
        debug_assert!(self.is_empty(), "hash seed changed on a non-empty dict");
        self.config.set_hash_seed(seed);
    }

    pub fn len(&self) -> usize {
        self.ht[0].used + self.ht[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bucket count across both generations.
    pub fn slots(&self) -> usize {
        self.ht[0].size() + self.ht[1].size()
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    pub fn rehash_index(&self) -> Option<usize> {
        self.rehash_idx
    }

    pub(crate) fn hash_key(&self, key: &T::Key) -> u64 {
        self.ty.hash(key, self.config.hash_seed())
    }

    pub(crate) fn alloc_table(&mut self, size: usize) -> Option<Table> {
        let table = Table::try_with_size(self.table_ids + 1, size)?;
        self.table_ids += 1;
        Some(table)
    }

    pub(crate) fn chain(&self, head: Option<DefaultKey>) -> impl Iterator<Item = DefaultKey> + '_ {
        core::iter::successors(head, move |&k| self.slots.get(k).and_then(|e| e.next))
    }

    pub(crate) fn fingerprint(&self) -> u64 {
        let [t0, t1] = &self.ht;
        fingerprint::mix(&[
            t0.id,
            t0.size() as u64,
            t0.used as u64,
            t1.id,
            t1.size() as u64,
            t1.used as u64,
        ])
    }

    /// Look `key` up in every live generation without advancing rehashing.
    fn probe(&self, key: &T::Key, hash: u64) -> Option<DefaultKey> {
        if !self.ht[0].is_allocated() {
            return None;
        }
        let tables = if self.is_rehashing() {
            &self.ht[..]
        } else {
            &self.ht[..1]
        };
        for table in tables {
            let head = table.buckets[table.bucket_of(hash)];
            if let Some(k) = self
                .chain(head)
                .find(|&k| self.ty.key_eq(key, &self.slots[k].key))
            {
                return Some(k);
            }
        }
        None
    }

    /// Insert `key` with no value, or report the entry that already holds it.
    fn add_or_existing(&mut self, key: T::Key) -> Result<DefaultKey, DefaultKey> {
        if self.is_rehashing() {
            self.rehash_step();
        }
        self.expand_if_needed();

        let hash = self.hash_key(&key);
        if let Some(existing) = self.probe(&key, hash) {
            return Err(existing);
        }

        let key = self.ty.dup_key(key);
        // New entries go straight to the generation being filled.
        let table = if self.is_rehashing() {
            &mut self.ht[1]
        } else {
            &mut self.ht[0]
        };
        let bucket = table.bucket_of(hash);
        let k = self.slots.insert(Entry {
            key,
            value: None,
            next: table.buckets[bucket],
        });
        table.buckets[bucket] = Some(k);
        table.used += 1;
        Ok(k)
    }

    /// Store `value` (after `dup_value`), destroying any value it replaces.
    fn store_value(&mut self, k: DefaultKey, value: T::Value) -> bool {
        let value = self.ty.dup_value(value);
        match self.slots.get_mut(k) {
            Some(entry) => {
                if let Some(old) = entry.value.replace(value) {
                    self.ty.destroy_value(old);
                }
                true
            }
            None => {
                self.ty.destroy_value(value);
                false
            }
        }
    }

    pub fn add(&mut self, key: T::Key, value: T::Value) -> Result<Handle, DictError> {
        let handle = self.add_raw(key).ok_or(DictError::KeyExists)?;
        self.store_value(handle.raw_handle(), value);
        Ok(handle)
    }

    /// Insert `key` with its value unset; `None` if the key is present.
    pub fn add_raw(&mut self, key: T::Key) -> Option<Handle> {
        self.add_or_existing(key).ok().map(Handle::new)
    }

    pub fn set_value(&mut self, handle: Handle, value: T::Value) -> Result<(), DictError> {
        if self.store_value(handle.raw_handle(), value) {
            Ok(())
        } else {
            Err(DictError::KeyNotFound)
        }
    }

    /// Insert or overwrite. Returns `true` if `key` was not present.
    pub fn replace(&mut self, key: T::Key, value: T::Value) -> bool {
        let (k, added) = match self.add_or_existing(key) {
            Ok(k) => (k, true),
            Err(k) => (k, false),
        };
        self.store_value(k, value);
        added
    }

    /// The entry holding `key`, adding an unset one if needed.
    pub fn replace_raw(&mut self, key: T::Key) -> Handle {
        match self.add_or_existing(key) {
            Ok(k) | Err(k) => Handle::new(k),
        }
    }

    pub fn find(&mut self, key: &T::Key) -> Result<Handle, DictError> {
        if !self.ht[0].is_allocated() {
            return Err(DictError::KeyNotFound);
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.hash_key(key);
        self.probe(key, hash)
            .map(Handle::new)
            .ok_or(DictError::KeyNotFound)
    }

    pub fn fetch_value(&mut self, key: &T::Key) -> Option<&T::Value> {
        let handle = self.find(key).ok()?;
        self.slots.get(handle.raw_handle())?.value.as_ref()
    }

    /// Membership test that never advances rehashing.
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.probe(key, self.hash_key(key)).is_some()
    }

    /// Value lookup that never advances rehashing.
    pub fn get(&self, key: &T::Key) -> Option<&T::Value> {
        let k = self.probe(key, self.hash_key(key))?;
        self.slots.get(k)?.value.as_ref()
    }

    pub fn entry(&self, handle: Handle) -> Option<&Entry<T::Key, T::Value>> {
        self.slots.get(handle.raw_handle())
    }

    /// Remove `key`, running the key and value destructors.
    pub fn delete(&mut self, key: &T::Key) -> Result<(), DictError> {
        let entry = self.unlink(key)?;
        destroy_entry(&self.ty, entry);
        Ok(())
    }

    /// Remove `key` and hand the entry back without running destructors.
    pub fn delete_no_free(&mut self, key: &T::Key) -> Result<Entry<T::Key, T::Value>, DictError> {
        self.unlink(key)
    }

    fn unlink(&mut self, key: &T::Key) -> Result<Entry<T::Key, T::Value>, DictError> {
        if !self.ht[0].is_allocated() {
            return Err(DictError::KeyNotFound);
        }
        if self.is_rehashing() {
            self.rehash_step();
        }

        let hash = self.hash_key(key);
        for t in 0..2 {
            let idx = self.ht[t].bucket_of(hash);
            let mut prev: Option<DefaultKey> = None;
            let mut cur = self.ht[t].buckets[idx];
            while let Some(k) = cur {
                let entry = &self.slots[k];
                let next = entry.next;
                if self.ty.key_eq(key, &entry.key) {
                    match prev {
                        Some(p) => self.slots[p].next = next,
                        None => self.ht[t].buckets[idx] = next,
                    }
                    self.ht[t].used -= 1;
                    return self.slots.remove(k).ok_or(DictError::KeyNotFound);
                }
                prev = cur;
                cur = next;
            }
            if !self.is_rehashing() {
                break;
            }
        }
        Err(DictError::KeyNotFound)
    }

    /// Pick a random entry: a random non-empty bucket, then a random position
    /// in its chain.
    ///
    /// While rehashing the bucket is drawn from the combined address space of
    /// both generations. Already migrated `ht[0]` buckets are empty and get
    /// redrawn, which skews the choice toward entries in `ht[1]` until the
    /// rehash completes.
    pub fn random_key(&mut self) -> Option<Handle> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }

        let head = if self.is_rehashing() {
            let s0 = self.ht[0].size();
            let total = s0 + self.ht[1].size();
            loop {
                let i = self.rng.gen_range(0..total);
                let head = if i >= s0 {
                    self.ht[1].buckets[i - s0]
                } else {
                    self.ht[0].buckets[i]
                };
                if head.is_some() {
                    break head;
                }
            }
        } else {
            let size = self.ht[0].size();
            loop {
                let i = self.rng.gen_range(0..size);
                if let Some(head) = self.ht[0].buckets[i] {
                    break Some(head);
                }
            }
        };

        let len = self.chain(head).count();
        let pos = self.rng.gen_range(0..len);
        self.chain(head).nth(pos).map(Handle::new)
    }

    /// Collect up to `count` entries by walking consecutive buckets from a
    /// random start in each generation. Cheaper than repeated `random_key`,
    /// and correspondingly less random.
    pub fn random_keys(&mut self, count: usize) -> Vec<Handle> {
        let count = count.min(self.len());
        let mut out = Vec::with_capacity(count);
        if count == 0 {
            return out;
        }
        for t in 0..2 {
            let size = self.ht[t].size();
            if size == 0 {
                continue;
            }
            let mut i = self.rng.gen_range(0..size);
            let table = &self.ht[t];
            for _ in 0..size {
                for k in self.chain(table.buckets[i]) {
                    out.push(Handle::new(k));
                    if out.len() == count {
                        return out;
                    }
                }
                i = (i + 1) & table.mask;
            }
            debug_assert!(self.is_rehashing(), "ht[0] alone held fewer than len() entries");
        }
        out
    }

    /// Drop every entry through the destructors and reset to the unallocated
    /// state. `callback` sees the type descriptor every 65536 buckets.
    pub fn empty<F: FnMut(&T)>(&mut self, mut callback: F) {
        let removed = self.len();
        for t in 0..2 {
            let table = core::mem::replace(&mut self.ht[t], Table::unallocated());
            let mut remaining = table.used;
            for (i, head) in table.buckets.into_iter().enumerate() {
                if remaining == 0 {
                    break;
                }
                if i & 0xffff == 0 {
                    callback(&self.ty);
                }
                let mut cur = head;
                while let Some(k) = cur {
                    let Some(entry) = self.slots.remove(k) else {
                        break;
                    };
                    cur = entry.next;
                    remaining = remaining.saturating_sub(1);
                    destroy_entry(&self.ty, entry);
                }
            }
        }
        debug_assert!(self.slots.is_empty());
        self.rehash_idx = None;
        self.safe_iterators = 0;
        trace!(removed, "dict emptied");
    }

    pub fn clear(&mut self) {
        self.empty(|_| {});
    }

    /// Destroy the dict and every entry it owns.
    pub fn release(self) {
        drop(self)
    }
}

impl<T: DictType> Drop for Dict<T> {
    fn drop(&mut self) {
        for (_, entry) in self.slots.drain() {
            destroy_entry(&self.ty, entry);
        }
    }
}

impl<T: DictType> fmt::Debug for Dict<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.len())
            .field("ht0_size", &self.ht[0].size())
            .field("ht1_size", &self.ht[1].size())
            .field("rehash_idx", &self.rehash_idx)
            .field("safe_iterators", &self.safe_iterators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::INITIAL_SIZE;
    use crate::types::BinaryKeys;
    use std::collections::BTreeSet;

    type StrDict = Dict<BinaryKeys<String, i32>>;

    fn dict() -> StrDict {
        Dict::with_config(BinaryKeys::new(), DictConfig::default().with_rng_seed(1))
    }

    /// Every slot-map entry is reachable from exactly one generation and the
    /// per-generation counts agree with the chains.
    fn assert_structure(d: &StrDict) {
        let mut seen = BTreeSet::new();
        for table in &d.ht {
            let mut count = 0;
            for (i, &head) in table.buckets.iter().enumerate() {
                for k in d.chain(head) {
                    assert!(seen.insert(k), "entry reachable twice");
                    assert_eq!(table.bucket_of(d.hash_key(&d.slots[k].key)), i);
                    count += 1;
                }
            }
            assert_eq!(count, table.used);
        }
        assert_eq!(seen.len(), d.slots.len());
        assert_eq!(d.rehash_idx.is_none(), !d.ht[1].is_allocated());
    }

    #[test]
    fn first_insert_allocates_minimum_table() {
        let mut d = dict();
        assert_eq!(d.slots(), 0);
        d.add("a".to_string(), 1).unwrap();
        assert_eq!(d.slots(), INITIAL_SIZE);
        assert!(!d.is_rehashing());
    }

    #[test]
    fn entries_stay_in_one_generation_while_rehashing() {
        let mut d = dict();
        for i in 0..40 {
            d.add(format!("k{i}"), i).unwrap();
            assert_structure(&d);
        }
        while d.rehash(1) {
            assert_structure(&d);
        }
        assert_structure(&d);
        assert_eq!(d.len(), 40);
    }

    #[test]
    fn inserts_during_rehash_land_in_new_generation() {
        let mut d = dict();
        for i in 0..4 {
            d.add(format!("k{i}"), i).unwrap();
        }
        d.add("k4".to_string(), 4).unwrap();
        assert!(d.is_rehashing());
        let before = d.ht[1].used;
        // Safe iterator pauses the opportunistic step so only the insert moves counts.
        let it = d.safe_iterator();
        d.add("k5".to_string(), 5).unwrap();
        d.release_iterator(it);
        assert_eq!(d.ht[1].used, before + 1);
        assert_structure(&d);
    }

    #[test]
    fn delete_unlinks_from_chain_middle() {
        #[derive(Default)]
        struct OneBucket;
        impl DictType for OneBucket {
            type Key = u32;
            type Value = u32;
            fn hash(&self, _key: &u32, _seed: u32) -> u64 {
                0
            }
        }
        let mut d = Dict::new(OneBucket);
        for k in 0..3 {
            d.add(k, k * 10).unwrap();
        }
        d.delete(&1).unwrap();
        assert_eq!(d.get(&0), Some(&0));
        assert_eq!(d.get(&2), Some(&20));
        assert!(!d.contains_key(&1));
        assert_eq!(d.ht[0].used, 2);
        assert_eq!(d.chain(d.ht[0].buckets[0]).count(), 2);
    }

    #[test]
    fn fingerprint_tracks_structure() {
        let mut d = dict();
        let empty = d.fingerprint();
        d.add("a".to_string(), 1).unwrap();
        let one = d.fingerprint();
        assert_ne!(empty, one);
        // Value updates are not structural.
        d.replace("a".to_string(), 2);
        assert_eq!(one, d.fingerprint());
        d.delete(&"a".to_string()).unwrap();
        assert_ne!(one, d.fingerprint());
    }

    #[test]
    fn empty_resets_state_and_invokes_callback() {
        let mut d = dict();
        for i in 0..100 {
            d.add(format!("k{i}"), i).unwrap();
        }
        let mut calls = 0;
        d.empty(|_| calls += 1);
        assert!(calls >= 1);
        assert!(d.is_empty());
        assert_eq!(d.slots(), 0);
        assert!(!d.is_rehashing());
        assert!(d.slots.is_empty());
        // Usable again afterwards.
        d.add("again".to_string(), 1).unwrap();
        assert_eq!(d.get(&"again".to_string()), Some(&1));
    }

    #[test]
    fn stale_handle_does_not_alias_new_entry() {
        let mut d = dict();
        let h1 = d.add("old".to_string(), 1).unwrap();
        d.delete(&"old".to_string()).unwrap();
        let h2 = d.add("new".to_string(), 2).unwrap();
        assert_ne!(h1, h2);
        assert!(h1.value(&d).is_none());
        assert_eq!(d.set_value(h1, 5), Err(DictError::KeyNotFound));
        assert_eq!(h2.value(&d), Some(&2));
    }
}
