//! Traversal: a borrowing `Iter` and detached safe/unsafe `DictIterator`s.
//!
//! Order is `ht[0]` buckets by index, most recently inserted first within a
//! bucket, then `ht[1]` from bucket 0 when a rehash is in progress.

use crate::dict::{Dict, Entry, Handle};
use crate::fingerprint::DebugFingerprint;
use crate::tokens::ReleaseToken;
use crate::types::DictType;
use slotmap::DefaultKey;

/// Position shared by both iterator flavours.
#[derive(Debug, Default)]
struct Walk {
    table: usize,
    index: usize,
    /// Entry returned by the last call.
    current: Option<DefaultKey>,
    /// Successor of `current` when it was returned, used only if `current`
    /// has since been deleted.
    next_entry: Option<DefaultKey>,
}

impl Walk {
    fn advance<T: DictType>(&mut self, dict: &Dict<T>) -> Option<DefaultKey> {
        loop {
            // A live current entry has an up-to-date link even if its old
            // successor was unlinked.
            let candidate = match self.current.take() {
                Some(cur) => match dict.slots.get(cur) {
                    Some(entry) => entry.next,
                    None => self.next_entry,
                },
                None => self.next_entry,
            };
            self.next_entry = None;
            if let Some(k) = candidate {
                if let Some(entry) = dict.slots.get(k) {
                    self.current = Some(k);
                    self.next_entry = entry.next;
                    return Some(k);
                }
            }
            match dict.ht[self.table].buckets.get(self.index) {
                Some(&head) => {
                    self.next_entry = head;
                    self.index += 1;
                }
                None if self.table == 0 && dict.is_rehashing() => {
                    self.table = 1;
                    self.index = 0;
                }
                None => return None,
            }
        }
    }
}

/// Borrowing iterator. Holding it keeps the dict immutable, so no
/// fingerprint is needed.
pub struct Iter<'a, T: DictType> {
    dict: &'a Dict<T>,
    walk: Walk,
}

impl<'a, T: DictType> Iterator for Iter<'a, T> {
    type Item = &'a Entry<T::Key, T::Value>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let dict = self.dict;
        let k = self.walk.advance(dict)?;
        dict.slots.get(k)
    }
}

impl<'a, T: DictType> IntoIterator for &'a Dict<T> {
    type Item = &'a Entry<T::Key, T::Value>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator detached from the dict's borrow, advanced with `next(&dict)`
/// and handed back through `Dict::release_iterator`.
///
/// A safe iterator permits mutation between steps and pauses opportunistic
/// rehashing while outstanding. An unsafe one forbids structural mutation;
/// debug builds check that at release.
#[derive(Debug)]
pub struct DictIterator {
    walk: Walk,
    safe: bool,
    fingerprint: Option<DebugFingerprint>,
    token: ReleaseToken,
}

impl DictIterator {
    pub fn is_safe(&self) -> bool {
        self.safe
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next<T: DictType>(&mut self, dict: &Dict<T>) -> Option<Handle> {
        self.walk.advance(dict).map(Handle::new)
    }
}

impl<T: DictType> Dict<T> {
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            dict: self,
            walk: Walk::default(),
        }
    }

    /// Detached iterator that must not overlap structural mutation.
    pub fn iterator(&self) -> DictIterator {
        DictIterator {
            walk: Walk::default(),
            safe: false,
            fingerprint: Some(DebugFingerprint::capture(|| self.fingerprint())),
            token: ReleaseToken::new(),
        }
    }

    /// Detached iterator that tolerates add/delete between steps.
    pub fn safe_iterator(&mut self) -> DictIterator {
        self.safe_iterators += 1;
        DictIterator {
            walk: Walk::default(),
            safe: true,
            fingerprint: None,
            token: ReleaseToken::new(),
        }
    }

    /// Return a detached iterator. For an unsafe iterator this is where a
    /// structural mutation since creation is caught (debug builds only).
    pub fn release_iterator(&mut self, it: DictIterator) {
        let DictIterator {
            safe,
            fingerprint,
            token,
            ..
        } = it;
        token.consume();
        if safe {
            self.safe_iterators = self.safe_iterators.saturating_sub(1);
        } else if let Some(fp) = fingerprint {
            fp.verify(|| self.fingerprint());
        }
    }
}
