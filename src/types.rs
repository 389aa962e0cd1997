//! Type descriptors: how a dict hashes, compares, copies and frees its keys
//! and values.

use crate::hash::{gen_case_hash, gen_hash, int_hash};
use core::fmt;
use core::marker::PhantomData;

/// Capabilities a `Dict` needs from its key/value types.
///
/// Only `hash` is required. The descriptor value is owned by the dict and
/// every hook receives `&self`, so any per-dict context a caller wants to
/// thread through lives in the descriptor itself.
pub trait DictType {
    type Key: Eq;
    type Value;

    fn hash(&self, key: &Self::Key, seed: u32) -> u64;

    fn key_eq(&self, a: &Self::Key, b: &Self::Key) -> bool {
        a == b
    }

    /// Runs once per successful insertion; the dict owns the returned key.
    fn dup_key(&self, key: Self::Key) -> Self::Key {
        key
    }

    /// Runs every time a value is stored; the dict owns the returned value.
    fn dup_value(&self, value: Self::Value) -> Self::Value {
        value
    }

    fn destroy_key(&self, key: Self::Key) {
        drop(key)
    }

    fn destroy_value(&self, value: Self::Value) {
        drop(value)
    }
}

/// Binary-safe keys hashed with the seeded `gen_hash`. This is the keyspace
/// type.
pub struct BinaryKeys<K, V> {
    _pd: PhantomData<fn() -> (K, V)>,
}

/// Keys compared and hashed ignoring ASCII case, e.g. command names.
pub struct CaseInsensitiveKeys<K, V> {
    _pd: PhantomData<fn() -> (K, V)>,
}

/// `u32` keys mixed with `int_hash`. The seed is not used.
pub struct IntKeys<V> {
    _pd: PhantomData<fn() -> V>,
}

macro_rules! marker_impls {
    ($name:ident<$($p:ident),+>) => {
        impl<$($p),+> $name<$($p),+> {
            pub const fn new() -> Self {
                Self { _pd: PhantomData }
            }
        }

        impl<$($p),+> Default for $name<$($p),+> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<$($p),+> Clone for $name<$($p),+> {
            fn clone(&self) -> Self {
                Self::new()
            }
        }

        impl<$($p),+> fmt::Debug for $name<$($p),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };
}

marker_impls!(BinaryKeys<K, V>);
marker_impls!(CaseInsensitiveKeys<K, V>);
marker_impls!(IntKeys<V>);

impl<K, V> DictType for BinaryKeys<K, V>
where
    K: AsRef<[u8]> + Eq,
{
    type Key = K;
    type Value = V;

    fn hash(&self, key: &K, seed: u32) -> u64 {
        u64::from(gen_hash(key.as_ref(), seed))
    }
}

impl<K, V> DictType for CaseInsensitiveKeys<K, V>
where
    K: AsRef<[u8]> + Eq,
{
    type Key = K;
    type Value = V;

    fn hash(&self, key: &K, seed: u32) -> u64 {
        u64::from(gen_case_hash(key.as_ref(), seed))
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a.as_ref().eq_ignore_ascii_case(b.as_ref())
    }
}

impl<V> DictType for IntKeys<V> {
    type Key = u32;
    type Value = V;

    fn hash(&self, key: &u32, _seed: u32) -> u64 {
        u64::from(int_hash(*key))
    }
}
