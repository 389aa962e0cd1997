//! Hash functions used by the stock dict types.
//!
//! All functions are deterministic for a given seed. Choosing the seed
//! (fixed, or randomized per process to resist hash flooding) is up to the
//! caller; see `DictConfig::with_hash_seed`.

/// Seed used when none is configured.
pub const DEFAULT_SEED: u32 = 5381;

/// MurmurHash2 over `key`, mixing four little-endian bytes at a time.
pub fn gen_hash(key: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = seed ^ (key.len() as u32);

    let mut words = key.chunks_exact(4);
    for w in &mut words {
        let mut k = u32::from_le_bytes([w[0], w[1], w[2], w[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = words.remainder();
    if tail.len() == 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Case-insensitive rolling hash: `hash * 33 + lowercase(byte)`.
pub fn gen_case_hash(buf: &[u8], seed: u32) -> u32 {
    buf.iter().fold(seed, |h, &b| {
        h.wrapping_mul(33)
            .wrapping_add(u32::from(b.to_ascii_lowercase()))
    })
}

/// Thomas Wang's 32-bit integer mix.
pub fn int_hash(key: u32) -> u32 {
    let mut k = key;
    k = k.wrapping_add(!(k << 15));
    k ^= k >> 10;
    k = k.wrapping_add(k << 3);
    k ^= k >> 6;
    k = k.wrapping_add(!(k << 11));
    k ^= k >> 16;
    k
}
