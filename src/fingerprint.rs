//! Debug-only structural fingerprint.
//!
//! An unsafe iterator records a checksum of the dict's generation metadata
//! when it is created and compares it when released. In debug builds a
//! mismatch panics. In release builds the recorded value does not exist and
//! the checks compile to nothing.

/// Checksum captured by a detached unsafe iterator.
#[derive(Debug)]
pub(crate) struct DebugFingerprint {
    #[cfg(debug_assertions)]
    value: u64,
}

impl DebugFingerprint {
    /// Record the fingerprint produced by `compute`. Release builds never
    /// call it.
    #[inline]
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) fn capture<F: FnOnce() -> u64>(compute: F) -> Self {
        Self {
            #[cfg(debug_assertions)]
            value: compute(),
        }
    }

    /// Panics in debug builds if `compute` disagrees with the recorded value.
    #[inline]
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub(crate) fn verify<F: FnOnce() -> u64>(&self, compute: F) {
        #[cfg(debug_assertions)]
        assert_eq!(
            self.value,
            compute(),
            "dict structurally mutated while an unsafe iterator was outstanding"
        );
    }
}

/// Fold a sequence of integers into one 64-bit value. Order matters.
pub(crate) fn mix(integers: &[u64]) -> u64 {
    integers.iter().fold(0u64, |mut h, &x| {
        h = h.wrapping_add(x);
        h = (!h).wrapping_add(h << 21);
        h ^= h >> 24;
        h = h.wrapping_add(h << 3).wrapping_add(h << 8);
        h ^= h >> 14;
        h = h.wrapping_add(h << 2).wrapping_add(h << 4);
        h ^= h >> 28;
        h.wrapping_add(h << 31)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_fingerprint_is_ok() {
        let fp = DebugFingerprint::capture(|| 17);
        fp.verify(|| 17);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn mismatch_panics_in_debug() {
        let fp = DebugFingerprint::capture(|| 17);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            fp.verify(|| 18);
        }));
        assert!(res.is_err(), "expected fingerprint mismatch to panic");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn mismatch_is_noop_in_release() {
        let fp = DebugFingerprint::capture(|| 17);
        fp.verify(|| 18);
    }

    #[test]
    fn mix_is_order_sensitive() {
        assert_ne!(mix(&[1, 2, 3]), mix(&[3, 2, 1]));
        assert_ne!(mix(&[1, 4, 0, 0, 0, 0]), mix(&[1, 4, 1, 0, 0, 0]));
        assert_eq!(mix(&[5, 6]), mix(&[5, 6]));
    }
}
