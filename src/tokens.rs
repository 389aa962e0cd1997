//! Linear release token for detached iterators.
//!
//! A detached `DictIterator` may hold a safe-iterator count on its dict, so
//! it has to be handed back through `Dict::release_iterator`. The token it
//! carries is the proof of that obligation: the only valid way to dispose of
//! it is `consume`, and dropping it otherwise panics in debug builds.

/// Zero-sized obligation to call `Dict::release_iterator`.
#[must_use = "a dict iterator must be returned with Dict::release_iterator"]
#[derive(Debug)]
pub(crate) struct ReleaseToken {
    _priv: (),
}

impl ReleaseToken {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { _priv: () }
    }

    /// Discharge the obligation.
    #[inline]
    pub(crate) fn consume(self) {
        core::mem::forget(self);
    }
}

impl Drop for ReleaseToken {
    fn drop(&mut self) {
        // Stay quiet while unwinding so a failing test reports its own panic.
        if cfg!(debug_assertions) && !std::thread::panicking() {
            panic!("dict iterator dropped without Dict::release_iterator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReleaseToken;

    #[test]
    fn consumed_token_is_silent() {
        ReleaseToken::new().consume();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn dropped_token_panics_in_debug() {
        let res = std::panic::catch_unwind(|| {
            let t = ReleaseToken::new();
            drop(t);
        });
        assert!(res.is_err(), "expected dropped token to panic in debug builds");
    }
}
