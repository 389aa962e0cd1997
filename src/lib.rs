//! keyspace-dict: the in-memory hash table behind a key-value store's
//! keyspace, with incremental rehashing and a resize-tolerant scan cursor.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a table that grows and shrinks without ever pausing a caller for
//!   a full rehash, and that can be enumerated page by page while it does.
//! - Layers:
//!   - Table: one generation, a power-of-two array of chain heads.
//!   - Dict<T>: two generations plus the rehash index. `ht[0]` serves
//!     traffic; `ht[1]` exists only while entries migrate into it.
//!   - Rehashing: `expand` allocates the target generation; entries then
//!     move one bucket per add/find/delete, or in time-boxed batches
//!     through `rehash_milliseconds`.
//!   - Iteration: a borrowing `Iter`, plus detached safe/unsafe
//!     `DictIterator`s for callers that mutate between steps.
//!   - Scan: a reverse-binary cursor that survives resizes between calls.
//!
//! Constraints
//! - Single owner, no locking. The hazard is reentrancy through the
//!   descriptor hooks and through mutation during iteration.
//! - Entries live in a per-dict `SlotMap`; chains link generational keys,
//!   so migration relinks entries and never copies them.
//! - Keys are unique; `add` on a present key fails with `KeyExists`.
//! - No operation blocks. `rehash_milliseconds` is the only one with a
//!   deadline.
//!
//! Type descriptor
//! - `DictType` supplies the hash plus optional comparison, dup and destroy
//!   hooks. Stock descriptors cover binary-safe keys, ASCII
//!   case-insensitive keys and integer keys.
//! - Hash seed, resize toggle, force-resize ratio and the sampling RNG seed
//!   live in a per-dict `DictConfig`.
//!
//! Iteration safety
//! - Borrowing `Iter` makes mutation during unsafe iteration a compile
//!   error.
//! - A detached unsafe iterator captures a fingerprint of both
//!   generations' identity, size and fill; `release_iterator` compares it
//!   in debug builds and panics on mismatch.
//! - A safe iterator suspends opportunistic and bulk rehashing until it is
//!   released, so entries never move under it.
//! - Detached iterators carry a linear token; dropping one without
//!   `release_iterator` panics in debug builds.
//!
//! Notes and non-goals
//! - No thread safety, persistence or network surface. Callers own those.
//! - Random sampling while rehashing favours entries in the new generation
//!   until migration completes.

mod config;
mod dict;
mod dict_proptest;
mod error;
mod fingerprint;
pub mod hash;
mod iter;
mod rehash;
mod scan;
mod table;
mod tokens;
mod types;

// Public surface
pub use config::{DictConfig, DEFAULT_FORCE_RESIZE_RATIO};
pub use dict::{Dict, Entry, Handle};
pub use error::{DictError, ResizeRejection};
pub use iter::{DictIterator, Iter};
pub use rehash::HASHTABLE_MIN_FILL;
pub use table::INITIAL_SIZE;
pub use types::{BinaryKeys, CaseInsensitiveKeys, DictType, IntKeys};
