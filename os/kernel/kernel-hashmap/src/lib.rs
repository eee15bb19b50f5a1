//! # Concurrent Hash Maps
//!
//! Two chained hash maps, each guarded by a single [`SpinLock`](kernel_sync::SpinLock)
//! held for the full duration of every operation:
//!
//! - [`KeyedMap`]: machine-word keys, `hash = key % table_size`. Backs the
//!   per-frame share counts of copy-on-write pages and the process registry.
//! - [`PageMap`]: keys are page-aligned physical addresses, but hashing and
//!   equality look at the **content** of the page at that address. Two
//!   distinct frames with identical bytes land in the same bucket and compare
//!   equal, which is what page deduplication needs.
//!
//! ```text
//!  buckets (fixed, prime)      chains (heap nodes, newest first)
//!  ┌────┐
//!  │  0 │ ── ∅
//!  │  1 │ ── [k=8] ── [k=1] ── ∅
//!  │  … │
//!  │  6 │ ── [k=13] ── ∅
//!  └────┘
//! ```
//!
//! ## Atomic read-modify-write
//!
//! [`KeyedMap::update`] and [`PageMap::update`] run a caller-supplied
//! transform while the lock is held. The transform sees the key and the
//! current value (if any) and answers with an [`Update`]: store a new value
//! or remove the entry. The map applies that decision exactly once before
//! releasing the lock, so "read, decide, write back" cannot interleave with
//! another context.
//!
//! ```rust
//! use kernel_hashmap::{KeyedMap, Update};
//!
//! let counts = KeyedMap::new(7);
//! for _ in 0..3 {
//!     counts.update(42, |_, n: Option<&u32>| (Update::Set(n.map_or(1, |n| n + 1)), ()));
//! }
//! assert_eq!(counts.get(42), Some(3));
//!
//! // Decrement; drop the entry when it reaches zero and report that.
//! let hit_zero = counts.update(42, |_, n| match n {
//!     Some(1) => (Update::Remove, true),
//!     Some(n) => (Update::Set(n - 1), false),
//!     None => (Update::Remove, false),
//! });
//! assert!(!hit_zero);
//! ```
//!
//! ## Failure model
//!
//! Node allocation uses the global allocator; exhaustion aborts through the
//! allocation error handler. Acquiring a map's lock from a context that
//! already holds it (for example by touching the same map from inside an
//! `update` transform) panics.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod chain;
mod keyed_map;
mod page_map;

pub use keyed_map::KeyedMap;
pub use page_map::PageMap;

/// Decision returned by an `update` transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update<V> {
    /// Insert the value, or overwrite the existing one.
    Set(V),
    /// Remove the entry if present; no-op otherwise.
    Remove,
}
