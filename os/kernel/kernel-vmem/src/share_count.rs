//! # Frame Share Counts
//!
//! One entry per frame that is currently shared copy-on-write. The count is
//! the number of COW leaves referencing the frame; the entry exists exactly
//! while that number is positive.
//!
//! ```text
//!  fork ─► acquire (0 → 1 → 2)       unmap ─► release (2 → 1)
//!                                    unmap ─► release (1 → 0) ─► free frame
//! ```
//!
//! Releasing to zero frees the frame inside the same locked update that
//! removes the entry, so two contexts dropping the last two references
//! never both see "still shared" nor both see "last one".

use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_hashmap::{KeyedMap, Update};
use kernel_memory_addresses::PhysicalPage;
use log::trace;

pub struct ShareCounts {
    counts: KeyedMap<u64>,
}

impl ShareCounts {
    /// Empty table with `buckets` buckets.
    ///
    /// # Panics
    /// If `buckets` is zero.
    #[must_use]
    pub fn new(buckets: usize) -> Self {
        Self {
            counts: KeyedMap::named("share counts", buckets),
        }
    }

    /// Add one reference to `frame`. Returns the new count.
    pub fn acquire(&self, frame: PhysicalPage) -> u64 {
        let count = self
            .counts
            .update(frame.base().as_u64(), |_, current| {
                let next = current.copied().unwrap_or(0) + 1;
                (Update::Set(next), next)
            });
        trace!("share count of {frame}: {count}");
        count
    }

    /// Drop one reference to `frame`. Returns the new count.
    ///
    /// When the count reaches zero the entry is removed and, if `free` is
    /// given, the frame is returned to it before the map lock is released.
    ///
    /// # Panics
    /// If `frame` has no references.
    pub fn release<A: FrameAlloc + ?Sized>(&self, frame: PhysicalPage, free: Option<&A>) -> u64 {
        let count = self
            .counts
            .update(frame.base().as_u64(), |_, current| match current.copied() {
                None | Some(0) => panic!("share count underflow for frame {frame}"),
                Some(1) => {
                    if let Some(alloc) = free {
                        alloc.free_frame(frame);
                    }
                    (Update::Remove, 0)
                }
                Some(n) => (Update::Set(n - 1), n - 1),
            });
        trace!("share count of {frame}: {count}");
        count
    }

    /// Current count of `frame`; zero if it is not shared.
    #[must_use]
    pub fn count(&self, frame: PhysicalPage) -> u64 {
        self.counts.get(frame.base().as_u64()).unwrap_or(0)
    }

    /// Number of frames that are currently shared.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
