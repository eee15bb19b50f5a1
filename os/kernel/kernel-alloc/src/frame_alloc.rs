//! Physical frame allocation.

use alloc::vec;
use alloc::vec::Vec;
use kernel_memory_addresses::PhysicalPage;
use kernel_sync::SpinLock;
use log::trace;

/// Source of 4 KiB physical frames.
///
/// Implementations are shared between execution contexts, hence `&self`.
/// Returned frames are page aligned; their contents are unspecified.
pub trait FrameAlloc {
    /// Allocate one frame. Returns `None` on out-of-memory.
    fn alloc_frame(&self) -> Option<PhysicalPage>;

    /// Return a frame obtained from [`alloc_frame`](Self::alloc_frame).
    fn free_frame(&self, frame: PhysicalPage);
}

impl<T: FrameAlloc + ?Sized> FrameAlloc for &T {
    #[inline]
    fn alloc_frame(&self) -> Option<PhysicalPage> {
        (**self).alloc_frame()
    }

    #[inline]
    fn free_frame(&self, frame: PhysicalPage) {
        (**self).free_frame(frame);
    }
}

/// Bitmap allocator over `frames` consecutive frames starting at `base`.
///
/// One bit per frame, `1` = in use. A search hint keeps allocation O(1) in
/// the common case.
///
/// ### Panics
/// Freeing a frame twice, or a frame outside the managed range, is a fatal
/// usage error.
pub struct BitmapFrameAlloc {
    base: PhysicalPage,
    frames: usize,
    state: SpinLock<Bitmap>,
}

struct Bitmap {
    words: Vec<u64>,
    in_use: usize,
    /// Lowest word that may contain a free bit.
    hint: usize,
}

impl BitmapFrameAlloc {
    #[must_use]
    pub fn new(base: PhysicalPage, frames: usize) -> Self {
        let mut words = vec![0_u64; frames.div_ceil(64)];
        // Bits past the end of the range are permanently "in use".
        let tail = frames % 64;
        if tail != 0
            && let Some(last) = words.last_mut()
        {
            *last = !0 << tail;
        }
        log::debug!("bitmap frame allocator: {frames} frames at {base}");
        Self {
            base,
            frames,
            state: SpinLock::named("frame bitmap", Bitmap {
                words,
                in_use: 0,
                hint: 0,
            }),
        }
    }

    /// Number of frames managed.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.frames
    }

    /// Frames currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.state.with_lock(|bm| bm.in_use)
    }

    /// Frames still available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.frames - self.in_use()
    }

    /// `true` if `frame` lies within the managed range.
    #[must_use]
    pub const fn contains(&self, frame: PhysicalPage) -> bool {
        let first = self.base.number();
        let n = frame.number();
        n >= first && n - first < self.frames as u64
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index_of(&self, frame: PhysicalPage) -> usize {
        assert!(
            self.contains(frame),
            "free of frame {frame} outside allocator range"
        );
        (frame.number() - self.base.number()) as usize
    }
}

impl FrameAlloc for BitmapFrameAlloc {
    fn alloc_frame(&self) -> Option<PhysicalPage> {
        let index = self.state.with_lock(|bm| {
            let start = bm.hint;
            let (w, word) = bm
                .words
                .iter_mut()
                .enumerate()
                .skip(start)
                .find(|(_, word)| **word != u64::MAX)?;
            let bit = word.trailing_ones() as usize;
            *word |= 1 << bit;
            bm.in_use += 1;
            bm.hint = w;
            Some(w * 64 + bit)
        })?;

        let frame = self.base.add_frames(index as u64);
        trace!("alloc frame {frame}");
        Some(frame)
    }

    fn free_frame(&self, frame: PhysicalPage) {
        let index = self.index_of(frame);
        let (w, bit) = (index / 64, index % 64);
        self.state.with_lock(|bm| {
            let word = &mut bm.words[w];
            assert!(*word & (1 << bit) != 0, "double free of frame {frame}");
            *word &= !(1 << bit);
            bm.in_use -= 1;
            bm.hint = bm.hint.min(w);
        });
        trace!("free frame {frame}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    fn base() -> PhysicalPage {
        PhysicalPage::containing(PhysicalAddress::new(0x8000_0000))
    }

    #[test]
    fn hands_out_every_frame_once_then_none() {
        let a = BitmapFrameAlloc::new(base(), 70);
        let mut seen = Vec::new();
        while let Some(f) = a.alloc_frame() {
            assert!(a.contains(f));
            seen.push(f);
        }
        assert_eq!(seen.len(), 70);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 70);
        assert_eq!(a.in_use(), 70);
        assert_eq!(a.available(), 0);
    }

    #[test]
    fn freed_frames_are_reused() {
        let a = BitmapFrameAlloc::new(base(), 3);
        let f0 = a.alloc_frame().unwrap();
        let f1 = a.alloc_frame().unwrap();
        let _f2 = a.alloc_frame().unwrap();
        assert!(a.alloc_frame().is_none());

        a.free_frame(f1);
        assert_eq!(a.alloc_frame(), Some(f1));
        a.free_frame(f0);
        assert_eq!(a.in_use(), 2);
        assert_eq!(a.alloc_frame(), Some(f0));
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_is_fatal() {
        let a = BitmapFrameAlloc::new(base(), 2);
        let f = a.alloc_frame().unwrap();
        a.free_frame(f);
        a.free_frame(f);
    }

    #[test]
    #[should_panic(expected = "outside allocator range")]
    fn foreign_frame_is_fatal() {
        let a = BitmapFrameAlloc::new(base(), 2);
        a.free_frame(base().add_frames(2));
    }

    #[test]
    fn blanket_impl_for_references() {
        fn take<A: FrameAlloc>(a: A) -> Option<PhysicalPage> {
            a.alloc_frame()
        }
        let a = BitmapFrameAlloc::new(base(), 1);
        assert_eq!(take(&a), Some(base()));
        assert_eq!(take(&a), None);
    }
}
