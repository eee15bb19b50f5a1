//! Hosted physical memory.
//!
//! A [`FrameArena`] is a page-aligned heap block posing as physical RAM that
//! starts at [`HOSTED_PHYS_BASE`]. It owns a [`BitmapFrameAlloc`] over its
//! frames and hands out a [`DirectMapper`] translating those physical
//! addresses back into the block. The mapper's pointers are valid only while
//! the arena is alive.

use crate::frame_alloc::BitmapFrameAlloc;
use crate::phys_mapper::DirectMapper;
use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use core::ptr::NonNull;
use kernel_info::memory::HOSTED_PHYS_BASE;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

pub struct FrameArena {
    memory: NonNull<u8>,
    layout: Layout,
    frames: BitmapFrameAlloc,
}

impl FrameArena {
    /// Reserve `frames` zeroed frames.
    ///
    /// # Panics
    /// If `frames` is zero. Heap exhaustion goes through the allocation error
    /// handler.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(frames: usize) -> Self {
        assert!(frames > 0, "frame arena needs at least one frame");
        let Ok(layout) = Layout::from_size_align(frames * PAGE_SIZE as usize, PAGE_SIZE as usize)
        else {
            panic!("frame arena of {frames} frames exceeds the address space");
        };

        // SAFETY: layout has a non-zero size.
        let Some(memory) = NonNull::new(unsafe { alloc_zeroed(layout) }) else {
            handle_alloc_error(layout)
        };

        let base = PhysicalPage::containing(PhysicalAddress::new(HOSTED_PHYS_BASE));
        Self {
            memory,
            layout,
            frames: BitmapFrameAlloc::new(base, frames),
        }
    }

    /// The allocator over this arena's frames.
    #[must_use]
    pub const fn frame_alloc(&self) -> &BitmapFrameAlloc {
        &self.frames
    }

    /// Mapper from this arena's physical addresses to host pointers.
    #[must_use]
    pub fn mapper(&self) -> DirectMapper {
        let host = self.memory.as_ptr() as usize as u64;
        DirectMapper::new(host.wrapping_sub(HOSTED_PHYS_BASE))
    }
}

// SAFETY: the block is only reached through raw pointers from `mapper`;
// the arena itself never reads or writes it.
unsafe impl Send for FrameArena {}
unsafe impl Sync for FrameArena {}

impl Drop for FrameArena {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { dealloc(self.memory.as_ptr(), self.layout) }
    }
}
