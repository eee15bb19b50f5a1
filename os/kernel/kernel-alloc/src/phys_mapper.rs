//! # Physical Memory Access
//!
//! Code can only dereference virtual addresses. Page tables, zero-filled
//! frames and copied frames are all addressed physically, so the subsystem
//! goes through a [`PhysMapper`] that turns a physical address into a pointer
//! in the current address space.
//!
//! - **Kernel**: physical memory is direct-mapped at
//!   [`DIRECT_MAP_BASE`]; [`DirectMapper::kernel`] adds that offset.
//! - **Host**: a [`FrameArena`](crate::arena::FrameArena) hands out a
//!   [`DirectMapper`] whose offset points into a heap block.

use core::ptr;
use kernel_info::memory::DIRECT_MAP_BASE;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// One frame's worth of bytes.
pub type FrameBytes = [u8; PAGE_SIZE as usize];

/// Converts physical addresses to usable pointers in the current virtual
/// address space.
///
/// Only [`phys_to_ptr`](Self::phys_to_ptr) is required; the frame-level
/// helpers are built on it.
pub trait PhysMapper {
    /// Pointer through which the byte at `pa` can be accessed.
    ///
    /// Computing the pointer is safe; dereferencing it is only valid if `pa`
    /// is backed by memory the caller may touch.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// Typed view of the memory at `pa`.
    ///
    /// # Safety
    /// - `pa` must be mapped and writable, and suitably aligned for `T`.
    /// - The bytes at `pa` must be a valid `T`.
    /// - No other reference to the same memory may be live for `'a`.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_ptr(pa).cast::<T>() }
    }

    /// Read-only view of a frame.
    ///
    /// # Safety
    /// `frame` must be backed by memory and not mutated for `'a`.
    #[inline]
    unsafe fn frame_bytes<'a>(&self, frame: PhysicalPage) -> &'a FrameBytes {
        unsafe { &*self.phys_to_ptr(frame.base()).cast::<FrameBytes>() }
    }

    /// Mutable view of a frame.
    ///
    /// # Safety
    /// `frame` must be backed by memory that nothing else references for `'a`.
    #[inline]
    unsafe fn frame_bytes_mut<'a>(&self, frame: PhysicalPage) -> &'a mut FrameBytes {
        unsafe { self.phys_to_mut(frame.base()) }
    }

    /// Fill a frame with zeros.
    ///
    /// # Safety
    /// `frame` must be backed by memory owned by the caller.
    #[inline]
    unsafe fn zero_frame(&self, frame: PhysicalPage) {
        unsafe { ptr::write_bytes(self.phys_to_ptr(frame.base()), 0, PAGE_SIZE as usize) }
    }

    /// Copy the contents of `src` into `dst`.
    ///
    /// # Safety
    /// Both frames must be backed by memory, `dst` owned by the caller, and
    /// the frames must differ.
    #[inline]
    unsafe fn copy_frame(&self, dst: PhysicalPage, src: PhysicalPage) {
        debug_assert_ne!(dst, src);
        unsafe {
            ptr::copy_nonoverlapping(
                self.phys_to_ptr(src.base()),
                self.phys_to_ptr(dst.base()),
                PAGE_SIZE as usize,
            );
        }
    }
}

/// [`PhysMapper`] for a linear mapping: `va = pa + offset` (wrapping).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DirectMapper {
    offset: u64,
}

impl DirectMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// The kernel's direct map of physical memory.
    #[must_use]
    pub const fn kernel() -> Self {
        Self::new(DIRECT_MAP_BASE)
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for DirectMapper {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        pa.as_u64().wrapping_add(self.offset) as usize as *mut u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_mapper_adds_offset() {
        let m = DirectMapper::new(0x1000);
        assert_eq!(m.phys_to_ptr(PhysicalAddress::new(0x234)) as usize, 0x1234);
    }

    #[test]
    fn direct_mapper_wraps() {
        let m = DirectMapper::new(0u64.wrapping_sub(0x8000_0000));
        assert_eq!(m.phys_to_ptr(PhysicalAddress::new(0x8000_1000)) as usize, 0x1000);
    }
}
