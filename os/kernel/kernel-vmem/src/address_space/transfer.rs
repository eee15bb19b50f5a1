//! Copying bytes between kernel buffers and user memory.
//!
//! Transfers go page by page through the kernel's view of each frame.
//! A deferred page is materialized and a shared page gets its private copy
//! before it is touched, in either direction.

use super::AddressSpace;
use crate::error::VmError;
use crate::pte::Backing;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

impl<A: FrameAlloc, M: PhysMapper> AddressSpace<'_, A, M> {
    /// Private frame behind the user page `page`, resolving copy-on-write
    /// and deferred backing first.
    fn user_frame(&mut self, page: VirtualAddress) -> Result<PhysicalPage, VmError> {
        match self.translate_page(page).ok_or(VmError::Unmapped(page))? {
            Backing::Private(frame) => Ok(frame),
            Backing::Shared { .. } => {
                self.resolve_cow_fault(page)?;
                self.user_frame(page)
            }
            Backing::Deferred => {
                self.resolve_demand_fault(page)?;
                self.user_frame(page)
            }
        }
    }

    /// Copy `src` to user memory at `dst`.
    ///
    /// # Errors
    /// - [`VmError::Unmapped`] if a destination page is not user accessible.
    /// - [`VmError::OutOfFrames`] if a private copy or deferred page cannot
    ///   be allocated.
    ///
    /// Bytes before the failing page have been written.
    #[allow(clippy::cast_possible_truncation)]
    pub fn copy_out(&mut self, dst: VirtualAddress, src: &[u8]) -> Result<(), VmError> {
        let vm = self.vm;
        let mut va = dst;
        let mut done = 0;
        while done < src.len() {
            let (page, offset) = va.split();
            let frame = self.user_frame(page.base())?;

            let offset = offset as usize;
            let n = (PAGE_SIZE as usize - offset).min(src.len() - done);
            // SAFETY: `frame` is a private user frame of this space.
            let bytes = unsafe { vm.mapper().frame_bytes_mut(frame) };
            bytes[offset..offset + n].copy_from_slice(&src[done..done + n]);

            done += n;
            va = page.next().base();
        }
        Ok(())
    }

    /// Fill `dst` from user memory at `src`.
    ///
    /// # Errors
    /// - [`VmError::Unmapped`] if a source page is not user accessible.
    /// - [`VmError::OutOfFrames`] if a private copy or deferred page cannot
    ///   be allocated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn copy_in(&mut self, dst: &mut [u8], src: VirtualAddress) -> Result<(), VmError> {
        let vm = self.vm;
        let mut va = src;
        let mut done = 0;
        while done < dst.len() {
            let (page, offset) = va.split();
            let frame = self.user_frame(page.base())?;

            let offset = offset as usize;
            let n = (PAGE_SIZE as usize - offset).min(dst.len() - done);
            // SAFETY: `frame` is a private user frame of this space.
            let bytes = unsafe { vm.mapper().frame_bytes(frame) };
            dst[done..done + n].copy_from_slice(&bytes[offset..offset + n]);

            done += n;
            va = page.next().base();
        }
        Ok(())
    }

    /// Copy a NUL-terminated string from user memory at `src` into `dst`,
    /// terminator included. At most `dst.len()` bytes are read.
    ///
    /// Returns the string length without the terminator.
    ///
    /// # Errors
    /// - [`VmError::MissingTerminator`] if the first `dst.len()` bytes hold
    ///   no NUL.
    /// - [`VmError::Unmapped`] if a source page is not user accessible.
    /// - [`VmError::OutOfFrames`] if a private copy or deferred page cannot
    ///   be allocated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn copy_in_str(
        &mut self,
        dst: &mut [u8],
        src: VirtualAddress,
    ) -> Result<usize, VmError> {
        let vm = self.vm;
        let max = dst.len();
        let mut va = src;
        let mut done = 0;
        while done < max {
            let (page, offset) = va.split();
            let frame = self.user_frame(page.base())?;

            let offset = offset as usize;
            let n = (PAGE_SIZE as usize - offset).min(max - done);
            // SAFETY: `frame` is a private user frame of this space.
            let bytes = &unsafe { vm.mapper().frame_bytes(frame) }[offset..offset + n];

            if let Some(len) = bytes.iter().position(|&b| b == 0) {
                dst[done..=done + len].copy_from_slice(&bytes[..=len]);
                return Ok(done + len);
            }
            dst[done..done + n].copy_from_slice(bytes);

            done += n;
            va = page.next().base();
        }
        Err(VmError::MissingTerminator { max })
    }
}
