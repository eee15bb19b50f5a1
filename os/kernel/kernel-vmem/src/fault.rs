//! # Page-Fault Resolution
//!
//! Two kinds of faults are fixed up here; everything else is left to the
//! trap handler, which normally kills the process.
//!
//! | Leaf | Fault | Resolution |
//! |---|---|---|
//! | shared (COW) | store | private copy, write permission restored |
//! | deferred | any | zeroed frame, read/write |
//! | otherwise | any | [`VmError::NotResolvable`] |
//!
//! Running out of frames is reported, never fatal: the caller terminates
//! the faulting process and the kernel carries on.

use crate::address_space::AddressSpace;
use crate::error::VmError;
use crate::pte::{Backing, PteFlags};
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::VirtualAddress;
use log::{debug, warn};

/// Access that caused a page fault.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultKind {
    InstructionFetch,
    Load,
    Store,
}

impl FaultKind {
    /// Decode a RISC-V `scause` exception code.
    ///
    /// `None` for anything that is not a page fault.
    #[must_use]
    pub const fn from_scause(code: u64) -> Option<Self> {
        match code {
            12 => Some(Self::InstructionFetch),
            13 => Some(Self::Load),
            15 => Some(Self::Store),
            _ => None,
        }
    }
}

impl<A: FrameAlloc, M: PhysMapper> AddressSpace<'_, A, M> {
    /// Fix up a fault at `va` if it is one the subsystem is responsible for.
    ///
    /// # Errors
    /// - [`VmError::NotResolvable`] if `va` is not a user page, or the fault
    ///   is not a store to a shared page or a touch of a deferred page.
    /// - [`VmError::OutOfFrames`].
    pub fn resolve_fault(&mut self, va: VirtualAddress, kind: FaultKind) -> Result<(), VmError> {
        match self.translate_page(va) {
            Some(Backing::Shared { .. }) if kind == FaultKind::Store => self.resolve_cow_fault(va),
            Some(Backing::Deferred) => self.resolve_demand_fault(va),
            _ => Err(VmError::NotResolvable(va)),
        }
    }

    /// Give the page containing `va` a private copy of its shared frame.
    ///
    /// The page's share-count reference is dropped, freeing the old frame
    /// if this was its last sharer.
    ///
    /// # Errors
    /// - [`VmError::Unmapped`] if the page is not mapped.
    /// - [`VmError::NotCopyOnWrite`] if it is not shared; nothing changes.
    /// - [`VmError::OutOfFrames`]; the page stays shared.
    pub fn resolve_cow_fault(&mut self, va: VirtualAddress) -> Result<(), VmError> {
        let page = va.page().base();
        let leaf = self.query(page).ok_or(VmError::Unmapped(va))?;
        let Backing::Shared { frame: shared, .. } = leaf.backing else {
            return Err(VmError::NotCopyOnWrite(va));
        };
        let vm = self.vm();

        let Some(frame) = vm.frames().alloc_frame() else {
            warn!("cow fault at {va}: out of frames, caller should terminate the process");
            return Err(VmError::OutOfFrames);
        };
        // SAFETY: `shared` is still referenced by this page, `frame` is freshly allocated.
        unsafe { vm.mapper().copy_frame(frame, shared) };

        self.unmap_range(page, 1, true);
        self.map_range(page, PAGE_SIZE, Backing::Private(frame), leaf.private_perms())
            .inspect_err(|_| vm.frames().free_frame(frame))?;

        debug!("cow fault at {va}: {shared} copied to {frame}");
        Ok(())
    }

    /// Back the deferred page containing `va` with a zeroed frame, mapped
    /// readable and writable for user code.
    ///
    /// The frame is allocated before the deferred leaf is removed, so a
    /// failed resolution leaves the page reserved.
    ///
    /// # Errors
    /// - [`VmError::Unmapped`] if the page is not mapped.
    /// - [`VmError::NotDeferred`] if it already has a frame.
    /// - [`VmError::OutOfFrames`].
    ///
    /// # Panics
    /// If the page is deferred and copy-on-write at the same time.
    pub fn resolve_demand_fault(&mut self, va: VirtualAddress) -> Result<(), VmError> {
        let page = va.page().base();
        let leaf = self.query(page).ok_or(VmError::Unmapped(va))?;
        if !leaf.is_deferred() {
            return Err(VmError::NotDeferred(va));
        }
        let vm = self.vm();

        let Some(frame) = vm.frames().alloc_frame() else {
            warn!("demand fault at {va}: out of frames, caller should terminate the process");
            return Err(VmError::OutOfFrames);
        };
        // SAFETY: freshly allocated, owned by us.
        unsafe { vm.mapper().zero_frame(frame) };

        self.unmap_range(page, 1, false);
        self.map_range(page, PAGE_SIZE, Backing::Private(frame), PteFlags::USER_RW)
            .inspect_err(|_| vm.frames().free_frame(frame))?;

        debug!("demand fault at {va}: backed by {frame}");
        Ok(())
    }
}
