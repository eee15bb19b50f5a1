//! Forking an address space.

use super::AddressSpace;
use crate::error::VmError;
use crate::pte::{Backing, Mapping, PageTableEntry, PteFlags};
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::VirtualAddress;
use log::debug;

impl<'vm, A: FrameAlloc, M: PhysMapper> AddressSpace<'vm, A, M> {
    /// Copy the user pages `[0, size)` of `self` into the empty `dst`.
    ///
    /// - `cow == false`: every backed page gets a private copy in `dst`;
    ///   a copy-on-write source page becomes a private page with its write
    ///   permission restored. Deferred pages stay deferred.
    /// - `cow == true`: source pages turn copy-on-write (write permission
    ///   remembered, then removed) and `dst` maps the **same** frames; each
    ///   frame's share count ends up equal to the number of COW leaves
    ///   referencing it. Deferred pages stay deferred in both.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`]. Everything already mapped into `dst` is
    /// unmapped and freed; source pages already turned copy-on-write stay
    /// that way.
    ///
    /// # Panics
    /// If a page of `[0, size)` is not mapped in `self`.
    pub fn copy_into(
        &mut self,
        dst: &mut AddressSpace<'vm, A, M>,
        size: u64,
        cow: bool,
    ) -> Result<(), VmError> {
        let mut va = 0;
        while va < size {
            if let Err(e) = self.copy_page(dst, VirtualAddress::new(va), cow) {
                dst.unmap_range(VirtualAddress::zero(), va / PAGE_SIZE, true);
                debug!("fork: failed at {va:#x} of {size:#x}: {e}");
                return Err(e);
            }
            va += PAGE_SIZE;
        }

        debug!(
            "fork: {} pages ({}), {} shared frames",
            size.div_ceil(PAGE_SIZE),
            if cow { "copy-on-write" } else { "eager" },
            self.vm.share_counts().len()
        );
        Ok(())
    }

    fn copy_page(
        &mut self,
        dst: &mut AddressSpace<'vm, A, M>,
        va: VirtualAddress,
        cow: bool,
    ) -> Result<(), VmError> {
        let vm = self.vm;
        let Some(entry) = self.walk(va, false) else {
            panic!("copy_into: no page table for {va}");
        };
        let Mapping::Leaf(leaf) = entry.decode() else {
            panic!("copy_into: {va} is not mapped");
        };

        if cow {
            let shared = match leaf.backing {
                Backing::Private(frame) => {
                    let shared = Backing::Shared {
                        frame,
                        was_writable: leaf.perms.contains(PteFlags::WRITE),
                    };
                    *entry = PageTableEntry::leaf(shared, leaf.perms);
                    vm.share_counts().acquire(frame);
                    shared
                }
                shared_or_deferred => shared_or_deferred,
            };
            return dst.map_range(va, PAGE_SIZE, shared, leaf.perms);
        }

        match leaf.backing {
            Backing::Deferred => dst.map_range(va, PAGE_SIZE, Backing::Deferred, leaf.perms),
            Backing::Private(src) | Backing::Shared { frame: src, .. } => {
                let frame = vm.frames().alloc_frame().ok_or(VmError::OutOfFrames)?;
                // SAFETY: `src` is mapped by this space, `frame` is freshly allocated.
                unsafe { vm.mapper().copy_frame(frame, src) };
                dst.map_range(va, PAGE_SIZE, Backing::Private(frame), leaf.private_perms())
                    .inspect_err(|_| vm.frames().free_frame(frame))
            }
        }
    }
}
