//! Growing, shrinking and tearing down the user part of an address space.
//!
//! Sizes are byte counts from VA 0 and need not be page aligned; the
//! mapped range always ends at the size rounded up to a page.

use super::{AddressSpace, table_at};
use crate::error::VmError;
use crate::pte::{Backing, Mapping, PageTableEntry, PteFlags};
use crate::subsystem::VmSubsystem;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress, page_round_up, pages_spanning};
use log::debug;

impl<A: FrameAlloc, M: PhysMapper> AddressSpace<'_, A, M> {
    /// Grow from `old` to `new` bytes with zeroed, private pages mapped
    /// readable, user accessible, and `xperm`.
    ///
    /// Returns the new size; `old` if `new < old`.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`]. Pages added by this call are released again.
    pub fn grow(&mut self, old: u64, new: u64, xperm: PteFlags) -> Result<u64, VmError> {
        if new < old {
            return Ok(old);
        }
        let vm = self.vm;
        let perms = PteFlags::READ | PteFlags::USER | xperm;

        let mut va = page_round_up(old);
        while va < new {
            let Some(frame) = vm.frames().alloc_frame() else {
                self.shrink(va, old);
                return Err(VmError::OutOfFrames);
            };
            // SAFETY: freshly allocated, owned by us.
            unsafe { vm.mapper().zero_frame(frame) };
            let page = VirtualAddress::new(va);
            if let Err(e) = self.map_range(page, PAGE_SIZE, Backing::Private(frame), perms) {
                vm.frames().free_frame(frame);
                self.shrink(va, old);
                return Err(e);
            }
            va += PAGE_SIZE;
        }

        debug!("grow: {old:#x} -> {new:#x}");
        Ok(new)
    }

    /// Grow from `old` to `new` bytes with deferred pages; frames are only
    /// allocated when a page is first touched.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`] if a page table cannot be allocated. Pages
    /// added by this call are released again.
    pub fn grow_deferred(&mut self, old: u64, new: u64) -> Result<u64, VmError> {
        if new < old {
            return Ok(old);
        }

        let mut va = page_round_up(old);
        while va < new {
            let page = VirtualAddress::new(va);
            if let Err(e) = self.map_range(page, PAGE_SIZE, Backing::Deferred, PteFlags::USER) {
                self.shrink(va, old);
                return Err(e);
            }
            va += PAGE_SIZE;
        }

        debug!("grow (deferred): {old:#x} -> {new:#x}");
        Ok(new)
    }

    /// Shrink from `old` to `new` bytes, unmapping and freeing every page
    /// past `new` rounded up. Returns the new size; `old` if `new >= old`.
    ///
    /// # Panics
    /// If a page in the released range is not mapped.
    pub fn shrink(&mut self, old: u64, new: u64) -> u64 {
        if new >= old {
            return old;
        }

        let (keep, end) = (page_round_up(new), page_round_up(old));
        if keep < end {
            self.unmap_range(VirtualAddress::new(keep), (end - keep) / PAGE_SIZE, true);
        }

        debug!("shrink: {old:#x} -> {new:#x}");
        new
    }

    /// Free the user pages `[0, size)` and every page-table page.
    ///
    /// # Panics
    /// If a page of `[0, size)` is unmapped, or a leaf survives outside it.
    pub fn free(mut self, size: u64) {
        if size > 0 {
            self.unmap_range(VirtualAddress::zero(), pages_spanning(size), true);
        }
        free_walk(self.vm, self.root);
        debug!("free: address space {} ({size:#x} bytes)", self.root);
    }
}

/// Free `table` and every table below it.
///
/// # Panics
/// On any leaf; all leaves must be unmapped first.
fn free_walk<A: FrameAlloc, M: PhysMapper>(vm: &VmSubsystem<A, M>, table: PhysicalPage) {
    // SAFETY: `table` is an interior page of a tree that is being torn down.
    for entry in unsafe { table_at(vm.mapper(), table) }.iter_mut() {
        match entry.decode() {
            Mapping::Table(child) => {
                free_walk(vm, child);
                *entry = PageTableEntry::new();
            }
            Mapping::Leaf(leaf) => {
                panic!("free_walk: leaf {:?} left in table {table}", leaf.backing)
            }
            Mapping::Unmapped => {}
        }
    }
    vm.frames().free_frame(table);
}
