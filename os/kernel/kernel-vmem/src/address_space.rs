//! # Address Space (Sv39)
//!
//! One user address space: a three-level page-table tree rooted at a single
//! frame, plus a reference to the shared [`VmSubsystem`].
//!
//! ## Highlights
//!
//! - [`AddressSpace::walk`] descends the tree, optionally allocating missing
//!   interior tables.
//! - [`AddressSpace::map_range`] / [`AddressSpace::unmap_range`] install and
//!   remove leaves and keep share counts of COW frames in step.
//! - [`AddressSpace::copy_into`] forks, either eagerly or copy-on-write.
//! - [`AddressSpace::grow`], [`AddressSpace::grow_deferred`],
//!   [`AddressSpace::shrink`] and [`AddressSpace::free`] manage the user size.
//! - [`AddressSpace::copy_out`], [`AddressSpace::copy_in`] and
//!   [`AddressSpace::copy_in_str`] move bytes across the user boundary.
//!
//! ## Ownership
//!
//! - A private leaf owns its frame.
//! - A shared leaf owns one share-count reference; the frame belongs to the
//!   count and is freed when the last reference goes.
//! - A deferred leaf owns nothing.
//! - Interior tables are owned by their parent and freed by
//!   [`AddressSpace::free`].
//!
//! ## Panics
//!
//! Remapping a valid slot, unmapping an invalid or non-leaf slot, and
//! walking at or beyond [`MAX_VA`] are bugs in the caller and panic.
//!
//! ## Safety
//!
//! The tree is only reached through the subsystem's [`PhysMapper`]. An
//! address space must not be mutated from two contexts at once; `&mut self`
//! enforces that for every mutating method.

mod copy;
mod resize;
mod transfer;

use crate::error::VmError;
use crate::page_table::{PageTable, VpnIndex};
use crate::pte::{Backing, Leaf, Mapping, PageTableEntry, PteFlags};
use crate::subsystem::VmSubsystem;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_info::memory::{MAX_VA, PAGE_SIZE, PAGE_TABLE_LEVELS};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress, page_round_down};
use log::trace;

/// `satp.MODE` value selecting Sv39.
const SATP_MODE_SV39: u64 = 8 << 60;

/// Handle to a single user address space.
pub struct AddressSpace<'vm, A: FrameAlloc, M: PhysMapper> {
    root: PhysicalPage,
    vm: &'vm VmSubsystem<A, M>,
}

/// Borrow the table stored in `page`.
///
/// # Safety
/// `page` must be a page-table frame of a live tree, reachable through
/// `mapper`, and no other reference to it may be live for `'t`.
#[inline]
unsafe fn table_at<'t, M: PhysMapper>(mapper: &M, page: PhysicalPage) -> &'t mut PageTable {
    unsafe { mapper.phys_to_mut(page.base()) }
}

/// Shared view of the table stored in `page`.
///
/// # Safety
/// `page` must be a page-table frame of a live tree, reachable through
/// `mapper`, and not mutated for `'t`.
#[inline]
unsafe fn table_ref<'t, M: PhysMapper>(mapper: &M, page: PhysicalPage) -> &'t PageTable {
    unsafe { &*mapper.phys_to_ptr(page.base()).cast::<PageTable>() }
}

impl<'vm, A: FrameAlloc, M: PhysMapper> AddressSpace<'vm, A, M> {
    /// An empty address space with a freshly zeroed root table.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`] if no frame is left for the root.
    pub fn new(vm: &'vm VmSubsystem<A, M>) -> Result<Self, VmError> {
        let root = vm.frames().alloc_frame().ok_or(VmError::OutOfFrames)?;
        // SAFETY: freshly allocated, owned by us.
        unsafe { vm.mapper().zero_frame(root) };
        trace!("address space: root table {root}");
        Ok(Self { root, vm })
    }

    /// Physical page of the root table.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage {
        self.root
    }

    /// `satp` value that activates this address space.
    #[inline]
    #[must_use]
    pub const fn satp(&self) -> u64 {
        SATP_MODE_SV39 | self.root.number()
    }

    #[inline]
    #[must_use]
    pub const fn vm(&self) -> &'vm VmSubsystem<A, M> {
        self.vm
    }

    /// The level-0 slot for `va`.
    ///
    /// Missing interior tables are allocated and zeroed when `alloc` is set;
    /// otherwise, or when the allocator is exhausted, the walk gives `None`.
    ///
    /// # Panics
    /// - `va` at or beyond [`MAX_VA`].
    /// - An interior level holding a leaf.
    pub fn walk(&mut self, va: VirtualAddress, alloc: bool) -> Option<&mut PageTableEntry> {
        assert!(va.as_u64() < MAX_VA, "walk: {va} is beyond the user address range");
        let vm = self.vm;

        let mut table = self.root;
        for level in (1..PAGE_TABLE_LEVELS).rev() {
            // SAFETY: `table` belongs to this tree, which `&mut self` borrows exclusively.
            let entry = &mut unsafe { table_at(vm.mapper(), table) }[VpnIndex::of(va, level)];
            table = match entry.decode() {
                Mapping::Table(next) => next,
                Mapping::Leaf(_) => panic!("walk: leaf at level {level} on the way to {va}"),
                Mapping::Unmapped if !alloc => return None,
                Mapping::Unmapped => {
                    let next = vm.frames().alloc_frame()?;
                    // SAFETY: freshly allocated, owned by this tree from now on.
                    unsafe { vm.mapper().zero_frame(next) };
                    *entry = PageTableEntry::table(next);
                    next
                }
            };
        }

        // SAFETY: as above.
        Some(&mut unsafe { table_at(vm.mapper(), table) }[VpnIndex::of(va, 0)])
    }

    /// Read-only walk: the leaf mapping `va`, if any.
    ///
    /// Unlike [`walk`](Self::walk), an address beyond [`MAX_VA`] simply has no
    /// mapping.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<Leaf> {
        if va.as_u64() >= MAX_VA {
            return None;
        }

        let mut table = self.root;
        for level in (1..PAGE_TABLE_LEVELS).rev() {
            // SAFETY: tables of this tree are only mutated through `&mut self`.
            let entry = unsafe { table_ref(self.vm.mapper(), table) }[VpnIndex::of(va, level)];
            match entry.decode() {
                Mapping::Table(next) => table = next,
                Mapping::Leaf(_) => panic!("query: leaf at level {level} on the way to {va}"),
                Mapping::Unmapped => return None,
            }
        }

        // SAFETY: as above.
        match unsafe { table_ref(self.vm.mapper(), table) }[VpnIndex::of(va, 0)].decode() {
            Mapping::Leaf(leaf) => Some(leaf),
            Mapping::Unmapped | Mapping::Table(_) => None,
        }
    }

    /// What backs the user page containing `va`.
    ///
    /// `None` if `va` is beyond [`MAX_VA`], unmapped, or not user accessible.
    #[must_use]
    pub fn translate_page(&self, va: VirtualAddress) -> Option<Backing> {
        self.query(va)
            .filter(|leaf| leaf.perms.contains(PteFlags::USER))
            .map(|leaf| leaf.backing)
    }

    /// Physical address of the user byte at `va`. `None` for deferred pages.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let frame = self.translate_page(va)?.frame()?;
        Some(frame.join(va.offset()))
    }

    /// Map every page overlapping `[va, va + size)` to consecutive frames
    /// starting at `backing`, with leaf permissions `perms`.
    ///
    /// Mapping a [`Backing::Shared`] frame adds one share-count reference
    /// per page. A [`Backing::Deferred`] range is reserved without frames.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`] if an interior table cannot be allocated.
    /// Pages mapped before the failure stay mapped.
    ///
    /// # Panics
    /// - `size` is zero.
    /// - A page of the range is already mapped.
    #[allow(clippy::cast_possible_truncation)]
    pub fn map_range(
        &mut self,
        va: VirtualAddress,
        size: u64,
        backing: Backing,
        perms: PteFlags,
    ) -> Result<(), VmError> {
        assert!(size > 0, "map_range: empty range at {va}");
        let vm = self.vm;

        let first = page_round_down(va.as_u64());
        let last = page_round_down(va.as_u64() + size - 1);
        for (n, page) in (first..=last).step_by(PAGE_SIZE as usize).enumerate() {
            let at = VirtualAddress::new(page);
            let backing = backing.advance(n as u64);

            let entry = self.walk(at, true).ok_or(VmError::OutOfFrames)?;
            assert!(!entry.valid(), "map_range: remap of {at}");
            *entry = PageTableEntry::leaf(backing, perms);

            if let Backing::Shared { frame, .. } = backing {
                vm.share_counts().acquire(frame);
            }
            trace!("map {at} -> {backing:?}");
        }
        Ok(())
    }

    /// Unmap `pages` pages starting at `va`.
    ///
    /// A shared frame loses one share-count reference and is freed with it
    /// if `free` is set; a private frame is freed if `free` is set.
    ///
    /// # Panics
    /// - `va` is not page aligned.
    /// - A page of the range has no table, is not mapped, or is not a leaf.
    pub fn unmap_range(&mut self, va: VirtualAddress, pages: u64, free: bool) {
        assert!(va.is_page_aligned(), "unmap_range: {va} is not page aligned");
        let vm = self.vm;

        for i in 0..pages {
            let at = va + i * PAGE_SIZE;
            let Some(entry) = self.walk(at, false) else {
                panic!("unmap_range: no page table for {at}");
            };
            let leaf = match entry.decode() {
                Mapping::Leaf(leaf) => leaf,
                Mapping::Unmapped => panic!("unmap_range: {at} is not mapped"),
                Mapping::Table(_) => panic!("unmap_range: {at} is not a leaf"),
            };
            *entry = PageTableEntry::new();

            match leaf.backing {
                Backing::Shared { frame, .. } => {
                    vm.share_counts().release(frame, free.then_some(vm.frames()));
                }
                Backing::Private(frame) if free => vm.frames().free_frame(frame),
                Backing::Private(_) | Backing::Deferred => {}
            }
            trace!("unmap {at} ({:?})", leaf.backing);
        }
    }

    /// Strip user access from the page at `va`, e.g. for a stack guard page.
    ///
    /// # Panics
    /// If `va` has no level-0 slot.
    pub fn clear_user(&mut self, va: VirtualAddress) {
        let Some(entry) = self.walk(va, false) else {
            panic!("clear_user: no page table for {va}");
        };
        entry.set_user(false);
    }

    /// Map the first user program: one zeroed page at VA 0, readable,
    /// writable and executable, starting with `code`.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`].
    ///
    /// # Panics
    /// If `code` does not fit in less than one page.
    pub fn load_initial(&mut self, code: &[u8]) -> Result<(), VmError> {
        assert!(
            (code.len() as u64) < PAGE_SIZE,
            "load_initial: {} bytes do not fit in one page",
            code.len()
        );
        let vm = self.vm;

        let frame = vm.frames().alloc_frame().ok_or(VmError::OutOfFrames)?;
        // SAFETY: freshly allocated, owned by us.
        let bytes = unsafe { vm.mapper().frame_bytes_mut(frame) };
        bytes.fill(0);
        bytes[..code.len()].copy_from_slice(code);

        let perms = PteFlags::READ | PteFlags::WRITE | PteFlags::EXEC | PteFlags::USER;
        self.map_range(VirtualAddress::zero(), PAGE_SIZE, Backing::Private(frame), perms)
            .inspect_err(|_| vm.frames().free_frame(frame))
    }
}
