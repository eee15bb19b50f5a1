//! # Sv39 Page Table
//!
//! - [`VpnIndex`]: index into one table level, taken from the virtual address.
//! - [`PageTable`]: a 4 KiB-aligned array of 512 [`PageTableEntry`] values.
//!
//! ## Index fields
//!
//! ```text
//! | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! | VPN2  | VPN1  | VPN0  | Offset |
//! ```
//!
//! The walk starts at level 2 (the root) and ends at level 0, whose entries
//! are always leaves. Superpages are never created, so an interior level
//! holding a leaf is a corrupted tree.

use crate::pte::PageTableEntry;
use core::ops::{Index, IndexMut};
use kernel_info::memory::{PAGE_SHIFT, PTES_PER_TABLE, VPN_BITS};
use kernel_memory_addresses::VirtualAddress;

/// Index into one table level (VA bits `[12 + 9·level + 8 : 12 + 9·level]`).
///
/// Range is `0..512`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VpnIndex(u16);

impl VpnIndex {
    /// Index of `va` at `level` (`2` = root, `0` = leaf table).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(va: VirtualAddress, level: usize) -> Self {
        let shift = PAGE_SHIFT + VPN_BITS * level as u32;
        Self(((va.as_u64() >> shift) & (PTES_PER_TABLE as u64 - 1)) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// One page-table page: 512 entries, 4 KiB-aligned.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; PTES_PER_TABLE],
}

impl PageTable {
    /// A table with every entry unmapped.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageTableEntry::new(); PTES_PER_TABLE],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageTableEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PageTableEntry> {
        self.entries.iter_mut()
    }
}

impl Index<VpnIndex> for PageTable {
    type Output = PageTableEntry;

    #[inline]
    fn index(&self, i: VpnIndex) -> &Self::Output {
        &self.entries[i.as_usize()]
    }
}

impl IndexMut<VpnIndex> for PageTable {
    #[inline]
    fn index_mut(&mut self, i: VpnIndex) -> &mut Self::Output {
        &mut self.entries[i.as_usize()]
    }
}

const _: () = {
    assert!(size_of::<PageTable>() == 4096);
    assert!(align_of::<PageTable>() == 4096);
};
