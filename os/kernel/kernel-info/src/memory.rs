//! # Memory Layout

/// Size of one page and of one physical frame, in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Number of 8-byte entries in one page-table page.
pub const PTES_PER_TABLE: usize = 512;

/// Number of page-table levels walked for one translation (Sv39).
pub const PAGE_TABLE_LEVELS: usize = 3;

/// Bits of virtual page number consumed per level.
pub const VPN_BITS: u32 = 9;

/// One beyond the highest virtual address the page-table engine accepts.
///
/// Sv39 translates 39 bits, but addresses with bit 38 set would need sign
/// extension; staying below it keeps every user address canonical.
pub const MAX_VA: u64 = 1 << (VPN_BITS * PAGE_TABLE_LEVELS as u32 + PAGE_SHIFT - 1);

/// Base of the kernel's direct map of physical memory (`va = DIRECT_MAP_BASE + pa`).
///
/// The kernel runs with physical memory identity-mapped.
pub const DIRECT_MAP_BASE: u64 = 0;

/// Physical base address handed to hosted frame arenas.
///
/// Matches the start of DRAM on the QEMU `virt` board, so addresses seen in
/// hosted runs look like the ones a real boot produces.
pub const HOSTED_PHYS_BASE: u64 = 0x8000_0000;

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(PTES_PER_TABLE == 1 << VPN_BITS);
    assert!(PTES_PER_TABLE * 8 == PAGE_SIZE as usize);
    assert!(HOSTED_PHYS_BASE.is_multiple_of(PAGE_SIZE));
    assert!(MAX_VA == 0x40_0000_0000);
};
