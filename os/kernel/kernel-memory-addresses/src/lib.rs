//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw addresses and page bases used by the
//! page-table engine, the frame allocator and the shared maps.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | A byte address in some process's (or the kernel's) address space. |
//! | [`VirtualPage`] | The 4 KiB-aligned base of a virtual page. |
//! | [`PhysicalAddress`] | A byte address in physical memory. |
//! | [`PhysicalPage`] | The 4 KiB-aligned base of a physical frame. |
//!
//! The subsystem only ever maps 4 KiB pages, so the page types carry no size
//! parameter. Page bases are aligned by construction: the only way to obtain
//! one is to round an address down or to validate an already aligned value.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x1234);
//! let (page, off) = va.split();
//! assert_eq!(page.base().as_u64(), 0x1000);
//! assert_eq!(off, 0x234);
//! assert_eq!(page.join(off), va);
//!
//! let pa = PhysicalAddress::new(0x8000_2000);
//! assert!(PhysicalPage::try_from_addr(pa).is_some());
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`, so they can be used as map keys.
//! - All conversions are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use kernel_info::memory::{PAGE_SHIFT, PAGE_SIZE};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Round `x` down to a page boundary.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::page_round_down;
/// assert_eq!(page_round_down(0), 0);
/// assert_eq!(page_round_down(4095), 0);
/// assert_eq!(page_round_down(4096), 4096);
/// assert_eq!(page_round_down(8191), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn page_round_down(x: u64) -> u64 {
    x & !(PAGE_SIZE - 1)
}

/// Round `x` up to a page boundary.
///
/// `x + PAGE_SIZE - 1` must not overflow; sizes handled by the subsystem are
/// bounded by the Sv39 limit, far below that.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::page_round_up;
/// assert_eq!(page_round_up(0), 0);
/// assert_eq!(page_round_up(1), 4096);
/// assert_eq!(page_round_up(4096), 4096);
/// assert_eq!(page_round_up(4097), 8192);
/// ```
#[inline(always)]
#[must_use]
pub const fn page_round_up(x: u64) -> u64 {
    (x + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Number of whole pages needed to cover `bytes`.
#[inline(always)]
#[must_use]
pub const fn pages_spanning(bytes: u64) -> u64 {
    page_round_up(bytes) >> PAGE_SHIFT
}
