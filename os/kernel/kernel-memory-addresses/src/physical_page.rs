use crate::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// Base of a 4 KiB physical frame.
///
/// ### Invariants
/// - The low [`PAGE_SHIFT`] bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x8000_1234);
/// let frame = pa.page();
/// assert_eq!(frame.base().as_u64(), 0x8000_1000);
/// assert_eq!(frame.join(pa.offset()), pa);
/// assert_eq!(PhysicalPage::from_number(frame.number()), frame);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(u64);

impl PhysicalPage {
    /// The frame containing `pa` (rounds down).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u64() & !(PAGE_SIZE - 1))
    }

    /// `Some` only if `pa` already is a frame base.
    #[inline]
    #[must_use]
    pub const fn try_from_addr(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_page_aligned() {
            Some(Self(pa.as_u64()))
        } else {
            None
        }
    }

    /// Frame from its physical page number (`pa >> 12`).
    #[inline]
    #[must_use]
    pub const fn from_number(ppn: u64) -> Self {
        Self(ppn << PAGE_SHIFT)
    }

    /// Physical page number (`pa >> 12`), as stored in page-table entries.
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0 >> PAGE_SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0)
    }

    /// Combine with an in-frame offset. `off` must be below [`PAGE_SIZE`].
    #[inline]
    #[must_use]
    pub const fn join(self, off: u64) -> PhysicalAddress {
        debug_assert!(off < PAGE_SIZE);
        PhysicalAddress::new(self.0 | off)
    }

    /// The frame `n` frames after this one.
    #[inline]
    #[must_use]
    pub const fn add_frames(self, n: u64) -> Self {
        Self(self.0 + (n << PAGE_SHIFT))
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage(0x{:016X})", self.0)
    }
}

impl From<PhysicalPage> for PhysicalAddress {
    #[inline]
    fn from(p: PhysicalPage) -> Self {
        p.base()
    }
}
