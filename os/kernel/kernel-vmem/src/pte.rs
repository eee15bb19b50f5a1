//! # Sv39 Page-Table Entries
//!
//! ```text
//! 63      54 53                        10 9   8   7 6 5 4 3 2 1 0
//! ┌─────────┬────────────────────────────┬───┬───┬─┬─┬─┬─┬─┬─┬─┬─┐
//! │ reserved│            PPN             │SW │COW│D│A│G│U│X│W│R│V│
//! └─────────┴────────────────────────────┴───┴───┴─┴─┴─┴─┴─┴─┴─┴─┘
//! ```
//!
//! Bits 8 and 9 are the two bits the RISC-V privileged architecture reserves for
//! supervisor software (RSW). The subsystem uses them for copy-on-write:
//!
//! - `COW` (bit 8): the frame is shared between address spaces and must be
//!   copied before the first write.
//! - `SW` (bit 9, "saved writable"): the mapping was writable before it
//!   became copy-on-write; resolution restores `W` from it.
//!
//! A valid entry without any of `R`, `W`, `X`, `U` points to the next table
//! level. Every other valid entry is a leaf.
//!
//! ## Deferred pages
//!
//! A leaf whose PPN is all ones ([`DEFERRED_PPN`]) reserves the page without
//! backing it; the frame is allocated on first touch. Raw entries carry that
//! marker, but [`PageTableEntry::decode`] turns it into
//! [`Backing::Deferred`] so no caller ever compares addresses against it.

use bitfield_struct::bitfield;
use bitflags::bitflags;
use kernel_memory_addresses::PhysicalPage;

/// PPN marking a deferred (reserved but unbacked) leaf.
pub const DEFERRED_PPN: u64 = (1 << 44) - 1;

bitflags! {
    /// Flag bits of an Sv39 page-table entry (bits `0..=9`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PteFlags: u64 {
        /// Entry is valid.
        const VALID = 1 << 0;
        /// Readable.
        const READ = 1 << 1;
        /// Writable.
        const WRITE = 1 << 2;
        /// Executable.
        const EXEC = 1 << 3;
        /// Accessible from user mode.
        const USER = 1 << 4;
        /// Global mapping.
        const GLOBAL = 1 << 5;
        /// Accessed (hardware or software managed).
        const ACCESSED = 1 << 6;
        /// Dirty (hardware or software managed).
        const DIRTY = 1 << 7;
        /// Frame is shared copy-on-write.
        const COW = 1 << 8;
        /// `WRITE` as it was before the page became copy-on-write.
        const SAVED_WRITE = 1 << 9;

        /// Any of these makes a valid entry a leaf.
        const LEAF = Self::READ.bits() | Self::WRITE.bits() | Self::EXEC.bits() | Self::USER.bits();

        /// Bits a caller may choose for a leaf; the rest are owned by the engine.
        const PERMISSIONS = Self::LEAF.bits()
            | Self::GLOBAL.bits()
            | Self::ACCESSED.bits()
            | Self::DIRTY.bits();
    }
}

impl PteFlags {
    /// Read/write for user code, the permissions of heap and demand pages.
    pub const USER_RW: Self = Self::READ.union(Self::WRITE).union(Self::USER);
}

/// Raw 64-bit Sv39 page-table entry.
///
/// Field accessors come from [`bitfield_struct`]; use [`decode`](Self::decode)
/// for the typed view and [`table`](Self::table) / [`leaf`](Self::leaf) to
/// build entries.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    /// V, bit 0.
    pub valid: bool,
    /// R, bit 1.
    pub readable: bool,
    /// W, bit 2.
    pub writable: bool,
    /// X, bit 3.
    pub executable: bool,
    /// U, bit 4.
    pub user: bool,
    /// G, bit 5.
    pub global: bool,
    /// A, bit 6.
    pub accessed: bool,
    /// D, bit 7.
    pub dirty: bool,
    /// RSW bit 0: copy-on-write.
    pub cow: bool,
    /// RSW bit 1: writable before copy-on-write.
    pub saved_writable: bool,
    /// Physical page number, bits 10..=53.
    #[bits(44)]
    pub ppn: u64,
    #[bits(10)]
    __: u16,
}

/// What a leaf is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// The mapping exclusively owns the frame.
    Private(PhysicalPage),
    /// The frame is shared copy-on-write; its share count lives in
    /// [`ShareCounts`](crate::ShareCounts).
    Shared {
        frame: PhysicalPage,
        /// Whether the mapping was writable before it became shared.
        was_writable: bool,
    },
    /// Reserved, no frame yet (demand paging).
    Deferred,
}

impl Backing {
    /// The frame behind the mapping, if any.
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage> {
        match self {
            Self::Private(frame) | Self::Shared { frame, .. } => Some(frame),
            Self::Deferred => None,
        }
    }

    /// The backing for the page `n` pages further into a contiguous range.
    #[must_use]
    pub const fn advance(self, n: u64) -> Self {
        match self {
            Self::Private(frame) => Self::Private(frame.add_frames(n)),
            Self::Shared {
                frame,
                was_writable,
            } => Self::Shared {
                frame: frame.add_frames(n),
                was_writable,
            },
            Self::Deferred => Self::Deferred,
        }
    }
}

/// A decoded leaf entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf {
    pub backing: Backing,
    /// Subset of [`PteFlags::PERMISSIONS`].
    pub perms: PteFlags,
}

impl Leaf {
    #[must_use]
    pub const fn is_cow(&self) -> bool {
        matches!(self.backing, Backing::Shared { .. })
    }

    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self.backing, Backing::Deferred)
    }

    /// Permissions of a private copy of this page: `WRITE` comes back if the
    /// page was writable before it became copy-on-write.
    #[must_use]
    pub fn private_perms(&self) -> PteFlags {
        match self.backing {
            Backing::Shared {
                was_writable: true, ..
            } => self.perms | PteFlags::WRITE,
            _ => self.perms,
        }
    }
}

/// Typed view of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// `V = 0`.
    Unmapped,
    /// Points to the next-level table.
    Table(PhysicalPage),
    /// Maps a page.
    Leaf(Leaf),
}

impl PageTableEntry {
    /// Interior entry pointing at the table in `page`.
    #[inline]
    #[must_use]
    pub const fn table(page: PhysicalPage) -> Self {
        Self::new().with_valid(true).with_ppn(page.number())
    }

    /// Leaf entry.
    ///
    /// `perms` is masked to [`PteFlags::PERMISSIONS`]; for
    /// [`Backing::Shared`], `WRITE` is dropped and the copy-on-write bits are
    /// set from the backing.
    ///
    /// # Panics
    /// If no leaf permission remains, since the entry would read back as an
    /// interior table pointer.
    #[must_use]
    pub fn leaf(backing: Backing, perms: PteFlags) -> Self {
        let mut flags = (perms & PteFlags::PERMISSIONS) | PteFlags::VALID;
        let ppn = match backing {
            Backing::Private(frame) => frame.number(),
            Backing::Shared {
                frame,
                was_writable,
            } => {
                flags.remove(PteFlags::WRITE);
                flags.insert(PteFlags::COW);
                flags.set(PteFlags::SAVED_WRITE, was_writable);
                frame.number()
            }
            Backing::Deferred => DEFERRED_PPN,
        };
        assert!(
            flags.intersects(PteFlags::LEAF),
            "leaf entry without R/W/X/U permissions"
        );
        Self::from_bits(flags.bits()).with_ppn(ppn)
    }

    /// The flag bits (`0..=9`).
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.into_bits())
    }

    /// Typed view of the entry.
    ///
    /// # Panics
    /// On a deferred leaf that is also marked copy-on-write; the two lazy
    /// mechanisms exclude each other.
    #[must_use]
    pub fn decode(self) -> Mapping {
        if !self.valid() {
            return Mapping::Unmapped;
        }
        let flags = self.flags();
        let frame = PhysicalPage::from_number(self.ppn());
        if !flags.intersects(PteFlags::LEAF) {
            return Mapping::Table(frame);
        }

        let backing = if self.ppn() == DEFERRED_PPN {
            assert!(!self.cow(), "deferred page marked copy-on-write");
            Backing::Deferred
        } else if self.cow() {
            Backing::Shared {
                frame,
                was_writable: self.saved_writable(),
            }
        } else {
            Backing::Private(frame)
        };

        Mapping::Leaf(Leaf {
            backing,
            perms: flags & PteFlags::PERMISSIONS,
        })
    }
}
