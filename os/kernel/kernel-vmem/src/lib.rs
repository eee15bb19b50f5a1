//! # Virtual Memory
//!
//! Sv39 page tables with copy-on-write fork and demand paging for a small
//! RISC-V kernel.
//!
//! ## What you get
//! - An [`AddressSpace`] per process: walk, map, unmap, fork, grow, shrink,
//!   free, and user/kernel byte transfer.
//! - Typed [`PageTableEntry`] decoding into [`Mapping`] / [`Leaf`] /
//!   [`Backing`], so "shared" and "not backed yet" are variants rather
//!   than magic bits and addresses.
//! - Fault resolution ([`FaultKind`], [`AddressSpace::resolve_fault`]).
//! - [`ShareCounts`] for frames shared copy-on-write, a [`VmRegistry`] of
//!   promoted processes, and a content-addressed map of known pages, all
//!   owned by one [`VmSubsystem`].
//!
//! ## Sv39 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! | VPN2  | VPN1  | VPN0  | Offset |
//!
//!  root (VPN2) ──► level 1 (VPN1) ──► level 0 (VPN0) ──► 4 KiB frame
//! ```
//!
//! Each table is one 4 KiB frame of 512 eight-byte entries. Only level 0
//! holds leaves; the engine never creates superpages. User addresses stay
//! below [`MAX_VA`](kernel_info::memory::MAX_VA).
//!
//! ## Lifecycle of a frame
//!
//! ```text
//!             grow / load_initial          copy_into(cow)
//!  Deferred ───────────────────► Private ─────────────────► Shared (count n)
//!     │     demand fault           ▲                           │
//!     └────────────────────────────┘◄──────────────────────────┘
//!                                       cow fault (private copy)
//! ```
//!
//! A shared frame is freed when its share count drops to zero, inside the
//! same critical section that removes the count.
//!
//! ## Example
//!
//! ```
//! use kernel_alloc::arena::FrameArena;
//! use kernel_memory_addresses::VirtualAddress;
//! use kernel_vmem::{FaultKind, PteFlags, VmConfig, VmSubsystem};
//!
//! kernel_sync::context::hosted::install();
//! let arena = FrameArena::new(64);
//! // SAFETY: the arena outlives the subsystem and hands out its own frames.
//! let vm = unsafe { VmSubsystem::new(arena.frame_alloc(), arena.mapper(), VmConfig::default()) };
//!
//! let mut parent = vm.address_space().unwrap();
//! parent.grow(0, 4096, PteFlags::WRITE).unwrap();
//! parent.copy_out(VirtualAddress::new(16), b"hello").unwrap();
//!
//! let mut child = vm.address_space().unwrap();
//! parent.copy_into(&mut child, 4096, true).unwrap();
//! child.resolve_fault(VirtualAddress::new(16), FaultKind::Store).unwrap();
//!
//! let mut buf = [0; 5];
//! child.copy_in(&mut buf, VirtualAddress::new(16)).unwrap();
//! assert_eq!(&buf, b"hello");
//!
//! child.free(4096);
//! parent.free(4096);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address_space;
mod error;
mod fault;
mod page_table;
mod pte;
mod registry;
mod share_count;
mod subsystem;

pub use crate::address_space::AddressSpace;
pub use crate::error::VmError;
pub use crate::fault::FaultKind;
pub use crate::page_table::{PageTable, VpnIndex};
pub use crate::pte::{Backing, DEFERRED_PPN, Leaf, Mapping, PageTableEntry, PteFlags};
pub use crate::registry::{ProcessHandle, VmRegistry};
pub use crate::share_count::ShareCounts;
pub use crate::subsystem::{VmConfig, VmSubsystem};
