//! # Virtual Memory Configuration
//!
//! Compile-time configuration shared by every crate of the virtual-memory
//! subsystem. Keeping these values in one `no_std` crate means the page-table
//! engine, the frame allocator and the shared maps can never disagree about
//! page geometry or table sizes.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! Page geometry and the Sv39 virtual address limit:
//! * **Page Geometry**: 4 KiB pages, 512 entries per table page
//! * **Address Limit**: [`MAX_VA`](memory::MAX_VA), the first address a walk refuses
//! * **Physical Access**: the direct-map base and the base used by hosted frame arenas
//!
//! ### Shared Tables ([`tables`])
//! Bucket counts for the concurrent maps the subsystem builds at start-up.
//! All of them are prime because collisions are resolved by chaining and a
//! prime modulus spreads page-aligned keys evenly.
//!
//! ## Sv39 Layout
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │   User Space (grows upward)     │
//!                       │   [0, size) of each process     │
//! MAX_VA                ├─────────────────────────────────┤ 0x0000_0040_0000_0000
//!                       │   not addressable by `walk`     │
//!                       └─────────────────────────────────┘
//! ```
//!
//! A runtime view of the table sizes lives in the `VmConfig` type of the
//! `kernel-vmem` crate, which defaults to the constants defined here.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod tables;
