//! # Physical Frames and Physical Memory Access
//!
//! The virtual-memory subsystem consumes two capabilities it does not
//! implement itself:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          Virtual Memory Subsystem (kernel-vmem)     │
//! │    • page tables, COW fork, fault resolution        │
//! └───────────┬─────────────────────────┬───────────────┘
//!             │ allocate / free         │ zero / copy / view
//! ┌───────────▼───────────┐ ┌───────────▼───────────────┐
//! │  FrameAlloc           │ │  PhysMapper               │
//! │  • 4 KiB frames       │ │  • PA → usable pointer    │
//! │  • None when empty    │ │  • direct map offset      │
//! └───────────────────────┘ └───────────────────────────┘
//! ```
//!
//! - [`FrameAlloc`](frame_alloc::FrameAlloc) hands out and takes back 4 KiB
//!   physical frames. [`BitmapFrameAlloc`](frame_alloc::BitmapFrameAlloc) is
//!   a lock-protected bitmap over one contiguous range of frames.
//! - [`PhysMapper`](phys_mapper::PhysMapper) turns a physical address into a
//!   pointer the running code can dereference.
//!   [`DirectMapper`](phys_mapper::DirectMapper) adds a constant offset.
//! - [`FrameArena`](arena::FrameArena) backs both with an ordinary heap block
//!   so the whole subsystem runs on a development host.
//!
//! ## Usage
//! ```rust
//! use kernel_alloc::arena::FrameArena;
//! use kernel_alloc::frame_alloc::FrameAlloc;
//! use kernel_alloc::phys_mapper::PhysMapper;
//!
//! let arena = FrameArena::new(4);
//! let mapper = arena.mapper();
//! let frame = arena.frame_alloc().alloc_frame().expect("frame");
//! unsafe {
//!     mapper.zero_frame(frame);
//!     assert!(mapper.frame_bytes(frame).iter().all(|&b| b == 0));
//! }
//! arena.frame_alloc().free_frame(frame);
//! assert_eq!(arena.frame_alloc().in_use(), 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod arena;
pub mod frame_alloc;
pub mod phys_mapper;
