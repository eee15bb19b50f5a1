//! # Kernel synchronization primitives
//!
//! - [`SpinLock`]: a test-and-test-and-set lock that disables interrupts while
//!   held and remembers which execution context owns it. Acquiring a lock the
//!   current context already holds is a fatal usage error.
//! - [`IrqGuard`]: save, disable and restore local interrupts.
//! - [`SyncOnceCell`]: one-time initialization for global state.
//! - [`context`]: identity of the running execution context (hart, CPU or
//!   host thread), supplied by the embedding kernel.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![allow(unsafe_code)]

pub mod context;
pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use context::{ContextId, current_context, install_context_provider};
pub use irq::IrqGuard;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
