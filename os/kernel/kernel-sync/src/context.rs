//! Identity of the running execution context.
//!
//! Locks record their owner so that recursive acquisition can be detected and
//! so that callers can ask whether *they* hold a lock. What counts as an
//! execution context is up to the embedding kernel: a hart id, a CPU number,
//! or a host thread in tests. The kernel installs a provider once during
//! early boot via [`install_context_provider`].
//!
//! Until a provider is installed, [`current_context`] returns `None` and
//! locks fall back to plain mutual exclusion without ownership tracking.

use crate::SyncOnceCell;
use core::num::NonZeroUsize;

/// Opaque, non-zero identifier of an execution context.
///
/// Zero is reserved by [`SpinLock`](crate::SpinLock) to mean "unowned".
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ContextId(NonZeroUsize);

impl ContextId {
    #[inline]
    #[must_use]
    pub const fn new(id: NonZeroUsize) -> Self {
        Self(id)
    }

    /// Context id from a zero-based index such as a hart id.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        match NonZeroUsize::new(index.wrapping_add(1)) {
            Some(id) => Self(id),
            None => Self(NonZeroUsize::MAX),
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

static PROVIDER: SyncOnceCell<fn() -> ContextId> = SyncOnceCell::new();

/// Install the function that identifies the running execution context.
///
/// The provider must be cheap and must return the same id for as long as the
/// caller cannot migrate (interrupts are disabled around every query).
///
/// # Errors
/// Returns the rejected provider if one is already installed.
pub fn install_context_provider(provider: fn() -> ContextId) -> Result<(), fn() -> ContextId> {
    PROVIDER.set(provider)
}

/// The running execution context, if a provider is installed.
#[inline]
#[must_use]
pub fn current_context() -> Option<ContextId> {
    PROVIDER.get().map(|provider| provider())
}

/// Host threads as execution contexts.
#[cfg(any(test, feature = "std"))]
pub mod hosted {
    use super::{ContextId, install_context_provider};
    use core::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);

    std::thread_local! {
        static THIS_THREAD: ContextId = ContextId::from_index(NEXT.fetch_add(1, Ordering::Relaxed));
    }

    /// Id of the calling host thread.
    #[must_use]
    pub fn thread_context() -> ContextId {
        THIS_THREAD.with(|id| *id)
    }

    /// Install [`thread_context`] as the provider. Idempotent.
    pub fn install() {
        let _ = install_context_provider(thread_context);
    }
}
