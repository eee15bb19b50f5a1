use crate::{IrqGuard, current_context};
use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Owner value of an unowned lock, or of a lock taken while no context
/// provider is installed.
const NO_OWNER: usize = 0;

/// Busy-waiting mutual exclusion with owner tracking.
///
/// - Interrupts are disabled from acquisition until the guard is dropped, so
///   an interrupt handler can never spin on a lock its own context holds.
/// - The holder's [`ContextId`](crate::ContextId) is recorded; acquiring a
///   lock the current context already holds panics ("recursive acquire").
/// - Critical sections must never sleep or yield.
pub struct SpinLock<T> {
    /// lock state
    /// * `false`: unlocked
    /// * `true`: locked
    locked: AtomicBool,
    /// [`ContextId::get`](crate::ContextId::get) of the holder, or [`NO_OWNER`].
    owner: AtomicUsize,
    name: &'static str,
    inner: UnsafeCell<T>,
}

// Safety: mutual exclusion; only T: Send may cross threads.
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(inner: T) -> Self {
        Self::named("spinlock", inner)
    }

    /// A lock with a name for diagnostics.
    pub const fn named(name: &'static str, inner: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            owner: AtomicUsize::new(NO_OWNER),
            name,
            inner: UnsafeCell::new(inner),
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Try once; returns immediately. Never panics, not even when the
    /// current context already holds the lock.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let irq = IrqGuard::new();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(self.claim(irq))
        } else {
            None
        }
    }

    /// Spin until acquired (TATAS), then return a guard.
    ///
    /// # Panics
    /// If the calling execution context already holds this lock.
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let irq = IrqGuard::new();

        // Only the holder itself can have stored its own id, and only it can
        // clear it again, so a relaxed read is conclusive here.
        if let Some(me) = current_context()
            && self.owner.load(Ordering::Relaxed) == me.get()
        {
            panic!("recursive acquire of lock `{}`", self.name);
        }

        // Fast path: take the lock if it looks free.
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Contended path: spin on a read (cheap), then retry CAS.
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
            while self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                while self.locked.load(Ordering::Relaxed) {
                    spin_loop();
                }
            }
        }
        self.claim(irq)
    }

    fn claim(&self, irq: IrqGuard) -> SpinLockGuard<'_, T> {
        let me = current_context().map_or(NO_OWNER, crate::ContextId::get);
        self.owner.store(me, Ordering::Relaxed);
        SpinLockGuard { lock: self, _irq: irq }
    }

    /// Closure convenience, built on the guard.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut g = self.lock();
        f(&mut g)
    }

    /// `true` if the lock is currently held by anyone.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// `true` if the calling execution context holds this lock.
    ///
    /// Runs with interrupts disabled so the answer cannot be invalidated by
    /// preemption between reading the context id and the owner. Without an
    /// installed context provider ownership is unknown, and this reports
    /// whether the lock is held at all.
    pub fn is_held_by_current_context(&self) -> bool {
        let _irq = IrqGuard::new();
        match current_context() {
            Some(me) => self.is_locked() && self.owner.load(Ordering::Relaxed) == me.get(),
            None => self.is_locked(),
        }
    }

    /// Mutable access when you have `&mut self` (no contention possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Holds the lock and keeps interrupts disabled until dropped.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    // Dropped after `Drop::drop` released the lock.
    _irq: IrqGuard,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.owner.store(NO_OWNER, Ordering::Relaxed);
        // Release publishes the critical section.
        self.lock.locked.store(false, Ordering::Release);
    }
}
