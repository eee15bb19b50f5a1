//! Local interrupt masking.
//!
//! [`IrqGuard`] saves the current interrupt-enable state, disables interrupts
//! and restores the saved state on drop. Guards nest as long as they are
//! dropped in reverse order of creation.
//!
//! # Platform
//!
//! - `riscv64` bare metal: the `SIE` bit of `sstatus` (supervisor mode).
//! - Anything else (host builds, tests): no-op; a host thread has no
//!   interrupts to mask.
//!
//! # Safety & Privilege
//!
//! The bare-metal backend must run in a privileged context where touching
//! the interrupt-enable state is legal.

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
mod arch {
    /// `sstatus.SIE`
    const SSTATUS_SIE: usize = 1 << 1;

    #[inline]
    pub fn interrupts_enabled() -> bool {
        let r: usize;
        unsafe { core::arch::asm!("csrr {}, sstatus", out(reg) r, options(nomem, nostack)) }
        (r & SSTATUS_SIE) != 0
    }

    #[inline]
    pub fn disable() {
        unsafe {
            core::arch::asm!("csrc sstatus, {}", in(reg) SSTATUS_SIE, options(nomem, nostack));
        }
    }

    #[inline]
    pub fn enable() {
        unsafe {
            core::arch::asm!("csrs sstatus, {}", in(reg) SSTATUS_SIE, options(nomem, nostack));
        }
    }
}

#[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
mod arch {
    #[inline]
    pub const fn interrupts_enabled() -> bool {
        false
    }

    #[inline]
    pub const fn disable() {}

    #[inline]
    pub const fn enable() {}
}

/// Whether local interrupts are currently enabled.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    arch::interrupts_enabled()
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// On drop, interrupts are re-enabled **only** if they were enabled when the
/// guard was created.
///
/// # Examples
///
/// ```
/// use kernel_sync::IrqGuard;
///
/// {
///     let _g = IrqGuard::new(); // interrupts disabled here if previously enabled
///     // critical section
/// }
/// ```
pub struct IrqGuard {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = arch::interrupts_enabled();
        if enabled {
            arch::disable();
        }
        Self {
            were_enabled: enabled,
        }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            arch::enable();
        }
    }
}
