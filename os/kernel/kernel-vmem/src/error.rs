use kernel_memory_addresses::VirtualAddress;

/// Recoverable failures of the virtual-memory subsystem.
///
/// Everything here is either resource pressure or a bad user address, and
/// the expected reaction is to terminate the offending process. Misuse of
/// the subsystem itself panics instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// The frame allocator is exhausted.
    #[error("out of physical frames")]
    OutOfFrames,
    /// No user-accessible mapping at the address.
    #[error("no user mapping at {0}")]
    Unmapped(VirtualAddress),
    /// COW resolution on a page that is not shared. Nothing was changed.
    #[error("page at {0} is not copy-on-write")]
    NotCopyOnWrite(VirtualAddress),
    /// Demand resolution on a page that is already backed.
    #[error("page at {0} is not deferred")]
    NotDeferred(VirtualAddress),
    /// The fault is not one the subsystem can fix (e.g. a store to a
    /// read-only private page).
    #[error("fault at {0} cannot be resolved")]
    NotResolvable(VirtualAddress),
    /// No NUL byte within the first `max` bytes of a user string.
    #[error("string not terminated within {max} bytes")]
    MissingTerminator { max: usize },
}
