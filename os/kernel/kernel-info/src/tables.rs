//! # Shared Table Sizes
//!
//! Bucket counts of the maps built when the virtual-memory subsystem starts.

/// Buckets of the frame share-count map (one entry per COW-shared frame).
pub const COW_REFCOUNT_BUCKETS: usize = 1021;

/// Buckets of the process registry (one entry per promoted process).
pub const VM_REGISTRY_BUCKETS: usize = 61;

/// Buckets of the content-addressed map of known pages.
pub const KNOWN_PAGES_BUCKETS: usize = 509;

const fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n.is_multiple_of(d) {
            return false;
        }
        d += 1;
    }
    true
}

const _: () = {
    assert!(is_prime(COW_REFCOUNT_BUCKETS));
    assert!(is_prime(VM_REGISTRY_BUCKETS));
    assert!(is_prime(KNOWN_PAGES_BUCKETS));
};
