//! # Subsystem State
//!
//! Everything the page-table engine shares between address spaces lives in
//! one [`VmSubsystem`], built once at boot and handed to every
//! [`AddressSpace`] by reference.

use crate::address_space::AddressSpace;
use crate::error::VmError;
use crate::registry::VmRegistry;
use crate::share_count::ShareCounts;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_hashmap::PageMap;
use kernel_info::tables::{COW_REFCOUNT_BUCKETS, KNOWN_PAGES_BUCKETS, VM_REGISTRY_BUCKETS};
use kernel_memory_addresses::PhysicalPage;
use log::info;

/// Bucket counts of the subsystem's maps. Prime counts spread keys best.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VmConfig {
    pub share_count_buckets: usize,
    pub registry_buckets: usize,
    pub known_page_buckets: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            share_count_buckets: COW_REFCOUNT_BUCKETS,
            registry_buckets: VM_REGISTRY_BUCKETS,
            known_page_buckets: KNOWN_PAGES_BUCKETS,
        }
    }
}

/// Shared state of the virtual-memory subsystem.
///
/// - `frames`: the physical frame allocator.
/// - `mapper`: how the kernel reaches physical memory.
/// - share counts of COW frames, the VM registry, and the content-addressed
///   map of known pages.
pub struct VmSubsystem<A: FrameAlloc, M: PhysMapper> {
    frames: A,
    mapper: M,
    share_counts: ShareCounts,
    registry: VmRegistry,
    known_pages: PageMap<PhysicalPage, M>,
}

impl<A: FrameAlloc, M: PhysMapper + Clone> VmSubsystem<A, M> {
    /// Build the subsystem.
    ///
    /// # Safety
    /// Every frame `frames` hands out must be reachable through `mapper`
    /// for as long as the subsystem exists, and must not be used by anything
    /// else while allocated.
    ///
    /// # Panics
    /// If any bucket count in `config` is zero.
    #[must_use]
    pub unsafe fn new(frames: A, mapper: M, config: VmConfig) -> Self {
        // SAFETY: known-page keys are frames of `frames`, reachable per the contract above.
        let known_pages = unsafe { PageMap::new(config.known_page_buckets, mapper.clone()) };
        let vm = Self {
            frames,
            mapper,
            share_counts: ShareCounts::new(config.share_count_buckets),
            registry: VmRegistry::new(config.registry_buckets),
            known_pages,
        };
        info!(
            "vm: share counts {} buckets, registry {} buckets, known pages {} buckets",
            config.share_count_buckets, config.registry_buckets, config.known_page_buckets
        );
        vm
    }
}

impl<A: FrameAlloc, M: PhysMapper> VmSubsystem<A, M> {
    /// A fresh, empty address space.
    ///
    /// # Errors
    /// [`VmError::OutOfFrames`] if no frame is left for the root table.
    pub fn address_space(&self) -> Result<AddressSpace<'_, A, M>, VmError> {
        AddressSpace::new(self)
    }

    #[inline]
    #[must_use]
    pub const fn frames(&self) -> &A {
        &self.frames
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[inline]
    #[must_use]
    pub const fn share_counts(&self) -> &ShareCounts {
        &self.share_counts
    }

    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &VmRegistry {
        &self.registry
    }

    /// Content-addressed map from a page to its canonical frame.
    ///
    /// Nothing populates it yet; it is the table a page deduplicator would
    /// consult.
    #[inline]
    #[must_use]
    pub const fn known_pages(&self) -> &PageMap<PhysicalPage, M> {
        &self.known_pages
    }
}
