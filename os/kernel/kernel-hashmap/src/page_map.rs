use crate::Update;
use crate::chain::Chains;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_sync::SpinLock;

const WORDS_PER_PAGE: usize = PAGE_SIZE as usize / size_of::<u64>();

type PageWords = [u64; WORDS_PER_PAGE];

/// Concurrent map keyed by the **content** of physical pages.
///
/// A key is the base address of a frame, but the bucket is derived from the
/// frame's bytes and two keys are equal when they are the same frame or hold
/// identical bytes. Overwriting an entry also re-keys it to the address used
/// for the write.
///
/// ### Hash
/// The page is read as 64-bit words; each word is reduced modulo the table
/// size and added to a running sum that is reduced again after every step:
/// `h = (h + w % n) % n`.
///
/// ### Stale buckets
/// Hash and equality read live memory, and the map has no way to notice
/// when a stored page changes afterwards. An entry whose page was modified
/// after insertion stays in the bucket of its *old* content and may no
/// longer be found, not even under its own address. Callers must keep keyed
/// pages stable while they are stored and while an operation runs.
///
/// ### Panics
/// - A key that is not page aligned.
/// - Re-entering the map from inside an [`update`](Self::update) transform.
pub struct PageMap<V, M: PhysMapper> {
    size: usize,
    mapper: M,
    chains: SpinLock<Chains<PhysicalPage, V>>,
}

impl<V, M: PhysMapper> PageMap<V, M> {
    /// Map with `size` buckets whose keys are read through `mapper`.
    ///
    /// # Safety
    /// Every key passed to any operation, and every key stored in the map,
    /// must name a frame that is readable through `mapper` for as long as it
    /// is used or stored.
    ///
    /// # Panics
    /// If `size` is zero.
    #[must_use]
    pub unsafe fn new(size: usize, mapper: M) -> Self {
        Self {
            size,
            mapper,
            chains: SpinLock::named("page map", Chains::new(size)),
        }
    }

    fn key_page(key: PhysicalAddress) -> PhysicalPage {
        let Some(page) = PhysicalPage::try_from_addr(key) else {
            panic!("page map key {key} is not page aligned");
        };
        page
    }

    fn words(&self, page: PhysicalPage) -> &PageWords {
        // SAFETY: frames are page aligned and readable per the contract of `new`.
        unsafe { &*self.mapper.phys_to_ptr(page.base()).cast::<PageWords>() }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn hash(&self, page: PhysicalPage) -> usize {
        let n = self.size as u64;
        self.words(page).iter().fold(0, |h, &w| (h + w % n) % n) as usize
    }

    fn same_content(&self, a: PhysicalPage, b: PhysicalPage) -> bool {
        a == b || self.words(a) == self.words(b)
    }

    /// Bucket the current content of `key` hashes to.
    ///
    /// # Panics
    /// If `key` is not page aligned.
    #[must_use]
    pub fn bucket_of(&self, key: PhysicalAddress) -> usize {
        self.hash(Self::key_page(key))
    }

    /// Number of buckets.
    #[must_use]
    pub const fn table_size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.with_lock(|c| c.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the value stored for a page with `key`'s content.
    #[must_use]
    pub fn get(&self, key: PhysicalAddress) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, |_, v| v.clone())
    }

    /// Run `f` on the stored key and value matching `key`'s content.
    pub fn get_with<R>(
        &self,
        key: PhysicalAddress,
        f: impl FnOnce(PhysicalPage, &V) -> R,
    ) -> Option<R> {
        let page = Self::key_page(key);
        self.chains.with_lock(|c| {
            c.find(self.hash(page), |k| self.same_content(*k, page))
                .map(|(k, v)| f(*k, v))
        })
    }

    /// The stored frame whose content equals `key`'s, if any.
    #[must_use]
    pub fn canonical(&self, key: PhysicalAddress) -> Option<PhysicalPage> {
        self.get_with(key, |stored, _| stored)
    }

    /// Insert, or overwrite and re-key the entry with matching content.
    /// Returns the previous value.
    pub fn put(&self, key: PhysicalAddress, value: V) -> Option<V> {
        let page = Self::key_page(key);
        self.chains.with_lock(|c| {
            c.put(self.hash(page), page, value, |k| {
                self.same_content(*k, page)
            })
        })
    }

    /// Remove the entry with `key`'s content. Returns its value.
    pub fn delete(&self, key: PhysicalAddress) -> Option<V> {
        let page = Self::key_page(key);
        self.chains.with_lock(|c| {
            c.remove(self.hash(page), |k| self.same_content(*k, page))
                .map(|(_, v)| v)
        })
    }

    /// Atomic read-modify-write; see [`KeyedMap::update`](crate::KeyedMap::update).
    ///
    /// `transform` receives `key` as a page and the value of the entry with
    /// matching content, if any.
    pub fn update<R>(
        &self,
        key: PhysicalAddress,
        transform: impl FnOnce(PhysicalPage, Option<&V>) -> (Update<V>, R),
    ) -> R {
        let page = Self::key_page(key);
        self.chains.with_lock(|c| {
            c.update(
                self.hash(page),
                page,
                |k| self.same_content(*k, page),
                |k, v| transform(*k, v),
            )
        })
    }

    /// Visit every entry under the lock.
    pub fn for_each(&self, mut visit: impl FnMut(PhysicalPage, &V)) {
        self.chains.with_lock(|c| c.for_each(|k, v| visit(*k, v)));
    }

    /// Drop every entry; the map stays usable.
    pub fn destroy(&self) {
        let dropped = self.chains.with_lock(Chains::clear);
        log::debug!("page map: destroyed {dropped} entries");
    }

    /// `true` if the calling context currently holds this map's lock.
    #[must_use]
    pub fn is_locked_by_current_context(&self) -> bool {
        self.chains.is_held_by_current_context()
    }
}
