use crate::Update;
use crate::chain::Chains;
use kernel_sync::SpinLock;

/// Concurrent map from a machine-word key to a value.
///
/// - `hash(key) = key % table_size`; the table size is fixed at creation and
///   should be prime, since collisions are resolved by chaining.
/// - One lock guards all buckets and is held for the whole of each call.
/// - [`update`](Self::update) is the only read-modify-write primitive.
///
/// ### Panics
/// Every method panics if the calling context already holds this map's lock,
/// e.g. when called from inside an [`update`](Self::update) transform or a
/// [`for_each`](Self::for_each) visitor on the same map.
pub struct KeyedMap<V> {
    size: usize,
    chains: SpinLock<Chains<u64, V>>,
}

impl<V> KeyedMap<V> {
    /// Map with `size` buckets.
    ///
    /// # Panics
    /// If `size` is zero.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::named("keyed map", size)
    }

    /// Map whose lock carries `name` in diagnostics.
    ///
    /// # Panics
    /// If `size` is zero.
    #[must_use]
    pub fn named(name: &'static str, size: usize) -> Self {
        Self {
            size,
            chains: SpinLock::named(name, Chains::new(size)),
        }
    }

    /// Bucket `key` hashes to.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn bucket_of(&self, key: u64) -> usize {
        (key % self.size as u64) as usize
    }

    /// Number of buckets.
    #[must_use]
    pub const fn table_size(&self) -> usize {
        self.size
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.with_lock(|c| c.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Run `f` on the value stored under `key`, under the lock.
    pub fn get_with<R>(&self, key: u64, f: impl FnOnce(&V) -> R) -> Option<R> {
        let bucket = self.bucket_of(key);
        self.chains
            .with_lock(|c| c.find(bucket, |k| *k == key).map(|(_, v)| f(v)))
    }

    #[must_use]
    pub fn contains_key(&self, key: u64) -> bool {
        self.get_with(key, |_| ()).is_some()
    }

    /// Insert or overwrite. Returns the previous value.
    pub fn put(&self, key: u64, value: V) -> Option<V> {
        let bucket = self.bucket_of(key);
        self.chains
            .with_lock(|c| c.put(bucket, key, value, |k| *k == key))
    }

    /// Remove `key`. Returns the removed value.
    pub fn delete(&self, key: u64) -> Option<V> {
        let bucket = self.bucket_of(key);
        self.chains
            .with_lock(|c| c.remove(bucket, |k| *k == key).map(|(_, v)| v))
    }

    /// Atomic read-modify-write of the entry for `key`.
    ///
    /// `transform` receives the key and the current value (`None` if
    /// absent) and runs while the lock is held. Its [`Update`] is applied
    /// exactly once:
    ///
    /// | present | decision | effect |
    /// |---|---|---|
    /// | yes | `Set(v)` | overwrite |
    /// | yes | `Remove` | remove |
    /// | no | `Set(v)` | insert |
    /// | no | `Remove` | nothing |
    ///
    /// The second half of the transform's answer is returned to the caller.
    pub fn update<R>(
        &self,
        key: u64,
        transform: impl FnOnce(u64, Option<&V>) -> (Update<V>, R),
    ) -> R {
        let bucket = self.bucket_of(key);
        self.chains
            .with_lock(|c| c.update(bucket, key, |k| *k == key, |k, v| transform(*k, v)))
    }

    /// Visit every entry under the lock, bucket by bucket.
    pub fn for_each(&self, mut visit: impl FnMut(u64, &V)) {
        self.chains.with_lock(|c| c.for_each(|k, v| visit(*k, v)));
    }

    /// Drop every entry.
    ///
    /// The lock itself stays valid, so the map remains usable and concurrent
    /// holders simply observe an empty map afterwards.
    pub fn destroy(&self) {
        let dropped = self.chains.with_lock(Chains::clear);
        log::debug!("{}: destroyed {dropped} entries", self.chains.name());
    }

    /// `true` if the calling context currently holds this map's lock.
    #[must_use]
    pub fn is_locked_by_current_context(&self) -> bool {
        self.chains.is_held_by_current_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_keys_are_independent() {
        let m = KeyedMap::new(7);
        assert_eq!(m.bucket_of(3), m.bucket_of(10));

        m.put(3, "three");
        m.put(10, "ten");
        assert_eq!(m.get(3), Some("three"));
        assert_eq!(m.get(10), Some("ten"));
        assert_eq!(m.len(), 2);

        assert_eq!(m.delete(3), Some("three"));
        assert_eq!(m.get(3), None);
        assert_eq!(m.get(10), Some("ten"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn put_overwrites_without_growing() {
        let m = KeyedMap::new(5);
        assert_eq!(m.put(1, 1), None);
        assert_eq!(m.put(1, 2), Some(1));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(1), Some(2));
    }

    #[test]
    fn delete_of_absent_key_is_noop() {
        let m: KeyedMap<u8> = KeyedMap::new(3);
        assert_eq!(m.delete(9), None);
        assert!(m.is_empty());
    }

    #[test]
    fn update_follows_the_decision_table() {
        let m = KeyedMap::new(11);

        // absent + Set inserts
        let saw = m.update(4, |k, v| {
            assert_eq!(k, 4);
            (Update::Set(10_u32), v.copied())
        });
        assert_eq!(saw, None);
        assert_eq!(m.get(4), Some(10));

        // present + Set overwrites
        let saw = m.update(4, |_, v| (Update::Set(11), v.copied()));
        assert_eq!(saw, Some(10));
        assert_eq!(m.get(4), Some(11));

        // present + Remove removes
        let saw = m.update(4, |_, v| (Update::Remove, v.copied()));
        assert_eq!(saw, Some(11));
        assert!(m.is_empty());

        // absent + Remove does nothing
        let saw = m.update(4, |_, v| (Update::Remove, v.copied()));
        assert_eq!(saw, None);
        assert!(m.is_empty());
    }

    #[test]
    fn update_holds_the_lock_while_transforming() {
        kernel_sync::context::hosted::install();
        let m = KeyedMap::new(3);
        let held = m.update(1, |_, _| (Update::Set(()), m.is_locked_by_current_context()));
        assert!(held);
        assert!(!m.is_locked_by_current_context());
    }

    #[test]
    fn destroy_leaves_a_usable_empty_map() {
        let m = KeyedMap::new(3);
        for k in 0..20 {
            m.put(k, k);
        }
        m.destroy();
        assert!(m.is_empty());
        assert_eq!(m.get(5), None);
        m.put(5, 50);
        assert_eq!(m.get(5), Some(50));
    }

    #[test]
    fn for_each_sees_every_entry_once() {
        let m = KeyedMap::new(7);
        for k in [0, 7, 14, 3, 100] {
            m.put(k, k * 2);
        }
        let mut seen = Vec::new();
        m.for_each(|k, v| {
            assert_eq!(*v, k * 2);
            seen.push(k);
        });
        seen.sort_unstable();
        assert_eq!(seen, [0, 3, 7, 14, 100]);
    }

    #[test]
    #[should_panic(expected = "hash map needs at least one bucket")]
    fn zero_buckets_is_fatal() {
        let _ = KeyedMap::<u8>::new(0);
    }
}
