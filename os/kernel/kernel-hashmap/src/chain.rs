//! Bucket array with singly linked chains, shared by both map flavors.
//!
//! Nothing in here hashes or locks; callers pick the bucket and supply the
//! key comparison.

use crate::Update;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem;

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    next: Link<K, V>,
}

pub struct Chains<K, V> {
    buckets: Box<[Link<K, V>]>,
    len: usize,
}

impl<K, V> Chains<K, V> {
    /// # Panics
    /// If `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "hash map needs at least one bucket");
        let mut buckets = Vec::with_capacity(size);
        buckets.resize_with(size, || None);
        Self {
            buckets: buckets.into_boxed_slice(),
            len: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    /// The link holding the first node of `bucket` whose key satisfies
    /// `matches`, or the empty link terminating the chain.
    fn seek(&mut self, bucket: usize, mut matches: impl FnMut(&K) -> bool) -> &mut Link<K, V> {
        let mut link = &mut self.buckets[bucket];
        while link.as_ref().is_some_and(|node| !matches(&node.key)) {
            let Some(node) = link else { break };
            link = &mut node.next;
        }
        link
    }

    pub fn find(&self, bucket: usize, mut matches: impl FnMut(&K) -> bool) -> Option<(&K, &V)> {
        let mut link = &self.buckets[bucket];
        while let Some(node) = link {
            if matches(&node.key) {
                return Some((&node.key, &node.value));
            }
            link = &node.next;
        }
        None
    }

    /// Insert at the head of `bucket`, or overwrite the matching entry's key
    /// and value. Returns the previous value.
    pub fn put(
        &mut self,
        bucket: usize,
        key: K,
        value: V,
        matches: impl FnMut(&K) -> bool,
    ) -> Option<V> {
        if let Some(node) = self.seek(bucket, matches) {
            node.key = key;
            return Some(mem::replace(&mut node.value, value));
        }
        self.push_front(bucket, key, value);
        None
    }

    pub fn remove(&mut self, bucket: usize, matches: impl FnMut(&K) -> bool) -> Option<(K, V)> {
        let link = self.seek(bucket, matches);
        let node = link.take()?;
        let Node { key, value, next } = *node;
        *link = next;
        self.len -= 1;
        Some((key, value))
    }

    /// Look up, let `transform` decide, then apply the decision once.
    pub fn update<R>(
        &mut self,
        bucket: usize,
        key: K,
        matches: impl FnMut(&K) -> bool,
        transform: impl FnOnce(&K, Option<&V>) -> (Update<V>, R),
    ) -> R {
        let link = self.seek(bucket, matches);
        match link {
            Some(node) => {
                let (decision, result) = transform(&key, Some(&node.value));
                match decision {
                    Update::Set(value) => {
                        node.key = key;
                        node.value = value;
                    }
                    Update::Remove => {
                        if let Some(node) = link.take() {
                            *link = node.next;
                            self.len -= 1;
                        }
                    }
                }
                result
            }
            None => {
                let (decision, result) = transform(&key, None);
                if let Update::Set(value) = decision {
                    self.push_front(bucket, key, value);
                }
                result
            }
        }
    }

    fn push_front(&mut self, bucket: usize, key: K, value: V) {
        let slot = &mut self.buckets[bucket];
        let next = slot.take();
        *slot = Some(Box::new(Node { key, value, next }));
        self.len += 1;
    }

    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for bucket in &self.buckets {
            let mut link = bucket;
            while let Some(node) = link {
                f(&node.key, &node.value);
                link = &node.next;
            }
        }
    }

    /// Drop every entry. Chains are unlinked iteratively.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        for bucket in &mut self.buckets {
            let mut link = bucket.take();
            while let Some(mut node) = link {
                link = node.next.take();
            }
        }
        self.len = 0;
        dropped
    }
}

impl<K, V> Drop for Chains<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}
