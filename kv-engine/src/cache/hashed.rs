//! Hashed cache: arbitrary byte-string keys, indexed case-insensitively.
//!
//! Mirrors the teacher engine's sharded hash map (`hashbrown` + `ahash`),
//! minus the sharding — the storage façade already serializes all
//! access behind its own reader/writer lock, so a per-cache shard lock
//! would be redundant here.

use hashbrown::HashMap;

use crate::cache::{dispose_existing, Cache};
use crate::element::{Element, ElementRef};
use crate::flags::Flags;

type HashState = ahash::RandomState;

/// Lowercases ASCII so `"Foo"` and `"foo"` land in the same slot, as
/// specified for the hashed cache's case-insensitive indexing.
fn normalize(key: &[u8]) -> Box<[u8]> {
    key.to_ascii_lowercase().into_boxed_slice()
}

/// Primary cache strategy for free-form byte-string keys.
#[derive(Default)]
pub struct HashedCache {
    map: HashMap<Box<[u8]>, ElementRef, HashState>,
}

impl HashedCache {
    pub fn new() -> Self {
        HashedCache {
            map: HashMap::with_hasher(HashState::default()),
        }
    }
}

impl Cache for HashedCache {
    fn insert(
        &mut self,
        key: &[u8],
        data: Box<[u8]>,
        flags: Flags,
        expire: u32,
        age: i64,
        hash: u64,
    ) -> Option<ElementRef> {
        let norm = normalize(key);
        if let Some(existing) = self.map.get(&norm) {
            dispose_existing(existing);
        }
        let element: ElementRef = Element::new(key.to_vec().into_boxed_slice(), data, flags, expire, age, hash).into();
        self.map.insert(norm, element.clone());
        Some(element)
    }

    fn replace(
        &mut self,
        key: &[u8],
        data: Box<[u8]>,
        flags: Flags,
        expire: u32,
        age: i64,
        hash: u64,
    ) -> Option<ElementRef> {
        let norm = normalize(key);
        let existing = self.map.get(&norm)?;
        dispose_existing(existing);
        let element: ElementRef = Element::new(key.to_vec().into_boxed_slice(), data, flags, expire, age, hash).into();
        self.map.insert(norm, element.clone());
        Some(element)
    }

    fn lookup(&self, key: &[u8]) -> Option<ElementRef> {
        self.map.get(&normalize(key)).cloned()
    }

    fn delete(&mut self, key: &[u8]) -> Option<ElementRef> {
        self.map.remove(normalize(key).as_ref())
    }

    fn steal(&mut self, key: &[u8]) -> Option<ElementRef> {
        self.map.remove(normalize(key).as_ref())
    }

    fn destroy(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(cache: &mut HashedCache, key: &[u8], data: &[u8]) -> ElementRef {
        cache
            .insert(key, data.to_vec().into_boxed_slice(), Flags::empty(), 0, 0, 1)
            .unwrap()
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut cache = HashedCache::new();
        insert(&mut cache, b"Foo", b"bar");
        assert!(cache.lookup(b"foo").is_some());
        assert!(cache.lookup(b"FOO").is_some());
    }

    #[test]
    fn insert_replaces_duplicate() {
        let mut cache = HashedCache::new();
        insert(&mut cache, b"k", b"1");
        let second = insert(&mut cache, b"k", b"2");
        assert_eq!(cache.lookup(b"k").unwrap().with_data(|d| d.to_vec()), second.with_data(|d| d.to_vec()));
        assert_eq!(second.with_data(|d| d.to_vec()), b"2".to_vec());
    }

    #[test]
    fn replace_requires_existing_entry() {
        let mut cache = HashedCache::new();
        assert!(cache
            .replace(b"missing", b"v".to_vec().into_boxed_slice(), Flags::empty(), 0, 0, 1)
            .is_none());
    }

    #[test]
    fn steal_removes_without_changing_refcount_semantics() {
        let mut cache = HashedCache::new();
        insert(&mut cache, b"k", b"v");
        let stolen = cache.steal(b"k").unwrap();
        assert!(cache.lookup(b"k").is_none());
        assert_eq!(stolen.with_data(|d| d.to_vec()), b"v".to_vec());
    }
}
