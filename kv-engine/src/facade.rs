//! # Storage Façade
//!
//! The single entry point client code uses. Orchestrates a [`Cache`], an
//! [`Expire`] policy, and an optional [`Backend`] behind one
//! reader/writer lock — mirroring the teacher engine's per-shard
//! `RwLock<ShardInner>`, collapsed to a single shard since this crate
//! has no sharding concept of its own.

use std::hash::BuildHasher;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use kv_common::{Clock, KvError, KvResult};

use crate::array;
use crate::backend::Backend;
use crate::cache::{dispose_existing, Cache};
use crate::config::StorageConfig;
use crate::expire::Expire;
use crate::flags::Flags;

/// A bound loop never walks the expire queue more than this many times
/// per `Insert`, so a pathological queue (say, all entries pinned)
/// cannot turn a single call into an unbounded scan.
const MAX_EXPIRE_STEPS: u32 = 10;

struct Inner {
    cache: Box<dyn Cache>,
    expire: Box<dyn Expire>,
    backend: Box<dyn Backend>,
    elts: usize,
    memory: usize,
}

/// The pluggable key/value storage engine.
pub struct Storage {
    /// Identifies this instance in `tracing` events. The original
    /// façade takes a numeric `id` plus an optional `name`, defaulting
    /// the latter to the decimal rendering of the former; a single
    /// `impl Into<String>` covers both (pass `id.to_string()` for the
    /// numeric-only case) without the engine needing to track both.
    name: String,
    inner: RwLock<Inner>,
    clock: Box<dyn Clock>,
    hasher: ahash::RandomState,
    config: StorageConfig,
}

impl Storage {
    pub fn new(
        name: impl Into<String>,
        cache: Box<dyn Cache>,
        expire: Box<dyn Expire>,
        backend: Box<dyn Backend>,
        config: StorageConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut inner = Inner {
            cache,
            expire,
            backend,
            elts: 0,
            memory: 0,
        };
        inner.cache.init();
        inner.expire.init();
        inner.backend.init();
        Storage {
            name: name.into(),
            inner: RwLock::new(inner),
            clock,
            hasher: ahash::RandomState::new(),
            config,
        }
    }

    /// Construct with no backend attached (`()` is a no-op [`Backend`]).
    pub fn without_backend(
        name: impl Into<String>,
        cache: Box<dyn Cache>,
        expire: Box<dyn Expire>,
        config: StorageConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        Storage::new(name, cache, expire, Box::new(()), config, clock)
    }

    fn hash_key(&self, key: &[u8]) -> u64 {
        self.hasher.hash_one(key)
    }

    /// `expire == 0` means "never expires", which always implies
    /// `PERSISTENT` (invariant 6) — canonicalized once, here, so every
    /// insertion path (fresh insert, replace, array insert, backend
    /// admission) agrees on the same element's flags.
    fn canonical_flags(flags: Flags, expire: u32) -> Flags {
        if expire == 0 {
            flags | Flags::PERSISTENT
        } else {
            flags
        }
    }

    /// Current resident element count.
    pub fn elts(&self) -> usize {
        self.inner.read().elts
    }

    /// Current accounted memory.
    pub fn memory(&self) -> usize {
        self.inner.read().memory
    }

    /// Inserts `key`/`data`, first stealing any existing entry for the
    /// same key so the new record always lands as a clean insert.
    pub fn insert(&self, key: &[u8], data: Vec<u8>, flags: Flags, expire: u32) -> bool {
        self.try_insert(key, data, flags, expire).is_ok()
    }

    /// Inserts `key`/`data` without pre-stealing an existing entry,
    /// leaving collision handling to the cache strategy's own `insert`
    /// (the hashed cache replaces; the radix cache is idempotent). Used
    /// for cache-miss admission from a backend read-through.
    pub fn insert_internal(&self, key: &[u8], data: Vec<u8>, flags: Flags, expire: u32) -> bool {
        self.insert_impl(key, data, flags, expire, false).is_ok()
    }

    /// Same as [`Storage::insert`], surfacing *why* a rejected insert was
    /// rejected instead of collapsing it to `false`.
    pub fn try_insert(&self, key: &[u8], data: Vec<u8>, flags: Flags, expire: u32) -> KvResult<()> {
        self.insert_impl(key, data, flags, expire, true)
    }

    fn insert_impl(&self, key: &[u8], data: Vec<u8>, flags: Flags, expire: u32, pre_steal: bool) -> KvResult<()> {
        let data: Box<[u8]> = data.into_boxed_slice();
        let needed = data.len() + crate::element::RECORD_OVERHEAD;
        if self.config.max_memory != 0 && needed > self.config.max_memory {
            let err = KvError::TooLarge { len: needed, max: self.config.max_memory };
            warn!(name = %self.name, key_len = key.len(), %err, "insert refused");
            return Err(err);
        }

        let flags = Self::canonical_flags(flags, expire);
        let now = self.clock.now_secs();
        let hash = self.hash_key(key);
        let mut inner = self.inner.write();

        if pre_steal {
            if let Some(existing) = inner.cache.steal(key) {
                inner.expire.delete(key);
                dispose_existing(&existing);
                inner.elts -= 1;
                inner.memory -= existing.size();
            }
        }

        if !Self::make_room(&mut inner, needed, now, self.config) {
            warn!(name = %self.name, key_len = key.len(), "insert refused: could not reclaim enough room");
            return Err(KvError::CapacityExhausted);
        }

        let Some(element) = inner.cache.insert(key, data, flags, expire, now, hash) else {
            trace!(name = %self.name, key_len = key.len(), "insert refused by cache strategy");
            return Err(KvError::CacheRefused);
        };
        inner.expire.insert(element.clone());
        inner.elts += 1;
        inner.memory += element.size();
        // `InsertInternal` (pre_steal = false) never re-enters the backend:
        // it exists to admit a record the backend is already the source
        // of, so writing it back would be pointless.
        if pre_steal {
            // Backend failure is logged but never rolls back the
            // cache/expire state that already went live above.
            if !inner.backend.store(&element) {
                warn!(name = %self.name, key_len = key.len(), err = %KvError::BackendFailure, "backend write failed; entry remains live in cache");
            }
        }
        debug!(name = %self.name, key_len = key.len(), elts = inner.elts, memory = inner.memory, "inserted");
        Ok(())
    }

    /// Evicts via the bounded `MAX_EXPIRE_STEPS` loop until there is
    /// room for `needed` more bytes and one more element, or gives up.
    ///
    /// `max_elts == 0` disables the element-count bound and `max_memory
    /// == 0` disables the memory bound, matching the façade constructor's
    /// documented contract.
    ///
    /// Always calls `Expire::step` with `forced = false`: a head pinned
    /// `PERSISTENT` or `DIRTY` must abandon the loop rather than being
    /// evicted anyway, otherwise a store of nothing but pinned entries
    /// could never legitimately refuse an `Insert`.
    fn make_room(inner: &mut Inner, needed: usize, now: i64, config: StorageConfig) -> bool {
        let mut steps = 0;
        while (config.max_elts != 0 && inner.elts + 1 > config.max_elts)
            || (config.max_memory != 0 && inner.memory + needed > config.max_memory)
        {
            if steps >= MAX_EXPIRE_STEPS {
                return false;
            }
            let outcome = inner.expire.step(inner.cache.as_mut(), now, false);
            if !outcome.evicted {
                return false;
            }
            inner.elts -= 1 + outcome.extra_purged;
            inner.memory -= outcome.bytes_reclaimed;
            steps += 1;
        }
        true
    }

    /// Replaces an existing element, or creates one if the cache
    /// strategy permits (the radix cache always succeeds; the hashed
    /// cache requires a pre-existing entry).
    pub fn replace(&self, key: &[u8], data: Vec<u8>, flags: Flags, expire: u32) -> bool {
        self.try_replace(key, data, flags, expire).is_ok()
    }

    /// Same as [`Storage::replace`], surfacing *why* a rejected replace
    /// was rejected instead of collapsing it to `false`.
    pub fn try_replace(&self, key: &[u8], data: Vec<u8>, flags: Flags, expire: u32) -> KvResult<()> {
        let data: Box<[u8]> = data.into_boxed_slice();
        let flags = Self::canonical_flags(flags, expire);
        let now = self.clock.now_secs();
        let hash = self.hash_key(key);
        let mut inner = self.inner.write();

        let old_size = inner.cache.lookup(key).map(|e| e.size());
        let Some(new_element) = inner.cache.replace(key, data, flags, expire, now, hash) else {
            trace!(name = %self.name, key_len = key.len(), "replace refused: no existing entry and cache strategy requires one");
            return Err(KvError::CacheRefused);
        };

        // The cache's own replace may have disposed of the old element's
        // Arc clone; the expire queue must be rebuilt to match, or it
        // would keep a stale handle alive (violating the no-orphans
        // invariant between the cache and the expire queue).
        inner.expire.delete(key);
        inner.expire.insert(new_element.clone());

        let new_size = new_element.size();
        match old_size {
            Some(old_size) => {
                if new_size >= old_size {
                    inner.memory += new_size - old_size;
                } else {
                    inner.memory -= old_size - new_size;
                }
            }
            None => {
                inner.elts += 1;
                inner.memory += new_size;
            }
        }
        if !inner.backend.store(&new_element) {
            warn!(name = %self.name, key_len = key.len(), err = %KvError::BackendFailure, "backend replace failed; entry remains live in cache");
        }
        Ok(())
    }

    /// Looks up `key`, falling through to the backend on a cache miss
    /// and admitting the record back into the cache if found there.
    ///
    /// A resident element whose lifetime has elapsed is reported as
    /// absent without being evicted — a stale-but-present entry is the
    /// eviction policy's business, not the reader's; this call only
    /// ever changes state when it admits a backend hit.
    ///
    /// Returns an owned snapshot of the payload rather than a borrowed
    /// view: the original's pointer-plus-length return assumes the
    /// caller never outlives the lock that guards mutation, which Rust
    /// has no way to express at this boundary as cheaply as a copy.
    pub fn lookup(&self, key: &[u8]) -> Option<Vec<u8>> {
        let now = self.clock.now_secs();
        let guard = self.inner.upgradable_read();
        if let Some(element) = guard.cache.lookup(key) {
            if element.is_past_expiry(now) {
                return None;
            }
            return Some(element.with_data(|d| d.to_vec()));
        }

        let record = guard.backend.load(key)?;
        let mut inner = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
        // Re-check under the write lock: another thread may have
        // admitted this key while we were upgrading.
        if let Some(element) = inner.cache.lookup(key) {
            if element.is_past_expiry(now) {
                return None;
            }
            return Some(element.with_data(|d| d.to_vec()));
        }
        let needed = record.data.len() + crate::element::RECORD_OVERHEAD;
        if !Self::make_room(&mut inner, needed, now, self.config) {
            warn!(name = %self.name, key_len = key.len(), "backend admission refused: could not reclaim enough room");
            return None;
        }

        let hash = self.hash_key(key);
        let data = record.data.clone();
        let record_flags = Self::canonical_flags(record.flags, record.expire);
        let element = inner.cache.insert(key, data, record_flags, record.expire, now, hash)?;
        inner.expire.insert(element.clone());
        inner.elts += 1;
        inner.memory += element.size();
        if element.is_past_expiry(now) {
            return None;
        }
        Some(element.with_data(|d| d.to_vec()))
    }

    /// Removes `key`, if present.
    pub fn delete(&self, key: &[u8]) -> bool {
        let mut inner = self.inner.write();
        let Some(existing) = inner.cache.delete(key) else {
            return false;
        };
        inner.expire.delete(key);
        dispose_existing(&existing);
        inner.elts -= 1;
        inner.memory -= existing.size();
        inner.backend.remove(key);
        true
    }

    /// Tears down every collaborator. Unlike the bounded `Insert` path,
    /// this walks the expire queue with `forced = true` so `PERSISTENT`
    /// and `DIRTY` entries do not survive a deliberate full teardown.
    pub fn destroy(self) {
        let mut inner = self.inner.write();
        loop {
            let outcome = inner.expire.step(inner.cache.as_mut(), i64::MAX, true);
            if !outcome.evicted {
                break;
            }
        }
        inner.cache.destroy();
        inner.expire.destroy();
        inner.backend.destroy();
    }

    /// Inserts a fresh `ARRAY`-flagged element built from `stride` and
    /// an initial run of slot data.
    pub fn insert_array(&self, key: &[u8], stride: u32, data: &[u8], expire: u32) -> bool {
        let payload = array::build_payload(stride, data);
        self.insert(key, payload, Flags::ARRAY, expire)
    }

    /// Overwrites slot `index` of an existing array element in place.
    /// Returns `false` if the key is absent, not an array, the index is
    /// out of bounds, or `slot` is not exactly one stride wide.
    pub fn set_array(&self, key: &[u8], index: u32, slot: &[u8]) -> bool {
        self.try_set_array(key, index, slot).is_ok()
    }

    /// Same as [`Storage::set_array`], surfacing *why* the write was
    /// rejected instead of collapsing it to `false`.
    pub fn try_set_array(&self, key: &[u8], index: u32, slot: &[u8]) -> KvResult<()> {
        let inner = self.inner.write();
        let Some(element) = inner.cache.lookup(key) else {
            return Err(KvError::MalformedArray("key not present"));
        };
        if !element.is_array() {
            return Err(KvError::MalformedArray("element is not array-flagged"));
        }
        element.with_data_mut(|payload| {
            let stride = array::read_stride(payload);
            if stride == 0 || slot.len() != stride as usize {
                return Err(KvError::MalformedArray("slot length does not match stride"));
            }
            let count = array::slot_count(payload, stride) as u32;
            if index >= count {
                return Err(KvError::MalformedArray("index out of bounds"));
            }
            array::slot_mut(payload, index, stride).copy_from_slice(slot);
            Ok(())
        })
    }

    /// Reads slot `index` out of an existing array element. Returns
    /// `None` on any of the same conditions `set_array` rejects.
    pub fn get_array(&self, key: &[u8], index: u32) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        let element = inner.cache.lookup(key)?;
        if !element.is_array() {
            return None;
        }
        element.with_data(|payload| {
            let stride = array::read_stride(payload);
            let count = array::slot_count(payload, stride) as u32;
            if stride == 0 || index >= count {
                return None;
            }
            Some(array::slot(payload, index, stride).to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::cache::HashedCache;
    use crate::expire::LruExpire;
    use kv_common::FixedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Wraps [`InMemoryBackend`] to count `store` calls, so tests can
    /// assert a given insertion path never re-enters the backend.
    struct CountingBackend {
        inner: InMemoryBackend,
        stores: Arc<AtomicUsize>,
    }

    impl Backend for CountingBackend {
        fn store(&mut self, element: &crate::element::ElementRef) -> bool {
            self.stores.fetch_add(1, Ordering::SeqCst);
            self.inner.store(element)
        }
        fn load(&self, key: &[u8]) -> Option<crate::backend::BackendRecord> {
            self.inner.load(key)
        }
        fn remove(&mut self, key: &[u8]) {
            self.inner.remove(key)
        }
    }

    fn storage(max_elts: usize, max_memory: usize) -> Storage {
        Storage::without_backend(
            "test",
            Box::new(HashedCache::new()),
            Box::new(LruExpire::new()),
            StorageConfig::new(max_elts, max_memory),
            Box::new(FixedClock::new(1000)),
        )
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let storage = storage(16, 1 << 16);
        assert!(storage.insert(b"k", b"v".to_vec(), Flags::empty(), 0));
        assert_eq!(storage.lookup(b"k"), Some(b"v".to_vec()));
        assert_eq!(storage.elts(), 1);
    }

    #[test]
    fn insert_over_elt_bound_evicts_lru_head() {
        let storage = storage(2, 1 << 16);
        assert!(storage.insert(b"a", b"1".to_vec(), Flags::empty(), 10));
        assert!(storage.insert(b"b", b"2".to_vec(), Flags::empty(), 10));
        assert!(storage.insert(b"c", b"3".to_vec(), Flags::empty(), 10));
        assert_eq!(storage.elts(), 2);
        assert!(storage.lookup(b"a").is_none());
        assert!(storage.lookup(b"c").is_some());
    }

    #[test]
    fn eleven_pinned_heads_reject_insert_without_evicting() {
        let storage = storage(10, 1 << 20);
        for i in 0..10u8 {
            assert!(storage.insert(&[i], b"v".to_vec(), Flags::PERSISTENT, 0));
        }
        assert!(!storage.insert(b"overflow", b"v".to_vec(), Flags::empty(), 0));
        assert_eq!(storage.elts(), 10);
    }

    #[test]
    fn oversized_value_is_rejected() {
        let storage = storage(16, 32);
        assert!(!storage.insert(b"k", vec![0u8; 1024], Flags::empty(), 0));
    }

    #[test]
    fn delete_removes_element_and_updates_counters() {
        let storage = storage(16, 1 << 16);
        storage.insert(b"k", b"v".to_vec(), Flags::empty(), 0);
        assert!(storage.delete(b"k"));
        assert_eq!(storage.elts(), 0);
        assert!(!storage.delete(b"k"));
    }

    #[test]
    fn array_round_trip() {
        let storage = storage(16, 1 << 16);
        assert!(storage.insert_array(b"arr", 4, &[0, 0, 0, 1, 0, 0, 0, 2], 0));
        assert_eq!(storage.get_array(b"arr", 1), Some(vec![0, 0, 0, 2]));
        assert!(storage.set_array(b"arr", 1, &[9, 9, 9, 9]));
        assert_eq!(storage.get_array(b"arr", 1), Some(vec![9, 9, 9, 9]));
        assert!(storage.get_array(b"arr", 5).is_none());
    }

    #[test]
    fn expired_lookup_reports_absent_without_evicting() {
        let clock = std::sync::Arc::new(FixedClock::new(0));
        let storage = Storage::without_backend(
            "test",
            Box::new(HashedCache::new()),
            Box::new(LruExpire::new()),
            StorageConfig::new(16, 1 << 16),
            Box::new(clock.clone()),
        );
        storage.insert(b"x", b"v".to_vec(), Flags::empty(), 5);
        clock.set(4);
        assert_eq!(storage.lookup(b"x"), Some(b"v".to_vec()));
        clock.set(6);
        assert_eq!(storage.lookup(b"x"), None);
        // Reported absent, but not physically evicted.
        assert_eq!(storage.elts(), 1);
    }

    #[test]
    fn persistent_survives_large_now_advance() {
        let clock = std::sync::Arc::new(FixedClock::new(0));
        let storage = Storage::without_backend(
            "test",
            Box::new(HashedCache::new()),
            Box::new(LruExpire::new()),
            StorageConfig::new(16, 1 << 16),
            Box::new(clock.clone()),
        );
        assert!(storage.insert(b"p", b"1".to_vec(), Flags::empty(), 0));
        clock.set(1_000_000_000);
        assert_eq!(storage.lookup(b"p"), Some(b"1".to_vec()));
    }

    #[test]
    fn insert_internal_never_re_enters_the_backend() {
        let stores = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: InMemoryBackend::new(),
            stores: stores.clone(),
        };
        let storage = Storage::new(
            "test",
            Box::new(HashedCache::new()),
            Box::new(LruExpire::new()),
            Box::new(backend),
            StorageConfig::new(16, 1 << 16),
            Box::new(FixedClock::new(0)),
        );

        assert!(storage.insert(b"k", b"v".to_vec(), Flags::empty(), 0));
        assert_eq!(stores.load(Ordering::SeqCst), 1);

        assert!(storage.insert_internal(b"from-backend", b"v".to_vec(), Flags::empty(), 0));
        assert_eq!(stores.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_bound_disables_the_corresponding_check() {
        let storage = storage(0, 0);
        for i in 0..64u16 {
            assert!(storage.insert(&i.to_le_bytes(), vec![0u8; 4096], Flags::empty(), 10));
        }
        assert_eq!(storage.elts(), 64);
    }

    #[test]
    fn duplicate_insert_disposes_the_first() {
        let storage = storage(16, 1 << 16);
        storage.insert(b"k", b"1".to_vec(), Flags::empty(), 0);
        storage.insert(b"k", b"2".to_vec(), Flags::empty(), 0);
        assert_eq!(storage.elts(), 1);
        assert_eq!(storage.lookup(b"k"), Some(b"2".to_vec()));
    }
}
