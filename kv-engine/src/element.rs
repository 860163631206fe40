//! # Element Records
//!
//! An `Element` is the single record type every cache, expire, and
//! backend plug-in operates on. It is shared (not exclusively owned)
//! because the cache, the expire queue, and a backend's in-flight write
//! queue may all need to observe the same element at once.
//!
//! ## Ownership model
//!
//! The three collaborators describe in prose a single allocation with
//! shared, flag-gated ownership (`DIRTY` suppresses freeing, `NEED_FREE`
//! requests a deferred free). Rust has no manual free to gate, so this
//! crate represents "shared ownership of one record" directly with
//! `Arc<Element>`: the cache holds a clone while the key is indexed, the
//! expire queue holds a clone for ordering, and a deferred backend holds
//! a clone for as long as its write is in flight. The record's backing
//! memory is reclaimed exactly when the last `Arc` is dropped — which
//! already only happens after `DIRTY` is cleared, because a deferring
//! backend is the one holding the last clone. `NEED_FREE` is kept as an
//! observable flag (set when the cache's own clone goes away while the
//! element is still `DIRTY`) for API fidelity and for tests that assert
//! on the flag, not because anything manually acts on it.
//!
//! `key` and the initial payload are immutable for the life of the
//! element; `flags` may gain `DIRTY`/`NEED_FREE` after insertion, and
//! the payload may only be rewritten in place through the array
//! interface (see [`crate::array`]).

use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::flags::Flags;

/// Per-record bookkeeping overhead added to `size` when accounting for
/// `Storage::memory`. Mirrors the `sizeof(struct kv_element)` header
/// overhead the original engine charges against the memory bound.
pub const RECORD_OVERHEAD: usize = std::mem::size_of::<Element>();

/// Shared handle to a resident element.
pub type ElementRef = Arc<Element>;

/// A single key/payload record with lifecycle flags.
#[derive(Debug)]
pub struct Element {
    /// Opaque key bytes, immutable for the element's lifetime.
    pub key: Box<[u8]>,
    /// Opaque payload bytes. Mutable only through the array interface.
    data: RwLock<Box<[u8]>>,
    /// Bit set over `{PERSISTENT, DIRTY, NEED_FREE, ARRAY}`.
    flags: AtomicU8,
    /// Wall-clock second of the most recent (re)insertion.
    age: AtomicI64,
    /// Lifetime in seconds; `0` means "no expiry" (and implies `PERSISTENT`).
    expire: AtomicU32,
    /// Cached hash of the key, computed at insertion.
    pub hash: u64,
}

impl Element {
    pub fn new(key: Box<[u8]>, data: Box<[u8]>, flags: Flags, expire: u32, age: i64, hash: u64) -> Self {
        Element {
            key,
            data: RwLock::new(data),
            flags: AtomicU8::new(flags.bits()),
            age: AtomicI64::new(age),
            expire: AtomicU32::new(expire),
            hash,
        }
    }

    /// Returns the payload length, not counting record overhead.
    pub fn data_len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `size + record-overhead`, the quantity `Storage::memory`
    /// accounts for each live element with.
    pub fn size(&self) -> usize {
        self.data_len() + RECORD_OVERHEAD
    }

    /// Runs `f` with shared read access to the payload.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.read())
    }

    /// Runs `f` with exclusive write access to the payload. Only the
    /// array interface (`SetArray`) is permitted to call this.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.data.write())
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits(self.flags.load(Ordering::Acquire))
    }

    pub fn age(&self) -> i64 {
        self.age.load(Ordering::Relaxed)
    }

    pub fn expire(&self) -> u32 {
        self.expire.load(Ordering::Relaxed)
    }

    pub fn is_persistent(&self) -> bool {
        self.flags().contains(Flags::PERSISTENT)
    }

    pub fn is_dirty(&self) -> bool {
        self.flags().contains(Flags::DIRTY)
    }

    pub fn is_need_free(&self) -> bool {
        self.flags().contains(Flags::NEED_FREE)
    }

    pub fn is_array(&self) -> bool {
        self.flags().contains(Flags::ARRAY)
    }

    /// Sets a backend-in-flight marker. Called by a deferring backend
    /// before it returns from `insert`/`replace`.
    pub fn mark_dirty(&self) {
        self.flags.fetch_or(Flags::DIRTY.bits(), Ordering::AcqRel);
    }

    /// Clears the backend-in-flight marker. Called by a backend once its
    /// deferred write completes.
    pub fn clear_dirty(&self) {
        self.flags.fetch_and(!Flags::DIRTY.bits(), Ordering::AcqRel);
    }

    /// Flags the element as needing a deferred free: the cache is done
    /// with it, but it was `DIRTY` at the time, so something else must
    /// still hold it alive.
    pub fn mark_need_free(&self) {
        self.flags
            .fetch_or(Flags::NEED_FREE.bits(), Ordering::AcqRel);
    }

    pub fn add_flag(&self, flag: Flags) {
        self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
    }

    /// Returns true if this element's lifetime has elapsed at `now`,
    /// ignoring `PERSISTENT`. A negative delta (clock skew) is treated
    /// as "not expired".
    pub fn is_past_expiry(&self, now: i64) -> bool {
        let expire = self.expire();
        if expire == 0 {
            return false;
        }
        let age = self.age();
        now > age && (now - age) > expire as i64
    }
}
