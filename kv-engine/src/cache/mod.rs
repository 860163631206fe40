//! # Cache Plug-In
//!
//! The primary key→element index. The cache owns the memory of every
//! live element: inserting hands a fresh [`Element`] into existence,
//! and `delete`/`steal` are the only ways an element leaves the index.
//!
//! Two strategies are provided: [`hashed::HashedCache`] (arbitrary
//! byte-string keys, case-insensitive) and [`radix::RadixCache`]
//! (dotted-quad IPv4 keys only). A storage façade is indifferent to
//! which is plugged in; both satisfy this trait.

pub mod hashed;
pub mod radix;

use crate::element::ElementRef;
use crate::flags::Flags;

pub use hashed::HashedCache;
pub use radix::RadixCache;

/// The primary key→element index.
///
/// Implementations decide how keys are validated, hashed, and indexed;
/// the storage façade only calls through this trait and never inspects
/// cache internals.
pub trait Cache: Send {
    /// One-time setup hook. Most implementations have nothing to do.
    fn init(&mut self) {}

    /// Inserts a fresh element for `key`.
    ///
    /// Implementations that tolerate duplicate keys document their own
    /// collision behavior (the hashed cache replaces; the radix cache is
    /// idempotent). The façade's `Insert` operation steals any existing
    /// entry before calling this, so collisions here only arise through
    /// `InsertInternal`'s cache-authoritative admission path.
    fn insert(
        &mut self,
        key: &[u8],
        data: Box<[u8]>,
        flags: Flags,
        expire: u32,
        age: i64,
        hash: u64,
    ) -> Option<ElementRef>;

    /// Replaces an existing element for `key` with a freshly built one.
    /// Returns `None` if the cache requires an existing entry and none
    /// is present (the hashed cache); the radix cache always succeeds.
    fn replace(
        &mut self,
        key: &[u8],
        data: Box<[u8]>,
        flags: Flags,
        expire: u32,
        age: i64,
        hash: u64,
    ) -> Option<ElementRef>;

    /// Looks up `key` without removing it.
    fn lookup(&self, key: &[u8]) -> Option<ElementRef>;

    /// Removes and returns the element for `key`, if present. The caller
    /// takes ownership of the returned handle.
    fn delete(&mut self, key: &[u8]) -> Option<ElementRef>;

    /// Removes `key` from the index without any disposal decision — the
    /// caller (facade or expire policy) decides whether the element is
    /// freed immediately or marked `NEED_FREE`.
    fn steal(&mut self, key: &[u8]) -> Option<ElementRef>;

    /// Releases all resident elements.
    fn destroy(&mut self) {}
}

/// Shared duplicate-disposal discipline: when an existing element is
/// being overwritten, mark it `NEED_FREE` if it is `DIRTY`. Otherwise
/// there is nothing to do — dropping the last `Arc` clone frees it.
pub(crate) fn dispose_existing(existing: &ElementRef) {
    if existing.is_dirty() {
        existing.mark_need_free();
    }
}
