//! # Backend Plug-In
//!
//! An optional durable shadow store. The façade is fully functional
//! with no backend at all (`()` implements [`Backend`] as a no-op);
//! when one is attached, writes are mirrored to it and misses on
//! lookup fall through to it for admission back into the cache.

pub mod deferred;
pub mod memory;

use crate::element::ElementRef;
use crate::flags::Flags;

pub use deferred::DeferredBackend;
pub use memory::InMemoryBackend;

/// A durable record as the backend sees it — independent of the live
/// `Element`, since a backend may outlive the in-memory record it
/// shadows. Returned by `load` for cache-miss admission.
#[derive(Debug, Clone)]
pub struct BackendRecord {
    pub data: Box<[u8]>,
    pub flags: Flags,
    pub expire: u32,
}

/// Durable write-behind/read-through store plugged in under the cache.
pub trait Backend: Send {
    /// One-time setup hook.
    fn init(&mut self) {}

    /// Mirrors an insert/replace. Takes the live element (rather than a
    /// detached record) so a deferring implementation can retain its own
    /// clone and clear `DIRTY` once the write actually lands.
    ///
    /// Returns whether the backend accepted the write. The façade records
    /// the result but never rolls back cache/expire state on a backend
    /// failure — the entry is already live in the cache.
    fn store(&mut self, element: &ElementRef) -> bool;

    /// Reads a durable record back, for cache-miss admission.
    fn load(&self, key: &[u8]) -> Option<BackendRecord>;

    /// Removes a durable record.
    fn remove(&mut self, key: &[u8]);

    /// Drops all durable state.
    fn destroy(&mut self) {}
}

impl Backend for () {
    fn store(&mut self, _element: &ElementRef) -> bool {
        true
    }
    fn load(&self, _key: &[u8]) -> Option<BackendRecord> {
        None
    }
    fn remove(&mut self, _key: &[u8]) {}
}
