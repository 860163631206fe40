//! Backend wrapper that demonstrates the `DIRTY`/`NEED_FREE` write-behind
//! discipline explicitly: `store` marks the element `DIRTY` and queues
//! the write rather than completing it inline. A test-only `complete`
//! hook stands in for whatever out-of-band mechanism (a background
//! flush thread, an async task) would normally drive the queue, so
//! tests can deterministically observe the in-flight state and its
//! resolution.

use hashbrown::HashMap;

use crate::element::ElementRef;

use super::{memory::InMemoryBackend, Backend, BackendRecord};

#[derive(Default)]
pub struct DeferredBackend {
    inner: InMemoryBackend,
    pending: HashMap<Box<[u8]>, ElementRef, ahash::RandomState>,
}

impl DeferredBackend {
    pub fn new() -> Self {
        DeferredBackend {
            inner: InMemoryBackend::new(),
            pending: HashMap::with_hasher(ahash::RandomState::default()),
        }
    }

    /// Number of writes still in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drives the deferred write for `key` to completion: commits it to
    /// the inner durable store and clears `DIRTY` on the element. If the
    /// element was marked `NEED_FREE` while the write was in flight (the
    /// cache dropped its own reference), this was the last place still
    /// holding it alive; dropping our clone here frees it.
    pub fn complete(&mut self, key: &[u8]) -> bool {
        match self.pending.remove(key) {
            Some(element) => {
                self.inner.store(&element);
                element.clear_dirty();
                true
            }
            None => false,
        }
    }
}

impl Backend for DeferredBackend {
    fn store(&mut self, element: &ElementRef) -> bool {
        element.mark_dirty();
        self.pending.insert(element.key.clone(), element.clone());
        true
    }

    fn load(&self, key: &[u8]) -> Option<BackendRecord> {
        self.inner.load(key)
    }

    fn remove(&mut self, key: &[u8]) {
        self.pending.remove(key);
        self.inner.remove(key);
    }

    fn destroy(&mut self) {
        self.pending.clear();
        self.inner.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::flags::Flags;

    fn elt() -> ElementRef {
        Element::new(b"k".to_vec().into_boxed_slice(), b"v".to_vec().into_boxed_slice(), Flags::empty(), 0, 0, 1).into()
    }

    #[test]
    fn store_marks_dirty_and_defers() {
        let mut backend = DeferredBackend::new();
        let element = elt();
        backend.store(&element);
        assert!(element.is_dirty());
        assert_eq!(backend.pending_len(), 1);
        assert!(backend.load(b"k").is_none());
    }

    #[test]
    fn complete_clears_dirty_and_commits() {
        let mut backend = DeferredBackend::new();
        let element = elt();
        backend.store(&element);
        assert!(backend.complete(b"k"));
        assert!(!element.is_dirty());
        assert_eq!(backend.pending_len(), 0);
        assert!(backend.load(b"k").is_some());
    }

    #[test]
    fn complete_on_unknown_key_is_false() {
        let mut backend = DeferredBackend::new();
        assert!(!backend.complete(b"missing"));
    }

    #[test]
    fn need_free_survives_until_the_last_clone_drops() {
        let mut backend = DeferredBackend::new();
        let element = elt();
        backend.store(&element);
        element.mark_need_free();
        drop(element);
        assert!(backend.complete(b"k"));
    }
}
