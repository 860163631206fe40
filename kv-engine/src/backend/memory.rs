//! Synchronous in-memory backend. Every `store` completes before
//! returning, so no caller ever observes `DIRTY` through this backend —
//! it exists as the simplest conforming [`Backend`] and as the
//! building block [`super::deferred::DeferredBackend`] wraps.

use hashbrown::HashMap;

use crate::element::ElementRef;

use super::{Backend, BackendRecord};

#[derive(Default)]
pub struct InMemoryBackend {
    records: HashMap<Box<[u8]>, BackendRecord, ahash::RandomState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            records: HashMap::with_hasher(ahash::RandomState::default()),
        }
    }
}

impl Backend for InMemoryBackend {
    fn store(&mut self, element: &ElementRef) -> bool {
        let record = BackendRecord {
            data: element.with_data(|d| d.to_vec().into_boxed_slice()),
            flags: element.flags(),
            expire: element.expire(),
        };
        self.records.insert(element.key.clone(), record);
        true
    }

    fn load(&self, key: &[u8]) -> Option<BackendRecord> {
        self.records.get(key).cloned()
    }

    fn remove(&mut self, key: &[u8]) {
        self.records.remove(key);
    }

    fn destroy(&mut self) {
        self.records.clear();
    }
}
