//! Arena-based intrusive LRU queue.
//!
//! Grounded on the teacher engine's shard-local arena (`hkv-engine`'s
//! `ShardInner`/`Node`, index-linked rather than pointer-linked, with a
//! free list recycling vacated slots). This queue tracks ordering only;
//! the cache remains the sole owner of the key→element index.

use hashbrown::HashMap;

use crate::cache::{dispose_existing, Cache};
use crate::element::ElementRef;

use super::{Expire, StepOutcome};

struct Node {
    element: ElementRef,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Least-recently-used eviction queue. The head is the next eviction
/// candidate; `insert` always places the new element at the tail.
#[derive(Default)]
pub struct LruExpire {
    arena: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<Box<[u8]>, usize, ahash::RandomState>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruExpire {
    pub fn new() -> Self {
        LruExpire {
            arena: Vec::new(),
            free: Vec::new(),
            index: HashMap::with_hasher(ahash::RandomState::default()),
            head: None,
            tail: None,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.arena[slot].as_ref().expect("unlink of vacated slot");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.arena[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_tail(&mut self, element: ElementRef) {
        let node = Node {
            element,
            prev: self.tail,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.arena[slot] = Some(node);
                slot
            }
            None => {
                self.arena.push(Some(node));
                self.arena.len() - 1
            }
        };
        if let Some(tail) = self.tail {
            self.arena[tail].as_mut().unwrap().next = Some(slot);
        } else {
            self.head = Some(slot);
        }
        self.tail = Some(slot);
    }

    /// Removes the slot for `key`, if tracked, returning its element.
    fn remove_slot(&mut self, key: &[u8]) -> Option<ElementRef> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        let node = self.arena[slot].take().expect("indexed slot must be occupied");
        self.free.push(slot);
        Some(node.element)
    }

    /// Pops the head slot without consulting `forced`/expiry — used by
    /// both the expired-run purge and the plain-LRU-victim path.
    fn pop_head(&mut self) -> Option<ElementRef> {
        let slot = self.head?;
        self.unlink(slot);
        let node = self.arena[slot].take().expect("head slot must be occupied");
        self.free.push(slot);
        self.index.remove(node.element.key.as_ref());
        Some(node.element)
    }

    fn evict(&mut self, cache: &mut dyn Cache, element: &ElementRef) -> usize {
        let size = element.size();
        if let Some(removed) = cache.delete(&element.key) {
            dispose_existing(&removed);
        }
        size
    }
}

impl Expire for LruExpire {
    fn insert(&mut self, element: ElementRef) {
        let key = element.key.clone();
        self.push_tail(element);
        let slot = self.tail.expect("just pushed");
        self.index.insert(key, slot);
    }

    fn delete(&mut self, key: &[u8]) {
        self.remove_slot(key);
    }

    fn step(&mut self, cache: &mut dyn Cache, now: i64, forced: bool) -> StepOutcome {
        let head = match self.head.and_then(|slot| self.arena[slot].as_ref()) {
            Some(node) => node.element.clone(),
            None => return StepOutcome::default(),
        };

        // A pinned head abandons the step before expiry is ever consulted:
        // a DIRTY-but-expired head must not be stolen out from under an
        // in-flight backend write just because it is also stale.
        if (head.is_persistent() || head.is_dirty()) && !forced {
            return StepOutcome {
                inspected: true,
                evicted: false,
                extra_purged: 0,
                bytes_reclaimed: 0,
            };
        }

        if head.is_past_expiry(now) {
            let head = self.pop_head().expect("head just confirmed present");
            let mut bytes = self.evict(cache, &head);
            let mut extra = 0usize;
            while let Some(slot) = self.head {
                let next = self.arena[slot].as_ref().unwrap().element.clone();
                if next.is_persistent() || next.is_dirty() || !next.is_past_expiry(now) {
                    break;
                }
                let next = self.pop_head().expect("head just confirmed present");
                bytes += self.evict(cache, &next);
                extra += 1;
            }
            return StepOutcome {
                inspected: true,
                evicted: true,
                extra_purged: extra,
                bytes_reclaimed: bytes,
            };
        }

        let head = self.pop_head().expect("head just confirmed present");
        let bytes = self.evict(cache, &head);
        StepOutcome {
            inspected: true,
            evicted: true,
            extra_purged: 0,
            bytes_reclaimed: bytes,
        }
    }

    fn destroy(&mut self) {
        self.arena.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }
}
