//! Radix cache: keys are IPv4 dotted-quad strings, stored in a 32-level
//! binary trie over the big-endian address — a full (`/32`) mask only,
//! no prefix matching.
//!
//! The general-purpose radix-tree data structure is treated as an
//! external primitive this crate does not need to reimplement (see
//! spec's out-of-scope collaborators); this is a small, purpose-built
//! trie sized for exactly the one key shape this cache strategy
//! supports.

use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::cache::{dispose_existing, Cache};
use crate::element::{Element, ElementRef};
use crate::flags::Flags;

struct TrieNode {
    children: [Option<Box<TrieNode>>; 2],
    element: Option<ElementRef>,
}

impl TrieNode {
    fn empty() -> Self {
        TrieNode {
            children: [None, None],
            element: None,
        }
    }
}

/// Cache strategy that only accepts IPv4 dotted-quad keys.
pub struct RadixCache {
    root: TrieNode,
}

impl Default for RadixCache {
    fn default() -> Self {
        RadixCache::new()
    }
}

impl RadixCache {
    pub fn new() -> Self {
        RadixCache {
            root: TrieNode::empty(),
        }
    }

    /// Validates `key` as an IPv4 dotted-quad string and converts it to
    /// a 32-bit network-order address.
    fn parse_key(key: &[u8]) -> Option<u32> {
        let text = std::str::from_utf8(key).ok()?;
        let addr = Ipv4Addr::from_str(text).ok()?;
        Some(u32::from(addr))
    }

    fn walk_mut<'a>(root: &'a mut TrieNode, addr: u32, create: bool) -> Option<&'a mut TrieNode> {
        let mut node = root;
        for level in 0..32 {
            let bit = ((addr >> (31 - level)) & 1) as usize;
            if node.children[bit].is_none() {
                if !create {
                    return None;
                }
                node.children[bit] = Some(Box::new(TrieNode::empty()));
            }
            node = node.children[bit].as_mut().unwrap();
        }
        Some(node)
    }

    fn walk(&self, addr: u32) -> Option<&TrieNode> {
        let mut node = &self.root;
        for level in 0..32 {
            let bit = ((addr >> (31 - level)) & 1) as usize;
            node = node.children[bit].as_deref()?;
        }
        Some(node)
    }
}

impl Cache for RadixCache {
    fn insert(
        &mut self,
        key: &[u8],
        data: Box<[u8]>,
        flags: Flags,
        expire: u32,
        age: i64,
        hash: u64,
    ) -> Option<ElementRef> {
        let addr = Self::parse_key(key)?;
        let node = Self::walk_mut(&mut self.root, addr, true)?;
        if let Some(existing) = &node.element {
            // Idempotent on duplicates: return the existing record unchanged.
            return Some(existing.clone());
        }
        let element: ElementRef = Element::new(key.to_vec().into_boxed_slice(), data, flags, expire, age, hash).into();
        node.element = Some(element.clone());
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
        let addr = Self::parse_key(key)?;
        let node = Self::walk_mut(&mut self.root, addr, true)?;
        if let Some(existing) = &node.element {
            dispose_existing(existing);
        }
        let element: ElementRef = Element::new(key.to_vec().into_boxed_slice(), data, flags, expire, age, hash).into();
        node.element = Some(element.clone());
        Some(element)
    }

    fn lookup(&self, key: &[u8]) -> Option<ElementRef> {
        let addr = Self::parse_key(key)?;
        self.walk(addr)?.element.clone()
    }

    fn delete(&mut self, key: &[u8]) -> Option<ElementRef> {
        let addr = Self::parse_key(key)?;
        Self::walk_mut(&mut self.root, addr, false)?.element.take()
    }

    fn steal(&mut self, key: &[u8]) -> Option<ElementRef> {
        let addr = Self::parse_key(key)?;
        Self::walk_mut(&mut self.root, addr, false)?.element.take()
    }

    fn destroy(&mut self) {
        self.root = TrieNode::empty();
    }
}
