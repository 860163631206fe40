//! Element flag bits.
//!
//! `PERSISTENT`, `DIRTY`, `NEED_FREE`, and `ARRAY` are a bit set rather
//! than four booleans so a caller's `flags` argument and an element's
//! live flags share one representation, matching the bit-flag style the
//! original storage engine this crate is modeled on uses throughout.

/// A set of element flags.
///
/// `Flags` is a plain value type used for the flags callers pass in;
/// the *live*, mutable flags on a resident element are tracked
/// separately as an atomic (see [`crate::element::Element`]) because
/// `DIRTY` and `NEED_FREE` can be set after the element is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// The element never expires; the expire policy must not evict it
    /// except when forced.
    pub const PERSISTENT: Flags = Flags(0b0001);
    /// A backend write is in flight; the element's bytes must not be
    /// freed until the write completes.
    pub const DIRTY: Flags = Flags(0b0010);
    /// Set on a `DIRTY` element when eviction/replacement removes it
    /// from the cache; informational only once translated to Rust's
    /// `Arc`-based ownership (see module docs on `element`).
    pub const NEED_FREE: Flags = Flags(0b0100);
    /// The payload is a fixed-stride array (see [`crate::array`]).
    pub const ARRAY: Flags = Flags(0b1000);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}
