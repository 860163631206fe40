//! Façade construction-time configuration. There is no runtime
//! reconfiguration surface — bounds are fixed for the life of a
//! [`crate::facade::Storage`], matching the teacher engine's
//! construction-only config posture.

/// Capacity bounds a [`crate::facade::Storage`] enforces on every
/// `Insert`.
#[derive(Debug, Clone, Copy)]
pub struct StorageConfig {
    /// Maximum number of resident elements.
    pub max_elts: usize,
    /// Maximum total accounted memory (payload bytes plus per-record
    /// overhead, summed over every resident element).
    pub max_memory: usize,
}

impl StorageConfig {
    pub fn new(max_elts: usize, max_memory: usize) -> Self {
        StorageConfig { max_elts, max_memory }
    }
}

impl Default for StorageConfig {
    /// A generous but finite default, so a `Storage::default()` never
    /// silently behaves as an unbounded map.
    fn default() -> Self {
        StorageConfig {
            max_elts: 1 << 20,
            max_memory: 1 << 30,
        }
    }
}
