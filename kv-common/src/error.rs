//! Error taxonomy for the storage engine.
//!
//! Every public operation on the façade returns a plain `bool` or
//! `Option<_>` (see the façade docs); `KvError` exists one layer down so
//! that internal plug-ins can report *why* something failed before the
//! façade collapses the result and emits a `tracing` event. Callers that
//! only need the boolean/optional contract never see this type.

use thiserror::Error;

/// Result alias used by plug-in implementations.
pub type KvResult<T> = Result<T, KvError>;

/// Reasons an internal operation can fail.
///
/// None of these are exceptions in the usual sense — every façade method
/// still returns `bool`/`Option`; this enum is only consulted for logging
/// and for tests that want to assert on *why* an operation was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    /// The requested payload is larger than the storage's memory bound.
    #[error("value of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    /// The bounds loop could not free enough room within the step cap.
    #[error("could not reclaim enough capacity within the expire step cap")]
    CapacityExhausted,

    /// The cache plug-in refused the insert/replace (e.g. a malformed
    /// radix-cache key).
    #[error("cache plug-in refused the operation")]
    CacheRefused,

    /// A backend write/replace reported failure. The cache copy is
    /// retained; only the backend-facing result is affected.
    #[error("backend operation failed")]
    BackendFailure,

    /// Array access used the wrong flag, an out-of-range index, or a
    /// mismatched stride.
    #[error("malformed array access: {0}")]
    MalformedArray(&'static str),
}
