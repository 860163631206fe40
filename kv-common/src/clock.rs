//! Timebase abstraction.
//!
//! The façade needs "seconds since some epoch" for element age and
//! expiry checks. Injecting it as a trait (rather than calling
//! `SystemTime::now()` directly) keeps expiry tests deterministic, the
//! same way the teacher engine threads an explicit clock value through
//! its TTL checks instead of re-reading the system clock on every call.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as whole seconds, with whatever epoch the
/// implementation chooses (wall-clock seconds since `UNIX_EPOCH` for
/// `SystemClock`). Only deltas between two `now_secs()` calls matter to
/// the engine.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

/// Wall-clock implementation used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Test double with an explicitly settable time, so expiry and eviction
/// tests do not depend on real wall-clock delays.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        FixedClock {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Relaxed);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::Relaxed)
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_secs(&self) -> i64 {
        (**self).now_secs()
    }
}
