//! Local copies of watched services and settings keys.
//!
//! Both caches follow the same rules: a name starts at version `-1` when
//! watched, every reload swaps version and content together, and the
//! reconciliation loop is the only writer.

mod kv_cache;
mod service_cache;

pub use kv_cache::*;
pub use service_cache::*;

#[cfg(test)]
mod service_cache_test;

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use crate::UNFETCHED_VERSION;

/// Cached copy of one of the server's global counters.
#[derive(Debug)]
pub(crate) struct GlobalVersion(AtomicI64);

impl GlobalVersion {
    pub(crate) fn new() -> Self {
        Self(AtomicI64::new(UNFETCHED_VERSION))
    }

    pub(crate) fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(
        &self,
        version: i64,
    ) {
        self.0.store(version, Ordering::Release);
    }

    /// Forget the cached counter so the next dirty check reports a change
    pub(crate) fn invalidate(&self) {
        self.set(UNFETCHED_VERSION);
    }
}
