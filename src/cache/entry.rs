//! # Cache Entries
//!
//! The value held under one query key. The synchronization core never
//! assumes an entry's shape beyond what the caller's chosen reconciliation
//! strategy asserts (list of records, single record, or opaque).

use serde_json::Value;

/// One cache entry: an opaque value plus a staleness flag
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached value. Replaced wholesale on every reconciliation
    /// (copy-on-write); never mutated in place.
    pub value: Value,

    /// Stale entries are served but due for a refetch
    pub stale: bool,
}

impl CacheEntry {
    /// A fresh entry
    pub fn fresh(value: Value) -> Self {
        Self {
            value,
            stale: false,
        }
    }

    /// Mark the entry stale, forcing the next read to refetch
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }
}
