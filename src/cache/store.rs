//! # Cache Store
//!
//! The narrow interface the synchronization core depends on, plus the
//! in-memory reference implementation. The store is externally owned and
//! shared; the core only mutates entries it is handed a key for.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use super::entry::CacheEntry;
use super::key::QueryKey;

/// Copy-on-write updater: receives the current value (None when the entry
/// does not exist) and returns the replacement, or None to leave the entry
/// untouched.
pub type Updater<'a> = &'a dyn Fn(Option<&Value>) -> Option<Value>;

/// Narrow read-cache interface consumed by the synchronization core
pub trait CacheStore: Send + Sync {
    /// Read one entry
    fn get(&self, key: &QueryKey) -> Option<CacheEntry>;

    /// Replace one entry via a copy-on-write updater. Returns whether a
    /// write happened.
    fn update(&self, key: &QueryKey, updater: Updater<'_>) -> bool;

    /// Mark entries stale. `exact` matches one key; otherwise every key
    /// sharing the prefix. Returns the number of entries marked.
    fn invalidate(&self, key: &QueryKey, exact: bool) -> usize;

    /// Remove one entry entirely. Subsequent reads see absent, not stale.
    /// Returns whether the entry existed.
    fn remove(&self, key: &QueryKey) -> bool;

    /// Keys currently sharing a prefix. Backs list-family fan-out.
    fn keys_with_prefix(&self, prefix: &QueryKey) -> Vec<QueryKey>;
}

/// In-memory reference store
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
}

impl MemoryCache {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, as a fetch layer would
    pub fn put(&self, key: QueryKey, value: Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, CacheEntry::fresh(value));
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn update(&self, key: &QueryKey, updater: Updater<'_>) -> bool {
        let Ok(mut entries) = self.entries.write() else {
            return false;
        };

        let next = updater(entries.get(key).map(|e| &e.value));
        match next {
            Some(value) => {
                entries.insert(key.clone(), CacheEntry::fresh(value));
                true
            }
            None => false,
        }
    }

    fn invalidate(&self, key: &QueryKey, exact: bool) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };

        let mut marked = 0;
        for (entry_key, entry) in entries.iter_mut() {
            let hit = if exact {
                entry_key == key
            } else {
                entry_key.starts_with(key)
            };
            if hit && !entry.stale {
                entry.mark_stale();
                marked += 1;
            }
        }
        marked
    }

    fn remove(&self, key: &QueryKey) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    fn keys_with_prefix(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
