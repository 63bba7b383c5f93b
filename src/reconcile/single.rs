//! # Single-Record Strategy
//!
//! Reconciles the cache entry addressed by one record's identity:
//! UPDATE replaces the cached value wholesale, DELETE removes the entry
//! entirely, INSERT is a no-op (a record becomes visible only once a
//! detail view fetches it).

use super::binding::TableBinding;
use super::ReconcileOutcome;
use crate::cache::{CacheResult, CacheStore, QueryKey};
use crate::event::{identity_of, ChangeEvent, Operation};
use crate::observability::Logger;

/// Apply an event to the detail entry `prefix` + record identity
pub fn apply(
    store: &dyn CacheStore,
    binding: &TableBinding,
    prefix: &QueryKey,
    event: &ChangeEvent,
) -> CacheResult<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome::default();

    let Some(raw) = event.record() else {
        return Ok(outcome);
    };
    let Some(id) = identity_of(raw, &binding.identity) else {
        Logger::warn(
            "RECONCILE_SKIP",
            &[("reason", "no identity"), ("table", &binding.table)],
        );
        outcome.skipped += 1;
        return Ok(outcome);
    };

    let key = prefix.clone().with(id.as_str());

    match event.operation {
        Operation::Insert => {}
        Operation::Update => {
            let mapped = binding.map(raw);
            // Replace wholesale, but never materialize an unfetched entry
            let wrote = store.update(&key, &|old| old.map(|_| mapped.clone()));
            if wrote {
                outcome.touched += 1;
            }
        }
        Operation::Delete => {
            // Removed, not marked stale: subsequent reads see absent
            if store.remove(&key) {
                outcome.removed = true;
                outcome.touched += 1;
            }
        }
    }

    Ok(outcome)
}
