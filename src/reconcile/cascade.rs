//! # Cascade Propagation
//!
//! Some changes must also become visible in a dependent cache entry: a new
//! set-performance record refreshes its parent session's aggregate. Cascade
//! rules map a child-table event to the parent/aggregate keys to mark
//! stale. Propagation runs after the primary reconciliation and is
//! fire-and-forget: a dependent key missing from cache is a no-op.

use std::sync::Arc;

use crate::cache::{CacheStore, QueryKey};
use crate::event::{identity_of, ChangeEvent, IdentityFields};
use crate::observability::Logger;

/// Maps one event to the dependent keys it invalidates
pub type CascadeResolver = Arc<dyn Fn(&ChangeEvent) -> Vec<QueryKey> + Send + Sync>;

/// One cascade rule
#[derive(Clone)]
pub struct CascadeRule {
    resolver: CascadeResolver,
}

impl CascadeRule {
    /// Rule from an arbitrary resolver
    pub fn new(f: impl Fn(&ChangeEvent) -> Vec<QueryKey> + Send + Sync + 'static) -> Self {
        Self {
            resolver: Arc::new(f),
        }
    }

    /// Invalidate the parent detail entry referenced by a foreign-key field
    /// on the changed row: `prefix` + the row's `parent_field` value.
    pub fn parent_detail(prefix: QueryKey, parent_field: impl Into<String>) -> Self {
        let field = IdentityFields::single(parent_field);
        Self::new(move |event| {
            event
                .record()
                .and_then(|row| identity_of(row, &field))
                .map(|parent| vec![prefix.clone().with(parent.as_str())])
                .unwrap_or_default()
        })
    }

    /// Invalidate a fixed set of keys on every event
    pub fn keys(targets: Vec<QueryKey>) -> Self {
        Self::new(move |_| targets.clone())
    }

    /// Dependent keys for one event
    pub fn resolve(&self, event: &ChangeEvent) -> Vec<QueryKey> {
        (self.resolver)(event)
    }
}

impl std::fmt::Debug for CascadeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeRule").finish_non_exhaustive()
    }
}

/// Invalidate every dependent key the rules resolve for this event.
/// Returns the number of entries marked stale.
pub fn propagate(store: &dyn CacheStore, rules: &[CascadeRule], event: &ChangeEvent) -> usize {
    let mut invalidated = 0;
    for rule in rules {
        for key in rule.resolve(event) {
            invalidated += store.invalidate(&key, false);
        }
    }
    if invalidated > 0 {
        Logger::trace(
            "CASCADE_FANOUT",
            &[
                ("invalidated", &invalidated.to_string()),
                ("table", &event.table),
            ],
        );
    }
    invalidated
}
