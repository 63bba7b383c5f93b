//! # Cache Reconciliation
//!
//! Strategies that apply one routed change event to entries of the
//! query-keyed read cache:
//!
//! - **List**: append/replace/remove inside an array-shaped entry,
//!   deduplicated by identity
//! - **Single**: replace or clear the entry addressed by one record
//! - **InvalidateOnly**: mark entries stale and force a refetch
//!
//! The strategy is chosen explicitly per table via a [`TableBinding`]
//! resolved once at subscription time. All mutations are copy-on-write: a
//! strategy builds a new value and hands it to the store, so a reader
//! holding the previous value never observes a partial structure.

pub mod binding;
pub mod cascade;
pub mod invalidate;
pub mod list;
pub mod single;

pub use binding::{MapRow, Strategy, TableBinding};
pub use cascade::{propagate, CascadeRule};

use crate::cache::{CacheResult, CacheStore};
use crate::event::ChangeEvent;

/// What one reconciliation did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Entries written or marked stale
    pub touched: usize,
    /// Entries skipped (unexpected shape, unidentifiable record)
    pub skipped: usize,
    /// A fresh list entry was seeded
    pub seeded: bool,
    /// A detail entry was removed
    pub removed: bool,
}

/// Apply one event to the cache under a binding's strategy
pub fn apply(
    store: &dyn CacheStore,
    binding: &TableBinding,
    event: &ChangeEvent,
) -> CacheResult<ReconcileOutcome> {
    match &binding.strategy {
        Strategy::List {
            family,
            items_field,
            total_field,
        } => list::apply(store, binding, family, items_field, total_field.as_deref(), event),
        Strategy::Single { prefix } => single::apply(store, binding, prefix, event),
        Strategy::InvalidateOnly { targets, exact } => {
            Ok(invalidate::apply(store, targets, *exact))
        }
    }
}
