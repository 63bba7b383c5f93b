//! # Invalidate-Only Strategy
//!
//! For tables where patching in place is not worth the complexity
//! (aggregates, counts), any operation marks the target entries stale and
//! the next read refetches. Trades immediacy for simplicity.

use super::ReconcileOutcome;
use crate::cache::{CacheStore, QueryKey};

/// Mark every target entry (or family) stale
pub fn apply(store: &dyn CacheStore, targets: &[QueryKey], exact: bool) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    for target in targets {
        outcome.touched += store.invalidate(target, exact);
    }
    outcome
}
