//! livesync - A client-side realtime cache synchronization engine
//!
//! Receives row-level change notifications from a change-data-capture
//! channel and reconciles them into a query-keyed read cache.

pub mod cache;
pub mod engine;
pub mod event;
pub mod observability;
pub mod reconcile;
pub mod sync;
