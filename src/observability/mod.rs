//! # Observability
//!
//! Structured logging for the synchronization engine.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on reconciliation
//! 3. Synchronous, no buffering
//! 4. Deterministic output

mod logger;

pub use logger::{Logger, Severity};
