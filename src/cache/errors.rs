//! # Cache Errors
//!
//! Error types for cache access and entry reconciliation.

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache errors
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    // ==================
    // Shape Errors
    // ==================
    /// A cache entry did not have the shape the chosen strategy asserts
    #[error("Cache entry has unexpected shape: {0}")]
    EntryShape(String),

    // ==================
    // Internal Errors
    // ==================
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
