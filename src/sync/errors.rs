//! # Sync Errors
//!
//! Error types for subscriptions, channels, and routing.

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync errors
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    // ==================
    // Subscription Errors
    // ==================
    /// Filter string did not parse
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Too many subscriptions on one channel
    #[error("Too many subscriptions (max: {0})")]
    TooManySubscriptions(usize),

    /// No binding registered for the table
    #[error("No binding registered for table: {0}")]
    UnknownTable(String),

    // ==================
    // Payload Errors
    // ==================
    /// Incoming payload failed validation
    #[error("Invalid payload: {0}")]
    Payload(#[from] crate::event::EventError),

    // ==================
    // Internal Errors
    // ==================
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error surfaced by a consumer handler.
///
/// One consumer's failure is forwarded to its own `on_error` slot (or
/// logged) and never prevents delivery to other consumers.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Create a handler error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}
