//! # Event Errors
//!
//! Error types for payload validation.

use thiserror::Error;

use super::change::Operation;

/// Result type for event operations
pub type EventResult<T> = Result<T, EventError>;

/// Event validation errors
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// INSERT/UPDATE payload arrived without a new record
    #[error("{0} payload is missing the new record")]
    MissingNewRecord(Operation),

    /// UPDATE/DELETE payload arrived without an old record
    #[error("{0} payload is missing the old record")]
    MissingOldRecord(Operation),

    /// Payload could not be parsed
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}
