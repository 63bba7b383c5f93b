//! # Change Events
//!
//! Payload and event types for row-level database changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{EventError, EventResult};

/// Type of database change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// New record inserted
    Insert,
    /// Existing record updated
    Update,
    /// Record deleted
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Insert => write!(f, "INSERT"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

/// Raw change payload as delivered by the transport, one per open channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePayload {
    /// Change type
    #[serde(rename = "eventType")]
    pub event_type: Operation,

    /// Schema name (default: "public")
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Table name
    pub table: String,

    /// New row data (for INSERT/UPDATE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,

    /// Old row data (for UPDATE/DELETE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

impl ChangePayload {
    /// Parse a payload from its wire JSON
    pub fn from_json(raw: &str) -> EventResult<Self> {
        serde_json::from_str(raw).map_err(|e| EventError::MalformedPayload(e.to_string()))
    }
}

/// A validated change event
///
/// Invariant: `new_record` is present for INSERT/UPDATE, `old_record` is
/// present for UPDATE/DELETE. Enforced at construction; reconciliation code
/// relies on it.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Table the change applies to
    pub table: String,

    /// Schema name
    pub schema: String,

    /// Change type
    pub operation: Operation,

    /// New row (INSERT/UPDATE)
    pub new_record: Option<Value>,

    /// Old row (UPDATE/DELETE)
    pub old_record: Option<Value>,

    /// When this client received the event
    pub received_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Validate a raw payload into an event
    pub fn from_payload(payload: ChangePayload) -> EventResult<Self> {
        match payload.event_type {
            Operation::Insert | Operation::Update => {
                if payload.new.is_none() {
                    return Err(EventError::MissingNewRecord(payload.event_type));
                }
            }
            Operation::Delete => {}
        }
        match payload.event_type {
            Operation::Update | Operation::Delete => {
                if payload.old.is_none() {
                    return Err(EventError::MissingOldRecord(payload.event_type));
                }
            }
            Operation::Insert => {}
        }

        Ok(Self {
            table: payload.table,
            schema: payload.schema,
            operation: payload.event_type,
            new_record: payload.new,
            old_record: payload.old,
            received_at: Utc::now(),
        })
    }

    /// Create an INSERT event
    pub fn insert(table: impl Into<String>, record: Value) -> Self {
        Self {
            table: table.into(),
            schema: default_schema(),
            operation: Operation::Insert,
            new_record: Some(record),
            old_record: None,
            received_at: Utc::now(),
        }
    }

    /// Create an UPDATE event
    pub fn update(table: impl Into<String>, old_record: Value, new_record: Value) -> Self {
        Self {
            table: table.into(),
            schema: default_schema(),
            operation: Operation::Update,
            new_record: Some(new_record),
            old_record: Some(old_record),
            received_at: Utc::now(),
        }
    }

    /// Create a DELETE event
    pub fn delete(table: impl Into<String>, old_record: Value) -> Self {
        Self {
            table: table.into(),
            schema: default_schema(),
            operation: Operation::Delete,
            new_record: None,
            old_record: Some(old_record),
            received_at: Utc::now(),
        }
    }

    /// The row this event is about: new for INSERT/UPDATE, old for DELETE
    pub fn record(&self) -> Option<&Value> {
        match self.operation {
            Operation::Insert | Operation::Update => self.new_record.as_ref(),
            Operation::Delete => self.old_record.as_ref(),
        }
    }

    /// Either row, preferring new. Used by filter matching.
    pub fn any_record(&self) -> Option<&Value> {
        self.new_record.as_ref().or(self.old_record.as_ref())
    }
}
