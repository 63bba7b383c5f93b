//! # Subscription Filters
//!
//! A filter is a single `<field>=eq.<value>` expression. The registry treats
//! it as an opaque equality predicate supplied by the caller: the raw string
//! identifies the channel on the wire, and the parsed form is evaluated
//! against one field of the event's row.

use serde_json::Value;

use super::errors::{SyncError, SyncResult};
use crate::event::ChangeEvent;

/// An equality filter on one row field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    raw: String,
    field: String,
    value: String,
}

impl Filter {
    /// Parse a `<field>=eq.<value>` expression
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let (field, rest) = raw
            .split_once('=')
            .ok_or_else(|| SyncError::InvalidFilter(raw.to_string()))?;
        let value = rest
            .strip_prefix("eq.")
            .ok_or_else(|| SyncError::InvalidFilter(raw.to_string()))?;

        if field.is_empty() || value.is_empty() {
            return Err(SyncError::InvalidFilter(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    /// The original expression, passed through to the transport unchanged
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The filtered field name
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Check one row against the filter
    pub fn matches_row(&self, row: &Value) -> bool {
        let Some(field_value) = row.get(&self.field) else {
            return false;
        };
        match field_value {
            Value::String(s) => s == &self.value,
            // Non-string values compare against their JSON rendering, so
            // `count=eq.3` and `active=eq.true` behave as expected
            other => other.to_string() == self.value,
        }
    }

    /// Check an event against the filter, preferring the new row
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.any_record().is_some_and(|row| self.matches_row(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse() {
        let filter = Filter::parse("user_id=eq.u1").unwrap();
        assert_eq!(filter.field(), "user_id");
        assert_eq!(filter.raw(), "user_id=eq.u1");
    }

    #[test]
    fn test_parse_rejects_other_operators() {
        assert!(Filter::parse("age=gt.3").is_err());
        assert!(Filter::parse("nonsense").is_err());
        assert!(Filter::parse("=eq.x").is_err());
        assert!(Filter::parse("f=eq.").is_err());
    }

    #[test]
    fn test_value_containing_dots() {
        let filter = Filter::parse("email=eq.a.b@c.io").unwrap();
        assert!(filter.matches_row(&json!({"email": "a.b@c.io"})));
    }

    #[test]
    fn test_string_match() {
        let filter = Filter::parse("user_id=eq.u1").unwrap();
        assert!(filter.matches_row(&json!({"user_id": "u1"})));
        assert!(!filter.matches_row(&json!({"user_id": "u2"})));
        assert!(!filter.matches_row(&json!({"other": "u1"})));
    }

    #[test]
    fn test_non_string_match() {
        let filter = Filter::parse("count=eq.3").unwrap();
        assert!(filter.matches_row(&json!({"count": 3})));
        assert!(!filter.matches_row(&json!({"count": 4})));

        let filter = Filter::parse("active=eq.true").unwrap();
        assert!(filter.matches_row(&json!({"active": true})));
    }

    #[test]
    fn test_event_match_prefers_new_row() {
        let filter = Filter::parse("user_id=eq.u1").unwrap();

        let insert = ChangeEvent::insert("workouts", json!({"id": "w1", "user_id": "u1"}));
        assert!(filter.matches(&insert));

        // DELETE carries only the old row
        let delete = ChangeEvent::delete("workouts", json!({"id": "w1", "user_id": "u1"}));
        assert!(filter.matches(&delete));

        let other = ChangeEvent::insert("workouts", json!({"id": "w2", "user_id": "u2"}));
        assert!(!filter.matches(&other));
    }
}
