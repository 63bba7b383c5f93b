//! # List Strategy
//!
//! Applies one change event to every array-shaped entry in a key family.
//! Entries are either a bare array of records or an object holding the
//! records under an items field with an optional paired total counter.

use serde_json::Value;

use super::binding::TableBinding;
use super::ReconcileOutcome;
use crate::cache::{CacheError, CacheResult, CacheStore, QueryKey};
use crate::event::{identity_of, item_position, ChangeEvent, Identity, IdentityFields, Operation};
use crate::observability::Logger;

/// Apply an event to every entry sharing the family prefix.
///
/// INSERT on a family with no entries seeds a fresh entry at the family
/// key itself; UPDATE/DELETE on a missing family are no-ops.
pub fn apply(
    store: &dyn CacheStore,
    binding: &TableBinding,
    family: &QueryKey,
    items_field: &str,
    total_field: Option<&str>,
    event: &ChangeEvent,
) -> CacheResult<ReconcileOutcome> {
    let mut outcome = ReconcileOutcome::default();

    let Some(raw) = event.record() else {
        return Ok(outcome);
    };
    let Some(id) = identity_of(raw, &binding.identity) else {
        Logger::warn(
            "RECONCILE_SKIP",
            &[("reason", "no identity"), ("table", &binding.table)],
        );
        outcome.skipped += 1;
        return Ok(outcome);
    };

    // DELETE rows may be partial; they are never mapped or stored
    let mapped = match event.operation {
        Operation::Insert | Operation::Update => Some(binding.map(raw)),
        Operation::Delete => None,
    };

    let keys = store.keys_with_prefix(family);
    if keys.is_empty() {
        if event.operation == Operation::Insert {
            let seeded = seed(mapped.as_ref().unwrap_or(raw), items_field, total_field);
            store.update(family, &|_| Some(seeded.clone()));
            outcome.seeded = true;
            outcome.touched += 1;
        }
        return Ok(outcome);
    }

    for key in keys {
        let Some(entry) = store.get(&key) else {
            continue;
        };
        match edit(
            &entry.value,
            event.operation,
            mapped.as_ref(),
            &id,
            &binding.identity,
            items_field,
            total_field,
        ) {
            Ok(Some(next)) => {
                store.update(&key, &|_| Some(next.clone()));
                outcome.touched += 1;
            }
            Ok(None) => {}
            Err(err) => {
                Logger::warn(
                    "RECONCILE_SKIP",
                    &[("error", &err.to_string()), ("key", &key.to_string())],
                );
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

/// Fresh entry holding just one record. Mirrors the configuration: an
/// object when a total counter is tracked, a bare array otherwise.
fn seed(record: &Value, items_field: &str, total_field: Option<&str>) -> Value {
    match total_field {
        Some(total) => {
            let mut map = serde_json::Map::new();
            map.insert(items_field.to_string(), Value::Array(vec![record.clone()]));
            map.insert(total.to_string(), Value::from(1));
            Value::Object(map)
        }
        None => Value::Array(vec![record.clone()]),
    }
}

/// Compute the replacement for one entry. Returns None when unchanged.
fn edit(
    current: &Value,
    operation: Operation,
    mapped: Option<&Value>,
    id: &Identity,
    identity: &IdentityFields,
    items_field: &str,
    total_field: Option<&str>,
) -> CacheResult<Option<Value>> {
    match current {
        Value::Array(items) => Ok(edit_items(items, operation, mapped, id, identity)
            .map(|(items, _)| Value::Array(items))),
        Value::Object(map) => {
            let items = map
                .get(items_field)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    CacheError::EntryShape(format!("missing array field '{}'", items_field))
                })?;

            let Some((next_items, delta)) = edit_items(items, operation, mapped, id, identity)
            else {
                return Ok(None);
            };

            let mut next = map.clone();
            next.insert(items_field.to_string(), Value::Array(next_items));
            if let Some(total) = total_field {
                if let Some(count) = map.get(total).and_then(Value::as_i64) {
                    // The stored total may be miscounted; never below zero
                    next.insert(total.to_string(), Value::from((count + delta).max(0)));
                }
            }
            Ok(Some(Value::Object(next)))
        }
        other => Err(CacheError::EntryShape(format!(
            "expected array or object, found {}",
            json_kind(other)
        ))),
    }
}

/// Edit a record list, returning the new list and the total delta.
/// None when the event does not change this list.
fn edit_items(
    items: &[Value],
    operation: Operation,
    mapped: Option<&Value>,
    id: &Identity,
    identity: &IdentityFields,
) -> Option<(Vec<Value>, i64)> {
    let position = item_position(items, id, identity);

    match operation {
        Operation::Insert => {
            // Idempotent against duplicate delivery
            if position.is_some() {
                return None;
            }
            let mut next = items.to_vec();
            next.push(mapped?.clone());
            Some((next, 1))
        }
        Operation::Update => {
            // Never insert on UPDATE; the list may not hold the record yet
            let pos = position?;
            let mut next = items.to_vec();
            next[pos] = mapped?.clone();
            Some((next, 0))
        }
        Operation::Delete => {
            let pos = position?;
            let mut next = items.to_vec();
            next.remove(pos);
            Some((next, -1))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
