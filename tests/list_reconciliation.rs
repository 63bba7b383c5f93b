//! List Reconciliation Invariant Tests
//!
//! Tests for the core list-strategy invariants:
//! - Idempotent insert
//! - Update-miss no-op
//! - Delete floor
//! - Seed-on-missing

use std::sync::Arc;

use serde_json::json;

use livesync::cache::{CacheStore, KeyPart, MemoryCache, QueryKey};
use livesync::engine::{SyncEngine, TransportMessage};
use livesync::event::{ChangePayload, Operation};
use livesync::reconcile::TableBinding;
use livesync::sync::{EventHandlers, NullTransport};

fn foods_list() -> QueryKey {
    QueryKey::new().with("foods").with("list")
}

fn engine_with_store() -> (SyncEngine, Arc<MemoryCache>) {
    let engine = SyncEngine::new(Arc::new(NullTransport));
    let store = Arc::new(MemoryCache::new());
    engine.attach_store(store.clone());
    (engine, store)
}

fn bind_foods(engine: &SyncEngine) {
    engine.bind(TableBinding::list("foods", foods_list()).with_total_field("total"));
    engine
        .subscribe_table("foods", None, true, EventHandlers::new())
        .unwrap();
}

fn payload(op: Operation, new: Option<serde_json::Value>, old: Option<serde_json::Value>) -> ChangePayload {
    ChangePayload {
        event_type: op,
        schema: "public".to_string(),
        table: "foods".to_string(),
        new,
        old,
    }
}

// =============================================================================
// Idempotent Insert
// =============================================================================

/// Applying the same INSERT twice yields the same result as applying it
/// once: no duplicate identities, total incremented exactly once.
#[test]
fn test_idempotent_insert() {
    let (engine, store) = engine_with_store();
    store.put(foods_list(), json!({"items": [], "total": 0}));
    bind_foods(&engine);

    let insert = payload(
        Operation::Insert,
        Some(json!({"id": "f1", "name": "Apple"})),
        None,
    );
    engine.apply(insert.clone()).unwrap();
    let once = store.get(&foods_list()).unwrap().value;

    engine.apply(insert).unwrap();
    let twice = store.get(&foods_list()).unwrap().value;

    assert_eq!(once, twice);
    assert_eq!(twice["items"].as_array().unwrap().len(), 1);
    assert_eq!(twice["total"], 1);
}

// =============================================================================
// Update-Miss No-Op
// =============================================================================

/// An UPDATE for an identity absent from the list leaves the entry
/// unchanged; UPDATE never inserts.
#[test]
fn test_update_miss_noop() {
    let (engine, store) = engine_with_store();
    let before = json!({"items": [{"id": "f1", "name": "Apple"}], "total": 1});
    store.put(foods_list(), before.clone());
    bind_foods(&engine);

    engine
        .apply(payload(
            Operation::Update,
            Some(json!({"id": "f9", "name": "Fig"})),
            Some(json!({"id": "f9"})),
        ))
        .unwrap();

    assert_eq!(store.get(&foods_list()).unwrap().value, before);
}

// =============================================================================
// Delete Floor
// =============================================================================

/// Repeated DELETEs for the same identity never drive total below zero.
#[test]
fn test_delete_floor() {
    let (engine, store) = engine_with_store();
    store.put(foods_list(), json!({"items": [{"id": "f1"}], "total": 0}));
    bind_foods(&engine);

    let delete = payload(Operation::Delete, None, Some(json!({"id": "f1"})));
    for _ in 0..3 {
        engine.apply(delete.clone()).unwrap();
    }

    let value = store.get(&foods_list()).unwrap().value;
    assert!(value["items"].as_array().unwrap().is_empty());
    assert_eq!(value["total"], 0);
}

// =============================================================================
// Missing-Entry Policy
// =============================================================================

/// INSERT on a never-fetched family seeds a fresh entry with just the new
/// item; UPDATE/DELETE on a missing family are no-ops.
#[test]
fn test_missing_entry_policy() {
    let (engine, store) = engine_with_store();
    bind_foods(&engine);

    engine
        .apply(payload(
            Operation::Update,
            Some(json!({"id": "f1"})),
            Some(json!({"id": "f1"})),
        ))
        .unwrap();
    engine
        .apply(payload(Operation::Delete, None, Some(json!({"id": "f1"}))))
        .unwrap();
    assert!(store.get(&foods_list()).is_none());

    engine
        .apply(payload(
            Operation::Insert,
            Some(json!({"id": "f1", "name": "Apple"})),
            None,
        ))
        .unwrap();

    let value = store.get(&foods_list()).unwrap().value;
    assert_eq!(value["items"], json!([{"id": "f1", "name": "Apple"}]));
    assert_eq!(value["total"], 1);
}

// =============================================================================
// Family Fan-Out
// =============================================================================

/// Every paginated list sharing the family prefix reconciles; unrelated
/// keys stay untouched.
#[test]
fn test_family_fanout() {
    let (engine, store) = engine_with_store();
    let p1 = foods_list().with(KeyPart::json(&json!({"page": 1})));
    let p2 = foods_list().with(KeyPart::json(&json!({"page": 2})));
    let other = QueryKey::new().with("workouts").with("list");
    store.put(p1.clone(), json!({"items": [], "total": 0}));
    store.put(p2.clone(), json!({"items": [], "total": 0}));
    store.put(other.clone(), json!({"items": [], "total": 0}));
    bind_foods(&engine);

    engine
        .apply(payload(Operation::Insert, Some(json!({"id": "f1"})), None))
        .unwrap();

    assert_eq!(store.get(&p1).unwrap().value["total"], 1);
    assert_eq!(store.get(&p2).unwrap().value["total"], 1);
    assert_eq!(store.get(&other).unwrap().value["total"], 0);
}

// =============================================================================
// Worked Scenario
// =============================================================================

/// The full insert → delete → replayed-delete walk-through:
/// `[Apple]` +Banana → `[Apple, Banana]` (total 2), −Apple →
/// `[Banana]` (total 1), −Apple again → unchanged.
#[test]
fn test_insert_then_delete_scenario() {
    let (engine, store) = engine_with_store();
    store.put(
        foods_list(),
        json!({"items": [{"id": "f1", "name": "Apple"}], "total": 1}),
    );
    bind_foods(&engine);

    engine
        .apply(payload(
            Operation::Insert,
            Some(json!({"id": "f2", "name": "Banana"})),
            None,
        ))
        .unwrap();

    let value = store.get(&foods_list()).unwrap().value;
    assert_eq!(value["items"].as_array().unwrap().len(), 2);
    assert_eq!(value["total"], 2);

    let delete = payload(Operation::Delete, None, Some(json!({"id": "f1"})));
    engine.apply(delete.clone()).unwrap();

    let value = store.get(&foods_list()).unwrap().value;
    assert_eq!(value["items"], json!([{"id": "f2", "name": "Banana"}]));
    assert_eq!(value["total"], 1);

    // Replayed delete: unchanged, total stays 1
    engine.apply(delete).unwrap();
    let value = store.get(&foods_list()).unwrap().value;
    assert_eq!(value["items"].as_array().unwrap().len(), 1);
    assert_eq!(value["total"], 1);
}

// =============================================================================
// Copy-On-Write
// =============================================================================

/// A reader holding the previous entry value never sees it change.
#[test]
fn test_copy_on_write() {
    let (engine, store) = engine_with_store();
    store.put(foods_list(), json!({"items": [], "total": 0}));
    bind_foods(&engine);

    let held = store.get(&foods_list()).unwrap().value;

    engine
        .apply(payload(Operation::Insert, Some(json!({"id": "f1"})), None))
        .unwrap();

    // The held snapshot is untouched; the store has the new value
    assert_eq!(held, json!({"items": [], "total": 0}));
    assert_eq!(store.get(&foods_list()).unwrap().value["total"], 1);
}

// =============================================================================
// Async Pump
// =============================================================================

/// Events routed through the async pump reconcile in delivery order.
#[tokio::test]
async fn test_pump_applies_in_order() {
    let (engine, store) = engine_with_store();
    store.put(foods_list(), json!({"items": [], "total": 0}));
    bind_foods(&engine);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(TransportMessage::Change(payload(
        Operation::Insert,
        Some(json!({"id": "f1", "name": "Apple"})),
        None,
    )))
    .unwrap();
    tx.send(TransportMessage::Change(payload(
        Operation::Update,
        Some(json!({"id": "f1", "name": "Green Apple"})),
        Some(json!({"id": "f1"})),
    )))
    .unwrap();
    drop(tx);

    engine.run(rx).await;

    let value = store.get(&foods_list()).unwrap().value;
    assert_eq!(value["items"][0]["name"], "Green Apple");
    assert_eq!(value["total"], 1);
}
