//! # Sync Engine
//!
//! Composition root: owns the channel lifecycle, the subscription registry,
//! the router, and the per-table bindings, and drives reconciliation for
//! every delivered event. The read cache is constructor-injected with an
//! explicit attach/detach lifecycle; before a store is attached, every
//! cache-touching path is a silent no-op.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc;

use crate::cache::CacheStore;
use crate::event::{ChangeEvent, ChangePayload};
use crate::observability::Logger;
use crate::reconcile::{self, TableBinding};
use crate::sync::{
    ChannelKey, ChannelManager, ChannelStatus, EventHandlers, EventRouter, Filter, RouteOutcome,
    Subscription, SubscriptionHandle, SubscriptionRegistry, SyncError, SyncResult, Transport,
};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum subscriptions per channel
    pub max_subscriptions_per_channel: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_subscriptions_per_channel: 100,
        }
    }
}

/// Message consumed by the async pump in [`SyncEngine::run`]
#[derive(Debug, Clone)]
pub enum TransportMessage {
    /// A change payload delivered on some channel
    Change(ChangePayload),
    /// A connectivity-status update for one channel
    Status {
        /// The channel the status applies to
        channel: ChannelKey,
        /// The new status
        status: ChannelStatus,
    },
}

struct EngineInner {
    config: EngineConfig,
    store: RwLock<Option<Arc<dyn CacheStore>>>,
    registry: Arc<SubscriptionRegistry>,
    router: EventRouter,
    channels: ChannelManager,
    bindings: RwLock<HashMap<String, TableBinding>>,
}

impl EngineInner {
    fn store(&self) -> Option<Arc<dyn CacheStore>> {
        self.store.read().ok().and_then(|s| s.clone())
    }

    /// Primary reconciliation plus cascade fan-out for one event.
    /// Every failure mode here is recovered locally: no store attached and
    /// malformed entries are expected transients, not errors.
    fn reconcile(&self, binding: &TableBinding, event: &ChangeEvent) {
        let Some(store) = self.store() else {
            Logger::trace(
                "RECONCILE_SKIP",
                &[("reason", "store detached"), ("table", &event.table)],
            );
            return;
        };

        match reconcile::apply(store.as_ref(), binding, event) {
            Ok(outcome) => {
                if outcome.touched > 0 {
                    Logger::trace(
                        "RECONCILE_APPLIED",
                        &[
                            ("operation", &event.operation.to_string()),
                            ("table", &event.table),
                            ("touched", &outcome.touched.to_string()),
                        ],
                    );
                }
                reconcile::propagate(store.as_ref(), &binding.cascades, event);
            }
            Err(err) => {
                // One malformed event must not crash the multiplexer
                Logger::warn(
                    "RECONCILE_ERROR",
                    &[("error", &err.to_string()), ("table", &event.table)],
                );
            }
        }
    }
}

/// The realtime cache synchronization engine. Cheap to clone; clones share
/// state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Create an engine over a transport with default configuration
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    /// Create an engine over a transport
    pub fn with_config(transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        Self {
            inner: Arc::new(EngineInner {
                config,
                store: RwLock::new(None),
                router: EventRouter::new(Arc::clone(&registry)),
                registry,
                channels: ChannelManager::new(transport),
                bindings: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Attach the read cache. Until attached, reconciliation is a no-op.
    pub fn attach_store(&self, store: Arc<dyn CacheStore>) {
        if let Ok(mut slot) = self.inner.store.write() {
            *slot = Some(store);
        }
    }

    /// Detach the read cache (session teardown)
    pub fn detach_store(&self) {
        if let Ok(mut slot) = self.inner.store.write() {
            *slot = None;
        }
        Logger::info("STORE_DETACHED", &[]);
    }

    /// Register the default binding for a table
    pub fn bind(&self, binding: TableBinding) {
        if let Ok(mut bindings) = self.inner.bindings.write() {
            bindings.insert(binding.table.clone(), binding);
        }
    }

    /// Subscribe raw handler slots to a `(table, filter)` channel.
    ///
    /// When `enabled` is false (e.g. identity not yet resolved) this is a
    /// complete no-op: no channel I/O, and unsubscribing the returned
    /// handle does nothing.
    pub fn subscribe(
        &self,
        table: &str,
        filter: Option<&str>,
        enabled: bool,
        handlers: EventHandlers,
    ) -> SyncResult<SubscriptionHandle> {
        if !enabled {
            return Ok(SubscriptionHandle::disabled());
        }

        let filter = filter.map(Filter::parse).transpose()?;
        let channel = match &filter {
            Some(f) => ChannelKey::filtered(table, f.raw()),
            None => ChannelKey::table(table),
        };

        if self.inner.registry.channel_count(&channel)
            >= self.inner.config.max_subscriptions_per_channel
        {
            return Err(SyncError::TooManySubscriptions(
                self.inner.config.max_subscriptions_per_channel,
            ));
        }

        let id = self
            .inner
            .registry
            .insert(Subscription::new(channel.clone(), filter, handlers));
        self.inner.channels.acquire(&channel);

        Ok(SubscriptionHandle::active(id, channel))
    }

    /// Subscribe the table's registered binding: events reconcile the cache
    /// through the binding's strategy (then its cascades), and any handler
    /// slots given here run afterwards as consumer hooks.
    pub fn subscribe_table(
        &self,
        table: &str,
        filter: Option<&str>,
        enabled: bool,
        handlers: EventHandlers,
    ) -> SyncResult<SubscriptionHandle> {
        if !enabled {
            return Ok(SubscriptionHandle::disabled());
        }

        let binding = self
            .inner
            .bindings
            .read()
            .ok()
            .and_then(|bindings| bindings.get(table).cloned())
            .ok_or_else(|| SyncError::UnknownTable(table.to_string()))?;

        self.subscribe_bound(binding, filter, enabled, handlers)
    }

    /// Subscribe a one-off binding (e.g. keys scoped to the filter's value)
    pub fn subscribe_bound(
        &self,
        binding: TableBinding,
        filter: Option<&str>,
        enabled: bool,
        handlers: EventHandlers,
    ) -> SyncResult<SubscriptionHandle> {
        if !enabled {
            return Ok(SubscriptionHandle::disabled());
        }

        let table = binding.table.clone();
        let binding = Arc::new(binding);
        let weak = Arc::downgrade(&self.inner);

        let reconciling = EventHandlers {
            on_insert: Some(reconciling_handler(
                weak.clone(),
                Arc::clone(&binding),
                handlers.on_insert.clone(),
            )),
            on_update: Some(reconciling_handler(
                weak.clone(),
                Arc::clone(&binding),
                handlers.on_update.clone(),
            )),
            on_delete: Some(reconciling_handler(
                weak,
                Arc::clone(&binding),
                handlers.on_delete.clone(),
            )),
            on_error: handlers.on_error,
            on_status: handlers.on_status,
        };

        self.subscribe(&table, filter, true, reconciling)
    }

    /// Remove a subscription and release its channel. Safe at any point;
    /// a disabled handle is a no-op.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let (Some(id), Some(channel)) = (handle.id, handle.channel) else {
            return;
        };
        if self.inner.registry.remove(&id).is_some() {
            self.inner.channels.release(&channel);
        }
    }

    /// Validate and route one payload synchronously
    pub fn apply(&self, payload: ChangePayload) -> SyncResult<RouteOutcome> {
        let event = ChangeEvent::from_payload(payload)?;

        // Per-channel delivery counters; ordering is per channel only
        let touched: HashSet<ChannelKey> = self
            .inner
            .registry
            .matching(&event)
            .into_iter()
            .map(|sub| sub.channel)
            .collect();
        for channel in &touched {
            self.inner.channels.record_delivery(channel);
        }

        let outcome = self.inner.router.route(&event);
        Logger::trace(
            "EVENT_ROUTED",
            &[
                ("delivered", &outcome.delivered.to_string()),
                ("matched", &outcome.matched.to_string()),
                ("operation", &event.operation.to_string()),
                ("table", &event.table),
            ],
        );
        Ok(outcome)
    }

    /// Feed a connectivity status for one channel. `Closed` completes the
    /// channel teardown handshake; every status fans out to `on_status`.
    pub fn status(&self, channel: &ChannelKey, status: ChannelStatus) {
        if status == ChannelStatus::Closed {
            self.inner.channels.confirm_closed(channel);
        }
        if let ChannelStatus::Error(message) = &status {
            Logger::warn(
                "CHANNEL_ERROR",
                &[("error", message), ("topic", &channel.topic())],
            );
        }
        self.inner.router.notify_status(channel, &status);
    }

    /// Drain transport messages until the sender side closes
    pub async fn run(&self, mut receiver: mpsc::UnboundedReceiver<TransportMessage>) {
        while let Some(message) = receiver.recv().await {
            match message {
                TransportMessage::Change(payload) => {
                    if let Err(err) = self.apply(payload) {
                        Logger::warn("EVENT_REJECTED", &[("error", &err.to_string())]);
                    }
                }
                TransportMessage::Status { channel, status } => self.status(&channel, status),
            }
        }
    }

    /// Live subscription count
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Channels currently open
    pub fn open_channels(&self) -> usize {
        self.inner.channels.open_count()
    }

    /// Last delivery sequence seen on a channel
    pub fn last_sequence(&self, channel: &ChannelKey) -> u64 {
        self.inner.channels.last_sequence(channel)
    }
}

/// Handler that reconciles through the binding, then runs the consumer's
/// hook. Holds the engine weakly: a subscription outliving the engine
/// degrades to the consumer hook alone.
fn reconciling_handler(
    weak: Weak<EngineInner>,
    binding: Arc<TableBinding>,
    hook: Option<crate::sync::subscription::Handler>,
) -> crate::sync::subscription::Handler {
    Arc::new(move |event| {
        if let Some(inner) = weak.upgrade() {
            inner.reconcile(&binding, event);
        }
        match &hook {
            Some(hook) => hook(event),
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, QueryKey};
    use crate::event::Operation;
    use crate::sync::NullTransport;
    use serde_json::json;

    fn engine() -> SyncEngine {
        SyncEngine::new(Arc::new(NullTransport))
    }

    fn insert_payload(table: &str, row: serde_json::Value) -> ChangePayload {
        ChangePayload {
            event_type: Operation::Insert,
            schema: "public".to_string(),
            table: table.to_string(),
            new: Some(row),
            old: None,
        }
    }

    #[test]
    fn test_disabled_subscribe_is_noop() {
        let engine = engine();
        let handle = engine
            .subscribe("foods", None, false, EventHandlers::new())
            .unwrap();

        assert!(!handle.is_active());
        assert_eq!(engine.subscription_count(), 0);
        assert_eq!(engine.open_channels(), 0);

        // Unsubscribing a disabled handle does nothing
        engine.unsubscribe(handle);
        assert_eq!(engine.subscription_count(), 0);
    }

    #[test]
    fn test_subscribe_table_requires_binding() {
        let engine = engine();
        let err = engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownTable(t) if t == "foods"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let engine = engine();
        let err = engine
            .subscribe("foods", Some("bogus"), true, EventHandlers::new())
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidFilter(_)));
    }

    #[test]
    fn test_subscription_limit() {
        let engine = SyncEngine::with_config(
            Arc::new(NullTransport),
            EngineConfig {
                max_subscriptions_per_channel: 2,
            },
        );

        engine
            .subscribe("foods", None, true, EventHandlers::new())
            .unwrap();
        engine
            .subscribe("foods", None, true, EventHandlers::new())
            .unwrap();
        let err = engine
            .subscribe("foods", None, true, EventHandlers::new())
            .unwrap_err();

        assert!(matches!(err, SyncError::TooManySubscriptions(2)));
    }

    #[test]
    fn test_apply_reconciles_bound_table() {
        let engine = engine();
        let store = Arc::new(MemoryCache::new());
        engine.attach_store(store.clone());

        let family = QueryKey::new().with("foods").with("list");
        store.put(family.clone(), json!({"items": [], "total": 0}));

        engine.bind(TableBinding::list("foods", family.clone()).with_total_field("total"));
        engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap();

        let outcome = engine
            .apply(insert_payload("foods", json!({"id": "f1", "name": "Apple"})))
            .unwrap();

        assert_eq!(outcome.delivered, 1);
        assert_eq!(store.get(&family).unwrap().value["total"], 1);
    }

    #[test]
    fn test_apply_without_store_is_noop() {
        let engine = engine();
        engine.bind(TableBinding::list(
            "foods",
            QueryKey::new().with("foods").with("list"),
        ));
        engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap();

        // No store attached: delivered, nothing to reconcile, no error
        let outcome = engine
            .apply(insert_payload("foods", json!({"id": "f1"})))
            .unwrap();
        assert_eq!(outcome.delivered, 1);
    }

    #[test]
    fn test_apply_rejects_invalid_payload() {
        let engine = engine();
        let payload = ChangePayload {
            event_type: Operation::Insert,
            schema: "public".to_string(),
            table: "foods".to_string(),
            new: None,
            old: None,
        };
        assert!(matches!(
            engine.apply(payload),
            Err(SyncError::Payload(_))
        ));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let engine = engine();
        let store = Arc::new(MemoryCache::new());
        engine.attach_store(store.clone());

        let family = QueryKey::new().with("foods").with("list");
        store.put(family.clone(), json!({"items": [], "total": 0}));
        engine.bind(TableBinding::list("foods", family.clone()).with_total_field("total"));

        let handle = engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap();
        engine.unsubscribe(handle);

        let outcome = engine
            .apply(insert_payload("foods", json!({"id": "f1"})))
            .unwrap();

        assert_eq!(outcome.matched, 0);
        assert_eq!(store.get(&family).unwrap().value["total"], 0);
    }

    #[test]
    fn test_detach_store_suspends_reconciliation() {
        let engine = engine();
        let store = Arc::new(MemoryCache::new());
        engine.attach_store(store.clone());

        let family = QueryKey::new().with("foods").with("list");
        store.put(family.clone(), json!({"items": [], "total": 0}));
        engine.bind(TableBinding::list("foods", family.clone()).with_total_field("total"));
        engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap();

        engine.detach_store();
        engine
            .apply(insert_payload("foods", json!({"id": "f1"})))
            .unwrap();
        assert_eq!(store.get(&family).unwrap().value["total"], 0);

        // Re-attach: reconciliation resumes
        engine.attach_store(store.clone());
        engine
            .apply(insert_payload("foods", json!({"id": "f2"})))
            .unwrap();
        assert_eq!(store.get(&family).unwrap().value["total"], 1);
    }

    #[tokio::test]
    async fn test_run_pump() {
        let engine = engine();
        let store = Arc::new(MemoryCache::new());
        engine.attach_store(store.clone());

        let family = QueryKey::new().with("foods").with("list");
        store.put(family.clone(), json!({"items": [], "total": 0}));
        engine.bind(TableBinding::list("foods", family.clone()).with_total_field("total"));
        engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(TransportMessage::Change(insert_payload(
            "foods",
            json!({"id": "f1"}),
        )))
        .unwrap();
        tx.send(TransportMessage::Change(insert_payload(
            "foods",
            json!({"id": "f2"}),
        )))
        .unwrap();
        drop(tx);

        engine.run(rx).await;

        assert_eq!(store.get(&family).unwrap().value["total"], 2);
    }

    #[test]
    fn test_delivery_sequence_tracked() {
        let engine = engine();
        engine.bind(TableBinding::list(
            "foods",
            QueryKey::new().with("foods").with("list"),
        ));
        engine
            .subscribe_table("foods", None, true, EventHandlers::new())
            .unwrap();

        let channel = ChannelKey::table("foods");
        engine
            .apply(insert_payload("foods", json!({"id": "f1"})))
            .unwrap();
        engine
            .apply(insert_payload("foods", json!({"id": "f2"})))
            .unwrap();

        assert_eq!(engine.last_sequence(&channel), 2);
    }
}
