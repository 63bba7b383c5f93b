//! # Subscription Management
//!
//! Consumer subscription registry. Multiple subscriptions may target the
//! same `(table, filter)` pair; each keeps its own handler slots and is
//! fanned out independently, so one consumer's unsubscribe never drops
//! another's handlers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::channel::{ChannelKey, ChannelStatus};
use super::errors::HandlerError;
use super::filter::Filter;
use crate::event::ChangeEvent;

/// Change-event handler slot
pub type Handler = Arc<dyn Fn(&ChangeEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Error hook
pub type ErrorHandler = Arc<dyn Fn(&HandlerError) + Send + Sync>;

/// Connectivity-status hook
pub type StatusHandler = Arc<dyn Fn(&ChannelStatus) + Send + Sync>;

/// Per-subscription callback slots. All optional; an event whose operation
/// has no handler is dropped silently for that subscription.
#[derive(Clone, Default)]
pub struct EventHandlers {
    /// Invoked for INSERT events
    pub on_insert: Option<Handler>,
    /// Invoked for UPDATE events
    pub on_update: Option<Handler>,
    /// Invoked for DELETE events
    pub on_delete: Option<Handler>,
    /// Receives this subscription's handler failures
    pub on_error: Option<ErrorHandler>,
    /// Receives channel connectivity changes
    pub on_status: Option<StatusHandler>,
}

impl EventHandlers {
    /// Empty handler set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the INSERT handler
    pub fn on_insert(
        mut self,
        f: impl Fn(&ChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.on_insert = Some(Arc::new(f));
        self
    }

    /// Set the UPDATE handler
    pub fn on_update(
        mut self,
        f: impl Fn(&ChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    /// Set the DELETE handler
    pub fn on_delete(
        mut self,
        f: impl Fn(&ChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.on_delete = Some(Arc::new(f));
        self
    }

    /// Set the error hook
    pub fn on_error(mut self, f: impl Fn(&HandlerError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Set the status hook
    pub fn on_status(mut self, f: impl Fn(&ChannelStatus) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_insert", &self.on_insert.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

/// One consumer's subscription to database changes
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Unique subscription ID
    pub id: Uuid,

    /// Channel this subscription rides on
    pub channel: ChannelKey,

    /// Parsed filter, when the channel is narrowed
    pub filter: Option<Filter>,

    /// Handler slots
    pub handlers: EventHandlers,
}

impl Subscription {
    /// Create a subscription
    pub fn new(channel: ChannelKey, filter: Option<Filter>, handlers: EventHandlers) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            filter,
            handlers,
        }
    }

    /// Check whether an event belongs to this subscription
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.channel.table {
            return false;
        }
        match &self.filter {
            Some(filter) => filter.matches(event),
            None => true,
        }
    }
}

/// Handle returned by `subscribe`. Holds what `unsubscribe` needs; inert
/// when the subscription was disabled at creation.
#[derive(Debug)]
pub struct SubscriptionHandle {
    pub(crate) id: Option<Uuid>,
    pub(crate) channel: Option<ChannelKey>,
}

impl SubscriptionHandle {
    /// Handle for a disabled subscription: unsubscribing it is a no-op
    pub fn disabled() -> Self {
        Self {
            id: None,
            channel: None,
        }
    }

    /// Handle for a live subscription
    pub fn active(id: Uuid, channel: ChannelKey) -> Self {
        Self {
            id: Some(id),
            channel: Some(channel),
        }
    }

    /// Whether this handle refers to a live subscription
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    /// The subscription id, when live
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }
}

/// Registry of active subscriptions
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Subscriptions by ID
    by_id: RwLock<HashMap<Uuid, Subscription>>,

    /// Subscription IDs by table
    by_table: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl SubscriptionRegistry {
    /// Create a new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription
    pub fn insert(&self, subscription: Subscription) -> Uuid {
        let id = subscription.id;
        let table = subscription.channel.table.clone();

        if let Ok(mut by_id) = self.by_id.write() {
            by_id.insert(id, subscription);
        }
        if let Ok(mut by_table) = self.by_table.write() {
            by_table.entry(table).or_default().insert(id);
        }

        id
    }

    /// Remove a subscription. Returns it when it existed.
    pub fn remove(&self, id: &Uuid) -> Option<Subscription> {
        let subscription = self
            .by_id
            .write()
            .ok()
            .and_then(|mut by_id| by_id.remove(id))?;

        if let Ok(mut by_table) = self.by_table.write() {
            if let Some(ids) = by_table.get_mut(&subscription.channel.table) {
                ids.remove(id);
                if ids.is_empty() {
                    by_table.remove(&subscription.channel.table);
                }
            }
        }

        Some(subscription)
    }

    /// Subscriptions whose `(table, filter)` matches an event
    pub fn matching(&self, event: &ChangeEvent) -> Vec<Subscription> {
        let ids: Vec<Uuid> = {
            let Ok(by_table) = self.by_table.read() else {
                return Vec::new();
            };
            by_table
                .get(&event.table)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default()
        };

        let mut result = Vec::new();
        if let Ok(by_id) = self.by_id.read() {
            for id in ids {
                if let Some(sub) = by_id.get(&id) {
                    if sub.matches(event) {
                        result.push(sub.clone());
                    }
                }
            }
        }
        result
    }

    /// Subscriptions riding a specific channel
    pub fn on_channel(&self, channel: &ChannelKey) -> Vec<Subscription> {
        self.by_id
            .read()
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|sub| &sub.channel == channel)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Live subscriptions on one channel
    pub fn channel_count(&self, channel: &ChannelKey) -> usize {
        self.by_id
            .read()
            .map(|by_id| by_id.values().filter(|s| &s.channel == channel).count())
            .unwrap_or(0)
    }

    /// Total subscription count
    pub fn len(&self) -> usize {
        self.by_id.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
