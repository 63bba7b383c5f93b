//! # Event Router
//!
//! Fans one change event out to every matching subscription's handler for
//! that operation. A failure in one consumer's handler is forwarded to that
//! consumer's `on_error` hook (or logged and swallowed) and never prevents
//! delivery to the others.

use std::sync::Arc;

use super::channel::{ChannelKey, ChannelStatus};
use super::subscription::SubscriptionRegistry;
use crate::event::{ChangeEvent, Operation};
use crate::observability::Logger;

/// Result of routing one event
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Number of matching subscriptions
    pub matched: usize,
    /// Number of handlers that ran successfully
    pub delivered: usize,
    /// Number of subscriptions with no handler for this operation
    pub dropped: usize,
    /// Number of handlers that failed
    pub failed: usize,
}

/// Event router over a subscription registry
pub struct EventRouter {
    registry: Arc<SubscriptionRegistry>,
}

impl EventRouter {
    /// Create a router
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch an event to all matching subscriptions
    pub fn route(&self, event: &ChangeEvent) -> RouteOutcome {
        let subscriptions = self.registry.matching(event);

        let mut outcome = RouteOutcome {
            matched: subscriptions.len(),
            ..RouteOutcome::default()
        };

        for subscription in subscriptions {
            let handler = match event.operation {
                Operation::Insert => &subscription.handlers.on_insert,
                Operation::Update => &subscription.handlers.on_update,
                Operation::Delete => &subscription.handlers.on_delete,
            };

            // No handler registered for this operation: dropped, not an error
            let Some(handler) = handler else {
                outcome.dropped += 1;
                continue;
            };

            match handler(event) {
                Ok(()) => outcome.delivered += 1,
                Err(err) => {
                    outcome.failed += 1;
                    match &subscription.handlers.on_error {
                        Some(on_error) => on_error(&err),
                        None => Logger::warn(
                            "HANDLER_ERROR",
                            &[
                                ("error", &err.to_string()),
                                ("operation", &event.operation.to_string()),
                                ("table", &event.table),
                            ],
                        ),
                    }
                }
            }
        }

        outcome
    }

    /// Fan a connectivity status out to every subscription on a channel
    pub fn notify_status(&self, channel: &ChannelKey, status: &ChannelStatus) {
        for subscription in self.registry.on_channel(channel) {
            if let Some(on_status) = &subscription.handlers.on_status {
                on_status(status);
            }
        }
    }
}
