//! # Channel Lifecycle
//!
//! Reference-counted ownership of the underlying CDC channels. A channel is
//! opened on the first subscriber for a `(table, filter)` pair and closed
//! when the count returns to zero. Teardown is asynchronous: the transport
//! confirms the close later, and a re-subscribe arriving in between is
//! queued rather than opening a duplicate channel.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::observability::Logger;

/// Identity of one underlying channel: table plus raw filter string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    /// Table name
    pub table: String,
    /// Raw filter expression, if any
    pub filter: Option<String>,
}

impl ChannelKey {
    /// Channel for a whole table
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    /// Channel narrowed by a filter expression
    pub fn filtered(table: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Some(filter.into()),
        }
    }

    /// Topic string for transports and log lines
    pub fn topic(&self) -> String {
        match &self.filter {
            Some(filter) => format!("changes:{}:{}", self.table, filter),
            None => format!("changes:{}", self.table),
        }
    }
}

/// Per-channel lifecycle state
///
/// `Unsubscribed → Subscribed → Unsubscribing → Unsubscribed` is the only
/// valid cycle. Re-entering `Subscribed` from `Unsubscribing` waits for the
/// transport's teardown confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel open
    Unsubscribed,
    /// Channel open (or open requested) with at least one subscriber
    Subscribed,
    /// Close requested, awaiting transport confirmation
    Unsubscribing,
}

/// Connectivity status delivered to subscribers' `on_status` hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Channel confirmed open
    Subscribed,
    /// Channel closed
    Closed,
    /// Transport-level error; not retried here, the transport owns
    /// reconnection policy
    Error(String),
}

/// External transport the registry delegates channel I/O to.
///
/// Both calls return immediately; confirmations arrive later as status
/// callbacks. Open/close must be idempotent per key.
pub trait Transport: Send + Sync {
    /// Request a channel open
    fn open(&self, key: &ChannelKey);

    /// Request a channel close
    fn close(&self, key: &ChannelKey);
}

/// Transport that performs no I/O. Stand-in during startup and in tests.
#[derive(Debug, Default, Clone)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn open(&self, _key: &ChannelKey) {}

    fn close(&self, _key: &ChannelKey) {}
}

#[derive(Debug)]
struct ChannelSlot {
    state: ChannelState,
    subscribers: usize,
    /// A subscriber arrived while teardown was in flight; reopen on confirm
    reopen_pending: bool,
    /// Monotonic per-channel delivery counter
    delivered: u64,
}

impl ChannelSlot {
    fn new() -> Self {
        Self {
            state: ChannelState::Unsubscribed,
            subscribers: 0,
            reopen_pending: false,
            delivered: 0,
        }
    }
}

/// Reference-counted channel manager
pub struct ChannelManager {
    transport: std::sync::Arc<dyn Transport>,
    channels: RwLock<HashMap<ChannelKey, ChannelSlot>>,
}

impl ChannelManager {
    /// Create a manager over a transport
    pub fn new(transport: std::sync::Arc<dyn Transport>) -> Self {
        Self {
            transport,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register one subscriber interest. Opens the channel on the first.
    pub fn acquire(&self, key: &ChannelKey) {
        let mut open = false;
        if let Ok(mut channels) = self.channels.write() {
            let slot = channels.entry(key.clone()).or_insert_with(ChannelSlot::new);
            slot.subscribers += 1;
            match slot.state {
                ChannelState::Unsubscribed => {
                    slot.state = ChannelState::Subscribed;
                    open = true;
                }
                ChannelState::Subscribed => {}
                ChannelState::Unsubscribing => {
                    // Wait for teardown; confirm_closed reopens
                    slot.reopen_pending = true;
                }
            }
        }
        if open {
            Logger::info("CHANNEL_OPEN", &[("topic", &key.topic())]);
            self.transport.open(key);
        }
    }

    /// Drop one subscriber interest. Requests close when none remain.
    pub fn release(&self, key: &ChannelKey) {
        let mut close = false;
        if let Ok(mut channels) = self.channels.write() {
            let Some(slot) = channels.get_mut(key) else {
                return;
            };
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                slot.reopen_pending = false;
                if slot.state == ChannelState::Subscribed {
                    slot.state = ChannelState::Unsubscribing;
                    close = true;
                }
            }
        }
        if close {
            Logger::info("CHANNEL_CLOSE", &[("topic", &key.topic())]);
            self.transport.close(key);
        }
    }

    /// Transport confirmed the channel is torn down. Returns true when the
    /// channel was reopened for subscribers that arrived during teardown.
    pub fn confirm_closed(&self, key: &ChannelKey) -> bool {
        let mut reopen = false;
        if let Ok(mut channels) = self.channels.write() {
            let Some(slot) = channels.get_mut(key) else {
                return false;
            };
            if slot.state != ChannelState::Unsubscribing {
                return false;
            }
            if slot.reopen_pending && slot.subscribers > 0 {
                slot.reopen_pending = false;
                slot.state = ChannelState::Subscribed;
                reopen = true;
            } else {
                channels.remove(key);
            }
        }
        if reopen {
            Logger::info("CHANNEL_REOPEN", &[("topic", &key.topic())]);
            self.transport.open(key);
        }
        reopen
    }

    /// Current state of a channel
    pub fn state(&self, key: &ChannelKey) -> ChannelState {
        self.channels
            .read()
            .ok()
            .and_then(|channels| channels.get(key).map(|s| s.state))
            .unwrap_or(ChannelState::Unsubscribed)
    }

    /// Subscriber count on a channel
    pub fn subscriber_count(&self, key: &ChannelKey) -> usize {
        self.channels
            .read()
            .ok()
            .and_then(|channels| channels.get(key).map(|s| s.subscribers))
            .unwrap_or(0)
    }

    /// Record one delivery on a channel, returning its new sequence number.
    /// Events are not reordered or rejected; the counter only makes
    /// out-of-order transports observable.
    pub fn record_delivery(&self, key: &ChannelKey) -> u64 {
        self.channels
            .write()
            .ok()
            .and_then(|mut channels| {
                channels.get_mut(key).map(|slot| {
                    slot.delivered += 1;
                    slot.delivered
                })
            })
            .unwrap_or(0)
    }

    /// Last delivery sequence seen on a channel
    pub fn last_sequence(&self, key: &ChannelKey) -> u64 {
        self.channels
            .read()
            .ok()
            .and_then(|channels| channels.get(key).map(|s| s.delivered))
            .unwrap_or(0)
    }

    /// Number of channels currently open or opening
    pub fn open_count(&self) -> usize {
        self.channels
            .read()
            .map(|channels| {
                channels
                    .values()
                    .filter(|s| s.state == ChannelState::Subscribed)
                    .count()
            })
            .unwrap_or(0)
    }
}
