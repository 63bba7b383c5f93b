//! # Subscription & Routing
//!
//! Binds consumers to `(table, filter)` channels and routes incoming change
//! events to their handlers.
//!
//! ## Architecture
//!
//! - **Filter**: `<field>=eq.<value>` predicates, passthrough on the wire
//! - **ChannelManager**: reference-counted channel lifecycle over a transport
//! - **SubscriptionRegistry**: per-consumer handler slots, fanned out
//!   independently
//! - **EventRouter**: operation dispatch with per-consumer error isolation

pub mod channel;
pub mod errors;
pub mod filter;
pub mod router;
pub mod subscription;

pub use channel::{ChannelKey, ChannelManager, ChannelState, ChannelStatus, NullTransport, Transport};
pub use errors::{HandlerError, SyncError, SyncResult};
pub use filter::Filter;
pub use router::{EventRouter, RouteOutcome};
pub use subscription::{EventHandlers, Subscription, SubscriptionHandle, SubscriptionRegistry};
