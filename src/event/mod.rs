//! # Change Events
//!
//! Typed change notifications consumed from the CDC transport, plus the
//! identity helpers every reconciliation strategy keys on.
//!
//! ## Architecture
//!
//! - **ChangePayload**: raw wire payload as delivered per channel
//! - **ChangeEvent**: validated event (payload presence invariants enforced)
//! - **Identity**: stable record identity used for dedup/replace/remove

pub mod change;
pub mod errors;
pub mod identity;

pub use change::{ChangeEvent, ChangePayload, Operation};
pub use errors::{EventError, EventResult};
pub use identity::{identity_of, item_position, Identity, IdentityFields};
