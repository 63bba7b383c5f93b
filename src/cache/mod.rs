//! # Read Cache
//!
//! The query-keyed read cache boundary. The synchronization core depends
//! only on the narrow [`CacheStore`] interface and never on a store's
//! internal representation; [`MemoryCache`] is the reference store.

pub mod entry;
pub mod errors;
pub mod key;
pub mod store;

pub use entry::CacheEntry;
pub use errors::{CacheError, CacheResult};
pub use key::{KeyPart, QueryKey};
pub use store::{CacheStore, MemoryCache, Updater};
