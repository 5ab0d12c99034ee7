//! Storage Engine
//!
//! Expiration-aware key-value store and its background janitor.

mod cache;
mod entry;
mod janitor;
mod store;

pub use cache::Cache;
pub use entry::{
    unix_nanos_now, Entry, Expiration, DEFAULT_EXPIRATION_NANOS, NO_EXPIRATION_NANOS,
};
pub use janitor::{ExpirySweep, Janitor, JanitorState, MIN_INTERVAL};
pub use store::{Store, Ttl};
