//! Cache Interface
//!
//! Operations shared by every store variant, so callers can swap in a
//! bounded store without changing how they handle results.

use hashbrown::HashMap;

use crate::error::Result;

use super::entry::Entry;
use super::store::Ttl;

/// Expiration-aware key-value cache
pub trait Cache<V>: Send + Sync {
    /// Get a value; fails with `KeyNotFound` or `ItemExpired`
    fn get(&self, key: &str) -> Result<V>;

    /// Store a value, replacing any existing entry.
    ///
    /// Bounded stores may fail with `ValueNotStored`.
    fn put(&self, key: String, value: V, ttl: Ttl) -> Result<()>;

    /// Remove a key; fails with `KeyNotFound` when absent
    fn delete(&self, key: &str) -> Result<()>;

    /// Copy all visible entries into a new map
    fn items(&self) -> HashMap<String, Entry<V>>;

    /// Toggle whether reads surface expired entries
    fn with_expired(&self, include: bool) -> &dyn Cache<V>;

    /// Remove every expired entry, returning how many were removed
    fn delete_expired(&self) -> usize;
}
