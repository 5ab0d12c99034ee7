//! Store Configuration

use hashbrown::HashMap;
use std::time::Duration;

use crate::storage::Entry;

/// Default expiration applied by `Ttl::Default` (zero = never expire)
pub const DEFAULT_EXPIRATION: Duration = Duration::ZERO;

/// Default janitor interval (zero = no janitor)
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::ZERO;

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig<V> {
    /// Entries seeded into the store as-is, expired ones included
    pub items: HashMap<String, Entry<V>>,

    /// Duration substituted for `Ttl::Default` on writes
    pub default_expiration: Duration,

    /// Janitor sweep interval
    pub cleanup_interval: Duration,
}

impl<V> Default for StoreConfig<V> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            default_expiration: DEFAULT_EXPIRATION,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl<V> StoreConfig<V> {
    /// Seed the store with prebuilt entries
    pub fn with_items(mut self, items: impl IntoIterator<Item = (String, Entry<V>)>) -> Self {
        self.items = items.into_iter().collect();
        self
    }

    /// Set the default expiration
    pub fn with_default_expiration(mut self, expiration: Duration) -> Self {
        self.default_expiration = expiration;
        self
    }

    /// Set janitor interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Whether a janitor should be spawned for this configuration
    pub fn wants_janitor(&self) -> bool {
        !self.cleanup_interval.is_zero()
    }
}
