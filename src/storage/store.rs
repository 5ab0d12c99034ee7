//! In-Memory Key-Value Store
//!
//! Single-lock hashmap with per-entry expiration.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::metrics::{CacheStats, StatsSnapshot};

use super::cache::Cache;
use super::entry::{unix_nanos_now, Entry, Expiration};
use super::janitor::{ExpirySweep, Janitor};

/// Expiration requested by a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the store's configured default expiration
    #[default]
    Default,
    /// Never expire
    Never,
    /// Expire this long after the write. Zero means never.
    After(Duration),
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

struct Table<V> {
    items: HashMap<String, Entry<V>>,
    include_expired: bool,
}

/// State shared between a store and its janitor
struct Shared<V> {
    table: Mutex<Table<V>>,
    default_expiration: Duration,
    stats: CacheStats,
}

impl<V> Shared<V> {
    fn delete_expired(&self) -> usize {
        let now = unix_nanos_now();
        let removed = {
            let mut table = self.table.lock();
            let before = table.items.len();
            table
                .items
                .retain(|_, entry| !entry.expiration.is_expired_at(now));
            before - table.items.len()
        };
        self.stats.record_sweep(removed);
        removed
    }
}

impl<V: Send + 'static> ExpirySweep for Shared<V> {
    fn delete_expired(&self) -> usize {
        Shared::delete_expired(self)
    }
}

/// Thread-safe in-memory key-value store with per-entry expiration.
///
/// A single mutex guards the whole entry table; every operation holds it for
/// its full duration. Share a store between threads with `Arc<Store<V>>`.
///
/// Expired entries are hidden from `get` and `items` but stay in the table
/// until `delete_expired` runs, either called directly or from the janitor
/// configured through [`StoreConfig::cleanup_interval`].
///
/// # Example
///
/// ```rust,no_run
/// use ephemera::{Store, StoreConfig, Ttl};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> ephemera::Result<()> {
///     let config = StoreConfig::default()
///         .with_default_expiration(Duration::from_secs(300))
///         .with_cleanup_interval(Duration::from_secs(30));
///     let store = Store::with_config(config)?;
///
///     store.put("user:123", "John Doe".to_string(), Ttl::Default)?;
///     assert_eq!(store.get("user:123")?, "John Doe");
///     Ok(())
/// }
/// ```
pub struct Store<V> {
    shared: Arc<Shared<V>>,
    janitor: Option<Janitor>,
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V> {
    /// Create an empty store with no janitor and no default expiration
    pub fn new() -> Self {
        Self::from_parts(HashMap::new(), Duration::ZERO)
    }

    fn from_parts(items: HashMap<String, Entry<V>>, default_expiration: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(Table {
                    items,
                    include_expired: false,
                }),
                default_expiration,
                stats: CacheStats::new(),
            }),
            janitor: None,
        }
    }

    /// Store a value, replacing any existing entry for the key.
    ///
    /// The expiration is computed at call time. Never fails for this store;
    /// `Error::ValueNotStored` is reserved for bounded stores.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Ttl) -> Result<()> {
        let expiration = match ttl {
            Ttl::Never => Expiration::Never,
            Ttl::Default => Expiration::after(self.shared.default_expiration),
            Ttl::After(d) => Expiration::after(d),
        };
        let entry = Entry::new(value, expiration);

        self.shared.table.lock().items.insert(key.into(), entry);
        self.shared.stats.record_write();
        Ok(())
    }

    /// Remove a key regardless of its expiration
    pub fn delete(&self, key: &str) -> Result<()> {
        if self.shared.table.lock().items.remove(key).is_none() {
            return Err(Error::KeyNotFound);
        }
        self.shared.stats.record_delete();
        Ok(())
    }

    /// Toggle whether `get` and `items` surface expired entries
    pub fn with_expired(&self, include: bool) -> &Self {
        self.shared.table.lock().include_expired = include;
        self
    }

    /// Remove every expired entry, returning how many were removed.
    ///
    /// Ignores the `with_expired` toggle.
    pub fn delete_expired(&self) -> usize {
        self.shared.delete_expired()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.shared.table.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters for this store
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Janitor bound to this store, if one was configured
    pub fn janitor(&self) -> Option<&Janitor> {
        self.janitor.as_ref()
    }
}

impl<V: Clone> Store<V> {
    /// Get a value by key.
    ///
    /// Fails with `KeyNotFound` when absent and with `ItemExpired` when the
    /// entry has expired and expired entries are hidden. An expired entry is
    /// left in place for the next sweep.
    pub fn get(&self, key: &str) -> Result<V> {
        let table = self.shared.table.lock();
        let Some(entry) = table.items.get(key) else {
            self.shared.stats.record_miss();
            return Err(Error::KeyNotFound);
        };
        if !table.include_expired && entry.is_expired() {
            self.shared.stats.record_expired_read();
            return Err(Error::ItemExpired);
        }
        self.shared.stats.record_hit();
        Ok(entry.value.clone())
    }

    /// Copy all visible entries into a new map
    pub fn items(&self) -> HashMap<String, Entry<V>> {
        let now = unix_nanos_now();
        let table = self.shared.table.lock();
        table
            .items
            .iter()
            .filter(|(_, entry)| table.include_expired || !entry.expiration.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }
}

impl<V: Send + 'static> Store<V> {
    /// Create a store from configuration.
    ///
    /// Seeded items are taken verbatim. A non-zero cleanup interval starts a
    /// janitor on the current Tokio runtime; without one this fails with
    /// `Error::NoRuntime`.
    pub fn with_config(config: StoreConfig<V>) -> Result<Self> {
        let wants_janitor = config.wants_janitor();
        let mut store = Self::from_parts(config.items, config.default_expiration);

        if wants_janitor {
            let janitor = Janitor::new(config.cleanup_interval);
            // Task is detached; it exits on stop or once the store is gone
            janitor.start(&store.shared)?;
            store.janitor = Some(janitor);
        }

        debug!(
            items = store.len(),
            janitor = wants_janitor,
            "Store created"
        );
        Ok(store)
    }
}

impl<V: Send + 'static> ExpirySweep for Store<V> {
    fn delete_expired(&self) -> usize {
        Store::delete_expired(self)
    }
}

impl<V: Clone + Send + 'static> Cache<V> for Store<V> {
    fn get(&self, key: &str) -> Result<V> {
        Store::get(self, key)
    }

    fn put(&self, key: String, value: V, ttl: Ttl) -> Result<()> {
        Store::put(self, key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        Store::delete(self, key)
    }

    fn items(&self) -> HashMap<String, Entry<V>> {
        Store::items(self)
    }

    fn with_expired(&self, include: bool) -> &dyn Cache<V> {
        Store::with_expired(self, include)
    }

    fn delete_expired(&self) -> usize {
        Store::delete_expired(self)
    }
}

impl<V> Drop for Store<V> {
    fn drop(&mut self) {
        if let Some(janitor) = &self.janitor {
            janitor.stop();
        }
    }
}

impl<V> std::fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .field("default_expiration", &self.shared.default_expiration)
            .field("janitor", &self.janitor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JanitorState;
    use std::thread;
    use tokio_test::{assert_err, assert_ok};

    fn expired_millis_ago(ms: i64) -> Expiration {
        Expiration::At(unix_nanos_now() - ms * 1_000_000)
    }

    fn seeded(items: Vec<(&str, Entry<&'static str>)>) -> Store<&'static str> {
        let config = StoreConfig::default()
            .with_items(items.into_iter().map(|(k, e)| (k.to_string(), e)));
        assert_ok!(Store::with_config(config))
    }

    fn seeded_strings(items: Vec<(&str, Entry<String>)>) -> Store<String> {
        let config = StoreConfig::default()
            .with_items(items.into_iter().map(|(k, e)| (k.to_string(), e)));
        assert_ok!(Store::with_config(config))
    }

    #[test]
    fn test_get_miss() {
        let store: Store<String> = Store::new();
        assert_eq!(store.get("foo"), Err(Error::KeyNotFound));
    }

    #[test]
    fn test_get_hit_default_sentinel() {
        let store = seeded(vec![("foo", Entry::new("bar", Expiration::Default))]);
        assert_eq!(store.get("foo"), Ok("bar"));
    }

    #[test]
    fn test_get_no_expiration() {
        let store = seeded(vec![("foo", Entry::new("bar", Expiration::Never))]);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("foo"), Ok("bar"));
    }

    #[test]
    fn test_get_expired_then_with_expired() {
        let store = seeded(vec![("foo", Entry::new("bar", expired_millis_ago(1)))]);

        assert_eq!(store.get("foo"), Err(Error::ItemExpired));
        // Deferred deletion: the entry is still stored
        assert_eq!(store.len(), 1);

        assert_eq!(store.with_expired(true).get("foo"), Ok("bar"));
        assert_eq!(store.with_expired(false).get("foo"), Err(Error::ItemExpired));
    }

    #[test]
    fn test_get_valid_before_deadline() {
        let deadline = Expiration::after(Duration::from_secs(5));
        let store = seeded(vec![("foo", Entry::new("bar", deadline))]);
        thread::sleep(Duration::from_millis(1));
        assert_eq!(store.get("foo"), Ok("bar"));
    }

    #[test]
    fn test_put_and_get() {
        let store = Store::new();
        assert_ok!(store.put("foo", "bar".to_string(), Ttl::Never));
        assert_eq!(store.get("foo"), Ok("bar".to_string()));

        // Overwrite
        assert_ok!(store.put("foo", "baz".to_string(), Ttl::After(Duration::from_secs(60))));
        assert_eq!(store.get("foo"), Ok("baz".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_ttl_expires() {
        let store = Store::new();
        assert_ok!(store.put("foo", 1u32, Ttl::After(Duration::from_millis(3))));
        assert_eq!(store.get("foo"), Ok(1));

        thread::sleep(Duration::from_millis(10));
        assert_eq!(store.get("foo"), Err(Error::ItemExpired));
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let store = Store::new();
        assert_ok!(store.put("foo", 1u32, Ttl::After(Duration::ZERO)));
        assert_eq!(store.items()["foo"].expiration, Expiration::Never);
    }

    #[test]
    fn test_default_expiration() {
        let config = StoreConfig::default().with_default_expiration(Duration::from_millis(1));
        let store = assert_ok!(Store::with_config(config));
        assert_ok!(store.put("foo", "bar", Ttl::Default));

        thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("foo"), Err(Error::ItemExpired));
    }

    #[test]
    fn test_zero_default_expiration_never_expires() {
        let store = Store::new();
        assert_ok!(store.put("foo", "bar", Ttl::Default));
        thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("foo"), Ok("bar"));
        assert_eq!(store.items()["foo"].expiration, Expiration::Never);
    }

    #[test]
    fn test_delete() {
        let store = Store::new();
        assert_eq!(store.delete("missing"), Err(Error::KeyNotFound));

        assert_ok!(store.put("foo", "bar", Ttl::Never));
        assert_ok!(store.delete("foo"));
        assert_eq!(store.get("foo"), Err(Error::KeyNotFound));
        assert_err!(store.delete("foo"));
    }

    #[test]
    fn test_delete_expired_entry() {
        let store = seeded(vec![("foo", Entry::new("bar", expired_millis_ago(5)))]);
        assert_ok!(store.delete("foo"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_items_filters_expired() {
        let store = seeded(vec![
            ("default", Entry::new("foo", Expiration::Default)),
            ("never", Entry::new("bar", Expiration::Never)),
            ("expired", Entry::new("baz", expired_millis_ago(3_600_000))),
        ]);

        let items = store.items();
        assert!(items.contains_key("default"));
        assert!(items.contains_key("never"));
        assert!(!items.contains_key("expired"));

        let all = store.with_expired(true).items();
        assert_eq!(all.len(), 3);
        assert_eq!(all["expired"].value, "baz");
    }

    #[test]
    fn test_items_is_a_copy() {
        let store = Store::new();
        assert_ok!(store.put("foo", "bar", Ttl::Never));

        let mut snapshot = store.items();
        snapshot.clear();
        assert_ok!(store.put("other", "value", Ttl::Never));

        assert!(snapshot.is_empty());
        assert_eq!(store.items().len(), 2);
    }

    #[test]
    fn test_delete_expired_ignores_toggle_and_is_idempotent() {
        let store = seeded(vec![
            ("old", Entry::new("a", expired_millis_ago(10))),
            ("older", Entry::new("b", expired_millis_ago(20))),
            ("fresh", Entry::new("c", Expiration::after(Duration::from_secs(60)))),
            ("never", Entry::new("d", Expiration::Never)),
        ]);

        store.with_expired(true);
        assert_eq!(store.delete_expired(), 2);
        let after_first = store.items();

        assert_eq!(store.delete_expired(), 0);
        assert_eq!(store.items(), after_first);
        assert_eq!(store.len(), 2);

        let stats = store.stats();
        assert_eq!(stats.sweeps, 2);
        assert_eq!(stats.evictions, 2);
    }

    #[test]
    fn test_stats_track_reads() {
        let store = seeded(vec![("stale", Entry::new("x", expired_millis_ago(1)))]);
        assert_ok!(store.put("foo", "bar", Ttl::Never));

        assert_ok!(store.get("foo"));
        assert_err!(store.get("missing"));
        assert_err!(store.get("stale"));
        assert_ok!(store.delete("foo"));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expired_reads, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(Store::new());

        // Spawn multiple threads writing concurrently
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let s = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("key-{}-{}", i, j);
                        s.put(key.clone(), i * 100 + j, Ttl::Never).unwrap();
                        assert_eq!(s.get(&key), Ok(i * 100 + j));
                        if j % 10 == 0 {
                            s.delete_expired();
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
        assert_eq!(store.items().len(), 1000);
    }

    #[test]
    fn test_janitor_requires_runtime() {
        let config: StoreConfig<u8> =
            StoreConfig::default().with_cleanup_interval(Duration::from_millis(1));
        assert_eq!(Store::with_config(config).err(), Some(Error::NoRuntime));
    }

    #[tokio::test]
    async fn test_cleanup_interval() {
        let config = StoreConfig::default().with_cleanup_interval(Duration::from_millis(1));
        let store = assert_ok!(Store::with_config(config));
        assert_eq!(
            store.janitor().map(Janitor::state),
            Some(JanitorState::Running)
        );

        assert_ok!(store.put("foo", "bar", Ttl::After(Duration::from_millis(3))));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!store.items().contains_key("foo"));
        // Evicted by the janitor, not merely hidden
        assert!(!store.with_expired(true).items().contains_key("foo"));
        assert!(store.stats().evictions >= 1);
    }

    fn lookup_or_fill<C: Cache<String> + ?Sized>(cache: &C, key: &str) -> Result<String> {
        match cache.get(key) {
            Err(e) if e.is_miss() => {
                let value = format!("filled:{}", key);
                cache.put(key.to_string(), value.clone(), Ttl::Never)?;
                Ok(value)
            }
            other => other,
        }
    }

    #[test]
    fn test_store_through_cache_trait() {
        let store = seeded_strings(vec![(
            "stale",
            Entry::new("old".to_string(), expired_millis_ago(1)),
        )]);
        let cache: &dyn Cache<String> = &store;

        assert_eq!(lookup_or_fill(cache, "foo"), Ok("filled:foo".to_string()));
        assert_eq!(cache.get("foo"), Ok("filled:foo".to_string()));

        assert_eq!(cache.with_expired(true).get("stale"), Ok("old".to_string()));
        assert_eq!(cache.with_expired(false).items().len(), 1);
        assert_eq!(cache.delete_expired(), 1);
        assert_eq!(lookup_or_fill(cache, "stale"), Ok("filled:stale".to_string()));

        assert_ok!(cache.delete("foo"));
        assert_eq!(cache.delete("foo"), Err(Error::KeyNotFound));
    }

    #[tokio::test]
    async fn test_drop_cancels_running_janitor() {
        let config: StoreConfig<u8> =
            StoreConfig::default().with_cleanup_interval(Duration::from_secs(60));
        let store = assert_ok!(Store::with_config(config));
        let janitor = assert_ok!(store.janitor().ok_or(()));
        assert_eq!(janitor.state(), JanitorState::Running);
        let token = janitor.cancel_token();
        assert!(!token.is_cancelled());

        drop(store);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_drop_after_explicit_stop() {
        let config: StoreConfig<u8> =
            StoreConfig::default().with_cleanup_interval(Duration::from_millis(1));
        let store = assert_ok!(Store::with_config(config));
        let janitor = assert_ok!(store.janitor().ok_or(()));
        assert!(janitor.stop());
        assert_eq!(janitor.state(), JanitorState::Stopped);
        // Drop after an explicit stop must not stop twice
        drop(store);
    }

    #[tokio::test]
    async fn test_standalone_janitor_drives_store() {
        let store = Arc::new(Store::new());
        assert_ok!(store.put("foo", "bar", Ttl::After(Duration::from_millis(3))));

        let janitor = Janitor::new(Duration::from_millis(1));
        let _handle = assert_ok!(janitor.start(&store));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!store.with_expired(true).items().contains_key("foo"));
        janitor.stop();
    }
}
