//! Ephemera - In-Process TTL Cache
//!
//! String-keyed store holding values of a single caller-chosen type, each
//! with an optional time-to-live. Expired entries are hidden from reads and
//! removed by `delete_expired`, which an optional background janitor calls
//! on a fixed interval.

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;

pub use config::{StoreConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_EXPIRATION};
pub use error::{Error, Result};
pub use metrics::{CacheStats, StatsSnapshot};
pub use storage::{Cache, Entry, Expiration, ExpirySweep, Janitor, JanitorState, Store, Ttl};
