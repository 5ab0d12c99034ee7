//! Error Types
//!
//! Failures surfaced by store and janitor operations.

use thiserror::Error;

use crate::storage::JanitorState;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by cache operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Key is not present in the store
    #[error("key not found in cache")]
    KeyNotFound,

    /// Key is present but its entry has expired
    #[error("item has expired")]
    ItemExpired,

    /// Value was rejected by the store.
    ///
    /// Reserved for bounded stores; the unbounded `Store` never returns it.
    #[error("value not stored")]
    ValueNotStored,

    /// A janitor was requested outside of a Tokio runtime
    #[error("janitor requires a Tokio runtime; construct the store from within one")]
    NoRuntime,

    /// Janitor was already started or has been stopped
    #[error("janitor cannot be started from the {state:?} state")]
    JanitorNotIdle { state: JanitorState },
}

impl Error {
    /// Returns true for lookup misses (absent or expired keys)
    pub fn is_miss(&self) -> bool {
        matches!(self, Error::KeyNotFound | Error::ItemExpired)
    }
}
