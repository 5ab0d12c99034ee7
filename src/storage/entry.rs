//! Cache Entries
//!
//! Stored values paired with their absolute expiration.

use chrono::Utc;
use std::time::Duration;

/// Raw timestamp carried by [`Expiration::Never`]
pub const NO_EXPIRATION_NANOS: i64 = -1;

/// Raw timestamp carried by [`Expiration::Default`]
pub const DEFAULT_EXPIRATION_NANOS: i64 = 0;

/// Current wall-clock time as Unix nanoseconds.
///
/// Saturates at `i64::MAX` past the year 2262.
pub fn unix_nanos_now() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// When an entry stops being visible to reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// Never expires
    Never,
    /// Placeholder for the store's default; never expires once stored
    Default,
    /// Expires after this absolute Unix timestamp in nanoseconds
    At(i64),
}

impl Expiration {
    /// Builds an expiration from a raw timestamp, mapping the sentinel values
    pub fn from_unix_nanos(raw: i64) -> Self {
        match raw {
            NO_EXPIRATION_NANOS => Expiration::Never,
            DEFAULT_EXPIRATION_NANOS => Expiration::Default,
            ts => Expiration::At(ts),
        }
    }

    /// Expiration `ttl` from now. A zero duration never expires.
    pub fn after(ttl: Duration) -> Self {
        if ttl.is_zero() {
            return Expiration::Never;
        }
        let nanos = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        Expiration::At(unix_nanos_now().saturating_add(nanos))
    }

    /// Raw timestamp form, sentinels included
    pub fn as_unix_nanos(&self) -> i64 {
        match self {
            Expiration::Never => NO_EXPIRATION_NANOS,
            Expiration::Default => DEFAULT_EXPIRATION_NANOS,
            Expiration::At(ts) => *ts,
        }
    }

    /// Checks expiration against the current wall clock
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_nanos_now())
    }

    /// Only a positive timestamp strictly before `now` is expired; raw values
    /// equal to either sentinel never expire.
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        match *self {
            Expiration::Never | Expiration::Default => false,
            Expiration::At(ts) => ts > 0 && now > ts,
        }
    }
}

/// A stored value and its expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    pub value: V,
    pub expiration: Expiration,
}

impl<V> Entry<V> {
    pub fn new(value: V, expiration: Expiration) -> Self {
        Self { value, expiration }
    }

    /// Entry that never expires
    pub fn persistent(value: V) -> Self {
        Self::new(value, Expiration::Never)
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expiration.is_expired()
    }
}
