//! Cache Metrics
//!
//! Lookup, write and eviction counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by store operations
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expired_reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    sweeps: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub expired_reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub sweeps: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_expired_read(&self) {
        self.expired_reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self, evicted: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_reads: self.expired_reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Get a summary of metrics
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }
}

impl StatsSnapshot {
    /// Total reads, expired ones included
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses + self.expired_reads
    }

    /// Fraction of reads that returned a value
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Lookups: {} (hit ratio {:.3}) | Writes: {} | Deletes: {} | Sweeps: {} evicted {}",
            self.lookups(),
            self.hit_ratio(),
            self.writes,
            self.deletes,
            self.sweeps,
            self.evictions
        )
    }
}
