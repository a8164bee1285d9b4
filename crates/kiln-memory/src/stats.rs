//! Atomic pool statistics for lock-free usage tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Statistics for pool usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Lookups served from the idle bag.
    pub hits: u64,
    /// Lookups that found no acceptable idle item.
    pub misses: u64,
    /// Items created by the assistant.
    pub created: u64,
    /// Items returned to the idle bag.
    pub returns: u64,
    /// Candidates rejected by `evaluate` and pushed back.
    pub rejections: u64,
    /// Items dropped on return instead of pooled.
    pub discards: u64,
    /// Whole-pool sweeps triggered by the assistant.
    pub sweeps: u64,
    /// Idle items destroyed by sweeps.
    pub evictions: u64,
}

impl PoolStats {
    /// Fraction of lookups served from the idle bag.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Atomic pool statistics for lock-free updates.
#[derive(Debug, Default)]
pub struct AtomicPoolStats {
    hits: AtomicU64,
    misses: AtomicU64,
    created: AtomicU64,
    returns: AtomicU64,
    rejections: AtomicU64,
    discards: AtomicU64,
    sweeps: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicPoolStats {
    /// Create new zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of current stats.
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.created,
            &self.returns,
            &self.rejections,
            &self.discards,
            &self.sweeps,
            &self.evictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Increment hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment creation counter.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment return counter.
    pub fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment rejection counter.
    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment discard counter.
    pub fn record_discard(&self) {
        self.discards.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one sweep that destroyed `evicted` idle items.
    pub fn record_sweep(&self, evicted: u64) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
    }
}
