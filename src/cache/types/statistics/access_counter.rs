//! Per-tier hit/miss bookkeeping with cache-line aligned atomics
//!
//! Counters are an interior-mutable side channel: lookups that are logically
//! reads (`&self`) still record their outcome. Owners update them inside the
//! same critical section that protects the tier data.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Point-in-time copy of an [`AccessCounter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessSnapshot {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

impl AccessSnapshot {
    pub fn hit_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }

    pub fn miss_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.misses as f64 / self.accesses as f64
        }
    }
}

/// Monotonic access, hit and miss counters
#[derive(Debug)]
pub struct AccessCounter {
    accesses: CachePadded<AtomicU64>,
    hits: CachePadded<AtomicU64>,
    misses: CachePadded<AtomicU64>,
}

impl AccessCounter {
    pub fn new() -> Self {
        Self {
            accesses: CachePadded::new(AtomicU64::new(0)),
            hits: CachePadded::new(AtomicU64::new(0)),
            misses: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Record one lookup outcome
    #[inline(always)]
    pub fn record(&self, hit: bool) {
        self.accesses.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn hit(&self) {
        self.record(true);
    }

    #[inline(always)]
    pub fn miss(&self) {
        self.record(false);
    }

    pub fn reset(&self) {
        self.accesses.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn accesses(&self) -> u64 {
        self.accesses.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        self.snapshot().hit_ratio()
    }

    pub fn miss_ratio(&self) -> f64 {
        self.snapshot().miss_ratio()
    }

    pub fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot {
            accesses: self.accesses(),
            hits: self.hits(),
            misses: self.misses(),
        }
    }

    /// Human readable one-line summary, ratios in percent
    pub fn summary(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "Accesses: {}, Hits: {}, Misses: {}, Hit ratio: {:.2}%, Miss ratio: {:.2}%",
            snapshot.accesses,
            snapshot.hits,
            snapshot.misses,
            snapshot.hit_ratio() * 100.0,
            snapshot.miss_ratio() * 100.0
        )
    }

    pub fn log_summary(&self, prefix: &str) {
        log::info!("{}{}", prefix, self.summary());
    }
}

impl Default for AccessCounter {
    fn default() -> Self {
        Self::new()
    }
}
