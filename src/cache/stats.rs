//! Cache Statistics Module
//!
//! Counters describing how reads were served and how many upstream fetches
//! were started or joined.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache read and fetch activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served from a stored entry (including stale ones)
    pub hits: u64,
    /// Hits whose entry had expired and triggered a background refresh
    pub stale_hits: u64,
    /// Reads that found no entry and had to fetch
    pub misses: u64,
    /// Fallback invocations
    pub fetches: u64,
    /// Fetch requests that joined an in-flight fetch instead of starting one
    pub joined_fetches: u64,
    /// Current number of stored entries
    pub total_entries: usize,
    /// Current number of in-flight fetches
    pub in_flight: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub(crate) fn record_hit(&mut self, stale: bool) {
        self.hits += 1;
        if stale {
            self.stale_hits += 1;
        }
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub(crate) fn record_joined_fetch(&mut self) {
        self.joined_fetches += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.fetches, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit(false);
        stats.record_hit(true);
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.stale_hits, 1);
    }

    #[test]
    fn test_fetch_counters() {
        let mut stats = CacheStats::new();
        stats.record_fetch();
        stats.record_joined_fetch();
        stats.record_joined_fetch();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.joined_fetches, 2);
    }
}
