//! Cache Module
//!
//! Deduplicating TTL cache with stale-while-revalidate reads.

mod entry;
mod events;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

use std::time::Duration;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use events::{CacheEvent, CacheEventKind};
pub use stats::CacheStats;
pub use store::{CacheConfig, Fetch, FetchOutcome, MapCache};

// == Public Constants ==
/// Validity window applied to freshly stored values by default
pub const DEFAULT_EXPIRY: Duration = Duration::from_millis(3000);
