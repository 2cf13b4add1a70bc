//! Cache Entry Module
//!
//! A stored value together with its expiry timestamp.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A single cached value.
///
/// Expiry is advisory: an expired entry stays readable until something
/// removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix milliseconds)
    pub expire_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry expiring at `expire_at` (Unix milliseconds).
    pub fn new(value: V, expire_at: u64) -> Self {
        Self { value, expire_at }
    }

    // == Is Expired ==
    /// Checks expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against `now`.
    ///
    /// An entry is expired strictly after its `expire_at`; at `expire_at`
    /// itself it is still valid.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expire_at < now
    }

    // == Time To Live ==
    /// Returns remaining validity in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expire_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
