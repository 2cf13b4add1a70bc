//! Simulated Upstream
//!
//! Slow data source the demo service caches in front of. Ids starting with
//! [`MISSING_PREFIX`] have no data and ids starting with [`BROKEN_PREFIX`]
//! fail to load.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Ids with this prefix resolve to no data
pub const MISSING_PREFIX: &str = "missing-";

/// Ids with this prefix fail to load
pub const BROKEN_PREFIX: &str = "broken-";

/// Failure reported by the upstream source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("upstream failed to load '{0}'")]
pub struct UpstreamError(pub String);

/// Where a cached item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Upstream,
    Manual,
}

/// Value cached by the demo service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    pub payload: serde_json::Value,
    pub source: ItemSource,
    /// ISO 8601 time the item was produced
    pub produced_at: String,
}

impl Item {
    /// Creates an item stamped with the current time.
    pub fn new(id: impl Into<String>, payload: serde_json::Value, source: ItemSource) -> Self {
        Self {
            id: id.into(),
            payload,
            source,
            produced_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// == Upstream ==
/// Slow source that counts every load.
#[derive(Debug)]
pub struct Upstream {
    latency: Duration,
    loads: AtomicU64,
}

impl Upstream {
    /// Creates an upstream answering after `latency`.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            loads: AtomicU64::new(0),
        }
    }

    /// Loads `id` after the configured latency.
    pub async fn load(&self, id: String) -> Result<Option<Item>, UpstreamError> {
        tokio::time::sleep(self.latency).await;
        let load = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Upstream load #{} for '{}'", load, id);

        if id.starts_with(MISSING_PREFIX) {
            return Ok(None);
        }
        if id.starts_with(BROKEN_PREFIX) {
            return Err(UpstreamError(id));
        }

        let payload = json!({ "id": id, "load": load });
        Ok(Some(Item::new(id, payload, ItemSource::Upstream)))
    }

    /// Number of loads performed so far.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }
}
