//! Response DTOs for the demo service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::api::Item;
use crate::cache::CacheStats;

/// Response body for reading an item (GET /items/:id, POST /items/:id/refresh)
#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    /// The item
    pub item: Item,
    /// Whether the served value had already expired
    pub stale: bool,
}

/// Response body for storing an item (PUT /items/:id)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The stored id
    pub id: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("Item '{}' stored successfully", id),
            id,
        }
    }
}

/// Response body for removing an item (DELETE /items/:id)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The removed id
    pub id: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("Item '{}' removed", id),
            id,
        }
    }
}

/// Response body for a sweep (POST /sweep)
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    /// Number of expired entries removed
    pub removed: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Cache counters
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Sweeps currently running
    pub active_sweeps: usize,
    /// Sweep concurrency limit
    pub max_sweeps: usize,
    /// Ids currently locked, sorted
    pub locked: Vec<String>,
    /// Loads performed by the upstream source
    pub upstream_loads: u64,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_id");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_id"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("gone");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("gone"));
        assert!(json.contains("removed"));
    }

    #[test]
    fn test_stats_response_serialize() {
        let resp = StatsResponse {
            cache: CacheStats::new(),
            hit_rate: 0.0,
            active_sweeps: 0,
            max_sweeps: 1,
            locked: vec!["a".to_string()],
            upstream_loads: 3,
        };
        let json: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["cache"]["joined_fetches"], 0);
        assert_eq!(json["locked"][0], "a");
        assert_eq!(json["upstream_loads"], 3);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
