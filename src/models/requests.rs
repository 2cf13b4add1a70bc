//! Request DTOs for the demo service API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for storing an item (PUT /items/:id)
///
/// # Fields
/// - `value`: The JSON value to store
/// - `ttl_ms`: Optional validity in milliseconds (uses the cache expiry if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetItemRequest {
    /// The value to store
    pub value: serde_json::Value,
    /// Optional validity in milliseconds
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl SetItemRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.value.is_null() {
            return Some("Value cannot be null".to_string());
        }
        if self.ttl_ms == Some(0) {
            return Some("ttl_ms must be greater than zero".to_string());
        }
        None
    }
}
