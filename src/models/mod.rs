//! Request and Response models for the demo service API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::SetItemRequest;
pub use responses::{
    DeleteResponse, ErrorResponse, HealthResponse, ItemResponse, SetResponse, StatsResponse,
    SweepResponse,
};
