//! API Module
//!
//! Demo HTTP service putting the primitives in front of a slow upstream.
//!
//! # Endpoints
//! - `GET /items/:id` - Read an item through the cache
//! - `PUT /items/:id` - Store an item
//! - `DELETE /items/:id` - Remove an item
//! - `POST /items/:id/refresh` - Reload an item from upstream
//! - `POST /sweep` - Remove expired items
//! - `GET /stats` - Cache, lock and sweep statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;
mod upstream;

pub use handlers::*;
pub use routes::create_router;
pub use upstream::{Item, ItemSource, Upstream, UpstreamError, BROKEN_PREFIX, MISSING_PREFIX};
